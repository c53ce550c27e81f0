use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

use crate::config::DepositionMode;

/// Number of species slots. Each species owns one channel of the trail field.
pub const MAX_SPECIES: usize = 4;

/// Movement and sensing parameters for one species.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeciesParams {
    /// RGB color used when compositing this species' trail channel.
    pub color: [f32; 3],
    /// Pixels per second.
    pub move_speed: f32,
    /// Radians per second. The sign flips which side the agent steers toward.
    pub turn_rate: f32,
    /// Angle between the straight sensor and each side sensor, in radians.
    pub sensor_spacing: f32,
    /// Distance from the agent to each sensor, in pixels.
    pub sensor_distance: f32,
}

impl SpeciesParams {
    /// Default parameters for a species slot. Slots 0..3 get the red, green and
    /// blue identity colors; the fourth slot starts black.
    pub fn default_for_index(index: usize) -> Self {
        let mut color = [0.0; 3];
        if index < 3 {
            color[index] = 1.0;
        }
        Self {
            color,
            move_speed: 40.0,
            turn_rate: PI,
            sensor_spacing: PI / 4.0,
            sensor_distance: 9.0,
        }
    }

    /// Trail channel weights used when sensing: +1 on the own channel, -1 on every other.
    pub fn sensing_weights(species_id: usize) -> [f32; MAX_SPECIES] {
        let mut weights = [-1.0; MAX_SPECIES];
        if species_id < MAX_SPECIES {
            weights[species_id] = 1.0;
        }
        weights
    }

    /// One-hot channel mask deposited by an agent of `species_id`.
    pub fn deposit_mask(species_id: usize) -> [f32; MAX_SPECIES] {
        let mut mask = [0.0; MAX_SPECIES];
        if species_id < MAX_SPECIES {
            mask[species_id] = 1.0;
        }
        mask
    }
}

/// Per-step parameters handed to both kernels, refreshed by the engine every frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    // Field
    pub width: u32,
    pub height: u32,

    // Time
    pub delta_time: f32,
    pub time: f64,
    pub frame: u32,

    // Agents
    pub num_agents: u32,
    pub species_count: u32,
    pub rng_seed: u64,
    pub jitter: f32,
    pub deposition: DepositionMode,

    // Trail
    pub decay_rate: f32,
    pub diffuse_rate: f32,

    pub species: [SpeciesParams; MAX_SPECIES],
}

impl SimParams {
    /// Parameters of the species an agent belongs to. Out-of-range ids fall back to slot 0.
    #[inline(always)]
    pub fn species_of(&self, species_id: u32) -> &SpeciesParams {
        self.species
            .get(species_id as usize)
            .unwrap_or(&self.species[0])
    }
}

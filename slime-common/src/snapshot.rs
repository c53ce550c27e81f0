use serde::{Serialize, Deserialize};

use crate::sim_params::MAX_SPECIES;

/// A snapshot of the simulation state and metrics at a specific frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Frame number at which the snapshot was taken.
    pub frame: u32,
    /// Simulation time in seconds (sum of the applied delta times).
    pub time: f64,
    /// Field dimensions at that frame; they change when the viewport is resized.
    pub width: u32,
    pub height: u32,
    pub agent_count: u32,
    pub species_count: u32,
    /// Sum of each trail channel over the whole field.
    pub trail_totals: [f32; MAX_SPECIES],
    // Optional fields are always encoded so the bincode stream stays decodable.
    /// Colored field quantized to RGBA8, row-major, `width * height * 4` bytes.
    pub colored_rgba8: Option<Vec<u8>>,
    pub positions: Option<Vec<(f32, f32)>>,
}

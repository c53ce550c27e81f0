use crate::species::{clamp_setting, SpeciesTable};
use log::{debug, info};
use slime_common::{DepositionMode, SeedPolicy, SlimeConfig};

/// Largest decay or diffuse rate, per second.
pub const MAX_TRAIL_RATE: f32 = 1000.0;
/// Largest heading jitter, in radians per second.
pub const MAX_JITTER: f32 = 100.0;

/// Live-editable simulation knobs exposed to a UI layer.
///
/// Every numeric edit is clamped into range. Edits that invalidate the current
/// agent layout (species count, seed policy, explicit reset) raise a structural
/// change flag that the engine consumes at the start of the next step.
#[derive(Debug, Clone)]
pub struct Settings {
    decay_rate: f32,
    diffuse_rate: f32,
    num_agents: u32,
    capacity: u32,
    jitter: f32,
    seed_policy: SeedPolicy,
    deposition: DepositionMode,
    species: SpeciesTable,
    structural_change: bool,
}

impl Settings {
    pub fn from_config(config: &SlimeConfig) -> Self {
        let mut settings = Self {
            decay_rate: 0.0,
            diffuse_rate: 0.0,
            num_agents: 0,
            capacity: config.initial_conditions.agent_capacity,
            jitter: 0.0,
            seed_policy: config.initial_conditions.seed_policy,
            deposition: config.trail.deposition,
            species: SpeciesTable::new(
                config.species_params(),
                config.initial_conditions.species_count,
            ),
            structural_change: false,
        };
        settings.set_decay_rate(config.trail.decay_rate);
        settings.set_diffuse_rate(config.trail.diffuse_rate);
        settings.set_jitter(config.trail.jitter);
        settings.set_num_agents(config.num_agents());
        settings
    }

    pub fn decay_rate(&self) -> f32 {
        self.decay_rate
    }

    pub fn set_decay_rate(&mut self, rate: f32) {
        if let Some(v) = clamp_setting("decay rate", rate, 0.0, MAX_TRAIL_RATE) {
            self.decay_rate = v;
        }
    }

    pub fn diffuse_rate(&self) -> f32 {
        self.diffuse_rate
    }

    pub fn set_diffuse_rate(&mut self, rate: f32) {
        if let Some(v) = clamp_setting("diffuse rate", rate, 0.0, MAX_TRAIL_RATE) {
            self.diffuse_rate = v;
        }
    }

    pub fn jitter(&self) -> f32 {
        self.jitter
    }

    pub fn set_jitter(&mut self, jitter: f32) {
        if let Some(v) = clamp_setting("jitter", jitter, 0.0, MAX_JITTER) {
            self.jitter = v;
        }
    }

    pub fn num_agents(&self) -> u32 {
        self.num_agents
    }

    /// Sets the simulated agent count, clamped to the store capacity.
    pub fn set_num_agents(&mut self, count: u32) {
        let clamped = count.min(self.capacity);
        if clamped != count {
            debug!("agent count {} clamped to capacity {}.", count, self.capacity);
        }
        self.num_agents = clamped;
    }

    pub fn species_count(&self) -> u32 {
        self.species.active()
    }

    /// Changes the simulated species count (1..=4). A change re-seeds the agents.
    pub fn set_species_count(&mut self, count: u32) {
        if self.species.set_active(count) {
            info!("Species count set to {}; agents will be re-seeded.", self.species.active());
            self.structural_change = true;
        }
    }

    pub fn species(&self) -> &SpeciesTable {
        &self.species
    }

    /// Per-species edits (colors, speeds, sensors). These never re-seed.
    pub fn species_mut(&mut self) -> &mut SpeciesTable {
        &mut self.species
    }

    pub fn seed_policy(&self) -> SeedPolicy {
        self.seed_policy
    }

    /// Switching the seed pattern re-seeds the agents with the new pattern.
    pub fn select_seed_policy(&mut self, policy: SeedPolicy) {
        if policy != self.seed_policy {
            info!("Seed policy set to {:?}; agents will be re-seeded.", policy);
            self.seed_policy = policy;
            self.structural_change = true;
        }
    }

    pub fn deposition(&self) -> DepositionMode {
        self.deposition
    }

    pub fn set_deposition(&mut self, mode: DepositionMode) {
        self.deposition = mode;
    }

    /// Requests a full re-seed and trail clear on the next step.
    pub fn request_reset(&mut self) {
        self.structural_change = true;
    }

    pub fn structural_change_pending(&self) -> bool {
        self.structural_change
    }

    /// Returns whether a structural change happened since the last call, and clears it.
    pub fn take_structural_change(&mut self) -> bool {
        std::mem::take(&mut self.structural_change)
    }
}

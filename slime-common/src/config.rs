use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::{SimParams, SpeciesParams, MAX_SPECIES};
use std::path::Path;

/// How agents are placed whenever the store is (re)seeded.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SeedPolicy {
    /// Uniform over the whole field, random headings.
    #[default]
    Uniform,
    /// Uniform inside the inscribed ellipse, headings pointing at the center.
    Circle,
}

/// How an agent writes its species mask into the trail field.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DepositionMode {
    /// The cell is set to the mask; the last agent writing a cell wins.
    #[default]
    Overwrite,
    /// The mask is added to the cell, each channel saturating at 1.
    Additive,
}

// A scripted viewport change, applied by the headless driver at `frame`.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeEvent {
    pub frame: u32,
    pub width: u32,
    pub height: u32,
}

// Viewport (field) dimensions
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ViewportConfig {
    pub width: u32,
    pub height: u32,
    /// Upper bound on pixels per field; larger allocations are refused.
    #[serde(default = "default_max_field_pixels")]
    pub max_field_pixels: u64,
    #[serde(default)]
    pub resize_schedule: Vec<ResizeEvent>,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    pub total_frames: u32,
    /// Fixed seconds per frame. When absent the wall clock drives delta time.
    #[serde(default)]
    pub fixed_dt: Option<f32>,
    #[serde(default = "default_record_interval_frames")]
    pub record_interval_frames: u32,
}

// Initial conditions for the simulation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub agent_capacity: u32,
    /// Active agents at start; defaults to the full capacity.
    #[serde(default)]
    pub num_agents: Option<u32>,
    #[serde(default = "default_species_count")]
    pub species_count: u32,
    #[serde(default)]
    pub seed_policy: SeedPolicy,
    pub rng_seed: u64,
}

// Trail behaviour, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TrailConfig {
    #[serde(default = "default_decay_rate")]
    pub decay_rate: f32,
    #[serde(default = "default_diffuse_rate")]
    pub diffuse_rate: f32,
    #[serde(default)]
    pub deposition: DepositionMode,
    /// Maximum random heading perturbation in radians per second (0 disables it).
    #[serde(default)]
    pub jitter: f32,
}

impl Default for TrailConfig {
    fn default() -> Self {
        TrailConfig {
            decay_rate: default_decay_rate(),
            diffuse_rate: default_diffuse_rate(),
            deposition: DepositionMode::Overwrite,
            jitter: 0.0,
        }
    }
}

/// Overrides for one species slot. Missing fields keep the slot's defaults.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SpeciesConfig {
    #[serde(default)]
    pub color: Option<[f32; 3]>,
    #[serde(default)]
    pub move_speed: Option<f32>,
    #[serde(default)]
    pub turn_rate: Option<f32>,
    #[serde(default)]
    pub sensor_spacing: Option<f32>,
    #[serde(default)]
    pub sensor_distance: Option<f32>,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_positions: bool,
    pub save_stats: bool,
    /// Store the RGBA8 colored frame in each snapshot (needed by the visualizer).
    #[serde(default)]
    pub save_colored_frames: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SlimeConfig {
    pub viewport: ViewportConfig,
    pub timing: TimingConfig,
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub trail: TrailConfig,
    #[serde(default)]
    pub species: Vec<SpeciesConfig>,
    pub output: OutputConfig,
}

impl SlimeConfig {
    /// A configuration with default trail and species settings for the given
    /// capacity, viewport and seed pattern.
    pub fn new(agent_capacity: u32, width: u32, height: u32, seed_policy: SeedPolicy) -> Self {
        SlimeConfig {
            viewport: ViewportConfig {
                width,
                height,
                max_field_pixels: default_max_field_pixels(),
                resize_schedule: Vec::new(),
            },
            timing: TimingConfig {
                total_frames: 0,
                fixed_dt: None,
                record_interval_frames: default_record_interval_frames(),
            },
            initial_conditions: InitialConditions {
                agent_capacity,
                num_agents: None,
                species_count: default_species_count(),
                seed_policy,
                rng_seed: 0,
            },
            trail: TrailConfig::default(),
            species: Vec::new(),
            output: OutputConfig {
                base_filename: "slime".to_string(),
                save_positions: false,
                save_stats: false,
                save_colored_frames: false,
                format: None,
            },
        }
    }

    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SlimeConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.viewport.width == 0 || self.viewport.height == 0 {
            anyhow::bail!("viewport width and height must be positive.");
        }
        if self.initial_conditions.agent_capacity == 0 {
            anyhow::bail!("agent_capacity must be greater than 0.");
        }
        if self.num_agents() > self.initial_conditions.agent_capacity {
            anyhow::bail!(
                "num_agents ({}) exceeds agent_capacity ({}).",
                self.num_agents(),
                self.initial_conditions.agent_capacity
            );
        }
        if !(1..=MAX_SPECIES as u32).contains(&self.initial_conditions.species_count) {
            anyhow::bail!("species_count must be between 1 and {}.", MAX_SPECIES);
        }
        if self.species.len() > MAX_SPECIES {
            anyhow::bail!("At most {} [[species]] entries are supported.", MAX_SPECIES);
        }
        if self.trail.decay_rate < 0.0 || self.trail.diffuse_rate < 0.0 || self.trail.jitter < 0.0 {
            anyhow::bail!("decay_rate, diffuse_rate and jitter must not be negative.");
        }
        if let Some(dt) = self.timing.fixed_dt {
            if !(dt >= 0.0) {
                anyhow::bail!("fixed_dt must be a non-negative number.");
            }
        }
        Ok(())
    }

    /// Active agents at start.
    pub fn num_agents(&self) -> u32 {
        self.initial_conditions
            .num_agents
            .unwrap_or(self.initial_conditions.agent_capacity)
    }

    /// Resolves the four species slots: slot defaults with the configured overrides applied.
    pub fn species_params(&self) -> [SpeciesParams; MAX_SPECIES] {
        std::array::from_fn(|index| {
            let mut params = SpeciesParams::default_for_index(index);
            if let Some(overrides) = self.species.get(index) {
                if let Some(color) = overrides.color { params.color = color; }
                if let Some(v) = overrides.move_speed { params.move_speed = v; }
                if let Some(v) = overrides.turn_rate { params.turn_rate = v; }
                if let Some(v) = overrides.sensor_spacing { params.sensor_spacing = v; }
                if let Some(v) = overrides.sensor_distance { params.sensor_distance = v; }
            }
            params
        })
    }

    /// Converts the configuration into the initial step parameters.
    pub fn get_sim_params(&self) -> SimParams {
        SimParams {
            width: self.viewport.width,
            height: self.viewport.height,
            delta_time: 0.0,
            time: 0.0,
            frame: 0,
            num_agents: self.num_agents(),
            species_count: self.initial_conditions.species_count,
            rng_seed: self.initial_conditions.rng_seed,
            jitter: self.trail.jitter,
            deposition: self.trail.deposition,
            decay_rate: self.trail.decay_rate,
            diffuse_rate: self.trail.diffuse_rate,
            species: self.species_params(),
        }
    }
}

fn default_max_field_pixels() -> u64 {
    16_777_216 // 4096 x 4096
}

fn default_record_interval_frames() -> u32 {
    10
}

fn default_species_count() -> u32 {
    1
}

fn default_decay_rate() -> f32 {
    0.1
}

fn default_diffuse_rate() -> f32 {
    3.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [viewport]
        width = 320
        height = 200

        [timing]
        total_frames = 100

        [initial_conditions]
        agent_capacity = 1000
        rng_seed = 42

        [output]
        base_filename = "slime"
        save_positions = false
        save_stats = true
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = SlimeConfig::from_toml_str(MINIMAL).unwrap();
        assert_eq!(config.num_agents(), 1000);
        assert_eq!(config.initial_conditions.species_count, 1);
        assert_eq!(config.initial_conditions.seed_policy, SeedPolicy::Uniform);
        assert_eq!(config.trail.decay_rate, 0.1);
        assert_eq!(config.trail.diffuse_rate, 3.0);
        assert_eq!(config.trail.deposition, DepositionMode::Overwrite);
        assert_eq!(config.timing.record_interval_frames, 10);
        assert!(config.viewport.resize_schedule.is_empty());

        let params = config.get_sim_params();
        assert_eq!((params.width, params.height), (320, 200));
        assert_eq!(params.delta_time, 0.0);
        assert_eq!(params.species[1].color, [0.0, 1.0, 0.0]);
    }

    #[test]
    fn species_overrides_apply_per_slot() {
        let text = format!(
            "{}\n[[species]]\nmove_speed = 12.5\n\n[[species]]\ncolor = [0.5, 0.5, 0.0]\n",
            MINIMAL
        );
        let config = SlimeConfig::from_toml_str(&text).unwrap();
        let species = config.species_params();
        assert_eq!(species[0].move_speed, 12.5);
        assert_eq!(species[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(species[1].color, [0.5, 0.5, 0.0]);
        assert_eq!(species[2].move_speed, SpeciesParams::default_for_index(2).move_speed);
    }

    #[test]
    fn enums_and_schedule_parse_lowercase() {
        let text = MINIMAL
            .replace("rng_seed = 42", "rng_seed = 42\nseed_policy = \"circle\"\nspecies_count = 3")
            .replace(
                "[output]",
                "[trail]\ndeposition = \"additive\"\njitter = 0.5\n\n[[viewport.resize_schedule]]\nframe = 5\nwidth = 64\nheight = 48\n\n[output]",
            );
        let config = SlimeConfig::from_toml_str(&text).unwrap();
        assert_eq!(config.initial_conditions.seed_policy, SeedPolicy::Circle);
        assert_eq!(config.trail.deposition, DepositionMode::Additive);
        assert_eq!(config.trail.jitter, 0.5);
        assert_eq!(
            config.viewport.resize_schedule,
            vec![ResizeEvent { frame: 5, width: 64, height: 48 }]
        );
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let zero_capacity = MINIMAL.replace("agent_capacity = 1000", "agent_capacity = 0");
        assert!(SlimeConfig::from_toml_str(&zero_capacity).is_err());

        let too_many_species = MINIMAL.replace("rng_seed = 42", "rng_seed = 42\nspecies_count = 5");
        assert!(SlimeConfig::from_toml_str(&too_many_species).is_err());

        let too_many_agents = MINIMAL.replace("rng_seed = 42", "rng_seed = 42\nnum_agents = 2000");
        assert!(SlimeConfig::from_toml_str(&too_many_agents).is_err());

        let zero_width = MINIMAL.replace("width = 320", "width = 0");
        assert!(SlimeConfig::from_toml_str(&zero_width).is_err());
    }
}

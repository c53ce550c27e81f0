pub mod config;
pub mod sim_params;
pub mod snapshot;
pub mod vecmath;

// Re-export key types for easier use by dependent crates
pub use config::{
    DepositionMode, InitialConditions, OutputConfig, ResizeEvent, SeedPolicy, SlimeConfig,
    SpeciesConfig, TimingConfig, TrailConfig, ViewportConfig,
};
pub use sim_params::{SimParams, SpeciesParams, MAX_SPECIES};
pub use snapshot::Snapshot;
pub use vecmath::{Vec2, angle_to_vec, vec_to_angle, clamp};

pub mod agents;
pub mod clock;
pub mod field;
pub mod postprocess;
pub mod resize;
pub mod settings;
pub mod simulate;
pub mod simulation;
pub mod species;

// Re-export key types for easier use by the driver and integration tests
pub use agents::{Agent, AgentStore};
pub use clock::{ManualClock, TimeSource, WallClock};
pub use field::{Field, FieldSet, Pixel};
pub use resize::ResizeState;
pub use settings::Settings;
pub use simulation::SlimeEngine;
pub use species::SpeciesTable;

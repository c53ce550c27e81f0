use crate::agents::{Agent, AgentStore};
use crate::clock::{FrameClock, TimeSource, WallClock};
use crate::field::{Field, FieldSet};
use crate::postprocess::run_postprocess_stage;
use crate::resize::{ResizeController, ResizeState};
use crate::settings::Settings;
use crate::simulate::run_simulation_stage;
use anyhow::Result;
use log::{debug, info, trace};
use rand::prelude::*;
use slime_common::{SeedPolicy, SimParams, SlimeConfig, Snapshot};

/// Owns the agent store, species table, trail and colored fields, and the clock,
/// and runs one frame of the simulation per `step`.
pub struct SlimeEngine {
    /// The configuration the engine was built from.
    config: SlimeConfig,
    /// Live-editable settings, including the species table.
    settings: Settings,
    /// Parameters of the most recent step.
    params: SimParams,
    agents: AgentStore,
    fields: FieldSet,
    resize: ResizeController,
    /// Viewport requested by the caller; applied at the start of the next step.
    viewport: (u32, u32),
    clock: Box<dyn TimeSource>,
    frame_clock: FrameClock,
    /// Host-side RNG used for (re)seeding the agent store.
    rng: StdRng,
    current_frame: u32,
    /// Stores collected snapshots at record intervals.
    recorded_snapshots: Vec<Snapshot>,
}

impl SlimeEngine {
    /// Creates an engine with default settings, driven by the wall clock.
    pub fn new(capacity: u32, width: u32, height: u32, seed_policy: SeedPolicy) -> Result<Self> {
        let config = SlimeConfig::new(capacity, width, height, seed_policy);
        Self::from_config(config, Box::new(WallClock::new()))
    }

    /// Creates an engine from a configuration. Nothing is returned unless the
    /// fields were allocated and the agents seeded.
    pub fn from_config(config: SlimeConfig, clock: Box<dyn TimeSource>) -> Result<Self> {
        config.validate()?;
        let width = config.viewport.width;
        let height = config.viewport.height;

        let fields = FieldSet::try_new(width, height, config.viewport.max_field_pixels)?;
        let settings = Settings::from_config(&config);
        let mut rng = StdRng::seed_from_u64(config.initial_conditions.rng_seed);
        let mut agents = AgentStore::new(config.initial_conditions.agent_capacity);
        agents.seed(
            settings.seed_policy(),
            width,
            height,
            settings.species_count(),
            &mut rng,
        )?;

        let frame_clock = FrameClock::new(clock.now());
        let params = config.get_sim_params();
        info!(
            "Engine initialized: {} agents (capacity {}), {}x{} field, {} species.",
            settings.num_agents(),
            agents.capacity(),
            width,
            height,
            settings.species_count()
        );

        Ok(Self {
            settings,
            params,
            agents,
            fields,
            resize: ResizeController::new(width, height),
            viewport: (width, height),
            clock,
            frame_clock,
            rng,
            current_frame: 0,
            recorded_snapshots: Vec::new(),
            config,
        })
    }

    /// Records the viewport size to apply at the start of the next step.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    /// Runs one frame for the given viewport size.
    pub fn step(&mut self, width: u32, height: u32) -> Result<()> {
        self.set_viewport(width, height);
        self.advance()
    }

    /// Runs one frame for the last viewport passed to `set_viewport`:
    /// resize check, structural reset, simulation stage, post-process stage.
    pub fn advance(&mut self) -> Result<()> {
        let now = self.clock.now();

        // --- 1. Resize check ---
        let (width, height) = self.viewport;
        let mut structural = false;
        if self.resize.check(width, height) {
            structural = self
                .resize
                .apply(&mut self.fields, self.config.viewport.max_field_pixels);
        }

        // --- 2. Settings-driven resets ---
        if self.settings.take_structural_change() {
            structural = true;
        }

        let delta_time = if structural {
            self.reset_layout()?;
            // Restart timing after the reallocation and reseed so their cost is
            // not replayed as motion on the next step.
            self.frame_clock.reset(self.clock.now());
            0.0
        } else {
            self.frame_clock.tick(now)
        };
        self.refresh_params(delta_time);

        // --- 3. Simulation stage (returns once every agent has moved and deposited) ---
        let num_agents = self.params.num_agents as usize;
        run_simulation_stage(
            &mut self.agents.as_mut_slice()[..num_agents],
            &mut self.fields.trail,
            &self.params,
        );

        // --- 4. Post-process stage ---
        run_postprocess_stage(&mut self.fields, &self.params);

        trace!(
            "Frame {} done: dt={:.4}s, {} agents, {}x{}.",
            self.current_frame,
            delta_time,
            num_agents,
            self.params.width,
            self.params.height
        );
        self.current_frame += 1;
        Ok(())
    }

    /// Re-seeds every agent with the selected policy and clears the trail.
    fn reset_layout(&mut self) -> Result<()> {
        let (width, height) = self.resize.applied_dimensions();
        self.agents.seed(
            self.settings.seed_policy(),
            width,
            height,
            self.settings.species_count(),
            &mut self.rng,
        )?;
        self.fields.clear_trail();
        info!(
            "Reset at frame {}: {} agents re-seeded ({:?}) over {}x{}.",
            self.current_frame,
            self.agents.capacity(),
            self.settings.seed_policy(),
            width,
            height
        );
        Ok(())
    }

    /// Copies the current settings into the step parameters.
    fn refresh_params(&mut self, delta_time: f32) {
        let (width, height) = self.resize.applied_dimensions();
        let params = &mut self.params;
        params.width = width;
        params.height = height;
        params.delta_time = delta_time;
        params.time = self.frame_clock.elapsed();
        params.frame = self.current_frame;
        params.num_agents = self.settings.num_agents();
        params.species_count = self.settings.species_count();
        params.jitter = self.settings.jitter();
        params.deposition = self.settings.deposition();
        params.decay_rate = self.settings.decay_rate();
        params.diffuse_rate = self.settings.diffuse_rate();
        params.species = *self.settings.species().slots();
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Mutable access to every live setting; structural edits take effect on the next step.
    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Requests a full re-seed and trail clear on the next step.
    pub fn request_reset(&mut self) {
        self.settings.request_reset();
    }

    pub fn select_seed_policy(&mut self, policy: SeedPolicy) {
        self.settings.select_seed_policy(policy);
    }

    pub fn set_species_count(&mut self, count: u32) {
        self.settings.set_species_count(count);
    }

    /// Read-only view of the colored output, complete as of the last step.
    pub fn colored_field(&self) -> &Field {
        &self.fields.colored
    }

    pub fn trail_field(&self) -> &Field {
        &self.fields.trail
    }

    /// Every agent in the store, active or not.
    pub fn agents(&self) -> &[Agent] {
        self.agents.as_slice()
    }

    /// The agent store as raw bytes, ready for a storage-buffer upload.
    pub fn agent_bytes(&self) -> &[u8] {
        self.agents.as_bytes()
    }

    /// Positions of the simulated agents.
    pub fn agent_positions(&self) -> Vec<(f32, f32)> {
        self.agents.positions(self.settings.num_agents())
    }

    pub fn current_agent_count(&self) -> u32 {
        self.settings.num_agents()
    }

    pub fn capacity(&self) -> u32 {
        self.agents.capacity()
    }

    /// Dimensions of the fields as of the last step.
    pub fn dimensions(&self) -> (u32, u32) {
        self.resize.applied_dimensions()
    }

    pub fn resize_state(&self) -> ResizeState {
        self.resize.state()
    }

    pub fn current_frame(&self) -> u32 {
        self.current_frame
    }

    /// Provides access to the parameters of the last step.
    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn config(&self) -> &SlimeConfig {
        &self.config
    }

    /// Stores a snapshot of the current frame.
    pub fn record_snapshot(&mut self) -> Result<()> {
        let (width, height) = self.dimensions();
        let output = &self.config.output;

        let colored_rgba8 = output
            .save_colored_frames
            .then(|| self.fields.colored.to_rgba8());
        let positions = output.save_positions.then(|| self.agent_positions());

        let snapshot = Snapshot {
            frame: self.current_frame,
            time: self.frame_clock.elapsed(),
            width,
            height,
            agent_count: self.settings.num_agents(),
            species_count: self.settings.species_count(),
            trail_totals: self.fields.trail.channel_totals(),
            colored_rgba8,
            positions,
        };
        debug!(
            "Recorded snapshot at frame {} ({:.2}s): trail totals {:?}.",
            snapshot.frame, snapshot.time, snapshot.trail_totals
        );
        self.recorded_snapshots.push(snapshot);
        Ok(())
    }

    /// Provides access to the recorded snapshots.
    pub fn get_recorded_snapshots(&self) -> &Vec<Snapshot> {
        &self.recorded_snapshots
    }
}

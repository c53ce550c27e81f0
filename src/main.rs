use anyhow::Result;
use log::{debug, error, info, trace, warn};
use std::fs::File;
use std::io::Write;
use std::time::Instant;

use slime_common::{Snapshot, SlimeConfig};
use slime_engine::{ManualClock, SlimeEngine, TimeSource, WallClock};

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Slime Engine (CPU Parallel)...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = SlimeConfig::load(&config_path)?;
    info!("Loaded configuration from {}.", config_path);
    info!("Using {} Rayon threads.", rayon::current_num_threads());

    // --- Pick the time source ---
    // A fixed dt drives a manual clock so runs are reproducible; otherwise frames
    // advance by however long they actually took.
    let manual_clock = config.timing.fixed_dt.map(|_| ManualClock::new());
    let clock: Box<dyn TimeSource> = match &manual_clock {
        Some(clock) => Box::new(clock.clone()),
        None => Box::new(WallClock::new()),
    };

    // --- Initialize Engine ---
    let mut engine = SlimeEngine::from_config(config, clock)?;
    debug!("Initial parameters: {:#?}", engine.params());

    let total_frames = engine.config().timing.total_frames;
    let mut record_interval = engine.config().timing.record_interval_frames;
    if record_interval == 0 {
        warn!("record_interval_frames is 0. Recording every frame.");
        record_interval = 1;
    }
    let fixed_dt = engine.config().timing.fixed_dt.unwrap_or(0.0) as f64;
    let mut schedule = engine.config().viewport.resize_schedule.clone();
    schedule.sort_by_key(|event| event.frame);
    let mut schedule = schedule.into_iter().peekable();
    let (mut width, mut height) = engine.dimensions();

    info!(
        "Running {} frames, recording a snapshot every {} frames.",
        total_frames, record_interval
    );

    // --- Initial Snapshot (frame 0) ---
    if let Err(e) = engine.record_snapshot() {
        error!("Error recording initial snapshot: {}", e);
        anyhow::bail!("Failed to record initial snapshot.");
    }

    let start_time = Instant::now();
    let mut previous_print_time = start_time;

    for frame in 0..total_frames {
        while let Some(event) = schedule.next_if(|event| event.frame <= frame) {
            info!(
                "Frame {}: viewport changes to {}x{}.",
                frame, event.width, event.height
            );
            width = event.width;
            height = event.height;
        }
        if let Some(clock) = &manual_clock {
            clock.advance(fixed_dt);
        }

        let step_start_time = Instant::now();
        if let Err(e) = engine.step(width, height) {
            error!("Error during frame {}: {}", frame + 1, e);
            anyhow::bail!("Simulation step failed.");
        }
        let step_duration = step_start_time.elapsed();

        let current_time = Instant::now();
        let should_print_status = current_time.duration_since(previous_print_time).as_secs_f64() >= 5.0;
        let is_record_step = (frame + 1) % record_interval == 0;
        let is_last_step = frame == total_frames - 1;

        if should_print_status || is_record_step || is_last_step {
            let (w, h) = engine.dimensions();
            info!(
                "Frame [{}/{}] ({:.2} s) | Agents: {} | Field: {}x{} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                frame + 1,
                total_frames,
                engine.params().time,
                engine.current_agent_count(),
                w,
                h,
                step_duration.as_secs_f64() * 1000.0,
                start_time.elapsed().as_secs_f64()
            );
            previous_print_time = current_time;

            if is_record_step || is_last_step {
                if let Err(e) = engine.record_snapshot() {
                    error!("Error recording snapshot at frame {}: {}", frame + 1, e);
                    anyhow::bail!("Failed to record snapshot.");
                }
            }
        } else {
            trace!(
                "Frame [{}/{}] completed in {:.2} ms",
                frame + 1,
                total_frames,
                step_duration.as_secs_f64() * 1000.0
            );
        }
    }

    let total_duration = start_time.elapsed();
    info!(
        "Simulation finished in {:.3} seconds ({} frames).",
        total_duration.as_secs_f64(),
        engine.current_frame()
    );

    // --- Save Recorded Data ---
    let output = &engine.config().output;
    if output.save_stats {
        let format = output.format.as_deref().unwrap_or("json");
        save_snapshots(engine.get_recorded_snapshots(), &output.base_filename, format);
    } else {
        info!("Skipping saving snapshots as per config (save_stats is false).");
    }

    if output.save_positions {
        let filename = format!("{}_final_positions.csv", output.base_filename);
        match csv::Writer::from_path(&filename) {
            Ok(mut writer) => {
                for agent in &engine.agents()[..engine.current_agent_count() as usize] {
                    writer.serialize(agent)?;
                }
                writer.flush()?;
                info!("Final positions saved to {}", filename);
            }
            Err(e) => error!("Error saving CSV file '{}': {}", filename, e),
        }
    } else {
        info!("Skipping saving final positions as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}

/// Writes every snapshot to `<base>_snapshots.<ext>`. Failures are logged, not fatal.
fn save_snapshots(snapshots: &[Snapshot], base_filename: &str, format: &str) {
    match format {
        "bincode" => {
            let filename = format!("{}_snapshots.bin", base_filename);
            match File::create(&filename) {
                Ok(file) => match bincode::serialize_into(file, snapshots) {
                    Ok(_) => info!("All snapshots saved to {} (binary format)", filename),
                    Err(e) => error!("Error serializing snapshots to bincode: {}", e),
                },
                Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
            }
        }
        "messagepack" => {
            let filename = format!("{}_snapshots.msgpack", base_filename);
            match &mut File::create(&filename) {
                Ok(file) => match rmp_serde::encode::write(file, snapshots) {
                    Ok(_) => info!("All snapshots saved to {} (MessagePack format)", filename),
                    Err(e) => error!("Error serializing snapshots to MessagePack: {}", e),
                },
                Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
            }
        }
        other => {
            if other != "json" {
                error!("Unknown output format: {}. Using JSON instead.", other);
            }
            let filename = format!("{}_snapshots.json", base_filename);
            match File::create(&filename) {
                Ok(mut file) => match serde_json::to_string(snapshots) {
                    Ok(json_string) => {
                        if let Err(e) = file.write_all(json_string.as_bytes()) {
                            error!("Error writing snapshot JSON to file '{}': {}", filename, e);
                        } else {
                            info!("All snapshots saved to {} ({}MB)", filename, json_string.len() / 1_048_576);
                        }
                    }
                    Err(e) => error!("Error serializing snapshots to JSON: {}", e),
                },
                Err(e) => error!("Error creating snapshot file '{}': {}", filename, e),
            }
        }
    }
}

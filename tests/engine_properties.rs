use rand::prelude::*;
use slime_common::{DepositionMode, SeedPolicy, SlimeConfig};
use slime_engine::{AgentStore, Field, ManualClock, ResizeState, SlimeEngine};

fn config(capacity: u32, width: u32, height: u32) -> SlimeConfig {
    let mut config = SlimeConfig::new(capacity, width, height, SeedPolicy::Uniform);
    config.initial_conditions.rng_seed = 7;
    config
}

fn engine_with(config: SlimeConfig) -> (SlimeEngine, ManualClock) {
    let clock = ManualClock::new();
    let engine = SlimeEngine::from_config(config, Box::new(clock.clone())).unwrap();
    (engine, clock)
}

fn nonzero_cells(field: &Field) -> Vec<(u32, u32)> {
    let mut cells = Vec::new();
    for y in 0..field.height() {
        for x in 0..field.width() {
            if field.get(x, y).unwrap().iter().any(|&v| v != 0.0) {
                cells.push((x, y));
            }
        }
    }
    cells
}

fn max_trail_value(field: &Field) -> f32 {
    field
        .pixels()
        .iter()
        .flat_map(|p| p.iter().copied())
        .fold(0.0, f32::max)
}

#[test]
fn agents_stay_inside_the_field() {
    let mut config = config(500, 64, 48);
    config.initial_conditions.species_count = 3;
    config.trail.jitter = 2.0;
    let (mut engine, clock) = engine_with(config);
    engine.settings_mut().species_mut().set_move_speed(0, 120.0);

    for _ in 0..40 {
        clock.advance(0.25);
        engine.step(64, 48).unwrap();
        for agent in engine.agents() {
            assert!((0.0..=64.0).contains(&agent.x), "x out of bounds: {}", agent.x);
            assert!((0.0..=48.0).contains(&agent.y), "y out of bounds: {}", agent.y);
        }
    }
}

#[test]
fn trail_never_goes_negative() {
    let mut config = config(200, 32, 32);
    config.trail.decay_rate = 5.0;
    config.initial_conditions.species_count = 2;
    let (mut engine, clock) = engine_with(config);

    for _ in 0..20 {
        clock.advance(0.1);
        engine.step(32, 32).unwrap();
        assert!(engine
            .trail_field()
            .pixels()
            .iter()
            .all(|p| p.iter().all(|&v| v >= 0.0)));
    }
}

#[test]
fn resize_reseeds_into_new_bounds_and_clears_trail() {
    let (mut engine, clock) = engine_with(config(300, 64, 64));
    clock.advance(0.1);
    engine.step(64, 64).unwrap();

    clock.advance(0.1);
    engine.step(32, 16).unwrap();

    assert_eq!(engine.dimensions(), (32, 16));
    assert_eq!(engine.resize_state(), ResizeState::Stable);
    assert_eq!(engine.params().delta_time, 0.0);
    assert_eq!(engine.agents().len(), 300);
    for agent in engine.agents() {
        assert!((0.0..=32.0).contains(&agent.x));
        assert!((0.0..=16.0).contains(&agent.y));
    }

    // The trail was cleared before deposition and nothing moved or diffused,
    // so exactly the agent cells are marked.
    let trail = engine.trail_field();
    let mut agent_cells: Vec<(u32, u32)> =
        engine.agents().iter().map(|a| trail.cell_of(a.position())).collect();
    agent_cells.sort_by_key(|&(x, y)| (y, x));
    agent_cells.dedup();
    assert_eq!(nonzero_cells(trail), agent_cells);
}

#[test]
fn failed_resize_keeps_running_on_old_fields() {
    let mut config = config(50, 64, 64);
    config.viewport.max_field_pixels = 64 * 64;
    let (mut engine, clock) = engine_with(config);

    clock.advance(0.1);
    engine.step(128, 128).unwrap();
    assert_eq!(engine.dimensions(), (64, 64));
    assert_eq!(engine.resize_state(), ResizeState::Stable);
    assert_eq!(engine.params().delta_time, 0.1);
    assert_eq!(engine.colored_field().width(), 64);

    // A viewport that fits is applied normally.
    clock.advance(0.1);
    engine.step(48, 32).unwrap();
    assert_eq!(engine.dimensions(), (48, 32));
}

#[test]
fn single_species_colored_field_is_trail_times_color() {
    let (mut engine, clock) = engine_with(config(200, 32, 32));
    for _ in 0..5 {
        clock.advance(0.2);
        engine.step(32, 32).unwrap();
    }

    let color = engine.params().species[0].color;
    let trail = engine.trail_field().pixels();
    let colored = engine.colored_field().pixels();
    for (t, c) in trail.iter().zip(colored) {
        assert_eq!(c[0], t[0] * color[0]);
        assert_eq!(c[1], t[0] * color[1]);
        assert_eq!(c[2], t[0] * color[2]);
        assert_eq!(c[3], 1.0);
        // No other species deposits.
        assert_eq!(&t[1..], &[0.0, 0.0, 0.0]);
    }
}

#[test]
fn inactive_species_channels_stay_empty() {
    let mut config = config(400, 32, 32);
    config.initial_conditions.species_count = 2;
    let (mut engine, clock) = engine_with(config);
    for _ in 0..5 {
        clock.advance(0.1);
        engine.step(32, 32).unwrap();
    }
    let totals = engine.trail_field().channel_totals();
    assert!(totals[0] > 0.0 && totals[1] > 0.0);
    assert_eq!(totals[2], 0.0);
    assert_eq!(totals[3], 0.0);
}

#[test]
fn seeding_is_deterministic_for_a_fixed_rng_state() {
    let rng = StdRng::seed_from_u64(99);
    let mut first = AgentStore::new(64);
    let mut second = AgentStore::new(64);
    first.seed_uniform(100, 50, &mut rng.clone()).unwrap();
    second.seed_uniform(100, 50, &mut rng.clone()).unwrap();
    assert_eq!(first.as_slice(), second.as_slice());
}

#[test]
fn identical_engines_evolve_identically() {
    let mut config = config(256, 48, 48);
    config.initial_conditions.species_count = 2;
    config.trail.jitter = 1.0;
    let (mut a, clock_a) = engine_with(config.clone());
    let (mut b, clock_b) = engine_with(config);
    for _ in 0..10 {
        clock_a.advance(0.1);
        clock_b.advance(0.1);
        a.step(48, 48).unwrap();
        b.step(48, 48).unwrap();
    }
    assert_eq!(a.agents(), b.agents());
    assert_eq!(a.trail_field().pixels(), b.trail_field().pixels());
}

#[test]
fn one_second_step_moves_every_agent_by_its_speed() {
    let (mut engine, clock) = engine_with(config(100, 64, 64));
    let move_speed = engine.params().species[0].move_speed;
    let before: Vec<_> = engine.agents().to_vec();

    clock.advance(1.0);
    engine.step(64, 64).unwrap();
    assert_eq!(engine.params().delta_time, 1.0);

    for (old, new) in before.iter().zip(engine.agents()) {
        let clamped = new.x == 0.0 || new.x == 64.0 || new.y == 0.0 || new.y == 64.0;
        if !clamped {
            let travelled = old.position().distance(new.position());
            assert!((travelled - move_speed).abs() < 1e-3, "travelled {}", travelled);
        }
    }

    let trail = engine.trail_field();
    assert!(engine.agents().iter().any(|a| {
        let (x, y) = trail.cell_of(a.position());
        trail.get(x, y).unwrap()[0] > 0.0
    }));
}

#[test]
fn trail_decays_without_agents() {
    let (mut engine, clock) = engine_with(config(100, 32, 32));
    clock.advance(0.1);
    engine.step(32, 32).unwrap();
    assert!(max_trail_value(engine.trail_field()) > 0.0);

    engine.settings_mut().set_num_agents(0);
    let mut previous = max_trail_value(engine.trail_field());
    for _ in 0..30 {
        clock.advance(0.5);
        engine.step(32, 32).unwrap();
        let current = max_trail_value(engine.trail_field());
        assert!(current <= previous);
        previous = current;
    }
    assert_eq!(previous, 0.0);
}

#[test]
fn circle_seeding_faces_the_center() {
    let (mut engine, clock) = engine_with(config(300, 80, 40));
    engine.select_seed_policy(SeedPolicy::Circle);
    clock.advance(0.1);
    engine.step(80, 40).unwrap();
    assert_eq!(engine.params().delta_time, 0.0);

    for agent in engine.agents() {
        let dx = (agent.x - 40.0) / 40.0;
        let dy = (agent.y - 20.0) / 20.0;
        assert!(dx * dx + dy * dy <= 1.0 + 1e-4);
        if dx.abs() > 0.05 || dy.abs() > 0.05 {
            let (hx, hy) = (agent.heading.cos(), agent.heading.sin());
            assert!(hx * dx + hy * dy < 0.0);
        }
    }
}

#[test]
fn additive_deposition_saturates() {
    let mut config = config(200, 4, 4);
    config.trail.deposition = DepositionMode::Additive;
    let (mut engine, _clock) = engine_with(config);
    engine.request_reset();
    engine.step(4, 4).unwrap();
    assert!(engine
        .trail_field()
        .pixels()
        .iter()
        .all(|p| p[0] <= 1.0));
    assert!(engine.trail_field().channel_totals()[0] > 0.0);
}

#[test]
fn huge_sensor_distance_steps_safely() {
    let (mut engine, clock) = engine_with(config(200, 32, 32));
    engine.settings_mut().species_mut().set_sensor_distance(0, 1e20);
    assert!(engine.settings().species().get(0).unwrap().sensor_distance < 1e20);

    for _ in 0..3 {
        clock.advance(0.1);
        engine.step(32, 32).unwrap();
    }
    for agent in engine.agents() {
        assert!((0.0..=32.0).contains(&agent.x));
        assert!((0.0..=32.0).contains(&agent.y));
    }
}

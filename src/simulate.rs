use crate::agents::Agent;
use crate::field::{Field, Pixel};
use rand::prelude::*;
use rayon::prelude::*;
use slime_common::{angle_to_vec, clamp, DepositionMode, SimParams, SpeciesParams, Vec2, MAX_SPECIES};
use std::f32::consts::TAU;

/// Weighted trail reading of the 3x3 block around a sensor.
#[inline(always)]
fn sense(trail: &Field, pos: Vec2, angle: f32, distance: f32, weights: &Pixel) -> f32 {
    let sensor = pos + angle_to_vec(angle) * distance;
    let sum = trail.sum_3x3(sensor.x.floor() as i64, sensor.y.floor() as i64);
    (0..MAX_SPECIES).map(|c| sum[c] * weights[c]).sum()
}

/// Steering decision from the three sensor readings: `1.0` turns left, `-1.0`
/// turns right, `0.0` keeps the heading.
///
/// A side wins only if it is strictly above both the other side and the straight
/// sensor; every tie keeps the current heading.
#[inline(always)]
pub fn steer(forward: f32, left: f32, right: f32) -> f32 {
    if left > right && left > forward {
        1.0
    } else if right > left && right > forward {
        -1.0
    } else {
        0.0
    }
}

/// RNG for one agent in one frame. Seeding per (agent, frame) keeps parallel runs reproducible.
#[inline(always)]
fn agent_rng(params: &SimParams, agent_idx: usize) -> StdRng {
    let seed = params
        .rng_seed
        .wrapping_add((agent_idx as u64).wrapping_mul(0x9E37_79B9))
        .wrapping_add((params.frame as u64).wrapping_mul(0x58C7));
    StdRng::seed_from_u64(seed)
}

/// Sense, steer and move one agent. Does not deposit.
fn update_agent(agent_idx: usize, agent: &mut Agent, trail: &Field, params: &SimParams) {
    let species: &SpeciesParams = params.species_of(agent.species);
    let dt = params.delta_time;
    let mut rng = agent_rng(params, agent_idx);

    // --- 1. Sense ---
    let weights = SpeciesParams::sensing_weights(agent.species as usize);
    let pos = agent.position();
    let heading = agent.heading;
    let forward = sense(trail, pos, heading, species.sensor_distance, &weights);
    let left = sense(trail, pos, heading + species.sensor_spacing, species.sensor_distance, &weights);
    let right = sense(trail, pos, heading - species.sensor_spacing, species.sensor_distance, &weights);

    // --- 2. Steer ---
    let mut heading = heading + steer(forward, left, right) * species.turn_rate * dt;
    if params.jitter > 0.0 && dt > 0.0 {
        heading += rng.random_range(-1.0f32..=1.0) * params.jitter * dt;
    }

    // --- 3. Move ---
    let new_pos = pos + angle_to_vec(heading) * (species.move_speed * dt);

    // --- 4. Boundary: clamp and pick a fresh heading ---
    let width = params.width as f32;
    let height = params.height as f32;
    if new_pos.x < 0.0 || new_pos.x > width || new_pos.y < 0.0 || new_pos.y > height {
        agent.set_position(Vec2::new(clamp(new_pos.x, 0.0, width), clamp(new_pos.y, 0.0, height)));
        agent.heading = rng.random_range(0.0..TAU);
    } else {
        agent.set_position(new_pos);
        agent.heading = heading;
    }
}

#[inline(always)]
fn deposit(cell: &mut Pixel, mask: &Pixel, mode: DepositionMode) {
    match mode {
        DepositionMode::Overwrite => *cell = *mask,
        DepositionMode::Additive => {
            for c in 0..MAX_SPECIES {
                cell[c] = (cell[c] + mask[c]).min(1.0);
            }
        }
    }
}

/// Runs the per-agent stage over `agents` (the active prefix of the store).
///
/// Movement is computed in parallel against the trail as it was at the start of
/// the stage; deposits are then written in agent order once every agent has
/// moved, so overlapping overwrites resolve to the highest agent index.
pub fn run_simulation_stage(agents: &mut [Agent], trail: &mut Field, params: &SimParams) {
    {
        let trail_read: &Field = trail;
        agents
            .par_iter_mut()
            .enumerate()
            .for_each(|(idx, agent)| update_agent(idx, agent, trail_read, params));
    }

    for agent in agents.iter() {
        let (x, y) = trail.cell_of(agent.position());
        let idx = trail.index(x, y);
        let mask = SpeciesParams::deposit_mask(agent.species as usize);
        deposit(&mut trail.pixels_mut()[idx], &mask, params.deposition);
    }
}

use anyhow::Result;
use log::debug;
use rand::distr::Uniform;
use rand::prelude::*;
use rand_distr::UnitDisc;
use serde::Serialize;
use slime_common::{vec_to_angle, SeedPolicy, Vec2};
use std::f32::consts::TAU;
use zerocopy::{Immutable, IntoBytes};

/// One simulated particle. Laid out as four 32-bit words so the whole store can be
/// handed to a GPU storage buffer without repacking.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, IntoBytes, Immutable)]
pub struct Agent {
    pub x: f32,
    pub y: f32,
    /// Radians. Not re-wrapped after turning.
    pub heading: f32,
    pub species: u32,
}

impl Agent {
    #[inline(always)]
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    #[inline(always)]
    pub fn set_position(&mut self, pos: Vec2) {
        self.x = pos.x;
        self.y = pos.y;
    }
}

/// Fixed-capacity agent array. Agents are re-seeded in place, never added or removed;
/// the engine simulates a prefix of `num_agents` records.
#[derive(Debug)]
pub struct AgentStore {
    agents: Vec<Agent>,
}

impl AgentStore {
    /// Allocates `capacity` zeroed agents.
    pub fn new(capacity: u32) -> Self {
        Self {
            agents: vec![Agent::default(); capacity as usize],
        }
    }

    pub fn capacity(&self) -> u32 {
        self.agents.len() as u32
    }

    pub fn as_slice(&self) -> &[Agent] {
        &self.agents
    }

    pub fn as_mut_slice(&mut self) -> &mut [Agent] {
        &mut self.agents
    }

    /// Raw bytes of the whole store, in upload order.
    pub fn as_bytes(&self) -> &[u8] {
        self.agents.as_bytes()
    }

    /// Uniform positions over `[0, width) x [0, height)` and uniform headings.
    pub fn seed_uniform(&mut self, width: u32, height: u32, rng: &mut StdRng) -> Result<()> {
        let x_dist = Uniform::new(0.0f32, width as f32)?;
        let y_dist = Uniform::new(0.0f32, height as f32)?;
        let angle_dist = Uniform::new(0.0f32, TAU)?;
        for agent in self.agents.iter_mut() {
            agent.x = rng.sample(x_dist);
            agent.y = rng.sample(y_dist);
            agent.heading = rng.sample(angle_dist);
        }
        Ok(())
    }

    /// Positions inside the ellipse inscribed in the field, each agent facing inward.
    pub fn seed_circle(&mut self, width: u32, height: u32, rng: &mut StdRng) {
        let half_w = width as f32 / 2.0;
        let half_h = height as f32 / 2.0;
        for agent in self.agents.iter_mut() {
            let [x, y]: [f32; 2] = UnitDisc.sample(rng);
            agent.x = x * half_w + half_w;
            agent.y = y * half_h + half_h;
            agent.heading = vec_to_angle(Vec2::new(-x, -y));
        }
    }

    /// Draws every agent's species uniformly from `[0, count)`.
    pub fn assign_species(&mut self, count: u32, rng: &mut StdRng) -> Result<()> {
        let species_dist = Uniform::new(0u32, count.max(1))?;
        for agent in self.agents.iter_mut() {
            agent.species = rng.sample(species_dist);
        }
        Ok(())
    }

    /// Re-seeds the whole capacity with `policy` and reassigns species.
    pub fn seed(
        &mut self,
        policy: SeedPolicy,
        width: u32,
        height: u32,
        species_count: u32,
        rng: &mut StdRng,
    ) -> Result<()> {
        match policy {
            SeedPolicy::Uniform => self.seed_uniform(width, height, rng)?,
            SeedPolicy::Circle => self.seed_circle(width, height, rng),
        }
        self.assign_species(species_count, rng)?;
        debug!(
            "Seeded {} agents ({:?}) over {}x{} with {} species.",
            self.agents.len(),
            policy,
            width,
            height,
            species_count
        );
        Ok(())
    }

    /// Positions of the first `count` agents as (x, y) tuples.
    pub fn positions(&self, count: u32) -> Vec<(f32, f32)> {
        let count = (count as usize).min(self.agents.len());
        self.agents[..count].iter().map(|a| (a.x, a.y)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_seed_stays_in_extent() {
        let mut store = AgentStore::new(500);
        let mut rng = StdRng::seed_from_u64(7);
        store.seed_uniform(64, 32, &mut rng).unwrap();
        for agent in store.as_slice() {
            assert!((0.0..64.0).contains(&agent.x));
            assert!((0.0..32.0).contains(&agent.y));
            assert!((0.0..TAU).contains(&agent.heading));
        }
    }

    #[test]
    fn reseeding_from_same_rng_state_is_identical() {
        let mut store = AgentStore::new(100);
        let rng = StdRng::seed_from_u64(99);

        store.seed_uniform(128, 128, &mut rng.clone()).unwrap();
        let first = store.as_slice().to_vec();
        store.seed_uniform(128, 128, &mut rng.clone()).unwrap();
        assert_eq!(first, store.as_slice());
    }

    #[test]
    fn circle_seed_lies_in_ellipse_and_faces_center() {
        let mut store = AgentStore::new(300);
        let mut rng = StdRng::seed_from_u64(3);
        store.seed_circle(200, 100, &mut rng);
        for agent in store.as_slice() {
            let nx = (agent.x - 100.0) / 100.0;
            let ny = (agent.y - 50.0) / 50.0;
            assert!(nx * nx + ny * ny <= 1.0 + 1e-4);

            // Heading points back toward the center in disk-local space.
            let dot = nx * agent.heading.cos() + ny * agent.heading.sin();
            assert!(dot <= 1e-4);
        }
    }

    #[test]
    fn species_are_drawn_below_count() {
        let mut store = AgentStore::new(1000);
        let mut rng = StdRng::seed_from_u64(11);
        store.assign_species(3, &mut rng).unwrap();
        assert!(store.as_slice().iter().all(|a| a.species < 3));
        for id in 0..3 {
            assert!(store.as_slice().iter().any(|a| a.species == id));
        }
    }

    #[test]
    fn byte_view_covers_every_record() {
        let store = AgentStore::new(10);
        assert_eq!(store.as_bytes().len(), 10 * std::mem::size_of::<Agent>());
        assert_eq!(std::mem::size_of::<Agent>(), 16);
    }
}

use rand::Rng;

use crate::core::state::{state_mask, StateCode};

/// One member of a binary swarm. All schedules are at step resolution.
#[derive(Debug, Clone)]
pub struct Particle {
    pub pos: Vec<StateCode>,
    pub vel: Vec<StateCode>,
    pub pbest: Vec<StateCode>,
    pub pbest_fitness: f64,
}

impl Particle {
    /// Random position, zero velocity, personal best not yet scored.
    pub fn new_random(step_count: usize, gen_count: usize, rng: &mut impl Rng) -> Self {
        let mask = state_mask(gen_count);
        let pos: Vec<StateCode> = (0..step_count).map(|_| rng.gen::<StateCode>() & mask).collect();
        Self {
            pbest: pos.clone(),
            vel: vec![0; step_count],
            pos,
            pbest_fitness: f64::INFINITY,
        }
    }

    /// Adopts the current position as personal best if it scores lower.
    /// Returns whether it did.
    pub fn observe(&mut self, fitness: f64) -> bool {
        if fitness < self.pbest_fitness {
            self.pbest_fitness = fitness;
            self.pbest.copy_from_slice(&self.pos);
            true
        } else {
            false
        }
    }
}

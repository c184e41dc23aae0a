use rand::Rng;

use crate::core::state::{state_mask, StateCode};

const INERTIA_START: f64 = 1.0;
const INERTIA_END: f64 = 0.35;
const CRAZINESS_START: f64 = 0.005;
const CRAZINESS_END: f64 = 0.5;
/// Iterations without a global-best improvement after which craziness saturates.
const STAGNATION_CAP: f64 = 100.0;

fn lerp(from: f64, to: f64, t: f64) -> f64 {
    from + (to - from) * t
}

/// Inertia decays linearly over the run.
pub fn inertia_probability(iteration: usize, iter_count: usize) -> f64 {
    let t = if iter_count == 0 {
        1.0
    } else {
        (iteration as f64 / iter_count as f64).clamp(0.0, 1.0)
    };
    lerp(INERTIA_START, INERTIA_END, t)
}

/// Craziness grows while the swarm stagnates.
pub fn craziness_probability(iters_since_best: usize) -> f64 {
    let t = (iters_since_best as f64 / STAGNATION_CAP).clamp(0.0, 1.0);
    lerp(CRAZINESS_START, CRAZINESS_END, t)
}

/// Binary PSO move over bitmask positions.
///
/// Velocity bits mark generators that flip at the next position update.
#[derive(Clone, Debug)]
pub struct BinaryMove {
    prob_inertia: f64,
    prob_craziness: f64,
}

impl Default for BinaryMove {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryMove {
    pub fn new() -> Self {
        Self {
            prob_inertia: INERTIA_START,
            prob_craziness: CRAZINESS_START,
        }
    }

    /// Chance that a step keeps its previous velocity.
    pub fn inertia(mut self, prob: f64) -> Self {
        self.prob_inertia = prob;
        self
    }

    /// Chance that a step receives a random kick.
    pub fn craziness(mut self, prob: f64) -> Self {
        self.prob_craziness = prob;
        self
    }

    /// Schedule-driven hyperparameters for `iteration` of `iter_count`.
    pub fn scheduled(iteration: usize, iter_count: usize, iters_since_best: usize) -> Self {
        Self::new()
            .inertia(inertia_probability(iteration, iter_count))
            .craziness(craziness_probability(iters_since_best))
    }

    pub fn prob_inertia(&self) -> f64 {
        self.prob_inertia
    }

    pub fn prob_craziness(&self) -> f64 {
        self.prob_craziness
    }

    /// Rewrites `vel` in place from the particle's distance to both bests.
    pub fn update_velocity(
        &self,
        pos: &[StateCode],
        vel: &mut [StateCode],
        pbest: &[StateCode],
        gbest: &[StateCode],
        gen_count: usize,
        rng: &mut impl Rng,
    ) {
        let mask = state_mask(gen_count);
        for i in 0..pos.len() {
            let r1 = rng.gen::<StateCode>() & mask;
            let r2 = rng.gen::<StateCode>() & mask;
            let keep = rng.gen::<f64>() < self.prob_inertia;
            let kick = rng.gen::<f64>() < self.prob_craziness;
            let noise = rng.gen::<StateCode>() & mask;

            let inertia = if keep { vel[i] } else { 0 };
            let mut v = inertia | (r1 & (pbest[i] ^ pos[i])) | (r2 & (gbest[i] ^ pos[i]));
            if kick {
                v ^= noise;
            }
            vel[i] = v;
        }
    }
}

/// Flips every position bit set in the velocity.
pub fn update_position(pos: &mut [StateCode], vel: &[StateCode]) {
    for (p, &v) in pos.iter_mut().zip(vel) {
        *p ^= v;
    }
}

use std::sync::Arc;

use nalgebra::DMatrix;
use uuid::Uuid;

use crate::core::state::{is_on, to_step_matrix, StateCode};
use crate::solvers::particle::Particle;

/// Swarm state after one iteration of one run. Immutable once captured.
#[derive(Debug, Clone)]
pub struct IterationSnapshot {
    pub iteration: usize,
    pub iter_count: usize,
    pub gbest_fitness: f64,
    pub gbest_schedule: Vec<StateCode>,
    /// Global best as `[step][generator]` 0/1.
    pub gbest: DMatrix<u8>,
    /// Particles whose personal best has the unit on, per `[step][generator]`.
    pub pbest_count: DMatrix<u32>,
    /// Particles whose current position has the unit on, per `[step][generator]`.
    pub pos_count: DMatrix<u32>,
    pub particle_count: usize,
}

impl IterationSnapshot {
    pub fn capture(
        iteration: usize,
        iter_count: usize,
        gbest: &[StateCode],
        gbest_fitness: f64,
        swarm: &[Particle],
        gen_count: usize,
    ) -> Self {
        let steps = gbest.len();
        let mut pbest_count = DMatrix::<u32>::zeros(steps, gen_count);
        let mut pos_count = DMatrix::<u32>::zeros(steps, gen_count);

        for particle in swarm {
            for step in 0..steps {
                for gen in 0..gen_count {
                    if is_on(particle.pbest[step], gen_count, gen) {
                        pbest_count[(step, gen)] += 1;
                    }
                    if is_on(particle.pos[step], gen_count, gen) {
                        pos_count[(step, gen)] += 1;
                    }
                }
            }
        }

        Self {
            iteration,
            iter_count,
            gbest_fitness,
            gbest_schedule: gbest.to_vec(),
            gbest: to_step_matrix(gbest, gen_count),
            pbest_count,
            pos_count,
            particle_count: swarm.len(),
        }
    }

    /// Merges snapshots of the same iteration across runs: counts and
    /// particles are summed, the lowest global best is kept (first on ties).
    pub fn combine<'a>(snapshots: impl IntoIterator<Item = &'a IterationSnapshot>) -> Option<Self> {
        let mut iter = snapshots.into_iter();
        let mut merged = iter.next()?.clone();
        for s in iter {
            merged.pbest_count += &s.pbest_count;
            merged.pos_count += &s.pos_count;
            merged.particle_count += s.particle_count;
            if s.gbest_fitness < merged.gbest_fitness {
                merged.gbest_fitness = s.gbest_fitness;
                merged.gbest_schedule = s.gbest_schedule.clone();
                merged.gbest = s.gbest.clone();
            }
        }
        Some(merged)
    }
}

/// Copy of the coordinator's progress grid at the moment a run reported.
#[derive(Debug, Clone)]
pub struct PsoProgress {
    pub execution_id: Uuid,
    pub run_index: usize,
    pub iteration: usize,
    pub iter_count: usize,
    /// Last iteration each run has completed.
    pub latest_per_run: Vec<Option<usize>>,
    /// `[run][iteration]`.
    pub snapshots: Vec<Vec<Option<Arc<IterationSnapshot>>>>,
}

impl PsoProgress {
    /// Latest iteration every run has reached.
    pub fn current_iteration(&self) -> Option<usize> {
        self.latest_per_run
            .iter()
            .copied()
            .min()
            .flatten()
    }

    /// Completed iterations over all runs, in `[0, 1]`.
    pub fn completion(&self) -> f64 {
        let total = self.latest_per_run.len() * self.iter_count;
        if total == 0 {
            return 0.0;
        }
        let done: usize = self.latest_per_run.iter().map(|l| l.map_or(0, |i| i + 1)).sum();
        done as f64 / total as f64
    }

    /// Combined snapshot of `iteration`, once every run has reached it.
    pub fn combined(&self, iteration: usize) -> Option<IterationSnapshot> {
        let per_run: Option<Vec<&IterationSnapshot>> = self
            .snapshots
            .iter()
            .map(|run| run.get(iteration).and_then(|s| s.as_deref()))
            .collect();
        IterationSnapshot::combine(per_run?)
    }
}

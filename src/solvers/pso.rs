use std::sync::Arc;
use std::thread;
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::Sender;
use log::{debug, info};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use uuid::Uuid;

use crate::core::domain::{AlgorithmType, Problem, PsoOptions};
use crate::core::error::{UcpError, UcpResult};
use crate::core::state::{expand_to_ticks, StateCode};
use crate::engine::constraints::fix_min_time_constraints;
use crate::engine::cost_table::CostTable;
use crate::engine::evaluator::ScheduleEvaluator;
use crate::engine::operators::{update_position, BinaryMove};
use crate::solvers::particle::Particle;
use crate::solvers::snapshot::{IterationSnapshot, PsoProgress};
use crate::solvers::{join_worker, spawn_worker, RunSummary, SearchEvent, SearchOutcome};

/// A single binary PSO run over a fixed evaluator.
pub struct PsoRunner {
    evaluator: Arc<dyn ScheduleEvaluator>,
    gen_count: usize,
    iter_count: usize,
    particle_count: usize,
    min_down: Vec<f64>,
    min_up: Vec<f64>,
}

impl PsoRunner {
    /// `min_down`/`min_up` are per-generator minimum times in steps.
    pub fn new(
        evaluator: Arc<dyn ScheduleEvaluator>,
        gen_count: usize,
        options: &PsoOptions,
        min_down: Vec<f64>,
        min_up: Vec<f64>,
    ) -> Self {
        Self {
            evaluator,
            gen_count,
            iter_count: options.iter_count,
            particle_count: options.particle_count,
            min_down,
            min_up,
        }
    }

    fn repair(&self, schedule: &mut [StateCode]) {
        fix_min_time_constraints(schedule, self.gen_count, &self.min_down, &self.min_up);
    }

    /// Runs every iteration and hands each snapshot to `report`.
    pub fn run(
        &self,
        run_index: usize,
        seed: u64,
        mut report: impl FnMut(IterationSnapshot),
    ) -> RunSummary {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let steps = self.evaluator.step_count();
        let g = self.gen_count;

        // Repaired up front so every scored position is feasible.
        let mut swarm: Vec<Particle> = (0..self.particle_count)
            .map(|_| {
                let mut p = Particle::new_random(steps, g, &mut rng);
                self.repair(&mut p.pos);
                p.pbest.copy_from_slice(&p.pos);
                p
            })
            .collect();

        let mut gbest: Vec<StateCode> = vec![0; steps];
        let mut gbest_fitness = f64::INFINITY;
        let mut since_best = 0usize;
        let mut convergence = Vec::with_capacity(self.iter_count);

        for iter in 0..self.iter_count {
            // 1. Evaluation
            let evaluator = &self.evaluator;
            swarm.par_iter_mut().for_each(|p| {
                let f = evaluator.fitness(&p.pos);
                p.observe(f);
            });

            // 2. Global best (first particle wins ties)
            let mut improved = false;
            for p in &swarm {
                if p.pbest_fitness < gbest_fitness {
                    gbest_fitness = p.pbest_fitness;
                    gbest.copy_from_slice(&p.pbest);
                    improved = true;
                }
            }
            if improved {
                since_best = 0;
            } else {
                since_best += 1;
            }

            // 3. Move + repair
            let mover = BinaryMove::scheduled(iter, self.iter_count, since_best);
            for p in swarm.iter_mut() {
                mover.update_velocity(&p.pos, &mut p.vel, &p.pbest, &gbest, g, &mut rng);
                update_position(&mut p.pos, &p.vel);
                fix_min_time_constraints(&mut p.pos, g, &self.min_down, &self.min_up);
            }

            convergence.push(gbest_fitness);
            report(IterationSnapshot::capture(
                iter,
                self.iter_count,
                &gbest,
                gbest_fitness,
                &swarm,
                g,
            ));
        }

        RunSummary {
            run_index,
            seed,
            fitness: gbest_fitness,
            schedule: gbest,
            convergence,
        }
    }
}

/// Shared `[run][iteration]` progress, written by every run.
struct ProgressGrid {
    latest: Vec<Option<usize>>,
    snapshots: Vec<Vec<Option<Arc<IterationSnapshot>>>>,
    best_fitness: f64,
}

/// Runs several independent swarms in parallel and keeps the best result.
pub struct PsoSearch {
    problem: Problem,
    options: PsoOptions,
}

impl PsoSearch {
    pub fn new(problem: Problem, options: PsoOptions) -> Self {
        Self { problem, options }
    }

    pub fn options(&self) -> &PsoOptions {
        &self.options
    }

    pub fn solve(&self, tx: Sender<SearchEvent>) -> UcpResult<SearchOutcome> {
        self.problem.validate()?;
        self.options.validate()?;

        let opts = &self.options;
        let table = CostTable::build(&self.problem, opts.step_count)?;
        let step_size = table.step_size();
        let gen_count = self.problem.gen_count();
        let (min_down, min_up) = self.problem.normalized_min_times(step_size);

        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        let mut master = match opts.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let seeds: Vec<u64> = (0..opts.run_count).map(|_| master.gen()).collect();

        info!(
            "PSO {} started: {} runs x {} iterations x {} particles, {} generators, {} steps",
            execution_id, opts.run_count, opts.iter_count, opts.particle_count, gen_count, opts.step_count
        );
        let _ = tx.send(SearchEvent::Started {
            execution_id,
            algorithm: AlgorithmType::ParticleSwarm,
        });
        let _ = tx.send(SearchEvent::Log(format!(
            "Swarm search over {} generators x {} steps ({} ticks/step)",
            gen_count, opts.step_count, step_size
        )));

        let runner = PsoRunner::new(Arc::new(table), gen_count, opts, min_down, min_up);
        let grid = Mutex::new(ProgressGrid {
            latest: vec![None; opts.run_count],
            snapshots: vec![vec![None; opts.iter_count]; opts.run_count],
            best_fitness: f64::INFINITY,
        });

        let results: Vec<UcpResult<RunSummary>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(seeds.len());
            for (run_index, &seed) in seeds.iter().enumerate() {
                let tx = tx.clone();
                let runner = &runner;
                let grid = &grid;
                let iter_count = opts.iter_count;
                let spawned = spawn_worker(scope, format!("pso-run-{}", run_index), move || {
                    runner.run(run_index, seed, |snapshot| {
                        // Published under the lock so consumers see whole iterations.
                        let mut g = grid.lock();
                        let iteration = snapshot.iteration;

                        if snapshot.gbest_fitness < g.best_fitness {
                            g.best_fitness = snapshot.gbest_fitness;
                            let _ = tx.send(SearchEvent::NewBest {
                                execution_id,
                                fitness: snapshot.gbest_fitness,
                                schedule: snapshot.gbest_schedule.clone(),
                            });
                        }

                        g.latest[run_index] = Some(iteration);
                        g.snapshots[run_index][iteration] = Some(Arc::new(snapshot));
                        let _ = tx.send(SearchEvent::PsoProgress(PsoProgress {
                            execution_id,
                            run_index,
                            iteration,
                            iter_count,
                            latest_per_run: g.latest.clone(),
                            snapshots: g.snapshots.clone(),
                        }));
                    })
                });
                handles.push(spawned);
            }
            handles
                .into_iter()
                .map(|h| h.and_then(join_worker))
                .collect()
        });

        let mut runs = Vec::with_capacity(results.len());
        for r in results {
            let summary = r?;
            debug!(
                "Run {} (seed {}) finished at {:.4}",
                summary.run_index, summary.seed, summary.fitness
            );
            runs.push(summary);
        }

        // Lowest fitness; the earliest run wins ties.
        let best = (0..runs.len())
            .reduce(|b, i| if runs[i].fitness < runs[b].fitness { i } else { b })
            .ok_or(UcpError::InvalidOption {
                name: "run_count",
                reason: "no run produced a result".to_string(),
            })?;
        let best_run = runs[best].run_index;
        let schedule = runs[best].schedule.clone();

        let outcome = SearchOutcome {
            execution_id,
            algorithm: AlgorithmType::ParticleSwarm,
            started_at,
            elapsed: start.elapsed(),
            fitness: runs[best].fitness,
            commitment: expand_to_ticks(&schedule, gen_count, step_size, self.problem.tick_count()),
            schedule,
            step_size,
            runs,
        };

        info!(
            "PSO {} finished in {:.2?}: best {:.4} from run {}",
            execution_id, outcome.elapsed, outcome.fitness, best_run
        );
        let _ = tx.send(SearchEvent::Log(format!(
            "Swarm search finished. Best fitness {:.4}",
            outcome.fitness
        )));
        let _ = tx.send(SearchEvent::Finished { execution_id });
        Ok(outcome)
    }
}

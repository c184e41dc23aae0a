//! # Exhaustive schedule search
//!
//! Enumerates every one of the `2^(G*S)` schedules, packed into a single
//! `u64` combination index, and splits the range into contiguous segments
//! searched by one worker thread each.
//!
//! Costs accumulate step by step from the [`CostTable`]. A candidate is
//! abandoned as soon as its running cost plus the cheapest possible
//! remainder exceeds the shared incumbent, which keeps the bound admissible
//! even when selling makes some entries negative. Only fully costed
//! candidates are checked against the minimum up/down times.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use chrono::Utc;
use crossbeam_channel::Sender;
use log::{debug, info, trace};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::core::domain::{AlgorithmType, ExhaustiveOptions, Problem};
use crate::core::error::{UcpError, UcpResult};
use crate::core::state::{decode_combination, expand_to_ticks, generator_track, StateCode};
use crate::engine::constraints::{is_schedule_valid, verification_needed};
use crate::engine::cost_table::CostTable;
use crate::engine::evaluator::ScheduleEvaluator;
use crate::solvers::{join_worker, spawn_worker, SearchEvent, SearchOutcome};

/// Largest `G * S` the combination index is allowed to span.
pub const MAX_SEARCH_BITS: usize = 40;

/// Progress events per worker over its whole segment.
const PROGRESS_REPORTS: u64 = 100;

/// Best `(cost, combination)` found by any worker.
///
/// The cost is mirrored into an atomic for lock-free prune reads; the mutex
/// holds the authoritative record.
#[derive(Debug)]
pub struct SharedIncumbent {
    cost_bits: AtomicU64,
    record: Mutex<Option<(f64, u64)>>,
}

impl Default for SharedIncumbent {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedIncumbent {
    pub fn new() -> Self {
        Self {
            cost_bits: AtomicU64::new(f64::INFINITY.to_bits()),
            record: Mutex::new(None),
        }
    }

    /// Current bound. May lag behind a concurrent install.
    #[inline]
    pub fn cost(&self) -> f64 {
        f64::from_bits(self.cost_bits.load(Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> Option<(f64, u64)> {
        *self.record.lock()
    }

    /// Installs the candidate if it is cheaper, or equally cheap with a lower
    /// combination index. Returns whether it was installed.
    pub fn try_install(&self, cost: f64, comb: u64) -> bool {
        self.try_install_and(cost, comb, || {})
    }

    /// Like [`try_install`](Self::try_install), running `on_install` under
    /// the lock so installs are observed in order.
    pub fn try_install_and(&self, cost: f64, comb: u64, on_install: impl FnOnce()) -> bool {
        if cost > self.cost() {
            return false;
        }
        let mut guard = self.record.lock();
        // Re-check against the record, not the hint.
        if let Some((best_cost, best_comb)) = *guard {
            if cost > best_cost || (cost == best_cost && comb >= best_comb) {
                return false;
            }
        }
        *guard = Some((cost, comb));
        self.cost_bits.store(cost.to_bits(), Ordering::Relaxed);
        on_install();
        true
    }
}

/// Contiguous `[start, end)` ranges covering `0..total`; the last one takes
/// the remainder.
pub fn segments(total: u64, task_count: usize) -> Vec<(u64, u64)> {
    let tasks = (task_count as u64).clamp(1, total.max(1));
    let size = total / tasks;
    (0..tasks)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == tasks { total } else { start + size };
            (start, end)
        })
        .collect()
}

/// Read-only state shared by all workers.
struct SearchContext<'a> {
    table: &'a CostTable,
    incumbent: SharedIncumbent,
    /// `suffix_min[k]`: cheapest possible cost of steps `k..S`.
    suffix_min: Vec<f64>,
    min_down: Vec<f64>,
    min_up: Vec<f64>,
    verify: Vec<bool>,
    progress: Mutex<Vec<f64>>,
    execution_id: Uuid,
}

impl SearchContext<'_> {
    fn is_feasible(&self, schedule: &[StateCode], track: &mut [u8]) -> bool {
        let g = self.table.gen_count();
        (0..g).filter(|&gen| self.verify[gen]).all(|gen| {
            generator_track(schedule, g, gen, track);
            is_schedule_valid(track, self.min_down[gen], self.min_up[gen])
        })
    }

    fn report(&self, worker: usize, fraction: f64, tx: &Sender<SearchEvent>) {
        let mut progress = self.progress.lock();
        progress[worker] = fraction;
        let overall = progress.iter().sum::<f64>() / progress.len() as f64;
        let _ = tx.send(SearchEvent::ExhaustiveProgress {
            execution_id: self.execution_id,
            worker,
            fraction,
            overall,
        });
    }

    /// Scans `[start, end)` and returns the worker's local best.
    fn scan(&self, worker: usize, start: u64, end: u64, tx: &Sender<SearchEvent>) -> Option<(f64, u64)> {
        let g = self.table.gen_count();
        let steps = self.table.step_count();
        let mut schedule = vec![0 as StateCode; steps];
        let mut track = vec![0u8; steps];
        let mut local: Option<(f64, u64)> = None;

        let len = end - start;
        let report_every = (len / PROGRESS_REPORTS).max(1);

        for comb in start..end {
            decode_combination(comb, g, &mut schedule);

            let bound = self.incumbent.cost();
            let slack = 1e-9 * bound.abs().max(1.0);
            let mut running = 0.0;
            let mut pruned = false;
            for (step, &state) in schedule.iter().enumerate() {
                running += self.table.step_cost(state, step);
                if running + self.suffix_min[step + 1] > bound + slack {
                    pruned = true;
                    break;
                }
            }

            let improves_local = local.map_or(true, |(c, _)| running < c);
            if !pruned && improves_local && self.is_feasible(&schedule, &mut track) {
                local = Some((running, comb));
                self.incumbent.try_install_and(running, comb, || {
                    trace!("Worker {} installed {:.4} (combination {})", worker, running, comb);
                    let _ = tx.send(SearchEvent::NewBest {
                        execution_id: self.execution_id,
                        fitness: running,
                        schedule: schedule.clone(),
                    });
                });
            }

            let done = comb - start + 1;
            if done % report_every == 0 && done < len {
                self.report(worker, done as f64 / len as f64, tx);
            }
        }

        self.report(worker, 1.0, tx);
        local
    }
}

/// Brute-force optimal commitment over a coarse horizon.
pub struct ExhaustiveSearch {
    problem: Problem,
    options: ExhaustiveOptions,
}

impl ExhaustiveSearch {
    pub fn new(problem: Problem, options: ExhaustiveOptions) -> Self {
        Self { problem, options }
    }

    pub fn options(&self) -> &ExhaustiveOptions {
        &self.options
    }

    pub fn solve(&self, tx: Sender<SearchEvent>) -> UcpResult<SearchOutcome> {
        self.problem.validate()?;
        self.options.validate()?;

        let gen_count = self.problem.gen_count();
        let steps = self.options.step_count;
        let bits = gen_count * steps;
        if bits > MAX_SEARCH_BITS {
            return Err(UcpError::SearchSpaceTooLarge {
                bits,
                max: MAX_SEARCH_BITS,
            });
        }

        let table = CostTable::build(&self.problem, steps)?;
        let step_size = table.step_size();
        let (min_down, min_up) = self.problem.normalized_min_times(step_size);

        let mut suffix_min = vec![0.0; steps + 1];
        for step in (0..steps).rev() {
            suffix_min[step] = suffix_min[step + 1] + table.step_minimum(step);
        }

        let total = 1u64 << bits;
        let ranges = segments(total, self.options.task_count);

        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();

        info!(
            "Exhaustive {} started: 2^{} schedules over {} workers",
            execution_id,
            bits,
            ranges.len()
        );
        let _ = tx.send(SearchEvent::Started {
            execution_id,
            algorithm: AlgorithmType::Exhaustive,
        });
        let _ = tx.send(SearchEvent::Log(format!(
            "Enumerating {} schedules ({} generators x {} steps)",
            total, gen_count, steps
        )));

        let ctx = SearchContext {
            table: &table,
            incumbent: SharedIncumbent::new(),
            suffix_min,
            verify: verification_needed(&min_down, &min_up),
            min_down,
            min_up,
            progress: Mutex::new(vec![0.0; ranges.len()]),
            execution_id,
        };

        let results: Vec<UcpResult<Option<(f64, u64)>>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(ranges.len());
            for (worker, &(lo, hi)) in ranges.iter().enumerate() {
                let tx = tx.clone();
                let ctx = &ctx;
                handles.push(spawn_worker(scope, format!("exhaustive-{}", worker), move || {
                    ctx.scan(worker, lo, hi, &tx)
                }));
            }
            handles
                .into_iter()
                .map(|h| h.and_then(join_worker))
                .collect()
        });

        for (worker, r) in results.into_iter().enumerate() {
            match r? {
                Some((cost, comb)) => debug!("Worker {} local best {:.4} (combination {})", worker, cost, comb),
                None => debug!("Worker {} found no feasible schedule", worker),
            }
        }

        let (fitness, comb) = ctx.incumbent.snapshot().ok_or(UcpError::NoFeasibleSchedule)?;
        let mut schedule = vec![0 as StateCode; steps];
        decode_combination(comb, gen_count, &mut schedule);

        let outcome = SearchOutcome {
            execution_id,
            algorithm: AlgorithmType::Exhaustive,
            started_at,
            elapsed: start.elapsed(),
            fitness,
            commitment: expand_to_ticks(&schedule, gen_count, step_size, self.problem.tick_count()),
            schedule,
            step_size,
            runs: Vec::new(),
        };

        info!(
            "Exhaustive {} finished in {:.2?}: optimum {:.4}",
            execution_id, outcome.elapsed, outcome.fitness
        );
        let _ = tx.send(SearchEvent::Log(format!(
            "Exhaustive search finished. Optimum {:.4}",
            outcome.fitness
        )));
        let _ = tx.send(SearchEvent::Finished { execution_id });
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_cover_range_once() {
        let s = segments(10, 3);
        assert_eq!(s, vec![(0, 3), (3, 6), (6, 10)]);
        assert_eq!(segments(2, 8), vec![(0, 1), (1, 2)]);
        assert_eq!(segments(16, 1), vec![(0, 16)]);
    }

    #[test]
    fn incumbent_prefers_cheaper_then_lower_index() {
        let inc = SharedIncumbent::new();
        assert!(inc.cost().is_infinite());
        assert!(inc.try_install(5.0, 9));
        assert!(!inc.try_install(6.0, 1));
        assert!(inc.try_install(5.0, 3));
        assert!(!inc.try_install(5.0, 4));
        assert!(inc.try_install(-1.0, 20));
        assert_eq!(inc.snapshot(), Some((-1.0, 20)));
        assert_eq!(inc.cost(), -1.0);
    }

    #[test]
    fn concurrent_installs_keep_minimum() {
        let inc = SharedIncumbent::new();
        thread::scope(|s| {
            for t in 0..4u64 {
                let inc = &inc;
                s.spawn(move || {
                    for k in 0..1000u64 {
                        inc.try_install(((k * 7 + t * 13) % 500) as f64, k * 4 + t);
                    }
                });
            }
        });
        assert_eq!(inc.snapshot().map(|(c, _)| c), Some(0.0));
    }
}

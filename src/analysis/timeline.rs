use std::collections::VecDeque;

use crossbeam_channel::{Receiver, TryRecvError};
use uuid::Uuid;

use crate::core::domain::AlgorithmType;
use crate::core::state::StateCode;
use crate::solvers::snapshot::{IterationSnapshot, PsoProgress};
use crate::solvers::SearchEvent;

const LOG_CAPACITY: usize = 200;
/// Events drained per `tick`.
const DRAIN_BATCH: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    Idle,
    Running,
    Finished,
    Disconnected,
}

/// Host-side view of a running search, folded from its event stream.
///
/// Events tagged with an older execution id are ignored once a newer search
/// has started.
pub struct Timeline {
    rx: Option<Receiver<SearchEvent>>,
    pub status: SearchStatus,
    pub execution_id: Option<Uuid>,
    pub algorithm: Option<AlgorithmType>,

    pub best_fitness: f64,
    pub best_schedule: Option<Vec<StateCode>>,
    /// Overall completion in `[0, 1]`.
    pub completion: f64,

    /// Latest PSO progress grid.
    pub progress: Option<PsoProgress>,
    /// Combined snapshot of every iteration all runs have finished.
    pub combined: Vec<IterationSnapshot>,

    pub logs: VecDeque<String>,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Timeline {
    pub fn new() -> Self {
        Self {
            rx: None,
            status: SearchStatus::Idle,
            execution_id: None,
            algorithm: None,
            best_fitness: f64::INFINITY,
            best_schedule: None,
            completion: 0.0,
            progress: None,
            combined: Vec::new(),
            logs: VecDeque::with_capacity(LOG_CAPACITY),
        }
    }

    pub fn set_channel(&mut self, rx: Receiver<SearchEvent>) {
        self.rx = Some(rx);
    }

    /// Drains up to one batch of pending events. Returns how many were handled.
    pub fn tick(&mut self) -> usize {
        self.tick_with(|_| {})
    }

    /// Like [`tick`](Self::tick), showing each event to `observe` before it
    /// is folded in.
    pub fn tick_with(&mut self, mut observe: impl FnMut(&SearchEvent)) -> usize {
        let Some(rx) = self.rx.clone() else {
            return 0;
        };
        let mut handled = 0;
        while handled < DRAIN_BATCH {
            match rx.try_recv() {
                Ok(evt) => {
                    observe(&evt);
                    self.handle_event(evt);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if self.status != SearchStatus::Finished {
                        self.status = SearchStatus::Disconnected;
                    }
                    self.rx = None;
                    break;
                }
            }
        }
        handled
    }

    /// False once the sender side has hung up and every event was drained.
    pub fn is_connected(&self) -> bool {
        self.rx.is_some()
    }

    /// Blocks until the sender side hangs up, folding every event.
    pub fn drain(&mut self) {
        if let Some(rx) = self.rx.take() {
            for evt in rx.iter() {
                self.handle_event(evt);
            }
            if self.status != SearchStatus::Finished {
                self.status = SearchStatus::Disconnected;
            }
        }
    }

    fn is_current(&self, id: Uuid) -> bool {
        self.execution_id == Some(id)
    }

    pub fn handle_event(&mut self, event: SearchEvent) {
        match event {
            SearchEvent::Log(msg) => self.log(msg),

            SearchEvent::Started { execution_id, algorithm } => {
                self.execution_id = Some(execution_id);
                self.algorithm = Some(algorithm);
                self.status = SearchStatus::Running;
                self.best_fitness = f64::INFINITY;
                self.best_schedule = None;
                self.completion = 0.0;
                self.progress = None;
                self.combined.clear();
            }

            SearchEvent::PsoProgress(progress) => {
                if !self.is_current(progress.execution_id) {
                    return;
                }
                self.completion = progress.completion();
                if let Some(current) = progress.current_iteration() {
                    while self.combined.len() <= current {
                        match progress.combined(self.combined.len()) {
                            Some(s) => self.combined.push(s),
                            None => break,
                        }
                    }
                }
                self.progress = Some(progress);
            }

            SearchEvent::ExhaustiveProgress { execution_id, overall, .. } => {
                if self.is_current(execution_id) {
                    self.completion = overall;
                }
            }

            SearchEvent::NewBest { execution_id, fitness, schedule } => {
                // Ties replace: equal-cost installs arrive in preference order.
                if self.is_current(execution_id) && fitness <= self.best_fitness {
                    self.best_fitness = fitness;
                    self.best_schedule = Some(schedule);
                }
            }

            SearchEvent::Finished { execution_id } => {
                if self.is_current(execution_id) {
                    self.status = SearchStatus::Finished;
                    self.completion = 1.0;
                }
            }
        }
    }

    fn log(&mut self, msg: impl Into<String>) {
        if self.logs.len() >= LOG_CAPACITY {
            self.logs.pop_front();
        }
        self.logs.push_back(msg.into());
    }

    /// Combined global-best fitness per finished iteration.
    pub fn convergence(&self) -> Vec<f64> {
        self.combined.iter().map(|s| s.gbest_fitness).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn stale_execution_is_ignored() {
        let mut t = Timeline::new();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        t.handle_event(SearchEvent::Started {
            execution_id: new,
            algorithm: AlgorithmType::Exhaustive,
        });
        t.handle_event(SearchEvent::NewBest {
            execution_id: old,
            fitness: -5.0,
            schedule: vec![1],
        });
        t.handle_event(SearchEvent::NewBest {
            execution_id: new,
            fitness: 3.0,
            schedule: vec![0],
        });
        assert_eq!(t.best_fitness, 3.0);
        assert_eq!(t.best_schedule, Some(vec![0]));
    }

    #[test]
    fn tick_notices_disconnect() {
        let (tx, rx) = unbounded();
        let mut t = Timeline::new();
        t.set_channel(rx);
        tx.send(SearchEvent::Log("hello".to_string())).unwrap();
        drop(tx);
        assert_eq!(t.tick(), 1);
        assert_eq!(t.status, SearchStatus::Disconnected);
        assert_eq!(t.logs.front().map(String::as_str), Some("hello"));
    }

    #[test]
    fn tick_with_observes_every_event_in_batches() {
        let (tx, rx) = unbounded();
        let id = Uuid::new_v4();
        tx.send(SearchEvent::Started {
            execution_id: id,
            algorithm: AlgorithmType::Exhaustive,
        })
        .unwrap();
        for k in 0..150 {
            tx.send(SearchEvent::NewBest {
                execution_id: id,
                fitness: 1000.0 - k as f64,
                schedule: vec![k],
            })
            .unwrap();
        }
        tx.send(SearchEvent::Finished { execution_id: id }).unwrap();
        drop(tx);

        let mut t = Timeline::new();
        t.set_channel(rx);
        let mut seen = 0;
        assert_eq!(t.tick_with(|_| seen += 1), DRAIN_BATCH);
        assert!(t.is_connected());
        while t.is_connected() {
            t.tick_with(|_| seen += 1);
        }
        assert_eq!(seen, 152);
        assert_eq!(t.status, SearchStatus::Finished);
        assert_eq!(t.best_fitness, 851.0);
    }
}

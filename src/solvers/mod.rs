use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use nalgebra::DMatrix;
use serde::Serialize;
use uuid::Uuid;

use crate::core::domain::AlgorithmType;
use crate::core::error::{UcpError, UcpResult};
use crate::core::state::StateCode;

pub mod exhaustive;
pub mod particle;
pub mod pso;
pub mod snapshot;

pub use snapshot::{IterationSnapshot, PsoProgress};

/// Events emitted by solvers to the host thread.
#[derive(Debug, Clone)]
pub enum SearchEvent {
    /// Diagnostic log message.
    Log(String),

    /// A search has validated its input and is about to spawn workers.
    Started {
        execution_id: Uuid,
        algorithm: AlgorithmType,
    },

    /// A PSO run finished an iteration. Carries a copy of the whole progress grid.
    PsoProgress(PsoProgress),

    /// An exhaustive worker advanced through its segment.
    ExhaustiveProgress {
        execution_id: Uuid,
        worker: usize,
        /// Fraction of this worker's segment consumed.
        fraction: f64,
        /// Average over all workers.
        overall: f64,
    },

    /// A schedule that beats every one seen so far in this search.
    NewBest {
        execution_id: Uuid,
        fitness: f64,
        schedule: Vec<StateCode>,
    },

    /// All workers have joined.
    Finished { execution_id: Uuid },
}

/// Per-run result of a PSO search.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_index: usize,
    pub seed: u64,
    pub fitness: f64,
    pub schedule: Vec<StateCode>,
    /// Global-best fitness after every iteration.
    pub convergence: Vec<f64>,
}

/// What a finished search hands back to its caller.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub execution_id: Uuid,
    pub algorithm: AlgorithmType,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,

    pub fitness: f64,
    /// Best schedule at step resolution.
    pub schedule: Vec<StateCode>,
    pub step_size: usize,
    /// Best schedule expanded to `[tick][generator]`.
    pub commitment: DMatrix<u8>,

    /// Empty for exhaustive search.
    pub runs: Vec<RunSummary>,
}

/// Spawns a named worker inside `scope`.
pub(crate) fn spawn_worker<'scope, 'env, T, F>(
    scope: &'scope thread::Scope<'scope, 'env>,
    name: String,
    work: F,
) -> UcpResult<thread::ScopedJoinHandle<'scope, T>>
where
    T: Send + 'scope,
    F: FnOnce() -> T + Send + 'scope,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn_scoped(scope, work)
        .map_err(|e| UcpError::WorkerSpawn(format!("{}: {}", name, e)))
}

/// Waits for a worker, turning a panic into an error.
pub(crate) fn join_worker<T>(handle: thread::ScopedJoinHandle<'_, T>) -> UcpResult<T> {
    let name = handle.thread().name().unwrap_or("worker").to_string();
    handle.join().map_err(|payload| {
        let msg = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        UcpError::WorkerPanicked(format!("{}: {}", name, msg))
    })
}

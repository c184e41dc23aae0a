use thiserror::Error;

/// Errors raised at the boundary of the search core.
///
/// Everything here is a precondition violation on the caller's side. The
/// search loops themselves have no recoverable failure modes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum UcpError {
    #[error("problem has no generators")]
    NoGenerators,

    #[error("too many generators: {count} (at most {max} supported)")]
    TooManyGenerators { count: usize, max: usize },

    #[error("{name} has length {actual}, expected {expected}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("step count must be positive")]
    ZeroSteps,

    #[error("{ticks} ticks cannot be split into {steps} equal steps")]
    IndivisibleHorizon { ticks: usize, steps: usize },

    #[error("{name}[{index}] is not a finite number")]
    NonFinite { name: &'static str, index: usize },

    #[error("generator {index} is invalid: {reason}")]
    InvalidGenerator { index: usize, reason: String },

    #[error("option `{name}` is invalid: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("search space of 2^{bits} schedules exceeds the limit of 2^{max}")]
    SearchSpaceTooLarge { bits: usize, max: usize },

    #[error("{axis} index {index} is out of bounds (length {len})")]
    IndexOutOfRange {
        axis: &'static str,
        index: usize,
        len: usize,
    },

    #[error("no schedule satisfies the minimum up/down-time constraints")]
    NoFeasibleSchedule,

    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(String),

    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}

pub type UcpResult<T> = Result<T, UcpError>;

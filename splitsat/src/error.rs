//! Solver failure kinds.
use thiserror::Error;

/// Errors the solve loop can fail with.
///
/// A decided formula is never an error: SAT and UNSAT are both reported through
/// [`Outcome`](crate::solver::Outcome).
#[derive(Debug, Error)]
pub enum SolverError {
    /// A worker failed repeatedly while expanding the same node.
    #[error("a worker failed {retries} times expanding a node: {message}")]
    WorkerCrash { message: String, retries: u32 },

    /// The solve was cancelled from the outside.
    #[error("solve aborted")]
    Aborted,

    /// A broken internal invariant, e.g. the scheduler ran out of work while the root was still
    /// undecided.
    #[error("internal error: {0}")]
    Internal(String),
}

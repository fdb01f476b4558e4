//! Solve statistics.

/// Counters maintained by the master.
///
/// Store-side counters (interned nodes, lookup hits) live in the node store, which the workers
/// update concurrently.
#[derive(Default)]
pub struct Stats {
    /// Nodes handed to a worker (or expanded inline).
    pub dispatched: u64,
    /// Completed expansions.
    pub expansions: u64,
    /// Work items re-queued after a worker failure.
    pub retries: u64,
    /// High-water mark of the pending queue.
    pub max_queue: usize,
    /// Resolved worker count of the last solve.
    pub workers: usize,
}

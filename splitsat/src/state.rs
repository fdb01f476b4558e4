//! Miscellaneous solver state.
use crate::store::NodeId;

/// Satisfiability state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Miscellaneous solver state.
#[derive(Default)]
pub struct SolverState {
    pub sat_state: SatState,
    /// The interned root of the DAG, if the root set did not resolve during preprocessing.
    pub root: Option<NodeId>,
}

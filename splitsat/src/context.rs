//! Central solver data structure.
//!
//! This module defines the `Context` data structure which holds all data used by the solver's
//! master loop. Functions operating on multiple fields use partial references provided by the
//! `partial_ref` crate; this documents the data dependencies and keeps the borrow checker happy
//! without passing long lists of individual references.
use partial_ref::{part, PartialRefTarget};

use crate::config::SolverConfig;
use crate::schedule::Schedule;
use crate::state::SolverState;
use crate::stats::Stats;
use crate::store::NodeStore;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub ConfigP: SolverConfig);
    part!(pub ScheduleP: Schedule);
    part!(pub SolverStateP: SolverState);
    part!(pub StatsP: Stats);
    part!(pub StoreP: NodeStore);
}

pub use parts::*;

/// Central solver data structure.
///
/// The node store is a shared handle: workers clone it and intern through it concurrently, while
/// every other part belongs to the master alone.
#[derive(PartialRefTarget, Default)]
pub struct Context {
    #[part(ConfigP)]
    pub solver_config: SolverConfig,
    #[part(ScheduleP)]
    pub schedule: Schedule,
    #[part(SolverStateP)]
    pub solver_state: SolverState,
    #[part(StatsP)]
    pub stats: Stats,
    #[part(StoreP)]
    pub store: NodeStore,
}

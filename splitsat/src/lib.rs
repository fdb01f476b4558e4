//! A parallel, memoizing splitting SAT solver.
//!
//! The engine decides CNF satisfiability by recursive case splits. Every derived set is brought
//! into a normal form and registered in a fingerprint-indexed store, so isomorphic subproblems
//! across the search share a single node; the resulting DAG is expanded by a master/worker
//! scheduler that propagates resolutions back up the shared structure.
pub mod circuit;
pub mod config;
pub mod factor;
pub mod graph;
pub mod normalize;
pub mod solution;
pub mod solver;
pub mod store;
pub mod verify;

mod context;
mod error;
mod global;
mod schedule;
mod split;
mod state;
mod stats;

pub use config::{NormalForm, SolverConfig, SplitPolicy};
pub use error::SolverError;
pub use solution::Assignment;
pub use solver::{Outcome, Solver};
pub use store::Fingerprint;

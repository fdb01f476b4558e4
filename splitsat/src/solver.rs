//! The solver facade.
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Error;
use log::{info, warn};
use partial_ref::{IntoPartialRefMut, PartialRef};

use splitsat_dimacs::DimacsParser;
use splitsat_formula::{Set, SetBuilder, VarMap};

use crate::config::SolverConfig;
use crate::context::{parts::*, Context};
use crate::error::SolverError;
use crate::global::GlobalStore;
use crate::graph;
use crate::normalize::normalize;
use crate::schedule;
use crate::solution::{self, Assignment};
use crate::state::SatState;
use crate::store::{NodeStore, Status};
use crate::verify::verify;

/// Result of a finished solve.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Sat(Assignment),
    Unsat,
}

impl Outcome {
    pub fn is_sat(&self) -> bool {
        matches!(self, Outcome::Sat(_))
    }
}

/// A splitting, memoizing SAT solver.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
    formula: Set,
    /// Renaming the root normalization applied, kept for solution extraction.
    root_rename: Option<VarMap>,
    outcome: Option<Outcome>,
    problem_id: Option<String>,
}

impl Solver {
    /// Create a new solver with the default configuration.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Create a new solver with the given configuration.
    pub fn with_config(config: SolverConfig) -> Solver {
        let mut solver = Solver::new();
        solver.ctx.solver_config = config;
        solver
    }

    /// Access the configuration. Changes apply to the next [`solve`](Solver::solve).
    pub fn config(&mut self) -> &mut SolverConfig {
        &mut self.ctx.solver_config
    }

    /// Add the clauses of a set to the formula.
    pub fn add_formula(&mut self, set: &Set) {
        let mut builder = SetBuilder::new();
        for clause in self.formula.clauses() {
            builder.add(clause.clone());
        }
        if set.value() == Some(false) || self.formula.value() == Some(false) {
            self.formula = Set::constant(false);
            return;
        }
        for clause in set.clauses() {
            builder.add(clause.clone());
        }
        let var_count = self.formula.var_count().max(set.var_count());
        self.formula = builder.finish();
        self.formula.set_var_count(var_count);
    }

    /// Reads and adds a formula in DIMACS CNF format.
    pub fn add_dimacs_cnf(&mut self, input: impl io::Read) -> Result<(), Error> {
        let set = DimacsParser::parse(input)?;
        info!(
            "parsed formula with {} variables and {} clauses",
            set.var_count(),
            set.len()
        );
        self.add_formula(&set);
        Ok(())
    }

    /// The cancellation handle: raising the flag aborts the running solve.
    pub fn stop_flag(&mut self) -> Arc<AtomicBool> {
        self.ctx.schedule.stop_flag()
    }

    /// Decide the formula.
    ///
    /// SAT and UNSAT are both successful outcomes; an `Err` means the solve itself failed.
    pub fn solve(&mut self) -> Result<Outcome, SolverError> {
        let started = Instant::now();
        let config = self.ctx.solver_config.clone();

        // fresh per-solve state; the store owns the persistent layer when enabled
        let global = if config.use_global_db {
            Some(GlobalStore::open(&config.global_db_path, !config.gdb_no_mem))
        } else {
            None
        };
        self.ctx.store = NodeStore::new(config.use_runtime_db, global);
        self.ctx.stats = Default::default();
        self.ctx.solver_state = Default::default();
        self.ctx.schedule.reset();
        self.outcome = None;

        let root = normalize(&self.formula, config.mode, config.sort_by_size);
        let fingerprint = crate::store::Fingerprint::of_set(&root.set);
        self.problem_id = Some(fingerprint.short());
        self.root_rename = Some(root.rename);

        let outcome = match root.set.value() {
            Some(true) => Outcome::Sat(Assignment::new(self.formula.var_count())),
            Some(false) => Outcome::Unsat,
            None => {
                let (root_id, _) = self.ctx.store.intern(root.set);
                self.ctx.store.mark_queued(root_id);
                self.ctx.solver_state.root = Some(root_id);
                self.ctx.schedule.seed(root_id);

                {
                    let mut ctx = self.ctx.into_partial_ref_mut();
                    schedule::run(ctx.borrow())?;
                }

                self.conclude(root_id)?
            }
        };

        self.log_summary(started);
        self.outcome = Some(outcome.clone());
        Ok(outcome)
    }

    /// Turn the resolved root into an outcome, extracting and checking the assignment.
    fn conclude(&mut self, root_id: crate::store::NodeId) -> Result<Outcome, SolverError> {
        match self.ctx.store.status(root_id) {
            Status::ResolvedFalse => {
                self.ctx.solver_state.sat_state = SatState::Unsat;
                Ok(Outcome::Unsat)
            }
            Status::ResolvedTrue => {
                self.ctx.solver_state.sat_state = SatState::Sat;
                let rename = self.root_rename.clone().unwrap_or_else(VarMap::identity);
                let assignment = solution::extract(
                    &self.ctx.store,
                    root_id,
                    &rename,
                    self.formula.var_count(),
                )
                .ok_or_else(|| {
                    SolverError::Internal("no complete satisfying path below the root".to_string())
                })?;

                if self.ctx.solver_config.verify {
                    if verify(&self.formula, &assignment) {
                        info!("solution verified against the original formula");
                    } else {
                        return Err(SolverError::Internal(
                            "extracted assignment fails verification".to_string(),
                        ));
                    }
                }
                Ok(Outcome::Sat(assignment))
            }
            status => Err(SolverError::Internal(format!(
                "scheduler finished with the root still {:?}",
                status
            ))),
        }
    }

    /// The satisfying assignment of the last solve, if it was SAT.
    pub fn assignment(&self) -> Option<&Assignment> {
        match self.outcome.as_ref() {
            Some(Outcome::Sat(assignment)) => Some(assignment),
            _ => None,
        }
    }

    /// Stable identifier of the last solved problem: a fingerprint prefix of the normalized
    /// root set.
    pub fn problem_id(&self) -> Option<&str> {
        self.problem_id.as_deref()
    }

    /// Write the solution file for the last solve.
    pub fn write_solution(&self, target: &mut impl io::Write) -> io::Result<()> {
        solution::write_solution(target, self.assignment())
    }

    /// Export the DAG of the last solve in Graphviz DOT format.
    pub fn write_dot(&self, target: &mut impl io::Write) -> io::Result<()> {
        let name = self.problem_id.as_deref().unwrap_or("splitsat");
        graph::write_dot(target, &self.ctx.store, name)
    }

    fn log_summary(&self, started: Instant) {
        let (interned, hits, hydrated) = self.ctx.store.counters();
        let stats = &self.ctx.stats;
        info!(
            "solve finished in {:.3}s: {} unique nodes, {} lookup hits, {} hydrated, \
             {} expansions, {} dispatched, {} retries, peak queue {}, {} worker(s)",
            started.elapsed().as_secs_f64(),
            interned,
            hits,
            hydrated,
            stats.expansions,
            stats.dispatched,
            stats.retries,
            stats.max_queue,
            stats.workers,
        );
        if stats.retries > 0 {
            warn!("{} expansions were retried after worker failures", stats.retries);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use splitsat_formula::set;
    use splitsat_formula::test::{pigeon_hole, sat_formula, unsat_formula};

    use crate::config::NormalForm;

    fn solver_with(threads: usize, mode: NormalForm) -> Solver {
        let mut solver = Solver::new();
        solver.config().threads = threads;
        solver.config().mode = mode;
        solver.config().verify = true;
        solver
    }

    #[test]
    fn contradiction_of_units_is_unsat() {
        let mut solver = solver_with(1, NormalForm::Flo);
        solver.add_formula(&set![1, 2; -1, 2; -2;]);
        assert_eq!(solver.solve().unwrap(), Outcome::Unsat);
    }

    #[test]
    fn small_sat_formula_verifies() {
        let mut solver = solver_with(1, NormalForm::Flo);
        solver.add_formula(&set![1, -2; 2;]);
        let outcome = solver.solve().unwrap();
        let assignment = match outcome {
            Outcome::Sat(assignment) => assignment,
            Outcome::Unsat => panic!("expected SAT"),
        };
        assert!(assignment.value_of(splitsat_formula::var!(1)));
        assert!(assignment.value_of(splitsat_formula::var!(2)));
    }

    #[test]
    fn empty_formula_is_sat_with_defaults() {
        let mut solver = solver_with(1, NormalForm::Flo);
        let outcome = solver.solve().unwrap();
        assert!(outcome.is_sat());
    }

    #[test]
    fn empty_clause_is_unsat() {
        let mut solver = solver_with(1, NormalForm::Flo);
        solver.add_formula(&Set::constant(false));
        assert_eq!(solver.solve().unwrap(), Outcome::Unsat);
    }

    #[test]
    fn dimacs_input_end_to_end() {
        let mut solver = solver_with(1, NormalForm::Flo);
        solver
            .add_dimacs_cnf(&b"p cnf 2 3\n1 2 0\n-1 2 0\n-2 0\n"[..])
            .unwrap();
        assert_eq!(solver.solve().unwrap(), Outcome::Unsat);
    }

    #[test]
    fn pigeon_hole_is_unsat_sequentially_and_in_parallel() {
        for &threads in &[1usize, 4] {
            let mut solver = solver_with(threads, NormalForm::Flo);
            solver.add_formula(&pigeon_hole(2));
            assert_eq!(solver.solve().unwrap(), Outcome::Unsat, "threads={}", threads);
        }
    }

    #[test]
    fn verdicts_agree_across_modes_and_start_modes() {
        let formulas = [set![1, 2; -1, 2; 1, -2;], set![1, 2, 3; -1, -2; -3, 1; 2, -1;]];
        for formula in formulas.iter() {
            let mut verdicts = vec![];
            for &mode in &[
                NormalForm::Normal,
                NormalForm::Lou,
                NormalForm::Lo,
                NormalForm::Flo,
                NormalForm::Flop,
            ] {
                let mut solver = solver_with(1, mode);
                solver.config().start_mode = Some(NormalForm::Lou);
                solver.add_formula(formula);
                verdicts.push(solver.solve().unwrap().is_sat());
            }
            assert!(verdicts.windows(2).all(|pair| pair[0] == pair[1]));
        }
    }

    #[test]
    fn exit_upon_solving_still_finds_a_model() {
        let mut solver = solver_with(4, NormalForm::Flo);
        solver.config().exit_upon_solving = true;
        solver.add_formula(&set![1, 2, 3; -1, 2; -2, 3;]);
        assert!(solver.solve().unwrap().is_sat());
    }

    #[test]
    fn thief_policy_reaches_the_same_verdicts() {
        use crate::config::SplitPolicy;

        let mut solver = solver_with(1, NormalForm::Flo);
        solver.config().split_policy = SplitPolicy::Thief;
        solver.add_formula(&pigeon_hole(2));
        assert_eq!(solver.solve().unwrap(), Outcome::Unsat);

        let mut solver = solver_with(1, NormalForm::Flo);
        solver.config().split_policy = SplitPolicy::Thief;
        solver.add_formula(&set![1, -2; 2;]);
        assert!(solver.solve().unwrap().is_sat());
    }

    #[test]
    fn runtime_db_off_still_solves() {
        let mut solver = solver_with(1, NormalForm::Flo);
        solver.config().use_runtime_db = false;
        solver.add_formula(&pigeon_hole(2));
        assert_eq!(solver.solve().unwrap(), Outcome::Unsat);
    }

    #[test]
    fn factorize_fifteen_end_to_end() {
        use crate::factor::Factorizer;

        let (set, factorizer) = Factorizer::encode(15);
        let mut solver = solver_with(1, NormalForm::Flo);
        solver.config().exit_upon_solving = true;
        solver.add_formula(&set);

        let assignment = match solver.solve().unwrap() {
            Outcome::Sat(assignment) => assignment,
            Outcome::Unsat => panic!("15 = 3 x 5 must be found"),
        };
        let factors = factorizer.decode(&assignment);
        let mut pair = [factors.a, factors.b];
        pair.sort_unstable();
        assert_eq!(pair, [3, 5]);
    }

    #[test]
    fn factorize_nine_end_to_end() {
        use crate::factor::Factorizer;

        let (set, factorizer) = Factorizer::encode(9);
        let mut solver = solver_with(1, NormalForm::Flo);
        solver.config().exit_upon_solving = true;
        solver.add_formula(&set);

        let assignment = match solver.solve().unwrap() {
            Outcome::Sat(assignment) => assignment,
            Outcome::Unsat => panic!("9 = 3 x 3 must be found"),
        };
        let factors = factorizer.decode(&assignment);
        assert_eq!((factors.a, factors.b), (3, 3));
    }

    #[test]
    fn factorize_a_prime_is_unsat() {
        use crate::factor::Factorizer;

        let (set, _) = Factorizer::encode(7);
        let mut solver = solver_with(1, NormalForm::Flo);
        solver.add_formula(&set);
        assert_eq!(solver.solve().unwrap(), Outcome::Unsat);
    }

    #[test]
    fn multiply_through_the_solver() {
        use crate::factor::Multiplier;

        let (set, multiplier) = Multiplier::encode(3, 5);
        assert_ne!(set.value(), Some(false));

        let mut solver = solver_with(1, NormalForm::Flo);
        solver.config().exit_upon_solving = true;
        solver.add_formula(&set);

        let assignment = match solver.solve().unwrap() {
            Outcome::Sat(assignment) => assignment,
            Outcome::Unsat => panic!("substituted multiplier must stay satisfiable"),
        };
        assert_eq!(multiplier.decode(&assignment), 15);
    }

    #[test]
    fn global_db_reuses_unsat_verdicts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("global.db");

        let mut first = solver_with(1, NormalForm::Flo);
        first.config().use_global_db = true;
        first.config().global_db_path = path.clone();
        first.add_formula(&pigeon_hole(2));
        assert_eq!(first.solve().unwrap(), Outcome::Unsat);

        let mut second = solver_with(1, NormalForm::Flo);
        second.config().use_global_db = true;
        second.config().global_db_path = path;
        second.add_formula(&pigeon_hole(2));
        assert_eq!(second.solve().unwrap(), Outcome::Unsat);

        let (_, _, hydrated) = second.ctx.store.counters();
        assert!(hydrated > 0, "second solve should hydrate from the store");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn scrambled_pigeon_hole_is_unsat(formula in unsat_formula(1..3usize)) {
            let mut solver = solver_with(1, NormalForm::Flo);
            solver.config().exit_upon_solving = true;
            solver.add_formula(&formula);
            prop_assert_eq!(solver.solve().unwrap(), Outcome::Unsat);
        }

        #[test]
        fn planted_model_instances_are_sat(formula in sat_formula(3..8usize, 4..24, 0..3)) {
            let mut solver = solver_with(1, NormalForm::Flo);
            solver.config().exit_upon_solving = true;
            solver.add_formula(&formula);

            let outcome = solver.solve().unwrap();
            prop_assert!(outcome.is_sat());

            let assignment = solver.assignment().unwrap();
            for clause in formula.clauses() {
                prop_assert!(clause
                    .lits()
                    .iter()
                    .any(|lit| assignment.value_of(lit.var()) == lit.is_positive()));
            }
        }

        #[test]
        fn parallel_and_sequential_agree(
            formula in prop_oneof![
                sat_formula(3..7usize, 4..16, 0..3).boxed(),
                unsat_formula(1..3usize).boxed(),
            ]
        ) {
            let mut sequential = solver_with(1, NormalForm::Flo);
            sequential.add_formula(&formula);
            let expected = sequential.solve().unwrap().is_sat();

            let mut parallel = solver_with(3, NormalForm::Flo);
            parallel.config().exit_upon_solving = true;
            parallel.add_formula(&formula);
            prop_assert_eq!(parallel.solve().unwrap().is_sat(), expected);
        }
    }
}

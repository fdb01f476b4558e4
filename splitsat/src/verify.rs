//! Independent solution checking.
use splitsat_formula::Set;

use crate::solution::Assignment;

/// Evaluate the original formula under an assignment, defaulting free variables to true.
///
/// Run after extraction when requested: it looks at nothing but the clauses of the original,
/// unrenamed formula, so a rename bookkeeping bug cannot fool it.
pub fn verify(set: &Set, assignment: &Assignment) -> bool {
    match set.value() {
        Some(value) => value,
        None => set.clauses().iter().all(|clause| {
            clause
                .lits()
                .iter()
                .any(|lit| assignment.value_of(lit.var()) == lit.is_positive())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use splitsat_formula::{set, var};

    #[test]
    fn accepts_satisfying_assignments() {
        let set = set![1, -2; 2;];
        let mut assignment = Assignment::new(2);
        assignment.set(var!(1), true);
        assignment.set(var!(2), true);
        assert!(verify(&set, &assignment));
    }

    #[test]
    fn rejects_falsified_clauses() {
        let set = set![1, -2; 2;];
        let mut assignment = Assignment::new(2);
        assignment.set(var!(1), false);
        assignment.set(var!(2), true);
        assert!(!verify(&set, &assignment));
    }

    #[test]
    fn free_variables_default_to_true() {
        // var 2 is unassigned; the default true satisfies the second clause
        let set = set![1; 2;];
        let mut assignment = Assignment::new(2);
        assignment.set(var!(1), true);
        assert!(verify(&set, &assignment));
    }

    #[test]
    fn constant_sets() {
        assert!(verify(&Set::constant(true), &Assignment::new(0)));
        assert!(!verify(&Set::constant(false), &Assignment::new(0)));
    }
}

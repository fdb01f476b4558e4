//! Splitting a set on a variable.
//!
//! The splitter picks the next decision variable and produces the two daughter sets. Unit
//! propagation is folded into the substitution path, so every daughter handed onwards is either
//! resolved or free of unit clauses.
use splitsat_formula::{Set, Var};

use crate::config::SplitPolicy;

/// One daughter of a split, before normalization.
///
/// `forced` lists the assignments that produced the daughter, in the variable space of the
/// parent set: the split variable first, followed by every unit-propagated literal. Solution
/// extraction replays these along the satisfying path.
pub enum Branch {
    /// The daughter collapsed to a constant during substitution or propagation.
    Resolved { value: bool, forced: Vec<(Var, bool)> },
    /// The daughter still has unknown value and no unit clauses.
    Open { set: Set, forced: Vec<(Var, bool)> },
}

/// Pick the split variable for a set with unknown value.
///
/// Both policies are deterministic so that runs are reproducible.
pub fn select_var(set: &Set, policy: SplitPolicy) -> Option<Var> {
    match policy {
        SplitPolicy::FirstVariable => set.first_variable(),
        SplitPolicy::Thief => {
            let counts = set.occurrence_counts();
            // max occurrence count, smallest variable on ties
            counts
                .iter()
                .enumerate()
                .filter(|&(_, &count)| count > 0)
                .max_by(|&(index_a, count_a), &(index_b, count_b)| {
                    count_a.cmp(count_b).then(index_b.cmp(&index_a))
                })
                .map(|(index, _)| Var::from_index(index))
        }
    }
}

/// Assign `var = value` and propagate unit clauses to a fixed point.
pub fn assume(set: &Set, var: Var, value: bool) -> Branch {
    let mut forced = vec![(var, value)];
    let mut current = set.substitute(var, value);

    loop {
        if let Some(value) = current.value() {
            return Branch::Resolved { value, forced };
        }

        let unit = current.clauses().iter().find_map(|clause| clause.unit());
        match unit {
            Some(lit) => {
                forced.push((lit.var(), lit.is_positive()));
                current = current.substitute(lit.var(), lit.is_positive());
            }
            None => return Branch::Open { set: current, forced },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use splitsat_formula::{set, var};

    #[test]
    fn first_variable_policy_picks_the_smallest() {
        let set = set![5, 3; -2, 7;];
        assert_eq!(select_var(&set, SplitPolicy::FirstVariable), Some(var!(2)));
    }

    #[test]
    fn thief_policy_picks_the_most_frequent() {
        let set = set![1, 4; -4, 2; 4, 3;];
        assert_eq!(select_var(&set, SplitPolicy::Thief), Some(var!(4)));

        // 1 and 2 both occur twice; the smaller id wins
        let tie = set![1, 2; -1, -2; 3;];
        assert_eq!(select_var(&tie, SplitPolicy::Thief), Some(var!(1)));
    }

    #[test]
    fn assume_propagates_units() {
        // assigning 1=false leaves the unit clause (2), which propagates and satisfies the rest
        let set = set![1, 2; -2, 3;];
        match assume(&set, var!(1), false) {
            Branch::Resolved { value, forced } => {
                assert!(value);
                assert_eq!(
                    forced,
                    vec![(var!(1), false), (var!(2), true), (var!(3), true)]
                );
            }
            Branch::Open { .. } => panic!("expected the branch to resolve"),
        }
    }

    #[test]
    fn assume_detects_conflicts() {
        let set = set![1; -1, 2; -2;];
        match assume(&set, var!(1), true) {
            Branch::Resolved { value, .. } => assert!(!value),
            Branch::Open { .. } => panic!("expected a conflict"),
        }
    }

    #[test]
    fn open_branches_are_unit_free() {
        let set = set![1, 2, 3; -1, 2, -3; 2, -3, 4;];
        match assume(&set, var!(2), false) {
            Branch::Open { set, forced } => {
                assert_eq!(forced, vec![(var!(2), false)]);
                assert!(set.clauses().iter().all(|clause| clause.len() > 1));
            }
            Branch::Resolved { .. } => panic!("expected an open branch"),
        }
    }
}

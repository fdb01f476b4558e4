//! Bringing sets into their normal form.
//!
//! The normal form serves one purpose: sets that are equal up to variable renaming and
//! clause/literal reorder must come out identical, so that their fingerprints collide and the
//! node store can share their subtrees.
use std::cmp::Ordering;

use log::warn;

use splitsat_formula::{Clause, Set, Var, VarMap};

use crate::config::NormalForm;

/// A normalized set together with the renaming that produced it.
///
/// The rename map goes from the variables of the input set to the variables of the normalized
/// set; solution extraction composes the inverses along the DAG path.
pub struct Normalized {
    pub set: Set,
    pub rename: VarMap,
}

/// Bring a set into the given normal form.
///
/// `sort_by_size` forces the size-ascending clause order of `Flop` onto the other forms (the
/// forms without a clause sort get a stable size-only sort).
pub fn normalize(set: &Set, form: NormalForm, sort_by_size: bool) -> Normalized {
    if set.value().is_some() {
        // Constant sets have a single representation already.
        return Normalized {
            set: set.clone(),
            rename: VarMap::identity(),
        };
    }

    let size_first = sort_by_size || form == NormalForm::Flop;

    match form {
        NormalForm::Normal => {
            let mut set = set.clone();
            if size_first {
                set.sort_clauses_by(|a, b| a.len().cmp(&b.len()));
            }
            Normalized {
                set,
                rename: VarMap::identity(),
            }
        }
        NormalForm::Lou => {
            let mut set = set.clone();
            if size_first {
                set.sort_clauses_by(|a, b| a.len().cmp(&b.len()));
            }
            let rename = rename_pass(&mut set);
            Normalized { set, rename }
        }
        NormalForm::Lo => {
            let mut set = set.clone();
            let rename = lo_pass(&mut set, size_first);
            Normalized { set, rename }
        }
        NormalForm::Flo | NormalForm::Flop => fixed_point(set, size_first),
    }
}

/// One complete pass: optional size placement, first-appearance rename, clause sort.
fn lo_pass(set: &mut Set, size_first: bool) -> VarMap {
    if size_first {
        set.sort_clauses_by(|a, b| a.len().cmp(&b.len()));
    }
    let rename = rename_pass(set);
    set.sort_clauses_by(|a, b| clause_order(a, b, size_first));
    rename
}

/// Iterate [`lo_pass`] until a pass leaves the set untouched.
///
/// Renaming depends on the clause order and the clause order on the assigned names, so a single
/// pass does not suffice. Every productive pass strictly reduces the set in the well-founded
/// order the passes sort by; the cap only exists to turn a logic bug into a loud failure instead
/// of a hang.
fn fixed_point(set: &Set, size_first: bool) -> Normalized {
    let mut current = set.clone();
    let mut rename = VarMap::identity();

    let cap = set.var_count() * set.len() + 2;
    for _ in 0..cap {
        let before = current.clone();
        let pass_rename = lo_pass(&mut current, size_first);
        rename = rename.then(&pass_rename);
        if current == before {
            return Normalized {
                set: current,
                rename,
            };
        }
    }

    debug_assert!(false, "normalization failed to reach a fixed point");
    warn!(
        "normalization hit the iteration cap of {}; continuing with the last form",
        cap
    );
    Normalized {
        set: current,
        rename,
    }
}

/// Rename variables into first-appearance order, walking clauses in their current order.
fn rename_pass(set: &mut Set) -> VarMap {
    let mut rename = VarMap::new();
    let mut next_index = 0;

    for clause in set.clauses() {
        for lit in clause.lits() {
            if rename.get(lit.var()).is_none() {
                rename.insert(lit.var(), Var::from_index(next_index));
                next_index += 1;
            }
        }
    }

    *set = set.rename(&rename);
    rename
}

fn clause_order(a: &Clause, b: &Clause, size_first: bool) -> Ordering {
    if size_first {
        (a.len(), a.lits()).cmp(&(b.len(), b.lits()))
    } else {
        a.lits().cmp(b.lits())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    use splitsat_formula::set::strategy::vec_formula;
    use splitsat_formula::{lits, set, var, Lit};

    fn flat_lits(set: &Set) -> Vec<Vec<Lit>> {
        set.clauses()
            .iter()
            .map(|clause| clause.lits().to_vec())
            .collect()
    }

    const ALL_FORMS: [NormalForm; 5] = [
        NormalForm::Normal,
        NormalForm::Lou,
        NormalForm::Lo,
        NormalForm::Flo,
        NormalForm::Flop,
    ];

    #[test]
    fn lou_renames_in_first_appearance_order() {
        // 7 appears first, then 3, then 5
        let set = set![7, -3; 3, 5;];
        let normalized = normalize(&set, NormalForm::Lou, false);
        assert_eq!(
            flat_lits(&normalized.set),
            vec![lits![1, -2].to_vec(), lits![2, 3].to_vec()]
        );
        assert_eq!(normalized.rename.get(var!(7)), Some(var!(1)));
        assert_eq!(normalized.rename.get(var!(3)), Some(var!(2)));
        assert_eq!(normalized.rename.get(var!(5)), Some(var!(3)));
    }

    #[test]
    fn lou_keeps_clause_order() {
        let set = set![9; 2, 4;];
        let normalized = normalize(&set, NormalForm::Lou, false);
        assert_eq!(
            flat_lits(&normalized.set),
            vec![lits![1].to_vec(), lits![2, 3].to_vec()]
        );
    }

    #[test]
    fn lo_sorts_clauses() {
        let set = set![2, 3; 1, 3;];
        let normalized = normalize(&set, NormalForm::Lo, false);
        // rename: 2->1, 3->2, 1->3; sorted: [1,2] before [2,3]
        assert_eq!(
            flat_lits(&normalized.set),
            vec![lits![1, 2].to_vec(), lits![2, 3].to_vec()]
        );
    }

    #[test]
    fn flop_places_unit_clauses_first() {
        let set = set![1, 2, 3; 4; 2, 3;];
        let normalized = normalize(&set, NormalForm::Flop, false);
        assert_eq!(flat_lits(&normalized.set)[0], lits![1].to_vec());
        assert!(normalized.set.clauses().windows(2).all(|pair| {
            pair[0].len() <= pair[1].len()
        }));
    }

    #[test]
    fn renamed_inputs_share_a_form() {
        // The same formula under an order-preserving renaming, clause order preserved.
        let first = set![3, -7; 7, 9;];
        let second = set![4, -8; 8, 11;]; // 3->4, 7->8, 9->11

        for &form in &[NormalForm::Lou, NormalForm::Lo, NormalForm::Flo, NormalForm::Flop] {
            let a = normalize(&first, form, false);
            let b = normalize(&second, form, false);
            assert_eq!(a.set, b.set, "diverged under {:?}", form);
            assert_eq!(
                flat_lits(&a.set),
                vec![lits![1, -2].to_vec(), lits![2, 3].to_vec()]
            );
        }
    }

    #[test]
    fn shuffled_clauses_share_a_fixed_point() {
        // Clause reorder without renaming converges through the rename/sort iteration.
        let cases = [
            (set![1, 2; 3, 4;], set![3, 4; 1, 2;]),
            (set![1, 2; 1, -2;], set![1, -2; 1, 2;]),
        ];
        for (first, second) in cases.iter() {
            let a = normalize(first, NormalForm::Flo, false);
            let b = normalize(second, NormalForm::Flo, false);
            assert_eq!(a.set, b.set);
        }
    }

    proptest! {
        #[test]
        fn idempotent(formula in vec_formula(1..20usize, 1..16, 1..5)) {
            let set = Set::from_clauses(formula);
            for &form in ALL_FORMS.iter() {
                let once = normalize(&set, form, false);
                let twice = normalize(&once.set, form, false);
                prop_assert_eq!(&once.set, &twice.set, "{:?} is not idempotent", form);
                prop_assert!(twice.rename.is_identity() || flat_lits(&once.set) == flat_lits(&twice.set));
            }
        }

        #[test]
        fn rename_starts_at_one_and_is_dense(formula in vec_formula(1..20usize, 1..16, 1..5)) {
            let set = Set::from_clauses(formula);
            prop_assume!(set.value().is_none());
            for &form in &[NormalForm::Lou, NormalForm::Lo, NormalForm::Flo, NormalForm::Flop] {
                let normalized = normalize(&set, form, false);
                let mut seen = vec![false; normalized.set.var_count()];
                let mut next = 0;
                for clause in normalized.set.clauses() {
                    for lit in clause.lits() {
                        if !seen[lit.index()] {
                            prop_assert_eq!(lit.index(), next, "appearance order broken in {:?}", form);
                            seen[lit.index()] = true;
                            next += 1;
                        }
                    }
                }
            }
        }

        #[test]
        fn rename_map_inverts(formula in vec_formula(1..20usize, 1..16, 1..5)) {
            let set = Set::from_clauses(formula);
            prop_assume!(set.value().is_none());
            let normalized = normalize(&set, NormalForm::Flo, false);
            let back = normalized.set.rename(&normalized.rename.inverse());
            // Clause and literal order differ, but the clause collection must match.
            let mut original: Vec<_> = set.clauses().to_vec();
            let mut restored: Vec<_> = back.clauses().to_vec();
            original.sort();
            restored.sort();
            prop_assert_eq!(original, restored);
        }
    }
}

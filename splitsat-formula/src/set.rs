//! Sets: conjunctions of clauses with a three-valued truth state.
use std::fmt;

use rustc_hash::FxHashSet;

use crate::clause::{Clause, ClauseHash, Reduced};
use crate::lit::{Lit, Var};
use crate::varmap::VarMap;

/// A conjunction of clauses.
///
/// The `value` is `Some(true)` for the empty conjunction, `Some(false)` for a conjunction that
/// contains the empty clause and `None` otherwise. Both resolved states are kept canonical: a set
/// that collapses to a constant drops all its clauses, so every true set and every false set has
/// a single representation.
///
/// Duplicate clauses are dropped on construction, as are tautological input clauses.
#[derive(Clone, PartialEq, Eq)]
pub struct Set {
    clauses: Vec<Clause>,
    value: Option<bool>,
    var_count: usize,
}

impl Default for Set {
    fn default() -> Set {
        Set::constant(true)
    }
}

impl Set {
    /// The constant true or false set.
    pub fn constant(value: bool) -> Set {
        Set {
            clauses: vec![],
            value: Some(value),
            var_count: 0,
        }
    }

    /// Build a set from clauses given as literal lists.
    ///
    /// Tautological clauses and duplicates are dropped. An empty clause collapses the whole set
    /// to false.
    pub fn from_clauses<I, L>(clauses: I) -> Set
    where
        I: IntoIterator<Item = L>,
        L: IntoIterator<Item = Lit>,
    {
        let mut builder = SetBuilder::new();
        for lits in clauses {
            builder.add_lits(lits.into_iter().collect());
        }
        builder.finish()
    }

    /// The clauses of the set.
    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    /// Number of clauses.
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the set has no clauses.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// The truth state: `None` while unknown.
    ///
    /// Invariant: the value is `None` iff the set has at least one clause and no empty clause.
    pub fn value(&self) -> Option<bool> {
        self.value
    }

    /// Number of variables in the set.
    ///
    /// This also counts missing variables if a variable with a higher index is present. It can be
    /// raised further with [`set_var_count`](Set::set_var_count) to cover variables a DIMACS
    /// header declares but no clause uses.
    pub fn var_count(&self) -> usize {
        self.var_count
    }

    /// Increase the number of variables in the set.
    ///
    /// If the parameter is less than the current variable count do nothing.
    pub fn set_var_count(&mut self, count: usize) {
        self.var_count = self.var_count.max(count);
    }

    /// Iterator over all literals of all clauses.
    pub fn iter_lits<'a>(&'a self) -> impl Iterator<Item = Lit> + 'a {
        self.clauses
            .iter()
            .flat_map(|clause| clause.lits().iter().cloned())
    }

    /// The smallest variable appearing in the set.
    pub fn first_variable(&self) -> Option<Var> {
        self.iter_lits().map(|lit| lit.var()).min()
    }

    /// Number of clauses each variable occurs in, indexed by variable.
    pub fn occurrence_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.var_count];
        for clause in self.clauses.iter() {
            for lit in clause.lits() {
                counts[lit.index()] += 1;
            }
        }
        counts
    }

    /// Whether no clause is tautological. Holds by construction.
    pub fn is_tautology_free(&self) -> bool {
        self.clauses
            .iter()
            .all(|clause| Clause::new(clause.lits().to_vec()).is_some())
    }

    /// Whether the set contains the empty clause.
    ///
    /// Canonicalization collapses such sets to the constant false set, so this reports the
    /// resolved-false state.
    pub fn has_empty_clause(&self) -> bool {
        self.value == Some(false)
    }

    /// Assign a value to a variable.
    ///
    /// Satisfied clauses are dropped; a clause that loses all its literals collapses the result
    /// to the false set; if every clause is dropped the result is the true set.
    pub fn substitute(&self, var: Var, value: bool) -> Set {
        if self.value.is_some() {
            return self.clone();
        }
        let mut builder = SetBuilder::new();
        for clause in self.clauses.iter() {
            match clause.substitute(var, value) {
                Reduced::Satisfied => {}
                Reduced::Empty => return Set::constant(false),
                Reduced::Clause(clause) => builder.add(clause),
            }
        }
        builder.finish()
    }

    /// Apply a variable renaming to every clause, preserving clause order and signs.
    pub fn rename(&self, map: &VarMap) -> Set {
        let mut renamed = Set {
            clauses: self.clauses.iter().map(|clause| clause.rename(map)).collect(),
            value: self.value,
            var_count: 0,
        };
        renamed.var_count = renamed
            .clauses
            .iter()
            .map(|clause| clause.var_watermark())
            .max()
            .unwrap_or(0);
        renamed
    }

    /// Replace the clause order.
    ///
    /// `compare` must be a total order; the sort is stable.
    pub fn sort_clauses_by<F>(&mut self, compare: F)
    where
        F: FnMut(&Clause, &Clause) -> std::cmp::Ordering,
    {
        self.clauses.sort_by(compare);
    }

    /// Commutative hash over the clause hashes.
    ///
    /// Stable under clause reorder and under literal reorder within clauses.
    pub fn hash64(&self) -> ClauseHash {
        let mut hash: ClauseHash = match self.value {
            None => 0,
            Some(true) => 0x9e37_79b9_7f4a_7c15,
            Some(false) => !0x9e37_79b9_7f4a_7c15,
        };
        for clause in self.clauses.iter() {
            hash = hash.wrapping_add(clause.hash64().wrapping_mul(0x61c8_8646_80b5_83eb));
        }
        hash
    }

    /// Serialize the set into a canonical byte string.
    ///
    /// The encoding is order-sensitive; it is used to fingerprint sets whose clause and literal
    /// order a normal form has already fixed.
    pub fn canonical_bytes(&self, out: &mut Vec<u8>) {
        out.push(match self.value {
            None => b'?',
            Some(true) => b'T',
            Some(false) => b'F',
        });
        for clause in self.clauses.iter() {
            for lit in clause.lits() {
                out.extend_from_slice(&(lit.to_dimacs() as i32).to_le_bytes());
            }
            out.extend_from_slice(&0i32.to_le_bytes());
        }
    }
}

impl fmt::Debug for Set {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.value {
            Some(value) => write!(f, "Set({})", value),
            None => f.debug_list().entries(self.clauses.iter()).finish(),
        }
    }
}

/// Incremental [`Set`] construction with duplicate-clause dropping.
pub struct SetBuilder {
    clauses: Vec<Clause>,
    seen: FxHashSet<Clause>,
    false_clause: bool,
    var_count: usize,
}

impl Default for SetBuilder {
    fn default() -> SetBuilder {
        SetBuilder::new()
    }
}

impl SetBuilder {
    pub fn new() -> SetBuilder {
        SetBuilder {
            clauses: vec![],
            seen: FxHashSet::default(),
            false_clause: false,
            var_count: 0,
        }
    }

    /// Add a clause given as raw literals. Tautologies are dropped.
    pub fn add_lits(&mut self, lits: Vec<Lit>) {
        if let Some(clause) = Clause::new(lits) {
            self.add(clause);
        }
    }

    /// Add an already-constructed clause.
    pub fn add(&mut self, clause: Clause) {
        if self.false_clause {
            return;
        }
        if clause.is_empty() {
            self.false_clause = true;
            return;
        }
        self.var_count = self.var_count.max(clause.var_watermark());
        if self.seen.insert(clause.clone()) {
            self.clauses.push(clause);
        }
    }

    pub fn finish(self) -> Set {
        if self.false_clause {
            Set::constant(false)
        } else if self.clauses.is_empty() {
            Set::constant(true)
        } else {
            Set {
                clauses: self.clauses,
                value: None,
                var_count: self.var_count,
            }
        }
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;

    use proptest::{collection::SizeRange, prelude::*};

    use crate::lit::strategy::lit;

    pub fn vec_formula(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = Vec<Vec<Lit>>> {
        let clauses = clauses.into();
        let clause_len = clause_len.into();

        // Not using ind_flat_map makes shrinking too expensive
        vars.prop_ind_flat_map(move |vars| {
            proptest::collection::vec(
                proptest::collection::vec(lit(0..vars), clause_len.clone()),
                clauses.clone(),
            )
        })
    }

    pub fn set(
        vars: impl Strategy<Value = usize>,
        clauses: impl Into<SizeRange>,
        clause_len: impl Into<SizeRange>,
    ) -> impl Strategy<Value = Set> {
        vec_formula(vars, clauses, clause_len).prop_map(Set::from_clauses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    #[test]
    fn empty_set_is_true() {
        assert_eq!(Set::from_clauses(Vec::<Vec<Lit>>::new()).value(), Some(true));
    }

    #[test]
    fn empty_clause_collapses_to_false() {
        let set = Set::from_clauses(vec![lits![1, 2].to_vec(), vec![]]);
        assert_eq!(set.value(), Some(false));
        assert!(set.is_empty());
        assert!(set.has_empty_clause());
    }

    #[test]
    fn duplicates_and_tautologies_are_dropped() {
        let set = Set::from_clauses(vec![
            lits![1, 2].to_vec(),
            lits![2, 1].to_vec(),
            lits![3, -3].to_vec(),
        ]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.value(), None);
        assert!(set.is_tautology_free());
    }

    #[test]
    fn substitute_drops_and_shrinks() {
        let set = set![1, 2; -1, 3; -2;];

        let positive = set.substitute(var!(1), true);
        assert_eq!(positive.clauses(), &[clause![3], clause![-2]][..]);

        let negative = set.substitute(var!(1), false);
        assert_eq!(negative.clauses(), &[clause![2], clause![-2]][..]);

        let resolved = negative.substitute(var!(2), true);
        assert_eq!(resolved.value(), Some(false));

        let satisfied = set![1;].substitute(var!(1), true);
        assert_eq!(satisfied.value(), Some(true));
    }

    #[test]
    fn first_variable_and_occurrences() {
        let set = set![2, 3; -3, 4; 3;];
        assert_eq!(set.first_variable(), Some(var!(2)));
        assert_eq!(set.occurrence_counts(), vec![0, 1, 3, 1]);
    }

    proptest! {
        #[test]
        fn hash_is_order_insensitive(formula in strategy::vec_formula(1..30usize, 1..20, 1..6)) {
            let set = Set::from_clauses(formula.iter().cloned());
            let mut reversed = formula.clone();
            reversed.reverse();
            for clause in reversed.iter_mut() {
                clause.reverse();
            }
            let reordered = Set::from_clauses(reversed);
            prop_assert_eq!(set.hash64(), reordered.hash64());
        }

        #[test]
        fn substitute_removes_variable(
            formula in strategy::vec_formula(1..20usize, 1..16, 1..5),
            index in 0..20usize,
            value: bool,
        ) {
            let set = Set::from_clauses(formula);
            let var = Var::from_index(index);
            let result = set.substitute(var, value);
            prop_assert!(result
                .iter_lits()
                .all(|lit| lit.var() != var));
        }
    }
}

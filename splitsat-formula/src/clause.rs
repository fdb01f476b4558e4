//! Clauses: disjunctions of literals.
use std::fmt;

use crate::lit::{Lit, Var};
use crate::varmap::VarMap;

/// Integer type used to store a commutative hash of a clause or set.
pub type ClauseHash = u64;

/// Hash a single literal.
///
/// Multiple literals can be combined with xor, as done in [`clause_hash`].
pub fn lit_hash(lit: Lit) -> ClauseHash {
    // Constant based on the golden ratio provides good mixing for the resulting upper bits
    (!(lit.code() as u64)).wrapping_mul(0x61c8_8646_80b5_83ebu64)
}

/// A fast hash function for clauses (or other *sets* of literals).
///
/// This hash function interprets the given slice as a set and will not change when the input is
/// permuted. It does not handle duplicated items.
pub fn clause_hash(lits: &[Lit]) -> ClauseHash {
    let mut hash = 0;
    for &lit in lits {
        hash ^= lit_hash(lit);
    }
    hash
}

/// Result of substituting a variable in a clause.
#[derive(Debug, PartialEq, Eq)]
pub enum Reduced {
    /// A literal of the clause became true; the whole clause is satisfied.
    Satisfied,
    /// The clause shrank but still has literals.
    Clause(Clause),
    /// Every literal of the clause became false.
    Empty,
}

/// A disjunction of literals.
///
/// The literals are kept sorted by variable with the positive polarity first and contain no
/// duplicates. Tautological inputs (containing both `x` and `¬x`) are rejected by the
/// constructor, so a constructed clause is always tautology free.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Clause {
    lits: Vec<Lit>,
}

impl Clause {
    /// Create a clause from literals in any order.
    ///
    /// Sorts and deduplicates the literals. Returns `None` for a tautological input, which
    /// callers drop: a tautology adds no constraint to a conjunction. The empty clause is a valid
    /// value and represents falsity.
    pub fn new(mut lits: Vec<Lit>) -> Option<Clause> {
        lits.sort_unstable();
        lits.dedup();

        // Sorting puts the two literals of a variable next to each other, and dedup removed
        // equal ones, so any adjacent pair over one variable is a complementary pair.
        let tautological = lits.windows(2).any(|pair| pair[0].var() == pair[1].var());
        if tautological {
            None
        } else {
            Some(Clause { lits })
        }
    }

    /// The literals of the clause in canonical order.
    pub fn lits(&self) -> &[Lit] {
        &self.lits
    }

    /// Number of literals.
    pub fn len(&self) -> usize {
        self.lits.len()
    }

    /// Whether the clause has no literals left.
    pub fn is_empty(&self) -> bool {
        self.lits.is_empty()
    }

    /// The single literal of a unit clause.
    pub fn unit(&self) -> Option<Lit> {
        match self.lits[..] {
            [lit] => Some(lit),
            _ => None,
        }
    }

    /// Whether the clause contains the given literal.
    pub fn contains(&self, lit: Lit) -> bool {
        self.lits.binary_search(&lit).is_ok()
    }

    /// Whether every literal of this clause is also contained in `other`.
    pub fn subsumes(&self, other: &Clause) -> bool {
        self.lits.iter().all(|&lit| other.contains(lit))
    }

    /// Commutative hash over the literal set.
    pub fn hash64(&self) -> ClauseHash {
        clause_hash(&self.lits)
    }

    /// Assign a value to a variable.
    ///
    /// A literal of the assigned variable either satisfies the clause or drops out of it.
    /// Variables not present leave the clause unchanged.
    pub fn substitute(&self, var: Var, value: bool) -> Reduced {
        if !self.contains(var.positive()) && !self.contains(var.negative()) {
            return Reduced::Clause(self.clone());
        }

        let mut lits = Vec::with_capacity(self.lits.len() - 1);
        for &lit in self.lits.iter() {
            if lit.var() != var {
                lits.push(lit);
            } else if lit.is_positive() == value {
                return Reduced::Satisfied;
            }
        }

        if lits.is_empty() {
            Reduced::Empty
        } else {
            Reduced::Clause(Clause { lits })
        }
    }

    /// Apply a variable renaming, preserving signs.
    ///
    /// Every variable of the clause must be mapped. The mapping is injective, so the result
    /// cannot become tautological or lose literals.
    pub fn rename(&self, map: &VarMap) -> Clause {
        let lits = self
            .lits
            .iter()
            .map(|&lit| match map.get(lit.var()) {
                Some(var) => var.lit(lit.is_positive()),
                None => lit,
            })
            .collect();
        match Clause::new(lits) {
            Some(clause) => {
                debug_assert_eq!(clause.len(), self.len());
                clause
            }
            None => unreachable!("injective renaming produced a tautology"),
        }
    }

    /// Largest variable index present plus one.
    pub fn var_watermark(&self) -> usize {
        self.lits.last().map(|lit| lit.index() + 1).unwrap_or(0)
    }
}

impl fmt::Debug for Clause {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.lits.iter()).finish()
    }
}

//! Variables and signed literals.
//!
//! A literal packs its variable and sign into one word: the code of a literal is the variable
//! index shifted left once, with the low bit set when the variable is negated. Two properties
//! of this encoding carry the rest of the crate:
//!
//! * sorting literals by code groups them by variable with the positive literal first, which is
//!   exactly the canonical within-clause order, and
//! * negation is `code ^ 1`.
use std::{fmt, ops};

/// Largest number of distinct variables the engine addresses.
///
/// A few high bits of the backing word stay free for the sign bit and for sentinel values in
/// variable maps.
pub const MAX_VAR_COUNT: usize = ((u32::MAX >> 4) + 1) as usize;

/// A propositional variable, numbered from 0.
///
/// The text formats use 1-based numbering so that a sign can distinguish the two literals of a
/// variable; the `dimacs` conversions translate between the conventions.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Var(u32);

impl Var {
    #[inline]
    pub fn from_index(index: usize) -> Var {
        debug_assert!(index < MAX_VAR_COUNT);
        Var(index as u32)
    }

    /// The variable written as `number` in DIMACS or single-line input. Requires `number > 0`.
    #[inline]
    pub fn from_dimacs(number: isize) -> Var {
        debug_assert!(number > 0);
        Var::from_index(number as usize - 1)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub fn to_dimacs(self) -> isize {
        self.0 as isize + 1
    }

    /// The literal of this variable that is true when the variable is `value`.
    #[inline]
    pub fn lit(self, value: bool) -> Lit {
        Lit::new(self, !value)
    }

    /// The non-negated literal.
    #[inline]
    pub fn positive(self) -> Lit {
        Lit::new(self, false)
    }

    /// The negated literal.
    #[inline]
    pub fn negative(self) -> Lit {
        Lit::new(self, true)
    }
}

/// A variable or its negation.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Lit(u32);

impl Lit {
    #[inline]
    pub fn new(var: Var, negative: bool) -> Lit {
        Lit(var.0 << 1 | negative as u32)
    }

    /// Literal over the variable with the given 0-based index; `polarity` is `true` for the
    /// non-negated literal.
    #[inline]
    pub fn from_index(index: usize, polarity: bool) -> Lit {
        Var::from_index(index).lit(polarity)
    }

    /// Signed 1-based integer form: `-3` denotes the negation of variable 3. Requires a
    /// nonzero argument.
    #[inline]
    pub fn from_dimacs(number: isize) -> Lit {
        debug_assert!(number != 0);
        Var::from_dimacs(number.abs()).lit(number > 0)
    }

    #[inline]
    pub fn to_dimacs(self) -> isize {
        if self.is_negative() {
            -self.var().to_dimacs()
        } else {
            self.var().to_dimacs()
        }
    }

    #[inline]
    pub fn var(self) -> Var {
        Var(self.0 >> 1)
    }

    /// 0-based index of the literal's variable.
    #[inline]
    pub fn index(self) -> usize {
        (self.0 >> 1) as usize
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 & 1 == 1
    }

    #[inline]
    pub fn is_positive(self) -> bool {
        self.0 & 1 == 0
    }

    /// The packed representation; input to the literal hash.
    #[inline]
    pub fn code(self) -> usize {
        self.0 as usize
    }
}

impl ops::Not for Lit {
    type Output = Lit;

    #[inline]
    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

/// Signed 1-based integer notation.
impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// Signed 1-based integer notation.
impl fmt::Display for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_dimacs())
    }
}

impl fmt::Debug for Lit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(any(test, feature = "proptest-strategies"))]
#[doc(hidden)]
pub mod strategy {
    use super::*;
    use proptest::prelude::*;

    /// Literal over a variable index drawn from `indices`, either sign.
    pub fn lit(indices: impl Strategy<Value = usize>) -> impl Strategy<Value = Lit> {
        (indices, proptest::bool::ANY)
            .prop_map(|(index, negative)| Lit::new(Var::from_index(index), negative))
    }
}

//! Basic formula data types used by the splitsat SAT solver.

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! lit {
    ($x:expr) => {
        $crate::lit::Lit::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! var {
    ($x:expr) => {
        $crate::lit::Var::from_dimacs($x)
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! lits {
    ( $( $x:expr ),* ) => { [ $( $crate::lit!( $x ) ),* ] };
    ( $( $x:expr ),* , ) => { $crate::lits! [ $( $x ),* ] };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! clause {
    ( $( $x:expr ),* ) => {
        $crate::clause::Clause::new(vec![ $( $crate::lit!( $x ) ),* ]).unwrap()
    };
}

/// Shortcut for tests
#[cfg(any(test, feature = "internal-testing"))]
#[doc(hidden)]
#[macro_export]
macro_rules! set {
    ( $( $( $x:expr ),* );* ; ) => {
        $crate::set::Set::from_clauses(vec![ $( vec![ $( $crate::lit!( $x ) ),* ] ),* ])
    };
}

pub mod clause;
pub mod lit;
pub mod set;
pub mod varmap;


pub use clause::{Clause, ClauseHash};
pub use lit::{Lit, Var, MAX_VAR_COUNT};
pub use set::{Set, SetBuilder};
pub use varmap::VarMap;

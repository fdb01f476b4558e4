//! Problem adapters: integer factorization and checked multiplication.
//!
//! Both adapters sit above the core engine: they generate a multiplier circuit as a CNF set,
//! solve it, and decode bit columns from the resulting assignment.
use log::info;

use splitsat_formula::{Set, Var};

use crate::circuit::{bit_width, from_bits, to_bits, CircuitBuilder, MultiplierLayout};
use crate::solution::Assignment;

/// A decoded factorization `n = a × b`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Factors {
    pub a: u64,
    pub b: u64,
}

/// Builds a CNF whose satisfying assignments are the nontrivial factorizations of `n`.
///
/// An unsatisfiable result means `n` has no nontrivial factorization (it is prime, 1 or 0 — for
/// an odd prime the excluded-trivial-factor clauses close the last gap).
pub struct Factorizer {
    layout: MultiplierLayout,
}

impl Factorizer {
    /// Encode `a × b = n` with both operands constrained to be greater than one.
    ///
    /// Operand widths: every composite `n` has a divisor pair whose smaller member fits in
    /// `ceil(L/2)` bits and whose larger member fits in `L - 1` bits, `L` being the bit width
    /// of `n`.
    pub fn encode(n: u64) -> (Set, Factorizer) {
        if n < 4 {
            // 0, 1 and the one-bit primes have no nontrivial factorization
            let layout = MultiplierLayout {
                a: vec![],
                b: vec![],
                out: vec![],
            };
            return (Set::constant(false), Factorizer { layout });
        }

        let width = bit_width(n);
        let a_width = (width + 1) / 2;
        let b_width = width - 1;

        let mut builder = CircuitBuilder::new();
        let layout = builder.multiplier(a_width, b_width);

        // fix the product bits to n
        for (index, out) in layout.out.iter().enumerate() {
            let expected = (n >> index) & 1 == 1;
            match out {
                Some(var) => builder.clause(&[var.lit(expected)]),
                // a constant-zero position conflicts with a one bit of n
                None if expected => builder.clause(&[]),
                None => {}
            }
        }

        // exclude the trivial factorizations: some bit above the lowest must be set
        let a_high: Vec<_> = layout.a[1..].iter().map(|var| var.positive()).collect();
        let b_high: Vec<_> = layout.b[1..].iter().map(|var| var.positive()).collect();
        builder.clause(&a_high);
        builder.clause(&b_high);

        info!(
            "factorization circuit for {}: {}x{} bits, {} variables",
            n,
            a_width,
            b_width,
            builder.var_count()
        );

        (builder.into_set(), Factorizer { layout })
    }

    /// Read the operand columns out of a satisfying assignment.
    pub fn decode(&self, assignment: &Assignment) -> Factors {
        Factors {
            a: decode_column(&self.layout.a, assignment),
            b: decode_column(&self.layout.b, assignment),
        }
    }
}

/// Builds a multiplier CNF with both operands substituted in.
///
/// The adapter reports an operand substitution that empties a clause as inconsistency; on a
/// satisfiable solve the product is decoded from the output columns.
pub struct Multiplier {
    layout: MultiplierLayout,
}

impl Multiplier {
    /// Encode the circuit sized for `a` and `b` and substitute their bits.
    ///
    /// The returned set is the remaining constraint system; it comes back as the constant false
    /// set when the substitution already ran into a contradiction.
    pub fn encode(a: u64, b: u64) -> (Set, Multiplier) {
        let a_width = bit_width(a).max(1);
        let b_width = bit_width(b).max(1);

        let mut builder = CircuitBuilder::new();
        let layout = builder.multiplier(a_width, b_width);
        let mut set = builder.into_set();

        for (value, vars) in [(a, &layout.a), (b, &layout.b)].iter() {
            let bits = to_bits(*value, vars.len());
            for (index, &var) in vars.iter().enumerate() {
                set = set.substitute(var, bits[index]);
                if set.value() == Some(false) {
                    return (set, Multiplier { layout });
                }
            }
        }

        (set, Multiplier { layout })
    }

    /// Read the product out of a satisfying assignment of the substituted set.
    pub fn decode(&self, assignment: &Assignment) -> u64 {
        from_bits(self.layout.out.iter().map(|out| match out {
            Some(var) => assignment.value_of(*var),
            None => false,
        }))
    }
}

fn decode_column(vars: &[Var], assignment: &Assignment) -> u64 {
    from_bits(vars.iter().map(|&var| {
        // operand bits left free by the solver can take either value; pick false so leading
        // zeros stay zeros
        assignment.get(var).unwrap_or(false)
    }))
}

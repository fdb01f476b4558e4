//! CNF encoding of a schoolbook multiplier circuit.
//!
//! The factor and multiply adapters share this builder. Gates are encoded with their Tseitin
//! definitions: every gate output is a fresh variable bi-implied with its inputs, so fixing the
//! operand bits forces the whole circuit by unit propagation.
use splitsat_formula::{Lit, Set, Var};

/// Variable layout of a generated multiplier.
///
/// All bit columns are least-significant first. `out` has `a.len() + b.len()` positions; a
/// `None` position is a constant zero (no partial product feeds it).
pub struct MultiplierLayout {
    pub a: Vec<Var>,
    pub b: Vec<Var>,
    pub out: Vec<Option<Var>>,
}

/// Incrementally builds the circuit clauses over fresh variables.
pub struct CircuitBuilder {
    clauses: Vec<Vec<Lit>>,
    next_index: usize,
}

impl CircuitBuilder {
    pub fn new() -> CircuitBuilder {
        CircuitBuilder {
            clauses: vec![],
            next_index: 0,
        }
    }

    fn fresh(&mut self) -> Var {
        let var = Var::from_index(self.next_index);
        self.next_index += 1;
        var
    }

    fn fresh_column(&mut self, width: usize) -> Vec<Var> {
        (0..width).map(|_| self.fresh()).collect()
    }

    pub fn clause(&mut self, lits: &[Lit]) {
        self.clauses.push(lits.to_vec());
    }

    /// `g ↔ a ∧ b`
    fn and_gate(&mut self, a: Lit, b: Lit) -> Lit {
        let g = self.fresh().positive();
        self.clause(&[!g, a]);
        self.clause(&[!g, b]);
        self.clause(&[g, !a, !b]);
        g
    }

    /// `s ↔ a ⊕ b`
    fn xor_gate(&mut self, a: Lit, b: Lit) -> Lit {
        let s = self.fresh().positive();
        self.clause(&[!s, a, b]);
        self.clause(&[!s, !a, !b]);
        self.clause(&[s, !a, b]);
        self.clause(&[s, a, !b]);
        s
    }

    /// `s ↔ a ⊕ b ⊕ c`
    fn xor3_gate(&mut self, a: Lit, b: Lit, c: Lit) -> Lit {
        let s = self.fresh().positive();
        self.clause(&[!s, a, b, c]);
        self.clause(&[!s, a, !b, !c]);
        self.clause(&[!s, !a, b, !c]);
        self.clause(&[!s, !a, !b, c]);
        self.clause(&[s, !a, b, c]);
        self.clause(&[s, a, !b, c]);
        self.clause(&[s, a, b, !c]);
        self.clause(&[s, !a, !b, !c]);
        s
    }

    /// `g ↔ at least two of a, b, c`
    fn majority_gate(&mut self, a: Lit, b: Lit, c: Lit) -> Lit {
        let g = self.fresh().positive();
        self.clause(&[!g, a, b]);
        self.clause(&[!g, a, c]);
        self.clause(&[!g, b, c]);
        self.clause(&[g, !a, !b]);
        self.clause(&[g, !a, !c]);
        self.clause(&[g, !b, !c]);
        g
    }

    /// Half adder: `(sum, carry)`.
    fn half_adder(&mut self, a: Lit, b: Lit) -> (Lit, Lit) {
        (self.xor_gate(a, b), self.and_gate(a, b))
    }

    /// Full adder: `(sum, carry)`.
    fn full_adder(&mut self, a: Lit, b: Lit, c: Lit) -> (Lit, Lit) {
        (self.xor3_gate(a, b, c), self.majority_gate(a, b, c))
    }

    /// Build an `a_width × b_width` bit multiplier.
    ///
    /// Partial products are collected per output column and compressed with half and full
    /// adders until each column holds a single bit.
    pub fn multiplier(&mut self, a_width: usize, b_width: usize) -> MultiplierLayout {
        let a = self.fresh_column(a_width);
        let b = self.fresh_column(b_width);

        let out_width = a_width + b_width;
        let mut columns: Vec<Vec<Lit>> = vec![vec![]; out_width + 1];

        for (i, &a_bit) in a.iter().enumerate() {
            for (j, &b_bit) in b.iter().enumerate() {
                let product = self.and_gate(a_bit.positive(), b_bit.positive());
                columns[i + j].push(product);
            }
        }

        let mut out = Vec::with_capacity(out_width);
        for k in 0..out_width {
            while columns[k].len() >= 3 {
                let inputs = (columns[k].pop(), columns[k].pop(), columns[k].pop());
                if let (Some(x), Some(y), Some(z)) = inputs {
                    let (sum, carry) = self.full_adder(x, y, z);
                    columns[k].push(sum);
                    columns[k + 1].push(carry);
                }
            }
            if columns[k].len() == 2 {
                let inputs = (columns[k].pop(), columns[k].pop());
                if let (Some(x), Some(y)) = inputs {
                    let (sum, carry) = self.half_adder(x, y);
                    columns[k].push(sum);
                    columns[k + 1].push(carry);
                }
            }
            out.push(columns[k].first().map(|lit| lit.var()));
        }

        // A carry past the product width cannot be set in any consistent assignment (the
        // product fits in out_width bits), but the adder tree may still allocate one.
        let overflow = columns[out_width].clone();
        for lit in overflow {
            self.clause(&[!lit]);
        }

        MultiplierLayout { a, b, out }
    }

    /// Number of variables allocated so far.
    pub fn var_count(&self) -> usize {
        self.next_index
    }

    pub fn into_set(self) -> Set {
        let mut set = Set::from_clauses(self.clauses);
        set.set_var_count(self.next_index);
        set
    }
}

impl Default for CircuitBuilder {
    fn default() -> CircuitBuilder {
        CircuitBuilder::new()
    }
}

/// Number of bits needed to represent `n`.
pub fn bit_width(n: u64) -> usize {
    (64 - n.leading_zeros()) as usize
}

/// The `width` low bits of `n`, least-significant first.
pub fn to_bits(n: u64, width: usize) -> Vec<bool> {
    (0..width).map(|index| (n >> index) & 1 == 1).collect()
}

/// Reassemble an integer from the assignment of a bit column.
pub fn from_bits(bits: impl Iterator<Item = bool>) -> u64 {
    bits.enumerate()
        .map(|(index, bit)| (bit as u64) << index)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::solution::Assignment;

    #[test]
    fn bit_helpers() {
        assert_eq!(bit_width(1), 1);
        assert_eq!(bit_width(15), 4);
        assert_eq!(bit_width(16), 5);
        assert_eq!(to_bits(6, 4), vec![false, true, true, false]);
        assert_eq!(from_bits(to_bits(1234, 11).into_iter()), 1234);
    }

    /// Evaluate the circuit clauses as plain boolean constraints.
    fn forced_outputs(layout: &MultiplierLayout, set: &Set, a: u64, b: u64) -> Option<u64> {
        // seed the operand bits, then run unit propagation to a fixed point
        let mut current = set.clone();
        let mut assignment = Assignment::new(set.var_count());

        for (bits, vars) in [(a, &layout.a), (b, &layout.b)].iter() {
            for (index, &var) in vars.iter().enumerate() {
                let value = (bits >> index) & 1 == 1;
                assignment.set(var, value);
                current = current.substitute(var, value);
            }
        }

        loop {
            match current.value() {
                Some(true) => break,
                Some(false) => return None,
                None => {}
            }
            let lit = current.clauses().iter().find_map(|clause| clause.unit())?;
            assignment.set(lit.var(), lit.is_positive());
            current = current.substitute(lit.var(), lit.is_positive());
        }

        Some(from_bits(layout.out.iter().map(|var| match var {
            Some(var) => assignment.value_of(*var),
            None => false,
        })))
    }

    #[test]
    fn small_products_propagate() {
        for &(a_width, b_width) in &[(2usize, 2usize), (3, 2), (3, 3)] {
            let mut builder = CircuitBuilder::new();
            let layout = builder.multiplier(a_width, b_width);
            let set = builder.into_set();

            for a in 0..(1u64 << a_width) {
                for b in 0..(1u64 << b_width) {
                    assert_eq!(
                        forced_outputs(&layout, &set, a, b),
                        Some(a * b),
                        "{}x{} under a {}x{} circuit",
                        a,
                        b,
                        a_width,
                        b_width
                    );
                }
            }
        }
    }
}

//! Mappings between variable names.
use crate::lit::{Lit, Var, MAX_VAR_COUNT};

const NO_VAR_IDX: u32 = MAX_VAR_COUNT as u32;

/// A mapping from variables to variables.
///
/// Used to record the renaming a normalization pass applied to a set. The identity mapping is
/// represented without backing storage so that un-renamed sets carry no allocation.
#[derive(Clone, Default)]
pub struct VarMap {
    default_identity: bool,
    mapping: Vec<u32>,
}

impl VarMap {
    /// The empty mapping: no variable is mapped.
    pub fn new() -> VarMap {
        VarMap::default()
    }

    /// Identity mapping over all variables.
    pub fn identity() -> VarMap {
        VarMap {
            default_identity: true,
            mapping: vec![],
        }
    }

    /// Whether this is the identity mapping.
    pub fn is_identity(&self) -> bool {
        self.default_identity && self.mapping.is_empty()
    }

    /// Look up a variable in the mapping.
    pub fn get(&self, from: Var) -> Option<Var> {
        match self.mapping.get(from.index()).cloned() {
            Some(index) if index == NO_VAR_IDX => None,
            Some(index) => Some(Var::from_index(index as usize)),
            None if self.default_identity => Some(from),
            None => None,
        }
    }

    /// Map a literal, preserving its sign.
    pub fn map_lit(&self, lit: Lit) -> Option<Lit> {
        self.get(lit.var()).map(|var| var.lit(lit.is_positive()))
    }

    /// Insert a new mapping from `from` to `into`.
    ///
    /// This has the precondition that `from` is not mapped yet.
    pub fn insert(&mut self, from: Var, into: Var) {
        if self.mapping.len() <= from.index() {
            self.mapping.resize(from.index() + 1, NO_VAR_IDX);
        }
        debug_assert_eq!(self.mapping[from.index()], NO_VAR_IDX);
        self.mapping[from.index()] = into.index() as u32;
    }

    /// Number of mapped variables.
    pub fn len(&self) -> usize {
        self.mapping
            .iter()
            .filter(|&&index| index != NO_VAR_IDX)
            .count()
    }

    /// Whether no variable is mapped.
    pub fn is_empty(&self) -> bool {
        !self.default_identity && self.len() == 0
    }

    /// The inverse mapping.
    ///
    /// Normalization renamings are injective, so the inverse maps every image back to its unique
    /// preimage.
    pub fn inverse(&self) -> VarMap {
        if self.is_identity() {
            return VarMap::identity();
        }
        let mut inverse = VarMap::new();
        for (index, &into) in self.mapping.iter().enumerate() {
            if into != NO_VAR_IDX {
                inverse.insert(Var::from_index(into as usize), Var::from_index(index));
            }
        }
        inverse
    }

    /// The composition `next ∘ self`: first apply `self`, then `next`.
    ///
    /// Variables that `next` does not map are dropped from the result.
    pub fn then(&self, next: &VarMap) -> VarMap {
        if self.is_identity() {
            return next.clone();
        }
        if next.is_identity() {
            return self.clone();
        }
        let mut composed = VarMap::new();
        for (index, &mid) in self.mapping.iter().enumerate() {
            if mid == NO_VAR_IDX {
                continue;
            }
            if let Some(into) = next.get(Var::from_index(mid as usize)) {
                composed.insert(Var::from_index(index), into);
            }
        }
        composed
    }
}

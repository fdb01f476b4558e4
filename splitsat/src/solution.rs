//! Assignments and solution extraction.
//!
//! When the root resolves satisfiable, the extractor walks from the root down whichever branch
//! of each node is itself resolved true, replaying the forced assignments of every edge. The
//! assignments are recorded in node-local variable spaces; composing the inverses of the edge
//! rename maps translates them back into the variable space of the original formula.
use std::io;

use splitsat_formula::{Var, VarMap};

use crate::store::{Node, NodeId, NodeStore, Status, Target};

/// A (partial) assignment over the original variable space.
///
/// Variables left unassigned by extraction are free: any value satisfies. They are reported with
/// the deterministic default `true`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Assignment {
    values: Vec<Option<bool>>,
}

impl Assignment {
    pub fn new(var_count: usize) -> Assignment {
        Assignment {
            values: vec![None; var_count],
        }
    }

    pub fn var_count(&self) -> usize {
        self.values.len()
    }

    pub fn set(&mut self, var: Var, value: bool) {
        if var.index() >= self.values.len() {
            self.values.resize(var.index() + 1, None);
        }
        self.values[var.index()] = Some(value);
    }

    pub fn get(&self, var: Var) -> Option<bool> {
        self.values.get(var.index()).cloned().flatten()
    }

    /// The value of a variable with free variables defaulted to true.
    pub fn value_of(&self, var: Var) -> bool {
        self.get(var).unwrap_or(true)
    }

    /// Iterator over `(var, value)` with free variables defaulted.
    pub fn iter<'a>(&'a self) -> impl Iterator<Item = (Var, bool)> + 'a {
        self.values
            .iter()
            .enumerate()
            .map(|(index, value)| (Var::from_index(index), value.unwrap_or(true)))
    }
}

/// Walk the DAG from the root to a satisfied leaf and collect the assignment.
///
/// `root_rename` is the renaming the root normalization applied; `var_count` the variable count
/// of the original formula. Returns `None` when the root is not resolved true or the true path
/// is incomplete (which would be a bookkeeping bug, surfaced by the caller).
pub fn extract(
    store: &NodeStore,
    root: NodeId,
    root_rename: &VarMap,
    var_count: usize,
) -> Option<Assignment> {
    store.read(|nodes| {
        let mut assignment = Assignment::new(var_count);
        // node-local space -> original space
        let mut to_orig = root_rename.inverse();
        let mut id = root;

        loop {
            let node = &nodes[id];
            if node.status != Status::ResolvedTrue {
                return None;
            }

            let edge = [node.pos.as_ref(), node.neg.as_ref()]
                .iter()
                .cloned()
                .flatten()
                .find(|&edge| Node::edge_value(edge, nodes) == Some(true))?;

            for &(var, value) in edge.forced.iter() {
                if let Some(orig) = to_orig.get(var) {
                    assignment.set(orig, value);
                }
            }

            match edge.target {
                Target::Resolved(true) => return Some(assignment),
                Target::Resolved(false) => return None,
                Target::Node(child) => {
                    to_orig = edge.rename.inverse().then(&to_orig);
                    id = child;
                }
            }
        }
    })
}

/// Write an assignment in the solution file format: one `v=0|1` line per variable sorted by
/// variable id, and a final verdict line.
pub fn write_solution(
    target: &mut impl io::Write,
    assignment: Option<&Assignment>,
) -> io::Result<()> {
    match assignment {
        Some(assignment) => {
            for (var, value) in assignment.iter() {
                writeln!(target, "{}={}", var, value as u8)?;
            }
            writeln!(target, "SATISFIABLE")
        }
        None => writeln!(target, "UNSATISFIABLE"),
    }
}

//! Graphviz export of the node DAG.
use std::io;

use crate::store::{NodeStore, Status, Target};

/// Write the DAG in DOT format.
///
/// Nodes are labeled with a fingerprint prefix and their status; edges carry the split literal
/// that produced the branch. Branches that collapsed to a constant point at shared `sat` /
/// `unsat` sinks.
pub fn write_dot(target: &mut impl io::Write, store: &NodeStore, name: &str) -> io::Result<()> {
    writeln!(target, "digraph \"{}\" {{", name)?;
    writeln!(target, "    node [shape=box, fontname=\"monospace\"];")?;
    writeln!(target, "    sat [shape=ellipse, label=\"true\"];")?;
    writeln!(target, "    unsat [shape=ellipse, label=\"false\"];")?;

    store.read(|nodes| {
        for (id, node) in nodes.iter().enumerate() {
            let fill = match node.status {
                Status::ResolvedTrue => ", style=filled, fillcolor=palegreen",
                Status::ResolvedFalse => ", style=filled, fillcolor=lightpink",
                _ => "",
            };
            writeln!(
                target,
                "    n{} [label=\"{}\\n{:?}\"{}];",
                id,
                node.fingerprint.short(),
                node.status,
                fill
            )?;

            let split_var = match node.split_var {
                Some(var) => var,
                None => continue,
            };
            for &(edge, polarity) in [(&node.pos, true), (&node.neg, false)].iter() {
                let edge = match edge {
                    Some(edge) => edge,
                    None => continue,
                };
                let label = if polarity {
                    format!("{}", split_var)
                } else {
                    format!("-{}", split_var)
                };
                let head = match edge.target {
                    Target::Node(child) => format!("n{}", child),
                    Target::Resolved(true) => "sat".to_string(),
                    Target::Resolved(false) => "unsat".to_string(),
                };
                writeln!(target, "    n{} -> {} [label=\"{}\"];", id, head, label)?;
            }
        }
        Ok::<(), io::Error>(())
    })?;

    writeln!(target, "}}")
}

#[cfg(test)]
mod tests {
    use super::*;

    use splitsat_formula::set;

    #[test]
    fn renders_interned_nodes() {
        let store = NodeStore::default();
        store.intern(set![1, 2; -1;]);

        let mut out = vec![];
        write_dot(&mut out, &store, "test").unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("digraph \"test\" {"));
        assert!(text.contains("n0 [label="));
        assert!(text.trim_end().ends_with('}'));
    }
}

//! The node store: fingerprint-indexed, shared ownership of the DAG.
//!
//! The store is a cloneable handle. Workers use it concurrently, but only through
//! [`intern`](NodeStore::intern); all status, edge and parent-link mutation goes through the
//! master. Nodes are addressed by dense ids, so parent back-references never own anything.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use splitsat_formula::{Set, Var, VarMap};

use crate::global::GlobalStore;

/// Stable 256-bit digest of a normalized set.
///
/// Fingerprints key the runtime store and the persistent store. Nodes are identified by
/// fingerprint alone, which relies on the digest being collision free in practice.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Digest a set in its current (canonical) clause and literal order.
    pub fn of_set(set: &Set) -> Fingerprint {
        let mut bytes = vec![];
        set.canonical_bytes(&mut bytes);
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Fingerprint(hasher.finalize().into())
    }

    /// Parse the hex form produced by `Display`.
    pub fn from_hex(hex: &str) -> Option<Fingerprint> {
        if hex.len() != 64 {
            return None;
        }
        let mut bytes = [0u8; 32];
        for (index, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let high = (chunk[0] as char).to_digit(16)?;
            let low = (chunk[1] as char).to_digit(16)?;
            bytes[index] = (high * 16 + low) as u8;
        }
        Some(Fingerprint(bytes))
    }

    /// Shortened hex form for labels and log lines.
    pub fn short(&self) -> String {
        format!("{}", self).chars().take(12).collect()
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for byte in self.0.iter() {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

/// Index of a node in the store.
pub type NodeId = usize;

/// Lifecycle of a node.
///
/// Transitions are monotonic: pending → expanding → resolved, with no reverse edges.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Status {
    Pending,
    Expanding,
    ResolvedTrue,
    ResolvedFalse,
}

impl Status {
    pub fn is_resolved(self) -> bool {
        matches!(self, Status::ResolvedTrue | Status::ResolvedFalse)
    }
}

/// What a branch of an expansion leads to.
#[derive(Copy, Clone, Debug)]
pub enum Target {
    /// The branch collapsed to a constant during substitution.
    Resolved(bool),
    /// The branch was interned as a child node.
    Node(NodeId),
}

/// One branch of an expanded node.
///
/// Edges are per-parent: a shared child is reached from different parents with different forced
/// assignments and rename maps, so this data cannot live on the child.
#[derive(Clone)]
pub struct Edge {
    pub target: Target,
    /// Assignments that produced the branch, in the parent's variable space: the split variable
    /// followed by the unit-propagated literals.
    pub forced: Vec<(Var, bool)>,
    /// Renaming applied when the child was normalized (parent space → child space).
    pub rename: VarMap,
}

/// A registered set with its expansion bookkeeping.
pub struct Node {
    pub fingerprint: Fingerprint,
    pub set: Set,
    pub status: Status,
    pub split_var: Option<Var>,
    /// Positive branch.
    pub pos: Option<Edge>,
    /// Negative branch.
    pub neg: Option<Edge>,
    /// Non-owning back-references used for resolution propagation.
    pub parents: Vec<NodeId>,
    /// Whether the master already put the node on the pending queue.
    pub queued: bool,
}

impl Node {
    fn new(fingerprint: Fingerprint, set: Set, status: Status) -> Node {
        Node {
            fingerprint,
            set,
            status,
            split_var: None,
            pos: None,
            neg: None,
            parents: vec![],
            queued: false,
        }
    }

    /// The resolved value a branch contributes, if known.
    pub fn edge_value(edge: &Edge, nodes: &[Node]) -> Option<bool> {
        match edge.target {
            Target::Resolved(value) => Some(value),
            Target::Node(child) => match nodes[child].status {
                Status::ResolvedTrue => Some(true),
                Status::ResolvedFalse => Some(false),
                _ => None,
            },
        }
    }
}

#[derive(Default)]
struct StoreInner {
    nodes: Vec<Node>,
    index: FxHashMap<Fingerprint, NodeId>,
    interned: u64,
    hits: u64,
    hydrated: u64,
}

struct StoreShared {
    inner: Mutex<StoreInner>,
    memoize: bool,
    global: Option<GlobalStore>,
}

/// Cloneable handle to the shared node store.
#[derive(Clone)]
pub struct NodeStore {
    shared: Arc<StoreShared>,
}

impl Default for NodeStore {
    fn default() -> NodeStore {
        NodeStore::new(true, None)
    }
}

impl NodeStore {
    pub fn new(memoize: bool, global: Option<GlobalStore>) -> NodeStore {
        NodeStore {
            shared: Arc::new(StoreShared {
                inner: Mutex::new(StoreInner::default()),
                memoize,
                global,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<StoreInner> {
        match self.shared.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Register a set, returning the node id and whether it was newly created.
    ///
    /// Linearizable: concurrent interns of equal sets return the same id with exactly one
    /// `was_new = true`. When the persistent store knows the fingerprint, the node is hydrated
    /// in its resolved state.
    pub fn intern(&self, set: Set) -> (NodeId, bool) {
        let fingerprint = Fingerprint::of_set(&set);

        if self.shared.memoize {
            let mut inner = self.lock();
            if let Some(&id) = inner.index.get(&fingerprint) {
                inner.hits += 1;
                return (id, false);
            }
        }

        // Persistent lookup happens outside the lock; it may touch the filesystem.
        let known_unsat = self
            .shared
            .global
            .as_ref()
            .map(|global| global.contains(&fingerprint))
            .unwrap_or(false);

        let status = match set.value() {
            Some(true) => Status::ResolvedTrue,
            Some(false) => Status::ResolvedFalse,
            None if known_unsat => Status::ResolvedFalse,
            None => Status::Pending,
        };

        let mut inner = self.lock();
        if self.shared.memoize {
            if let Some(&id) = inner.index.get(&fingerprint) {
                inner.hits += 1;
                return (id, false);
            }
        }

        let id = inner.nodes.len();
        inner.nodes.push(Node::new(fingerprint, set, status));
        if self.shared.memoize {
            inner.index.insert(fingerprint, id);
        }
        inner.interned += 1;
        if known_unsat {
            inner.hydrated += 1;
        }
        (id, true)
    }

    pub fn status(&self, id: NodeId) -> Status {
        self.lock().nodes[id].status
    }

    pub fn fingerprint(&self, id: NodeId) -> Fingerprint {
        self.lock().nodes[id].fingerprint
    }

    /// Snapshot of a node's set, handed to workers.
    pub fn node_set(&self, id: NodeId) -> Set {
        self.lock().nodes[id].set.clone()
    }

    /// Master only: advance a node's status.
    pub fn set_status(&self, id: NodeId, status: Status) {
        let mut inner = self.lock();
        let node = &mut inner.nodes[id];
        debug_assert!(!node.status.is_resolved());
        node.status = status;

        if status == Status::ResolvedFalse {
            let fingerprint = node.fingerprint;
            drop(inner);
            if let Some(global) = self.shared.global.as_ref() {
                global.record_unsat(&fingerprint);
            }
        }
    }

    /// Master only: put a node that failed to expand back into the pending state.
    ///
    /// The one exception to the monotonic status order, used when a worker crashed mid-expansion
    /// and the node is re-queued.
    pub fn reset_for_retry(&self, id: NodeId) {
        let mut inner = self.lock();
        let node = &mut inner.nodes[id];
        debug_assert_eq!(node.status, Status::Expanding);
        node.status = Status::Pending;
    }

    /// Master only: mark a node as queued. Returns false if it already was.
    pub fn mark_queued(&self, id: NodeId) -> bool {
        let mut inner = self.lock();
        let node = &mut inner.nodes[id];
        if node.queued {
            false
        } else {
            node.queued = true;
            true
        }
    }

    /// Master only: store the expansion result of a node.
    pub fn set_expansion(&self, id: NodeId, split_var: Var, pos: Edge, neg: Edge) {
        let mut inner = self.lock();
        let node = &mut inner.nodes[id];
        debug_assert!(node.pos.is_none() && node.neg.is_none());
        node.split_var = Some(split_var);
        node.pos = Some(pos);
        node.neg = Some(neg);
    }

    /// Master only: register a parent back-reference.
    pub fn add_parent(&self, child: NodeId, parent: NodeId) {
        let mut inner = self.lock();
        let parents = &mut inner.nodes[child].parents;
        if !parents.contains(&parent) {
            parents.push(parent);
        }
    }

    pub fn parents(&self, id: NodeId) -> Vec<NodeId> {
        self.lock().nodes[id].parents.clone()
    }

    /// The resolution a node's edges imply, if any.
    ///
    /// A true branch resolves the node (OR rule); the node is false only once both branches are
    /// false (AND rule).
    pub fn implied_resolution(&self, id: NodeId) -> Option<Status> {
        let inner = self.lock();
        let node = &inner.nodes[id];
        let (pos, neg) = match (&node.pos, &node.neg) {
            (Some(pos), Some(neg)) => (pos, neg),
            _ => return None,
        };
        let pos = Node::edge_value(pos, &inner.nodes);
        let neg = Node::edge_value(neg, &inner.nodes);
        if pos == Some(true) || neg == Some(true) {
            Some(Status::ResolvedTrue)
        } else if pos == Some(false) && neg == Some(false) {
            Some(Status::ResolvedFalse)
        } else {
            None
        }
    }

    /// Number of nodes in the store.
    pub fn len(&self) -> usize {
        self.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// (interned, lookup hits, hydrated-from-persistent) counters.
    pub fn counters(&self) -> (u64, u64, u64) {
        let inner = self.lock();
        (inner.interned, inner.hits, inner.hydrated)
    }

    /// Run a closure over the node slab. Used by solution extraction and DOT export once the
    /// workers are gone.
    pub fn read<R>(&self, f: impl FnOnce(&[Node]) -> R) -> R {
        let inner = self.lock();
        f(&inner.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::thread;

    use splitsat_formula::set;

    #[test]
    fn intern_is_idempotent() {
        let store = NodeStore::default();
        let (first, new_first) = store.intern(set![1, 2; -1;]);
        let (second, new_second) = store.intern(set![1, 2; -1;]);
        assert_eq!(first, second);
        assert!(new_first);
        assert!(!new_second);
        assert_eq!(store.len(), 1);
        assert_eq!(store.counters(), (1, 1, 0));
    }

    #[test]
    fn without_memoization_every_intern_is_new() {
        let store = NodeStore::new(false, None);
        let (first, _) = store.intern(set![1;]);
        let (second, _) = store.intern(set![1;]);
        assert_ne!(first, second);
    }

    #[test]
    fn constant_sets_intern_resolved() {
        let store = NodeStore::default();
        let (id_true, _) = store.intern(Set::constant(true));
        let (id_false, _) = store.intern(Set::constant(false));
        assert_eq!(store.status(id_true), Status::ResolvedTrue);
        assert_eq!(store.status(id_false), Status::ResolvedFalse);
        assert_ne!(id_true, id_false);
    }

    #[test]
    fn fingerprints_differ_for_different_sets() {
        assert_ne!(
            Fingerprint::of_set(&set![1, 2;]),
            Fingerprint::of_set(&set![1, -2;])
        );
    }

    #[test]
    fn fingerprint_hex_roundtrip() {
        let fingerprint = Fingerprint::of_set(&set![1, 2; -1;]);
        let hex = format!("{}", fingerprint);
        assert_eq!(Fingerprint::from_hex(&hex), Some(fingerprint));
        assert_eq!(Fingerprint::from_hex("zz"), None);
    }

    #[test]
    fn concurrent_interns_agree_on_one_creator() {
        let store = NodeStore::default();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.intern(set![1, 2, 3; -1, -2; 2, -3;]))
            })
            .collect();

        let results: Vec<(NodeId, bool)> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        let id = results[0].0;
        assert!(results.iter().all(|&(other, _)| other == id));
        assert_eq!(results.iter().filter(|&&(_, new)| new).count(), 1);
    }

    #[test]
    fn implied_resolution_follows_or_and_rules() {
        let store = NodeStore::default();
        let (parent, _) = store.intern(set![1, 2; -1, 2;]);
        let (child, _) = store.intern(set![2;]);

        let edge_to_child = Edge {
            target: Target::Node(child),
            forced: vec![(splitsat_formula::var!(1), true)],
            rename: VarMap::identity(),
        };
        let false_edge = Edge {
            target: Target::Resolved(false),
            forced: vec![(splitsat_formula::var!(1), false)],
            rename: VarMap::identity(),
        };

        store.set_status(parent, Status::Expanding);
        store.set_expansion(parent, splitsat_formula::var!(1), edge_to_child, false_edge);
        assert_eq!(store.implied_resolution(parent), None);

        store.set_status(child, Status::Expanding);
        store.set_status(child, Status::ResolvedTrue);
        assert_eq!(store.implied_resolution(parent), Some(Status::ResolvedTrue));
    }
}

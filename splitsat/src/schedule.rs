//! Scheduling of node expansions across workers.
//!
//! The master owns the DAG bookkeeping and a FIFO queue of pending nodes, which yields a
//! breadth-first traversal. Workers receive `(node, set)` snapshots and return pure expansion
//! results; the master is the sole mutator of statuses, edges and parent links. With a single
//! worker everything runs inline on the master thread.
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, info};
use partial_ref::{partial, PartialRef};
use rustc_hash::FxHashMap;

use splitsat_formula::{Set, Var, VarMap};

use crate::config::{NormalForm, SolverConfig, SplitPolicy};
use crate::context::{parts::*, Context};
use crate::error::SolverError;
use crate::normalize::normalize;
use crate::split::{self, Branch};
use crate::state::SatState;
use crate::store::{Edge, NodeId, NodeStore, Status, Target};

/// How often a failed expansion is re-queued before the solve gives up.
const MAX_EXPAND_RETRIES: u32 = 2;

/// How many expansions between progress log lines.
const LOG_INTERVAL: u64 = 5000;

/// Master-side scheduling state.
#[derive(Default)]
pub struct Schedule {
    queue: VecDeque<NodeId>,
    in_flight: usize,
    retries: FxHashMap<NodeId, u32>,
    stop: Option<Arc<AtomicBool>>,
}

impl Schedule {
    /// Clear per-solve state, keeping the registered stop flag but lowering it.
    ///
    /// An earlier early-terminated solve leaves queued ids behind that mean nothing to the next
    /// solve's store.
    pub fn reset(&mut self) {
        self.queue.clear();
        self.in_flight = 0;
        self.retries.clear();
        if let Some(stop) = self.stop.as_ref() {
            stop.store(false, Ordering::Relaxed);
        }
    }

    /// Enqueue the root node.
    pub fn seed(&mut self, root: NodeId) {
        self.queue.push_back(root);
    }

    /// The cooperative cancellation flag, created on demand.
    ///
    /// Raising it makes the next master iteration abort the solve; the workers observe it while
    /// winding down.
    pub fn stop_flag(&mut self) -> Arc<AtomicBool> {
        self.stop
            .get_or_insert_with(|| Arc::new(AtomicBool::new(false)))
            .clone()
    }
}

/// The per-worker slice of the configuration.
#[derive(Clone)]
struct WorkerConfig {
    start_mode: NormalForm,
    sort_by_size: bool,
    split_policy: SplitPolicy,
}

impl WorkerConfig {
    fn of(config: &SolverConfig) -> WorkerConfig {
        WorkerConfig {
            start_mode: config.start_mode(),
            sort_by_size: config.sort_by_size,
            split_policy: config.split_policy,
        }
    }
}

struct WorkItem {
    node: NodeId,
    set: Set,
}

enum BranchReply {
    Resolved {
        value: bool,
        forced: Vec<(Var, bool)>,
    },
    Child {
        node: NodeId,
        forced: Vec<(Var, bool)>,
        rename: VarMap,
    },
}

struct Expansion {
    node: NodeId,
    split_var: Var,
    pos: BranchReply,
    neg: BranchReply,
}

enum WorkReply {
    Expanded(Expansion),
    Failed { node: NodeId, message: String },
}

/// Expand one node: split, propagate units, normalize and intern the open daughters.
///
/// Pure with respect to the DAG: the only side effect is interning, which is safe from any
/// thread.
fn expand(store: &NodeStore, config: &WorkerConfig, node: NodeId, set: Set) -> Expansion {
    let split_var = match split::select_var(&set, config.split_policy) {
        Some(var) => var,
        // an unknown set always has clauses and therefore variables
        None => unreachable!("expanding a set without variables"),
    };

    let pos = expand_branch(store, config, &set, split_var, true);
    let neg = expand_branch(store, config, &set, split_var, false);

    Expansion {
        node,
        split_var,
        pos,
        neg,
    }
}

fn expand_branch(
    store: &NodeStore,
    config: &WorkerConfig,
    set: &Set,
    var: Var,
    value: bool,
) -> BranchReply {
    match split::assume(set, var, value) {
        Branch::Resolved { value, forced } => BranchReply::Resolved { value, forced },
        Branch::Open { set, forced } => {
            let normalized = normalize(&set, config.start_mode, config.sort_by_size);
            let (node, _was_new) = store.intern(normalized.set);
            BranchReply::Child {
                node,
                forced,
                rename: normalized.rename,
            }
        }
    }
}

fn worker_loop(
    store: NodeStore,
    config: WorkerConfig,
    work_rx: Receiver<WorkItem>,
    reply_tx: Sender<WorkReply>,
    stop: Arc<AtomicBool>,
) {
    for item in work_rx.iter() {
        if stop.load(Ordering::Relaxed) {
            break;
        }
        let node = item.node;
        let result =
            panic::catch_unwind(AssertUnwindSafe(|| expand(&store, &config, node, item.set)));
        let reply = match result {
            Ok(expansion) => WorkReply::Expanded(expansion),
            Err(payload) => WorkReply::Failed {
                node,
                message: panic_message(payload),
            },
        };
        if reply_tx.send(reply).is_err() {
            break;
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Drive the scheduler until the root resolves (or everything reachable is expanded).
pub fn run(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        ConfigP,
        StoreP,
    ),
) -> Result<(), SolverError> {
    let workers = ctx.part(ConfigP).worker_count();
    ctx.part_mut(StatsP).workers = workers;
    info!("scheduling with {} worker(s)", workers);

    if workers <= 1 {
        run_inline(ctx.borrow())
    } else {
        run_parallel(ctx.borrow(), workers)
    }
}

fn run_inline(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        ConfigP,
        StoreP,
    ),
) -> Result<(), SolverError> {
    let config = WorkerConfig::of(ctx.part(ConfigP));
    let store = ctx.part(StoreP).clone();
    let stop = ctx.part_mut(ScheduleP).stop_flag();

    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(SolverError::Aborted);
        }

        let id = match ctx.part_mut(ScheduleP).queue.pop_front() {
            Some(id) => id,
            None => return Ok(()),
        };
        if store.status(id) != Status::Pending {
            continue;
        }
        store.set_status(id, Status::Expanding);
        let expansion = expand(&store, &config, id, store.node_set(id));
        ctx.part_mut(StatsP).dispatched += 1;
        handle_expansion(ctx.borrow(), expansion);

        if early_exit(ctx.borrow()) {
            return Ok(());
        }
    }
}

fn run_parallel(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        ConfigP,
        StoreP,
    ),
    workers: usize,
) -> Result<(), SolverError> {
    let config = WorkerConfig::of(ctx.part(ConfigP));
    let store = ctx.part(StoreP).clone();
    let stop = ctx.part_mut(ScheduleP).stop_flag();

    let (work_tx, work_rx) = unbounded::<WorkItem>();
    let (reply_tx, reply_rx) = unbounded::<WorkReply>();

    let handles: Vec<_> = (0..workers)
        .map(|index| {
            let store = store.clone();
            let config = config.clone();
            let work_rx = work_rx.clone();
            let reply_tx = reply_tx.clone();
            let stop = stop.clone();
            thread::Builder::new()
                .name(format!("splitsat-worker-{}", index))
                .spawn(move || worker_loop(store, config, work_rx, reply_tx, stop))
                .expect("failed to spawn worker thread")
        })
        .collect();
    drop(work_rx);
    drop(reply_tx);

    let result = master_loop(ctx.borrow(), &work_tx, &reply_rx, &stop);

    // Wind the pool down; the workers drain the closed channel and exit.
    stop.store(true, Ordering::Relaxed);
    drop(work_tx);
    for handle in handles {
        let _ = handle.join();
    }

    result
}

fn master_loop(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        ConfigP,
        StoreP,
    ),
    work_tx: &Sender<WorkItem>,
    reply_rx: &Receiver<WorkReply>,
    stop: &Arc<AtomicBool>,
) -> Result<(), SolverError> {
    let store = ctx.part(StoreP).clone();

    loop {
        if stop.load(Ordering::Relaxed) {
            return Err(SolverError::Aborted);
        }

        // dispatch everything pending
        while let Some(id) = ctx.part_mut(ScheduleP).queue.pop_front() {
            if store.status(id) != Status::Pending {
                continue;
            }
            store.set_status(id, Status::Expanding);
            let item = WorkItem {
                node: id,
                set: store.node_set(id),
            };
            if work_tx.send(item).is_err() {
                return Err(SolverError::Internal(
                    "work channel closed with workers alive".to_string(),
                ));
            }
            ctx.part_mut(ScheduleP).in_flight += 1;
            ctx.part_mut(StatsP).dispatched += 1;
        }

        if ctx.part(ScheduleP).in_flight == 0 {
            return Ok(());
        }

        match reply_rx.recv() {
            Ok(WorkReply::Expanded(expansion)) => {
                ctx.part_mut(ScheduleP).in_flight -= 1;
                handle_expansion(ctx.borrow(), expansion);
            }
            Ok(WorkReply::Failed { node, message }) => {
                ctx.part_mut(ScheduleP).in_flight -= 1;
                requeue_failed(ctx.borrow(), node, message)?;
            }
            Err(_) => {
                return Err(SolverError::Internal(
                    "all workers disconnected".to_string(),
                ));
            }
        }

        if early_exit(ctx.borrow()) {
            return Ok(());
        }
    }
}

/// Whether the master can stop before the queue drains.
///
/// Only early termination stops the loop while work remains: the root resolved and the caller
/// asked to exit upon solving. An unsatisfiable root drains the queue on its own; without the
/// flag a satisfiable solve keeps expanding for exhaustive statistics.
fn early_exit(mut ctx: partial!(Context, SolverStateP, ConfigP)) -> bool {
    ctx.part(ConfigP).exit_upon_solving && ctx.part(SolverStateP).sat_state != SatState::Unknown
}

fn requeue_failed(
    mut ctx: partial!(Context, mut ScheduleP, mut StatsP, StoreP),
    node: NodeId,
    message: String,
) -> Result<(), SolverError> {
    let attempts = {
        let schedule = ctx.part_mut(ScheduleP);
        let attempts = schedule.retries.entry(node).or_insert(0);
        *attempts += 1;
        *attempts
    };

    if attempts > MAX_EXPAND_RETRIES {
        return Err(SolverError::WorkerCrash {
            message,
            retries: MAX_EXPAND_RETRIES,
        });
    }

    debug!(
        "re-queueing node {} after worker failure (attempt {}): {}",
        node, attempts, message
    );
    ctx.part_mut(StatsP).retries += 1;
    ctx.part(StoreP).reset_for_retry(node);
    ctx.part_mut(ScheduleP).queue.push_front(node);
    Ok(())
}

/// Fold a finished expansion into the DAG and propagate resolutions.
fn handle_expansion(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        mut SolverStateP,
        mut StatsP,
        ConfigP,
        StoreP,
    ),
    expansion: Expansion,
) {
    let store = ctx.part(StoreP).clone();
    let node = expansion.node;
    let (pos, pos_child) = edge_of(expansion.pos);
    let (neg, neg_child) = edge_of(expansion.neg);

    store.set_expansion(node, expansion.split_var, pos, neg);

    for child in pos_child.into_iter().chain(neg_child) {
        store.add_parent(child, node);
        if store.status(child) == Status::Pending && store.mark_queued(child) {
            ctx.part_mut(ScheduleP).queue.push_back(child);
        }
    }

    let queue_len = ctx.part(ScheduleP).queue.len();
    let stats = ctx.part_mut(StatsP);
    stats.expansions += 1;
    stats.max_queue = stats.max_queue.max(queue_len);
    let expansions = stats.expansions;

    if expansions % LOG_INTERVAL == 0 {
        let (interned, hits, hydrated) = store.counters();
        info!(
            "exp: {}k queue: {} nodes: {} hits: {} hydrated: {}",
            expansions / 1000,
            queue_len,
            interned,
            hits,
            hydrated,
        );
    }

    propagate_resolutions(ctx.borrow(), node);
}

fn edge_of(reply: BranchReply) -> (Edge, Option<NodeId>) {
    match reply {
        BranchReply::Resolved { value, forced } => (
            Edge {
                target: Target::Resolved(value),
                forced,
                rename: VarMap::identity(),
            },
            None,
        ),
        BranchReply::Child {
            node,
            forced,
            rename,
        } => (
            Edge {
                target: Target::Node(node),
                forced,
                rename,
            },
            Some(node),
        ),
    }
}

/// Walk resolutions up the parent links.
///
/// Whenever a node resolves, every parent that is still expanding is re-examined: a true branch
/// resolves it immediately, two false branches resolve it as false.
fn propagate_resolutions(mut ctx: partial!(Context, mut SolverStateP, StoreP), from: NodeId) {
    let store = ctx.part(StoreP).clone();
    let mut work = vec![from];

    while let Some(id) = work.pop() {
        if store.status(id) != Status::Expanding {
            continue;
        }
        let resolution = match store.implied_resolution(id) {
            Some(resolution) => resolution,
            None => continue,
        };
        store.set_status(id, resolution);
        debug!("node {} resolved {:?}", id, resolution);

        if ctx.part(SolverStateP).root == Some(id) {
            ctx.part_mut(SolverStateP).sat_state = match resolution {
                Status::ResolvedTrue => SatState::Sat,
                _ => SatState::Unsat,
            };
        }

        work.extend(store.parents(id));
    }
}

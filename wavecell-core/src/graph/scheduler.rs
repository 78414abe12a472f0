//! Update Scheduler
//!
//! The scheduler owns the node registry and coordinates update propagation.
//! Writes never run subscribers inline: they mark a node pending here, and
//! a single deferred flush processes everything marked in the same
//! synchronous burst.
//!
//! # Algorithm
//!
//! A flush drains the pending set in breadth-first waves:
//!
//! 1. Snapshot the pending set as the current wave and clear it. Nodes
//!    marked while the wave runs land in the next wave.
//! 2. Phase A: recompute every derived (computed/hybrid) node in the wave
//!    that has not been processed this flush, then notify its subscribers.
//! 3. Phase B: notify subscribers of every unprocessed plain node in the
//!    wave.
//! 4. Enqueue the not-yet-processed dependents of every node processed so
//!    far, growing the next wave.
//! 5. Stop once the pending set stays empty.
//!
//! Each node is processed at most once per flush, so diamond-shaped graphs
//! notify their join node a single time per write. There is no topological
//! sort: a dependent always runs in a later wave than the dependency that
//! scheduled it, but unrelated branches within one wave run in insertion
//! order with no further guarantee.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;
use tracing::{debug, trace};

use super::node::{NodeId, ReactiveNode};

/// The update scheduler manages the dependency graph and coordinates
/// propagation from written nodes out to their transitive dependents.
pub(crate) struct Scheduler {
    /// All live nodes, indexed by ID. Holding the `Arc` here is what keeps
    /// a node alive; disposal removes the entry.
    nodes: RwLock<HashMap<NodeId, Arc<dyn ReactiveNode>>>,

    /// Nodes marked dirty and awaiting the next flush, in mark order.
    pending: Mutex<IndexSet<NodeId>>,

    /// Whether a deferred flush task is already queued. Cleared at the
    /// start of each flush so marks made during the flush can queue the
    /// next one.
    flush_scheduled: AtomicBool,

    /// Held for the duration of one flush. `try_lock` makes re-entrant and
    /// concurrent flush attempts collapse into the one already running.
    flush_lock: Mutex<()>,

    /// Bumped after every completed flush; `settled` waits on it.
    generation: watch::Sender<u64>,

    /// Handed to the deferred flush task; set once at construction.
    weak_self: Weak<Scheduler>,
}

impl Scheduler {
    /// Create a new empty scheduler.
    pub(crate) fn new() -> Arc<Self> {
        let (generation, _) = watch::channel(0);
        Arc::new_cyclic(|weak_self| Self {
            nodes: RwLock::new(HashMap::new()),
            pending: Mutex::new(IndexSet::new()),
            flush_scheduled: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
            generation,
            weak_self: weak_self.clone(),
        })
    }

    /// Add a node to the graph.
    pub(crate) fn add_node(&self, node: Arc<dyn ReactiveNode>) {
        let id = node.id();
        self.nodes.write().insert(id, node);
    }

    /// Remove a node from the graph.
    ///
    /// Also removes all edges involving this node, in both directions, and
    /// drops any pending mark it still had.
    pub(crate) fn remove_node(&self, node_id: NodeId) {
        let Some(node) = self.nodes.write().remove(&node_id) else {
            return;
        };
        debug!(node = node_id.raw(), "disposing node");

        for dep_id in node.dependencies() {
            if let Some(dep) = self.node(dep_id) {
                dep.remove_dependent(node_id);
            }
        }
        for dependent_id in node.dependents() {
            if let Some(dependent) = self.node(dependent_id) {
                dependent.remove_dependency(node_id);
            }
        }

        node.clear_subscribers();
        node.clear_dependents();
        node.clear_dependencies();
        self.pending.lock().shift_remove(&node_id);
    }

    /// Look up a node by ID.
    ///
    /// The `Arc` is cloned out so the registry lock is never held while the
    /// caller works with the node.
    pub(crate) fn node(&self, node_id: NodeId) -> Option<Arc<dyn ReactiveNode>> {
        self.nodes.read().get(&node_id).cloned()
    }

    /// Get the total number of live nodes in the graph.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    /// Mark a node dirty and make sure a flush is queued to process it.
    pub(crate) fn mark_pending(&self, node_id: NodeId) {
        if self.pending.lock().insert(node_id) {
            trace!(node = node_id.raw(), "marked pending");
        }
        self.request_flush();
    }

    /// Queue one deferred flush on the ambient tokio runtime, if any.
    ///
    /// Outside a tokio context this is a no-op; synchronous hosts drive
    /// propagation with [`Scheduler::flush`] instead.
    fn request_flush(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        if self.flush_scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(scheduler) = self.weak_self.upgrade() else {
            return;
        };
        handle.spawn(async move {
            scheduler.flush();
        });
    }

    /// Process every pending node, in waves, until the graph stabilizes.
    ///
    /// Runs the whole propagation synchronously on the calling thread. If a
    /// flush is already in progress the call returns immediately and leaves
    /// the work to the running one.
    pub(crate) fn flush(&self) {
        let Some(guard) = self.flush_lock.try_lock() else {
            return;
        };
        // Marks made while this flush runs must be able to queue the next
        // deferred flush, so the flag resets before draining starts.
        self.flush_scheduled.store(false, Ordering::Release);

        let mut processed: IndexSet<NodeId> = IndexSet::new();
        let mut wave_index = 0usize;

        loop {
            let wave: Vec<NodeId> = {
                let mut pending = self.pending.lock();
                if pending.is_empty() {
                    break;
                }
                pending.drain(..).collect()
            };
            wave_index += 1;
            debug!(wave = wave_index, nodes = wave.len(), "processing wave");

            // Phase A: derived nodes recompute, then notify.
            for &id in &wave {
                if processed.contains(&id) {
                    continue;
                }
                let Some(node) = self.node(id) else {
                    continue;
                };
                if !node.kind().recomputes() {
                    continue;
                }
                node.recompute();
                processed.insert(id);
                node.notify_subscribers();
            }

            // Phase B: plain nodes already hold their new value and only
            // need to notify.
            for &id in &wave {
                if processed.contains(&id) {
                    continue;
                }
                let Some(node) = self.node(id) else {
                    continue;
                };
                if node.kind().recomputes() {
                    continue;
                }
                processed.insert(id);
                node.notify_subscribers();
            }

            // Every processed node hands its not-yet-processed dependents
            // to the next wave.
            let mut next_wave: Vec<NodeId> = Vec::new();
            for &id in processed.iter() {
                let Some(node) = self.node(id) else {
                    continue;
                };
                for dependent in node.dependents() {
                    if !processed.contains(&dependent) {
                        next_wave.push(dependent);
                    }
                }
            }
            if !next_wave.is_empty() {
                let mut pending = self.pending.lock();
                for dependent in next_wave {
                    pending.insert(dependent);
                }
            }
        }

        drop(guard);
        self.generation.send_modify(|generation| *generation += 1);
    }

    /// Whether nothing is pending, queued, or mid-flush.
    fn is_settled(&self) -> bool {
        !self.flush_lock.is_locked()
            && !self.flush_scheduled.load(Ordering::Acquire)
            && self.pending.lock().is_empty()
    }

    /// Wait until all scheduled propagation has completed.
    pub(crate) async fn settled(&self) {
        let mut generations = self.generation.subscribe();
        loop {
            if self.is_settled() {
                return;
            }
            // Pending work with no queued flush can only happen when the
            // marks were made outside a tokio context; queue one here so
            // the wait always makes progress.
            self.request_flush();
            if generations.changed().await.is_err() {
                return;
            }
        }
    }

    /// Number of nodes currently marked pending.
    #[cfg(test)]
    pub(crate) fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

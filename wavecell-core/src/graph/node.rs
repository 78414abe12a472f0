//! Graph Nodes
//!
//! This module defines the graph-facing view of a node. The concrete node
//! variants live in the `state` module and are generic over their value
//! type; the scheduler and runtime cannot be, so they traverse the graph
//! through [`NodeId`]s and operate on nodes through the type-erased
//! [`ReactiveNode`] trait.
//!
//! Edges are stored on the nodes themselves, in both directions:
//! `dependencies` is "what I read during my last computation" and
//! `dependents` is "who read me". The runtime keeps the two sides
//! symmetric whenever a computation finishes and when a node is disposed.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;
use parking_lot::Mutex;

use crate::state::SubscriberId;

/// Unique identifier for a node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u64);

impl NodeId {
    /// Generate a new unique node ID.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The kind of node in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// A mutable leaf. Written by callers, never recomputed.
    Plain,

    /// Derived from a compute function. Read-only to callers; its value
    /// is refreshed by the scheduler when a dependency changes.
    Computed,

    /// Derived from a compute function, with caller-supplied partial
    /// overrides layered on top of the computed base.
    Hybrid,
}

impl NodeKind {
    /// Whether a flush wave recomputes this node before notifying.
    pub(crate) fn recomputes(&self) -> bool {
        !matches!(self, NodeKind::Plain)
    }
}

/// One direction of a node's edges, ordered by first insertion.
pub(crate) struct EdgeSet {
    edges: Mutex<IndexSet<NodeId>>,
}

impl EdgeSet {
    pub(crate) fn new() -> Self {
        Self {
            edges: Mutex::new(IndexSet::new()),
        }
    }

    /// Insert an edge. Returns `false` if it was already present.
    pub(crate) fn add(&self, node: NodeId) -> bool {
        self.edges.lock().insert(node)
    }

    /// Remove an edge. Returns `false` if it was not present.
    pub(crate) fn remove(&self, node: NodeId) -> bool {
        self.edges.lock().shift_remove(&node)
    }

    pub(crate) fn len(&self) -> usize {
        self.edges.lock().len()
    }

    /// Copy the current edges out, in insertion order.
    ///
    /// Callers iterate over the copy, so no edge lock is held while other
    /// nodes or user code run.
    pub(crate) fn snapshot(&self) -> Vec<NodeId> {
        self.edges.lock().iter().copied().collect()
    }

    /// Remove and return all current edges.
    pub(crate) fn take(&self) -> IndexSet<NodeId> {
        std::mem::take(&mut *self.edges.lock())
    }

    /// Replace the edge set wholesale.
    pub(crate) fn replace(&self, edges: IndexSet<NodeId>) {
        *self.edges.lock() = edges;
    }

    pub(crate) fn clear(&self) {
        self.edges.lock().clear();
    }
}

/// What the scheduler and runtime need from a node, independent of its
/// value type.
///
/// Every method takes `&self`: node internals sit behind their own locks,
/// and none of these calls may be made while holding another node's lock.
pub(crate) trait ReactiveNode: Send + Sync {
    /// Get the node's ID.
    fn id(&self) -> NodeId;

    /// Get the node's kind.
    fn kind(&self) -> NodeKind;

    /// Re-run the compute function and apply the variant's update policy.
    /// Plain nodes have nothing to recompute.
    fn recompute(&self);

    /// Invoke every current subscriber with the node's current value.
    fn notify_subscribers(&self);

    /// Drop one subscriber registration. Returns `true` if it was present.
    fn remove_subscriber(&self, subscriber: SubscriberId) -> bool;

    fn subscriber_count(&self) -> usize;

    fn clear_subscribers(&self);

    /// Nodes that read this one during their last computation.
    fn dependents(&self) -> Vec<NodeId>;

    fn add_dependent(&self, node: NodeId);

    fn remove_dependent(&self, node: NodeId);

    fn dependent_count(&self) -> usize;

    fn clear_dependents(&self);

    /// Nodes this one read during its last computation. Empty for plain
    /// nodes, which never compute.
    fn dependencies(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn remove_dependency(&self, _node: NodeId) {}

    fn dependency_count(&self) -> usize {
        0
    }

    fn clear_dependencies(&self) {}
}

//! Read Tracking
//!
//! Dependency edges are discovered, not declared: while a derived cell's
//! compute function runs, every cell read records itself here, and the
//! finished scope hands the collected reads back to the caller to be
//! turned into graph edges.
//!
//! # Implementation
//!
//! A thread-local stack holds one frame per computation in progress. The
//! innermost frame collects reads, so a computed cell that reads another
//! computed cell attributes each read to the right owner. Alongside each
//! read the cell's value version at first read is captured; a dependency
//! snapshot is therefore a sequence of `(node, version)` pairs, and two
//! snapshots are equal only if the same nodes were read in the same order
//! with the same versions.

use std::cell::RefCell;

use indexmap::IndexMap;
use smallvec::SmallVec;

use crate::graph::NodeId;

thread_local! {
    /// One frame per computation currently running on this thread, with
    /// the innermost computation last.
    static TRACKING_STACK: RefCell<SmallVec<[TrackingFrame; 4]>> =
        RefCell::new(SmallVec::new());
}

/// Reads collected on behalf of one running computation.
struct TrackingFrame {
    /// The cell whose compute function is running.
    node: NodeId,

    /// Cells read so far, in first-read order, with the value version
    /// observed at first read.
    reads: IndexMap<NodeId, u64>,
}

/// Guard marking a computation as the active read collector.
///
/// Dropping the guard pops the frame even if the compute function panics;
/// [`TrackingScope::finish`] pops it and returns the collected reads.
pub(crate) struct TrackingScope {
    node: NodeId,
}

impl TrackingScope {
    /// Begin collecting reads on behalf of `node`.
    ///
    /// Nests: reads recorded while an inner scope is active belong to the
    /// inner scope only.
    pub(crate) fn enter(node: NodeId) -> Self {
        TRACKING_STACK.with(|stack| {
            stack.borrow_mut().push(TrackingFrame {
                node,
                reads: IndexMap::new(),
            });
        });
        Self { node }
    }

    /// Record that the innermost running computation read `node`.
    ///
    /// No-op when no computation is running. A computation reading its own
    /// cell does not record itself, so a node never becomes its own
    /// dependent.
    pub(crate) fn record_read(node: NodeId, version: u64) {
        TRACKING_STACK.with(|stack| {
            if let Some(frame) = stack.borrow_mut().last_mut() {
                if frame.node != node {
                    frame.reads.entry(node).or_insert(version);
                }
            }
        });
    }

    /// End the computation and return its reads in first-read order.
    pub(crate) fn finish(self) -> Vec<(NodeId, u64)> {
        let node = self.node;
        std::mem::forget(self);
        Self::pop(node)
    }

    fn pop(node: NodeId) -> Vec<(NodeId, u64)> {
        TRACKING_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            match popped {
                Some(frame) => {
                    debug_assert_eq!(
                        frame.node, node,
                        "tracking scopes must unwind innermost-first"
                    );
                    frame.reads.into_iter().collect()
                }
                None => Vec::new(),
            }
        })
    }
}

impl Drop for TrackingScope {
    fn drop(&mut self) {
        let _ = Self::pop(self.node);
    }
}

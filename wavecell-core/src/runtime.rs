//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects plain, computed,
//! and hybrid cells. It owns the node registry and the update scheduler,
//! and decides which graph newly created cells join.
//!
//! # How It Works
//!
//! 1. When a cell is created, it registers with the current runtime.
//!
//! 2. When a derived cell runs its compute function, reads are captured
//!    and turned into graph edges at the end of the computation.
//!
//! 3. When a cell's value changes, the runtime marks it pending; the
//!    scheduler coalesces all marks from the same synchronous burst into
//!    one deferred flush and propagates from there.
//!
//! # Choosing a Runtime
//!
//! Most programs use the process-wide runtime implicitly: every factory
//! call resolves [`Runtime::current`], which falls back to
//! [`Runtime::global`] when no runtime has been entered. Tests and
//! embedders that want isolated graphs create their own with
//! [`Runtime::new`] and make it current for a block with
//! [`Runtime::scope`], or for as long as a guard lives with
//! [`Runtime::enter`].

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, OnceLock, Weak};

use crate::graph::{NodeId, ReactiveNode, Scheduler};
use crate::state::SubscriberId;

thread_local! {
    /// Innermost entry wins; the stack supports nested scopes.
    static RUNTIME_STACK: RefCell<Vec<Arc<Runtime>>> = const { RefCell::new(Vec::new()) };
}

static GLOBAL_RUNTIME: OnceLock<Arc<Runtime>> = OnceLock::new();

/// An isolated reactive graph: a node registry plus its update scheduler.
///
/// Cell handles keep their runtime alive, so a graph lives for as long as
/// any handle into it does.
pub struct Runtime {
    scheduler: Arc<Scheduler>,
    weak_self: Weak<Runtime>,
}

impl Runtime {
    /// Create a fresh runtime with an empty graph.
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            scheduler: Scheduler::new(),
            weak_self: weak_self.clone(),
        })
    }

    /// The process-wide default runtime, created on first use.
    pub fn global() -> Arc<Self> {
        GLOBAL_RUNTIME.get_or_init(Self::new).clone()
    }

    /// The runtime new cells join: the innermost entered runtime on this
    /// thread, or the global one when none has been entered.
    pub fn current() -> Arc<Self> {
        RUNTIME_STACK
            .with(|stack| stack.borrow().last().cloned())
            .unwrap_or_else(Self::global)
    }

    /// Make this runtime current on this thread until the guard drops.
    pub fn enter(&self) -> RuntimeGuard {
        let runtime = self
            .weak_self
            .upgrade()
            .expect("runtime alive while borrowed");
        RUNTIME_STACK.with(|stack| stack.borrow_mut().push(runtime.clone()));
        RuntimeGuard { runtime }
    }

    /// Run `f` with this runtime current on this thread.
    pub fn scope<R>(&self, f: impl FnOnce() -> R) -> R {
        let _guard = self.enter();
        f()
    }

    /// Synchronously process every pending update until the graph is
    /// stable.
    ///
    /// Hosts without a tokio runtime call this to drive propagation by
    /// hand; inside a tokio context it is rarely needed because writes
    /// queue a deferred flush on their own.
    pub fn flush_now(&self) {
        self.scheduler.flush();
    }

    /// Wait until every pending update has been flushed.
    ///
    /// Resolves immediately when nothing is pending. Useful in async tests
    /// to sequence assertions after the deferred flush has run.
    pub async fn settled(&self) {
        self.scheduler.settled().await;
    }

    /// Number of live nodes in this runtime's graph.
    pub fn node_count(&self) -> usize {
        self.scheduler.node_count()
    }

    pub(crate) fn register(&self, node: Arc<dyn ReactiveNode>) {
        self.scheduler.add_node(node);
    }

    pub(crate) fn node(&self, node_id: NodeId) -> Option<Arc<dyn ReactiveNode>> {
        self.scheduler.node(node_id)
    }

    /// Mark a node dirty for the next flush.
    pub(crate) fn schedule(&self, node_id: NodeId) {
        self.scheduler.mark_pending(node_id);
    }

    /// Drop the reverse edges a reader installed on its former
    /// dependencies.
    pub(crate) fn detach_dependencies(
        &self,
        reader: NodeId,
        dependencies: impl IntoIterator<Item = NodeId>,
    ) {
        for dependency in dependencies {
            if let Some(node) = self.node(dependency) {
                node.remove_dependent(reader);
            }
        }
    }

    /// Install the reverse edges for a reader's freshly captured
    /// dependencies.
    pub(crate) fn attach_dependencies(&self, reader: NodeId, dependencies: &[NodeId]) {
        for &dependency in dependencies {
            if let Some(node) = self.node(dependency) {
                node.add_dependent(reader);
            }
        }
    }

    /// Remove one subscriber from a node, then tear the node down if
    /// nothing references it anymore.
    pub(crate) fn release_subscriber(&self, node_id: NodeId, subscriber: SubscriberId) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        node.remove_subscriber(subscriber);
        self.maybe_dispose(node_id);
    }

    /// Tear a node down once it has no subscribers and no edges in either
    /// direction. Nodes still referenced by the graph survive subscriber
    /// loss.
    pub(crate) fn maybe_dispose(&self, node_id: NodeId) {
        let Some(node) = self.node(node_id) else {
            return;
        };
        if node.subscriber_count() == 0
            && node.dependent_count() == 0
            && node.dependency_count() == 0
        {
            self.scheduler.remove_node(node_id);
        }
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("nodes", &self.node_count())
            .finish()
    }
}

/// Guard that keeps a runtime current on this thread.
///
/// Dropping the guard restores whatever was current before, even if the
/// enclosed code panics.
pub struct RuntimeGuard {
    runtime: Arc<Runtime>,
}

impl Drop for RuntimeGuard {
    fn drop(&mut self) {
        RUNTIME_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            if let Some(runtime) = popped {
                debug_assert!(
                    Arc::ptr_eq(&runtime, &self.runtime),
                    "runtime scopes must unwind innermost-first"
                );
            }
        });
    }
}

impl fmt::Debug for RuntimeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeGuard").finish_non_exhaustive()
    }
}

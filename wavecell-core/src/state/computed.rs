//! Computed State
//!
//! A computed cell derives its value by running a compute function over
//! other cells. Callers can read and subscribe but never write; the
//! scheduler refreshes the value when a dependency changes.
//!
//! # How It Works
//!
//! 1. Every recomputation starts by tearing down the edges from the
//!    previous run, then runs the compute function inside a tracking
//!    scope. The cells read during the run become the new dependencies.
//!
//! 2. The captured reads form a dependency snapshot: the sequence of
//!    `(node, version)` pairs in first-read order. If the snapshot is
//!    identical to the previous run's, the cell keeps its stored value
//!    without looking at the freshly computed result; identical inputs
//!    are assumed to produce identical output. This makes reads of
//!    anything *outside* the graph invisible until a tracked dependency
//!    actually changes.
//!
//! 3. When the snapshot differs, the new value is adopted, and if it
//!    changed the cell is marked pending so downstream cells and
//!    subscribers hear about it.
//!
//! The first computation runs synchronously at creation, so `get` is
//! valid as soon as the handle exists.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::error::Error;
use crate::graph::{EdgeSet, NodeId, NodeKind, ReactiveNode};
use crate::runtime::Runtime;
use crate::state::observer::TrackingScope;
use crate::state::subscription::{Callback, SubscriberId, SubscriberSet, Subscription};
use crate::state::{run_tracked, ComputeFn};
use crate::value::ValueCell;

/// A read-only reactive cell derived from other cells.
///
/// Handles are cheap to clone and share the underlying cell.
///
/// # Example
///
/// ```rust,ignore
/// let price = create_state(100);
/// let with_tax = create_computed_state({
///     let price = price.clone();
///     move || price.get() * 12 / 10
/// });
/// assert_eq!(with_tax.get(), 120);
/// ```
pub struct ComputedState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
    runtime: Arc<Runtime>,
}

struct ComputedInner<T> {
    id: NodeId,
    runtime: Weak<Runtime>,
    compute: ComputeFn<T>,
    value: ValueCell<T>,

    /// Dependency snapshot of the previous computation; `None` until the
    /// first run so that run always adopts its result.
    snapshot: Mutex<Option<Vec<(NodeId, u64)>>>,

    subscribers: SubscriberSet<T>,
    dependencies: EdgeSet,
    dependents: EdgeSet,
}

impl<T> ComputedState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new computed cell in the current runtime and run its
    /// first computation.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let runtime = Runtime::current();
        let inner = Arc::new(ComputedInner {
            id: NodeId::new(),
            runtime: Arc::downgrade(&runtime),
            compute: Box::new(compute),
            value: ValueCell::empty(),
            snapshot: Mutex::new(None),
            subscribers: SubscriberSet::new(),
            dependencies: EdgeSet::new(),
            dependents: EdgeSet::new(),
        });
        runtime.register(inner.clone());
        inner.recompute();
        Self { inner, runtime }
    }

    /// Get the cell's node ID.
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// Inside a derived computation this also records the cell as a
    /// dependency of that computation.
    pub fn get(&self) -> T {
        let (value, version) = self.inner.value.get_versioned();
        TrackingScope::record_read(self.inner.id, version);
        value
    }

    /// Get the current value without recording a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.get()
    }

    /// Computed cells are read-only; every call fails with
    /// [`Error::ReadOnly`].
    pub fn set(&self, _value: T) -> Result<(), Error> {
        Err(Error::ReadOnly {
            node: self.inner.id,
        })
    }

    /// Register a callback for changes to this cell.
    ///
    /// The callback runs once immediately with the current value, then
    /// once per flush wave that reaches this cell. The subscription ends
    /// when the returned handle is dropped.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let callback: Callback<T> = Arc::new(callback);
        let subscriber = self.inner.subscribers.insert(callback.clone());
        callback(&self.inner.value.get());
        Subscription::new(Arc::downgrade(&self.runtime), self.inner.id, subscriber)
    }

    /// Get the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> ReactiveNode for ComputedInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Computed
    }

    fn recompute(&self) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        let (value, reads) = run_tracked(&runtime, self.id, &self.dependencies, &self.compute);

        let mut snapshot = self.snapshot.lock();
        if snapshot.as_ref() == Some(&reads) {
            // Same dependencies at the same versions as last run: keep
            // the stored value.
            trace!(node = self.id.raw(), "snapshot unchanged, keeping value");
            return;
        }
        *snapshot = Some(reads);
        drop(snapshot);
        trace!(node = self.id.raw(), "snapshot changed, adopting result");

        if self.value.store_if_changed(value) {
            runtime.schedule(self.id);
        }
    }

    fn notify_subscribers(&self) {
        if self.subscribers.is_empty() {
            return;
        }
        self.subscribers.notify_all(&self.value.get());
    }

    fn remove_subscriber(&self, subscriber: SubscriberId) -> bool {
        self.subscribers.remove(subscriber)
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    fn clear_subscribers(&self) {
        self.subscribers.clear();
    }

    fn dependents(&self) -> Vec<NodeId> {
        self.dependents.snapshot()
    }

    fn add_dependent(&self, node: NodeId) {
        self.dependents.add(node);
    }

    fn remove_dependent(&self, node: NodeId) {
        self.dependents.remove(node);
    }

    fn dependent_count(&self) -> usize {
        self.dependents.len()
    }

    fn clear_dependents(&self) {
        self.dependents.clear();
    }

    fn dependencies(&self) -> Vec<NodeId> {
        self.dependencies.snapshot()
    }

    fn remove_dependency(&self, node: NodeId) {
        self.dependencies.remove(node);
    }

    fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    fn clear_dependencies(&self) {
        self.dependencies.clear();
    }
}

impl<T> Clone for ComputedState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<T> fmt::Debug for ComputedState<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComputedState")
            .field("id", &self.inner.id.raw())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

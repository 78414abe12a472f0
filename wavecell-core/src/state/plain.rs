//! Plain State
//!
//! A plain cell is the fundamental mutable primitive. It holds a value,
//! remembers who read it, and notifies subscribers after writes.
//!
//! # How It Works
//!
//! 1. When a plain cell is read inside a derived computation, the read is
//!    recorded and becomes a dependency edge when the computation ends.
//!
//! 2. `set` stores the new value immediately but defers all notification:
//!    the cell is marked pending and the scheduler delivers callbacks on
//!    the next flush. Writing a value equal to the current one is a no-op.
//!
//! 3. Reads always return an isolated clone, so callers can never mutate
//!    engine state through a returned value.
//!
//! # Thread Safety
//!
//! The value and the subscriber list sit behind their own locks, and no
//! lock is held while user callbacks run. The propagation model itself is
//! single-threaded and cooperative; the locks make cross-thread handle
//! sharing safe, not concurrent flushes.

use std::fmt;
use std::sync::Arc;

use crate::graph::{EdgeSet, NodeId, NodeKind, ReactiveNode};
use crate::runtime::Runtime;
use crate::state::observer::TrackingScope;
use crate::state::subscription::{Callback, SubscriberId, SubscriberSet, Subscription};
use crate::value::ValueCell;

/// A mutable reactive cell holding a value of type `T`.
///
/// Handles are cheap to clone and share the underlying cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = create_state(0);
///
/// // Read the value
/// let value = count.get();
///
/// // Store a new value; subscribers hear about it on the next flush
/// count.set(5);
/// ```
pub struct PlainState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<PlainInner<T>>,
    runtime: Arc<Runtime>,
}

struct PlainInner<T> {
    id: NodeId,
    value: ValueCell<T>,
    subscribers: SubscriberSet<T>,
    dependents: EdgeSet,
}

impl<T> PlainState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Create a new plain cell in the current runtime.
    pub fn new(initial: T) -> Self {
        let runtime = Runtime::current();
        let inner = Arc::new(PlainInner {
            id: NodeId::new(),
            value: ValueCell::new(initial),
            subscribers: SubscriberSet::new(),
            dependents: EdgeSet::new(),
        });
        runtime.register(inner.clone());
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

    /// Store a new value and mark the cell for the next flush.
    ///
    /// A value equal to the current one leaves the cell untouched and
    /// triggers no notifications.
    pub fn set(&self, value: T) {
        if self.inner.value.store_if_changed(value) {
            self.runtime.schedule(self.inner.id);
        }
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let current = self.inner.value.get();
        self.set(f(&current));
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

impl<T> ReactiveNode for PlainInner<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Plain
    }

    fn recompute(&self) {}

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
}

impl<T> Clone for PlainState<T>
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

impl<T> fmt::Debug for PlainState<T>
where
    T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlainState")
            .field("id", &self.inner.id.raw())
            .field("value", &self.get_untracked())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;

    #[test]
    fn get_and_set() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(0);
            assert_eq!(state.get(), 0);

            state.set(42);
            assert_eq!(state.get(), 42);
        });
    }

    #[test]
    fn update_uses_the_current_value() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(10);
            state.update(|v| v + 5);
            assert_eq!(state.get(), 15);
        });
    }

    #[test]
    fn subscribe_invokes_immediately() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(7);
            let seen = Arc::new(AtomicI32::new(0));
            let seen_clone = seen.clone();

            let _sub = state.subscribe(move |value| {
                seen_clone.store(*value, Ordering::SeqCst);
            });

            assert_eq!(seen.load(Ordering::SeqCst), 7);
        });
    }

    #[test]
    fn notifications_arrive_on_flush_not_on_set() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(0);
            let calls = Arc::new(AtomicI32::new(0));
            let calls_clone = calls.clone();

            let _sub = state.subscribe(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            state.set(1);
            assert_eq!(calls.load(Ordering::SeqCst), 1);

            runtime.flush_now();
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn writing_an_equal_value_is_a_no_op() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(String::from("same"));
            let calls = Arc::new(AtomicI32::new(0));
            let calls_clone = calls.clone();

            let _sub = state.subscribe(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });

            state.set(String::from("same"));
            runtime.flush_now();
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        });
    }

    #[test]
    fn repeated_writes_coalesce_into_one_notification() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(0);
            let calls = Arc::new(AtomicI32::new(0));
            let calls_clone = calls.clone();

            let _sub = state.subscribe(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });

            state.set(1);
            state.set(2);
            state.set(3);
            runtime.flush_now();

            assert_eq!(calls.load(Ordering::SeqCst), 2);
            assert_eq!(state.get(), 3);
        });
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(0);
            let calls = Arc::new(AtomicI32::new(0));
            let calls_clone = calls.clone();

            let sub = state.subscribe(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });

            state.set(1);
            runtime.flush_now();
            assert_eq!(calls.load(Ordering::SeqCst), 2);

            sub.unsubscribe();
            state.set(2);
            runtime.flush_now();
            assert_eq!(calls.load(Ordering::SeqCst), 2);
        });
    }

    #[test]
    fn clone_shares_state() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let first = PlainState::new(0);
            let second = first.clone();

            first.set(42);
            assert_eq!(second.get(), 42);

            second.set(100);
            assert_eq!(first.get(), 100);
        });
    }

    #[test]
    fn subscriber_count_tracks_registrations() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let state = PlainState::new(0);
            assert_eq!(state.subscriber_count(), 0);

            let sub_a = state.subscribe(|_| {});
            let sub_b = state.subscribe(|_| {});
            assert_eq!(state.subscriber_count(), 2);

            sub_a.unsubscribe();
            assert_eq!(state.subscriber_count(), 1);
            drop(sub_b);
            assert_eq!(state.subscriber_count(), 0);
        });
    }
}

//! Subscriber bookkeeping.
//!
//! Each registered callback gets a [`SubscriberId`], and the caller gets a
//! [`Subscription`] handle back. The handle is the only way to unregister:
//! dropping it (or calling [`Subscription::unsubscribe`]) removes the
//! callback and lets the runtime tear the cell down if nothing else
//! references it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::graph::NodeId;
use crate::runtime::Runtime;

/// A subscriber callback as stored on a cell.
pub(crate) type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Unique identifier for a registered subscriber callback.
///
/// Used to remove exactly the right callback on unsubscribe, even when the
/// same closure is registered more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// An active subscription to one cell.
///
/// Returned by every `subscribe` call. The callback stays registered for
/// as long as this handle lives.
#[must_use = "dropping a Subscription unsubscribes its callback immediately"]
pub struct Subscription {
    runtime: Weak<Runtime>,
    node: NodeId,
    subscriber: SubscriberId,
}

impl Subscription {
    pub(crate) fn new(runtime: Weak<Runtime>, node: NodeId, subscriber: SubscriberId) -> Self {
        Self {
            runtime,
            node,
            subscriber,
        }
    }

    /// Remove the callback now. Equivalent to dropping the subscription.
    pub fn unsubscribe(self) {}

    /// Keep the callback registered for the rest of the cell's life and
    /// discard the handle.
    pub fn forget(self) {
        std::mem::forget(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.release_subscriber(self.node, self.subscriber);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("node", &self.node.raw())
            .field("subscriber", &self.subscriber)
            .finish()
    }
}

/// The ordered callback registry of one cell.
///
/// Callbacks are invoked in registration order. The list is snapshotted
/// before invoking, so no lock is held while user code runs and a callback
/// may subscribe or unsubscribe without deadlocking.
pub(crate) struct SubscriberSet<T> {
    callbacks: Mutex<IndexMap<SubscriberId, Callback<T>>>,
}

impl<T> SubscriberSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: Mutex::new(IndexMap::new()),
        }
    }

    /// Register a callback and return its ID.
    pub(crate) fn insert(&self, callback: Callback<T>) -> SubscriberId {
        let subscriber = SubscriberId::new();
        self.callbacks.lock().insert(subscriber, callback);
        subscriber
    }

    /// Remove a callback. Returns `false` if it was not registered.
    pub(crate) fn remove(&self, subscriber: SubscriberId) -> bool {
        self.callbacks.lock().shift_remove(&subscriber).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.callbacks.lock().is_empty()
    }

    pub(crate) fn clear(&self) {
        self.callbacks.lock().clear();
    }

    /// Invoke every registered callback with `value`, in registration
    /// order.
    pub(crate) fn notify_all(&self, value: &T) {
        let callbacks: Vec<Callback<T>> = self.callbacks.lock().values().cloned().collect();
        for callback in callbacks {
            callback(value);
        }
    }
}

//! Hybrid State
//!
//! A hybrid cell derives a base value from a compute function like a
//! computed cell, then layers a caller-supplied override patch on top. The
//! override always wins for the fields it specifies; everything else
//! follows the computed base.
//!
//! # How It Works
//!
//! 1. `set` takes a partial patch, merges it into the accumulated
//!    override (later patches win field-by-field), and applies the result
//!    to the current value in place. The caller sees the override through
//!    `get` immediately, before any flush runs.
//!
//! 2. Recomputation rebuilds dependency edges exactly like a computed
//!    cell, but adopts `base value with the accumulated override applied`
//!    unconditionally; there is no dependency-snapshot shortcut. Every
//!    recompute also re-marks the cell pending, so subscribers are
//!    renotified even when the freshly computed base is unchanged.
//!
//! The first computation runs synchronously at creation; the `initial`
//! argument fills the value slot until that run replaces it.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::graph::{EdgeSet, NodeId, NodeKind, ReactiveNode};
use crate::patch::Patchable;
use crate::runtime::Runtime;
use crate::state::observer::TrackingScope;
use crate::state::subscription::{Callback, SubscriberId, SubscriberSet, Subscription};
use crate::state::{run_tracked, ComputeFn};
use crate::value::ValueCell;

/// A reactive cell blending a computed base with manual overrides.
///
/// Handles are cheap to clone and share the underlying cell.
///
/// # Example
///
/// ```rust,ignore
/// let layout = create_hybrid_state(
///     {
///         let width = width.clone();
///         move || Layout::fit(width.get())
///     },
///     Layout::default(),
/// );
///
/// // Pin one field; recomputes keep it pinned.
/// layout.set(LayoutPatch {
///     sidebar: Some(320),
///     ..LayoutPatch::default()
/// });
/// ```
pub struct HybridState<T>
where
    T: Patchable + PartialEq + Send + Sync + 'static,
{
    inner: Arc<HybridInner<T>>,
    runtime: Arc<Runtime>,
}

struct HybridInner<T>
where
    T: Patchable,
{
    id: NodeId,
    runtime: Weak<Runtime>,
    compute: ComputeFn<T>,
    value: ValueCell<T>,

    /// Accumulated override; later patches win over earlier ones
    /// field-by-field.
    override_patch: Mutex<Option<T::Patch>>,

    subscribers: SubscriberSet<T>,
    dependencies: EdgeSet,
    dependents: EdgeSet,
}

impl<T> HybridState<T>
where
    T: Patchable + PartialEq + Send + Sync + 'static,
{
    /// Create a new hybrid cell in the current runtime and run its first
    /// computation.
    pub fn new<F>(compute: F, initial: T) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let runtime = Runtime::current();
        let inner = Arc::new(HybridInner {
            id: NodeId::new(),
            runtime: Arc::downgrade(&runtime),
            compute: Box::new(compute),
            value: ValueCell::new(initial),
            override_patch: Mutex::new(None),
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

    /// Merge a patch into the accumulated override and apply it to the
    /// current value.
    ///
    /// The result is readable through `get` as soon as this returns; the
    /// flush that follows only delivers notifications.
    pub fn set(&self, patch: T::Patch) {
        let earlier = self.inner.override_patch.lock().take();
        let merged = match earlier {
            Some(earlier) => T::merge_patch(earlier, patch),
            None => patch,
        };
        *self.inner.override_patch.lock() = Some(merged.clone());

        self.inner.value.apply_if_changed(|mut value| {
            value.apply_patch(&merged);
            value
        });
        self.runtime.schedule(self.inner.id);
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

impl<T> ReactiveNode for HybridInner<T>
where
    T: Patchable + PartialEq + Send + Sync + 'static,
{
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Hybrid
    }

    fn recompute(&self) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        let (base, _reads) = run_tracked(&runtime, self.id, &self.dependencies, &self.compute);

        let mut value = base;
        let patch = self.override_patch.lock().clone();
        if let Some(patch) = patch {
            value.apply_patch(&patch);
        }
        self.value.store_if_changed(value);

        // A recompute always renotifies, even when the merged result is
        // unchanged.
        runtime.schedule(self.id);
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

impl<T> Clone for HybridState<T>
where
    T: Patchable + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

impl<T> fmt::Debug for HybridState<T>
where
    T: Patchable + PartialEq + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridState")
            .field("id", &self.inner.id.raw())
            .field("value", &self.get_untracked())
            .field("has_override", &self.inner.override_patch.lock().is_some())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicI32, Ordering};

    use super::*;
    use crate::state::plain::PlainState;

    #[derive(Debug, Clone, PartialEq)]
    struct Viewport {
        x: i32,
        y: i32,
    }

    #[derive(Debug, Clone, Default)]
    struct ViewportPatch {
        x: Option<i32>,
        y: Option<i32>,
    }

    impl Patchable for Viewport {
        type Patch = ViewportPatch;

        fn merge_patch(earlier: ViewportPatch, later: ViewportPatch) -> ViewportPatch {
            ViewportPatch {
                x: later.x.or(earlier.x),
                y: later.y.or(earlier.y),
            }
        }

        fn apply_patch(&mut self, patch: &ViewportPatch) {
            if let Some(x) = patch.x {
                self.x = x;
            }
            if let Some(y) = patch.y {
                self.y = y;
            }
        }
    }

    #[test]
    fn override_is_visible_synchronously() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let cell = HybridState::new(|| Viewport { x: 1, y: 2 }, Viewport { x: 1, y: 2 });

            cell.set(ViewportPatch {
                y: Some(5),
                ..ViewportPatch::default()
            });

            // No flush has run yet.
            assert_eq!(cell.get(), Viewport { x: 1, y: 5 });
        });
    }

    #[test]
    fn override_survives_recompute() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let width = PlainState::new(100);
            let cell = HybridState::new(
                {
                    let width = width.clone();
                    move || Viewport { x: width.get(), y: 0 }
                },
                Viewport { x: 0, y: 0 },
            );
            assert_eq!(cell.get(), Viewport { x: 100, y: 0 });

            cell.set(ViewportPatch {
                y: Some(7),
                ..ViewportPatch::default()
            });

            width.set(200);
            runtime.flush_now();
            assert_eq!(cell.get(), Viewport { x: 200, y: 7 });
        });
    }

    #[test]
    fn later_patches_win_field_by_field() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let cell = HybridState::new(|| Viewport { x: 0, y: 0 }, Viewport { x: 0, y: 0 });

            cell.set(ViewportPatch {
                x: Some(10),
                ..ViewportPatch::default()
            });
            cell.set(ViewportPatch {
                y: Some(20),
                ..ViewportPatch::default()
            });
            cell.set(ViewportPatch {
                x: Some(30),
                ..ViewportPatch::default()
            });

            assert_eq!(cell.get(), Viewport { x: 30, y: 20 });
        });
    }

    #[test]
    fn recompute_renotifies_even_when_the_value_is_unchanged() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let tick = PlainState::new(0);
            let cell = HybridState::new(
                {
                    let tick = tick.clone();
                    move || {
                        let _ = tick.get();
                        Viewport { x: 1, y: 2 }
                    }
                },
                Viewport { x: 1, y: 2 },
            );

            let calls = Arc::new(AtomicI32::new(0));
            let calls_clone = calls.clone();
            let _sub = cell.subscribe(move |_| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
            });
            runtime.flush_now();
            let after_creation = calls.load(Ordering::SeqCst);

            cell.set(ViewportPatch {
                y: Some(5),
                ..ViewportPatch::default()
            });
            runtime.flush_now();
            assert_eq!(calls.load(Ordering::SeqCst), after_creation + 1);

            // The recomputed base and the merged result are both identical
            // to what is already stored, yet subscribers still hear about
            // the recompute.
            tick.set(1);
            runtime.flush_now();
            assert_eq!(calls.load(Ordering::SeqCst), after_creation + 2);
        });
    }

    #[test]
    fn without_an_override_the_cell_follows_its_base() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let width = PlainState::new(10);
            let cell = HybridState::new(
                {
                    let width = width.clone();
                    move || Viewport { x: width.get(), y: 1 }
                },
                Viewport { x: 0, y: 0 },
            );
            assert_eq!(cell.get(), Viewport { x: 10, y: 1 });

            width.set(40);
            runtime.flush_now();
            assert_eq!(cell.get(), Viewport { x: 40, y: 1 });
        });
    }

    #[test]
    fn clone_shares_state() {
        let runtime = Runtime::new();
        runtime.scope(|| {
            let first = HybridState::new(|| Viewport { x: 0, y: 0 }, Viewport { x: 0, y: 0 });
            let second = first.clone();

            first.set(ViewportPatch {
                x: Some(9),
                ..ViewportPatch::default()
            });
            assert_eq!(second.get(), Viewport { x: 9, y: 0 });
        });
    }
}

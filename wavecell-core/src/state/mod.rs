//! Reactive Cells
//!
//! This module implements the three cell variants and the factory
//! functions that create them.
//!
//! # Concepts
//!
//! ## Plain State
//!
//! A plain cell is a container for mutable state. Reading it inside a
//! derived computation records a dependency; writing it marks the cell
//! pending, and subscribers are notified on the next flush.
//!
//! ## Computed State
//!
//! A computed cell derives its value from other cells by re-running a
//! compute function. It is read-only to callers and refreshes whenever a
//! dependency changes, with a dependency-snapshot shortcut that skips
//! adopting a result when every input is unchanged.
//!
//! ## Hybrid State
//!
//! A hybrid cell is a computed cell with a caller-supplied override patch
//! layered on top. Patches accumulate field-by-field, win over the
//! computed base, and are readable synchronously without waiting for a
//! flush.
//!
//! # Implementation Notes
//!
//! Dependencies are detected automatically through a thread-local
//! tracking scope: when a cell is read while a computation is running,
//! the read is recorded and becomes a graph edge when the computation
//! ends. This approach (sometimes called "transparent reactivity") is
//! the same one used by SolidJS, Vue, and Leptos.

mod computed;
mod hybrid;
mod observer;
mod plain;
mod subscription;

pub use computed::ComputedState;
pub use hybrid::HybridState;
pub use plain::PlainState;
pub use subscription::{SubscriberId, Subscription};

use crate::graph::{EdgeSet, NodeId};
use crate::patch::Patchable;
use crate::runtime::Runtime;
use observer::TrackingScope;

/// Boxed compute function owned by a derived cell.
pub(crate) type ComputeFn<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Run one tracked computation for `reader`.
///
/// Tears down the edges from the previous run, runs `compute` inside a
/// tracking scope, installs edges for the captured reads, and returns the
/// result together with the reads in first-read order.
pub(crate) fn run_tracked<T>(
    runtime: &Runtime,
    reader: NodeId,
    dependencies: &EdgeSet,
    compute: &ComputeFn<T>,
) -> (T, Vec<(NodeId, u64)>) {
    runtime.detach_dependencies(reader, dependencies.take());

    let scope = TrackingScope::enter(reader);
    let value = compute();
    let reads = scope.finish();

    let read_ids: Vec<NodeId> = reads.iter().map(|(node, _)| *node).collect();
    dependencies.replace(read_ids.iter().copied().collect());
    runtime.attach_dependencies(reader, &read_ids);

    (value, reads)
}

/// Create a mutable cell in the current runtime.
///
/// # Example
///
/// ```rust,ignore
/// let count = create_state(0);
/// count.set(5);
/// assert_eq!(count.get(), 5);
/// ```
pub fn create_state<T>(initial: T) -> PlainState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    PlainState::new(initial)
}

/// Create a read-only derived cell in the current runtime.
///
/// The compute function runs once immediately and again on each flush
/// that reaches a dependency.
///
/// # Example
///
/// ```rust,ignore
/// let count = create_state(2);
/// let doubled = create_computed_state({
///     let count = count.clone();
///     move || count.get() * 2
/// });
/// assert_eq!(doubled.get(), 4);
/// ```
pub fn create_computed_state<T, F>(compute: F) -> ComputedState<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    ComputedState::new(compute)
}

/// Create a derived cell with manual overrides in the current runtime.
///
/// `initial` fills the value slot until the first computation replaces
/// it.
///
/// # Example
///
/// ```rust,ignore
/// let viewport = create_hybrid_state(
///     {
///         let size = size.clone();
///         move || Viewport::fit(size.get())
///     },
///     Viewport::default(),
/// );
/// viewport.set(ViewportPatch { zoom: Some(2), ..Default::default() });
/// ```
pub fn create_hybrid_state<T, F>(compute: F, initial: T) -> HybridState<T>
where
    T: Patchable + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    HybridState::new(compute, initial)
}

//! Versioned value storage.
//!
//! Every node keeps its current value in a [`ValueCell`]. The cell enforces
//! the isolation rule of the engine: values go in by move and come out as
//! fresh clones, so no caller ever holds a mutable alias of engine state.
//!
//! Each cell also carries a version counter. The version advances exactly
//! when a store replaces the value with one that compares unequal, which
//! makes "did this dependency change since I last read it" a cheap integer
//! comparison instead of a value comparison at flush time. Dependency
//! snapshots (see the computed state module) are built from these versions.

use parking_lot::RwLock;

/// The stored value plus its change counter.
///
/// Kept in one lock so a tracked read observes a consistent (value, version)
/// pair.
struct Slot<T> {
    value: Option<T>,
    version: u64,
}

/// A shared, versioned slot for one node's value.
pub(crate) struct ValueCell<T> {
    slot: RwLock<Slot<T>>,
}

impl<T> ValueCell<T>
where
    T: Clone + PartialEq,
{
    /// Create a cell holding `initial`.
    pub(crate) fn new(initial: T) -> Self {
        Self {
            slot: RwLock::new(Slot {
                value: Some(initial),
                version: 0,
            }),
        }
    }

    /// Create a cell with no value yet.
    ///
    /// Used by derived nodes, which fill the cell during their first
    /// computation before any caller can observe them.
    pub(crate) fn empty() -> Self {
        Self {
            slot: RwLock::new(Slot {
                value: None,
                version: 0,
            }),
        }
    }

    /// Clone the current value out of the cell.
    pub(crate) fn get(&self) -> T {
        self.slot
            .read()
            .value
            .clone()
            .expect("value cell filled during construction")
    }

    /// Clone the current value together with its version.
    pub(crate) fn get_versioned(&self) -> (T, u64) {
        let slot = self.slot.read();
        let value = slot
            .value
            .clone()
            .expect("value cell filled during construction");
        (value, slot.version)
    }

    /// Store `new` unless it equals the current value.
    ///
    /// Returns `true` when the value was replaced (and the version bumped),
    /// `false` when the store was suppressed as a no-op.
    pub(crate) fn store_if_changed(&self, new: T) -> bool {
        let mut slot = self.slot.write();
        if slot.value.as_ref() == Some(&new) {
            return false;
        }
        slot.value = Some(new);
        slot.version += 1;
        true
    }

    /// Run `f` on the current value and store the result if it differs.
    ///
    /// The closure sees an isolated clone, never the stored value itself.
    pub(crate) fn apply_if_changed<F>(&self, f: F) -> bool
    where
        F: FnOnce(T) -> T,
    {
        let current = self.get();
        self.store_if_changed(f(current))
    }
}

//! Partial-value patches for hybrid state.
//!
//! A hybrid node derives a base value from a compute function and layers a
//! caller-supplied override on top. The override is a *partial* value: it
//! specifies some fields and leaves the rest to the computed base. This
//! module defines the [`Patchable`] trait that gives a value type its patch
//! representation, and implements it for map-shaped values where "partial"
//! has an obvious meaning (a subset of the entries).
//!
//! For struct values the patch is typically a mirror struct whose fields are
//! `Option`s:
//!
//! ```rust,ignore
//! #[derive(Clone, PartialEq)]
//! struct Viewport { width: u32, height: u32 }
//!
//! #[derive(Clone, Default)]
//! struct ViewportPatch { width: Option<u32>, height: Option<u32> }
//!
//! impl Patchable for Viewport {
//!     type Patch = ViewportPatch;
//!
//!     fn merge_patch(earlier: ViewportPatch, later: ViewportPatch) -> ViewportPatch {
//!         ViewportPatch {
//!             width: later.width.or(earlier.width),
//!             height: later.height.or(earlier.height),
//!         }
//!     }
//!
//!     fn apply_patch(&mut self, patch: &ViewportPatch) {
//!         if let Some(width) = patch.width {
//!             self.width = width;
//!         }
//!         if let Some(height) = patch.height {
//!             self.height = height;
//!         }
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::hash::Hash;

use indexmap::IndexMap;

/// A value type that supports partial overrides.
///
/// Patches accumulate: when a node receives several patches, they are folded
/// into one with [`merge_patch`](Patchable::merge_patch), and the folded
/// patch is reapplied over every freshly computed base with
/// [`apply_patch`](Patchable::apply_patch). Fields a patch does not specify
/// are left to the value underneath.
pub trait Patchable: Clone {
    /// The partial form of `Self`.
    type Patch: Clone + Send + Sync + 'static;

    /// Fold two patches into one. Fields specified by `later` win over
    /// `earlier`; fields specified by neither stay unspecified.
    fn merge_patch(earlier: Self::Patch, later: Self::Patch) -> Self::Patch;

    /// Lay `patch` over this value, replacing the fields it specifies.
    fn apply_patch(&mut self, patch: &Self::Patch);
}

/// Map values are patched entry-wise: the patch is a map of the same shape,
/// and every entry it carries replaces (or adds) the entry under that key.
impl<K, V> Patchable for HashMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Patch = HashMap<K, V>;

    fn merge_patch(mut earlier: Self::Patch, later: Self::Patch) -> Self::Patch {
        earlier.extend(later);
        earlier
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        for (key, value) in patch {
            self.insert(key.clone(), value.clone());
        }
    }
}

impl<K, V> Patchable for IndexMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    type Patch = IndexMap<K, V>;

    fn merge_patch(mut earlier: Self::Patch, later: Self::Patch) -> Self::Patch {
        earlier.extend(later);
        earlier
    }

    fn apply_patch(&mut self, patch: &Self::Patch) {
        for (key, value) in patch {
            self.insert(key.clone(), value.clone());
        }
    }
}

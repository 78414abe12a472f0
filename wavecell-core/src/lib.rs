//! Wavecell Core
//!
//! This crate provides the core engine of the Wavecell reactive state
//! system. It implements:
//!
//! - Reactive cells (plain, computed, and hybrid state)
//! - Automatic dependency tracking through side-effecting reads
//! - A coalescing update scheduler with breadth-first propagation
//! - Reference-counted disposal of unreferenced cells
//!
//! Writes are cheap and synchronous; propagation is deferred. Setting a
//! cell stores the value immediately and marks the cell dirty, and a
//! single flush later recomputes affected derived cells and notifies
//! subscribers, at most once per cell per flush.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `state`: The cell variants, factory functions, and subscriptions
//! - `graph`: Dependency graph nodes and the update scheduler
//! - `runtime`: Graph ownership and the current-runtime mechanism
//! - `patch`: Partial-value overrides for hybrid cells
//! - `error`: The public error type
//!
//! # Example
//!
//! ```
//! use wavecell_core::{create_computed_state, create_state, Runtime};
//!
//! let runtime = Runtime::new();
//! runtime.scope(|| {
//!     let count = create_state(2);
//!     let doubled = create_computed_state({
//!         let count = count.clone();
//!         move || count.get() * 2
//!     });
//!     assert_eq!(doubled.get(), 4);
//!
//!     count.set(5);
//!     runtime.flush_now();
//!     assert_eq!(doubled.get(), 10);
//! });
//! ```
//!
//! Inside a tokio runtime the explicit flush is unnecessary: writes queue
//! a deferred flush on their own, and `runtime.settled().await` waits for
//! it to finish.

pub mod error;
pub mod graph;
pub mod patch;
pub mod runtime;
pub mod state;

mod value;

pub use error::Error;
pub use graph::{NodeId, NodeKind};
pub use patch::Patchable;
pub use runtime::{Runtime, RuntimeGuard};
pub use state::{
    create_computed_state, create_hybrid_state, create_state, ComputedState, HybridState,
    PlainState, SubscriberId, Subscription,
};

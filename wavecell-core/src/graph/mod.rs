//! Dependency Graph
//!
//! This module implements the dependency graph that tracks relationships
//! between reactive cells and the scheduler that propagates updates over
//! it.
//!
//! # Overview
//!
//! The graph is directed: if a derived cell reads another cell during its
//! computation, an edge is recorded from the cell that was read to the cell
//! that read it. Edges are discovered automatically at read time, rebuilt
//! on every recomputation, and stored in both directions so the graph can
//! be traversed either way.
//!
//! When a cell changes, the scheduler collects everything marked dirty in
//! the same synchronous burst and propagates outward in breadth-first
//! waves, recomputing derived cells and notifying subscribers at most once
//! per node per flush.
//!
//! # Design Decisions
//!
//! 1. Nodes are registered centrally and indexed by ID for O(1) lookup;
//!    edges refer to nodes by ID rather than by reference, which keeps the
//!    bidirectional edge sets free of ownership cycles.
//!
//! 2. Both forward (dependencies) and reverse (dependents) edge sets are
//!    maintained symmetrically, so recomputation can tear down stale edges
//!    and disposal can detach a node from either side.

mod node;
mod scheduler;

pub use node::{NodeId, NodeKind};

pub(crate) use node::{EdgeSet, ReactiveNode};
pub(crate) use scheduler::Scheduler;

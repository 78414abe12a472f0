//! Error types for the reactive engine.
//!
//! Graph maintenance and scheduling are total: they do not fail under
//! normal operation. The only fallible public operation is writing to a
//! node that does not accept writes.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors surfaced by the public state API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// The node derives its value from a compute function and cannot be
    /// written directly. Writes must go to the cells it reads instead.
    #[error("node {node:?} is read-only: computed values cannot be set directly")]
    ReadOnly {
        /// The node the write was attempted on.
        node: NodeId,
    },
}

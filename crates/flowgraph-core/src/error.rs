//! Errors surfaced by the graph-building API.
//!
//! These cover mistakes made while wiring and configuring a graph, before any
//! phase executes. Phase outcomes travel as [`Status`] values instead; the
//! two meet only through [`GraphError::into_status`].

use thiserror::Error;

use crate::status::{code, Status};
use crate::types::ElementId;

/// Errors raised while constructing, wiring, or configuring a graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Mutation attempted after the graph started initialization.
    #[error("configuration is frozen once the graph has been initialized")]
    FrozenConfiguration,

    /// Loop counts below one are rejected at configuration time.
    #[error("loop count must be at least 1, got {0}")]
    InvalidLoopCount(usize),

    /// Adding the edge would make the graph cyclic.
    #[error("dependency '{from}' -> '{to}' would close a cycle")]
    CycleWouldForm {
        /// Name of the element being depended on.
        from: String,
        /// Name of the element declaring the dependency.
        to: String,
    },

    /// The assembled graph is not a DAG.
    #[error("graph contains a dependency cycle ({remaining} elements unschedulable)")]
    CycleDetected {
        /// Number of elements left unprocessed by the feasibility check.
        remaining: usize,
    },

    /// An element handle that this graph never issued.
    #[error("unknown element handle {0}")]
    UnknownElement(ElementId),

    /// The worker pool was missing or no longer accepts work.
    #[error("worker pool unavailable: {0}")]
    PoolUnavailable(String),

    /// Invalid pool or graph configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl GraphError {
    /// Render this error as a failure [`Status`] for callers speaking the
    /// status surface.
    #[track_caller]
    pub fn into_status(self) -> Status {
        Status::new(code::ERROR, self.to_string())
    }
}

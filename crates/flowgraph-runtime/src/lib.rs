//! Flowgraph Runtime - Parallel computation-graph engine.
//!
//! Users describe a workload as a DAG of elements with explicit data
//! dependencies; the engine validates the graph, schedules ready elements
//! onto a work-stealing pool of OS threads, and reports statuses back.
//!
//! - **Element model**: implement [`Element`] (any subset of `init` / `run`
//!   / `destroy` / `is_hold` / `crashed`); every phase is wrapped by aspect
//!   hooks and panic trapping.
//! - **Worker pool**: long-lived workers with local stealable deques over a
//!   blocking global queue; submission returns a waitable [`TaskHandle`].
//! - **Scheduler**: Kahn-validated dispatch honoring dependency order and
//!   per-element levels, draining in-flight work on first failure.
//!
//! # Example
//!
//! ```no_run
//! use flowgraph_core::Status;
//! use flowgraph_runtime::Graph;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut graph = Graph::new();
//!     let load = graph.create_function(|_| Status::ok(), &[], "load", 1, 0)?;
//!     let work = graph.create_function(|_| Status::ok(), &[load], "work", 1, 0)?;
//!     let _save = graph.create_function(|_| Status::ok(), &[work], "save", 1, 0)?;
//!
//!     let status = graph.run();
//!     assert!(status.is_ok());
//!     Ok(())
//! }
//! ```

pub mod aspect;
pub mod element;
pub mod graph;
pub mod pool;

mod scheduler;

pub use aspect::{Aspect, AspectKind, AspectManager};
pub use element::{
    ClusterElement, Element, ElementContext, ElementNode, FunctionElement, Phase,
};
pub use graph::{Graph, GraphConfig};
pub use pool::{
    PoolConfig, PoolError, ShutdownPolicy, TaskError, TaskHandle, TaskOutcome, TaskQueue,
    WorkerPool,
};

// Re-export the shared value types so most users need only this crate.
pub use flowgraph_core::{
    next_session, status, ElementId, GraphError, GraphResult, Level, ParamTable, Status,
};

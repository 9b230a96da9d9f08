//! Flowgraph Core - Shared value types for the flowgraph engine.
//!
//! This crate provides the types every layer of the engine speaks:
//! phase statuses, the error taxonomy, element identifiers, the process-wide
//! session generator, and the shared parameter table.

pub mod error;
pub mod logging;
pub mod param;
pub mod session;
pub mod status;
pub mod types;

pub use error::GraphError;
pub use param::ParamTable;
pub use session::next_session;
pub use status::{code, Status};
pub use types::{ElementId, Level};

/// Convenience alias used across the workspace for fallible API calls.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

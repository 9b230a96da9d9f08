//! Identifier aliases shared across the workspace.

/// Stable arena index of an element inside its owning graph.
///
/// Handles are only meaningful for the graph that issued them.
pub type ElementId = usize;

/// Dispatch priority among ready elements. Larger runs earlier.
pub type Level = i32;

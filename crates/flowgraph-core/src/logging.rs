//! Structured tracing macros for the engine.
//!
//! Each subsystem logs through its own target so callers can filter
//! `flowgraph::scheduler`, `flowgraph::pool`, and `flowgraph::element`
//! independently. When the `no-trace` feature is enabled, every macro
//! compiles to nothing for zero overhead in benchmark builds.

// ---- With tracing enabled (default) ----

/// Trace scheduler-level events (dispatch, completion, epoch boundaries).
#[cfg(not(feature = "no-trace"))]
#[macro_export]
macro_rules! fg_sched {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "flowgraph::scheduler", $($arg)*)
    }
}

/// Trace worker-pool events with worker context.
#[cfg(not(feature = "no-trace"))]
#[macro_export]
macro_rules! fg_pool {
    ($level:ident, worker = $worker:expr, $($arg:tt)*) => {
        tracing::$level!(target: "flowgraph::pool", worker = $worker, $($arg)*)
    };
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "flowgraph::pool", $($arg)*)
    }
}

/// Trace element lifecycle phases.
#[cfg(not(feature = "no-trace"))]
#[macro_export]
macro_rules! fg_elem {
    ($level:ident, $($arg:tt)*) => {
        tracing::$level!(target: "flowgraph::element", $($arg)*)
    }
}

// ---- With tracing disabled (no-trace feature) ----

/// Trace scheduler-level events - compiles to nothing when no-trace is enabled
#[cfg(feature = "no-trace")]
#[macro_export]
macro_rules! fg_sched {
    ($level:ident, $($arg:tt)*) => {};
}

/// Trace worker-pool events - compiles to nothing when no-trace is enabled
#[cfg(feature = "no-trace")]
#[macro_export]
macro_rules! fg_pool {
    ($level:ident, worker = $worker:expr, $($arg:tt)*) => {};
    ($level:ident, $($arg:tt)*) => {};
}

/// Trace element lifecycle phases - compiles to nothing when no-trace is enabled
#[cfg(feature = "no-trace")]
#[macro_export]
macro_rules! fg_elem {
    ($level:ident, $($arg:tt)*) => {};
}

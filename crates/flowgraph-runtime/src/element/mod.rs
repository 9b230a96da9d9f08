//! The schedulable unit and its user contract.
//!
//! User code implements [`Element`] (any subset of the five methods) and the
//! engine wraps each lifecycle phase with aspect hooks, panic trapping, and
//! readiness bookkeeping inside [`node::ElementNode`].

pub(crate) mod node;

mod cluster;
mod function;

pub use cluster::ClusterElement;
pub use function::FunctionElement;
pub use node::ElementNode;

use flowgraph_core::{ParamTable, Status};

/// Lifecycle phase driven through the phase processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Run,
    Destroy,
}

/// Per-invocation view handed to every user method.
pub struct ElementContext<'a> {
    name: &'a str,
    session: &'a str,
    params: &'a ParamTable,
}

impl<'a> ElementContext<'a> {
    pub(crate) fn new(name: &'a str, session: &'a str, params: &'a ParamTable) -> Self {
        Self {
            name,
            session,
            params,
        }
    }

    /// User-facing element name (defaults to the session).
    pub fn name(&self) -> &str {
        self.name
    }

    /// Process-unique session of the element.
    pub fn session(&self) -> &str {
        self.session
    }

    /// Shared parameter table bound to the graph.
    pub fn params(&self) -> &ParamTable {
        self.params
    }
}

/// User contract of a schedulable element.
///
/// Every method has a default; a useful element overrides at least [`run`].
///
/// [`run`]: Element::run
pub trait Element: Send {
    /// Called once per graph activation, before any `run`.
    fn init(&mut self, _ctx: &ElementContext<'_>) -> Status {
        Status::ok()
    }

    /// The work body. The default reports an unsupported-operation failure,
    /// so elements that are never meant to run can stay as-is.
    fn run(&mut self, ctx: &ElementContext<'_>) -> Status {
        Status::unsupported(format!("element '{}' does not implement run", ctx.name()))
    }

    /// Called once per graph teardown.
    fn destroy(&mut self, _ctx: &ElementContext<'_>) -> Status {
        Status::ok()
    }

    /// Evaluated after each successful `run`; `true` repeats `run`
    /// immediately within the same loop iteration.
    fn is_hold(&mut self, _ctx: &ElementContext<'_>) -> bool {
        false
    }

    /// Invoked with the rendered panic payload when a user method panicked.
    /// The returned status becomes the phase status; the default reports a
    /// fatal crash. Overriding this is the recovery hook.
    fn crashed(&mut self, panic: &str, _ctx: &ElementContext<'_>) -> Status {
        Status::crashed(panic)
    }
}

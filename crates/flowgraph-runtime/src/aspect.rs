//! Cross-cutting aspect hooks.
//!
//! Aspects wrap each lifecycle phase of an element. A `Begin*` hook may veto
//! the phase by returning a failure status; a `Finish*` hook observes the
//! phase outcome and always runs, even when the phase body failed, so it can
//! release whatever it set up. Hooks fire in insertion order and the first
//! non-OK result within a kind short-circuits the rest of that kind.
//!
//! The manager is mutated only while the graph is being configured; during
//! execution it is shared read-only, so hooks take `&self` and keep any
//! mutable state behind atomics or locks of their own.

use flowgraph_core::Status;

/// The closed set of hook points around the three lifecycle phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectKind {
    BeginInit,
    FinishInit,
    BeginRun,
    FinishRun,
    BeginDestroy,
    FinishDestroy,
}

impl AspectKind {
    /// Whether this is a `Begin*` kind (may veto the phase body).
    pub fn is_begin(self) -> bool {
        matches!(
            self,
            AspectKind::BeginInit | AspectKind::BeginRun | AspectKind::BeginDestroy
        )
    }
}

/// A cross-cutting hook registered on an element.
pub trait Aspect: Send + Sync {
    /// Invoked at each hook point with the phase's current status.
    fn reflect(&self, kind: AspectKind, current: &Status) -> Status;
}

/// Blanket adapter so plain closures can act as aspects.
impl<F> Aspect for F
where
    F: Fn(AspectKind, &Status) -> Status + Send + Sync,
{
    fn reflect(&self, kind: AspectKind, current: &Status) -> Status {
        self(kind, current)
    }
}

/// Ordered collection of hooks attached to one element.
#[derive(Default)]
pub struct AspectManager {
    name: String,
    aspects: Vec<Box<dyn Aspect>>,
}

impl AspectManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a hook. Insertion order is invocation order.
    pub fn add(&mut self, aspect: Box<dyn Aspect>) {
        self.aspects.push(aspect);
    }

    /// Number of registered hooks. Observability only.
    pub fn size(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }

    /// Propagate the owning element's name for hook diagnostics.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke every hook for `kind` in insertion order, threading `current`.
    ///
    /// The first non-OK result is returned and the remaining hooks of this
    /// kind are skipped; otherwise the combined status stays OK.
    pub fn reflect(&self, kind: AspectKind, current: &Status) -> Status {
        for aspect in &self.aspects {
            let status = aspect.reflect(kind, current);
            if status.is_err() {
                return status;
            }
        }
        Status::ok()
    }
}

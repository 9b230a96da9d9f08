//! Closure-backed element.

use flowgraph_core::Status;

use crate::element::{Element, ElementContext};

/// The workhorse element kind: wraps a closure as the `run` body.
///
/// Function elements are linkable, so consecutive single-successor chains of
/// them may be fused by callers that exploit the flag.
pub struct FunctionElement<F> {
    body: F,
}

impl<F> FunctionElement<F>
where
    F: FnMut(&ElementContext<'_>) -> Status + Send,
{
    pub fn new(body: F) -> Self {
        Self { body }
    }
}

impl<F> Element for FunctionElement<F>
where
    F: FnMut(&ElementContext<'_>) -> Status + Send,
{
    fn run(&mut self, ctx: &ElementContext<'_>) -> Status {
        (self.body)(ctx)
    }
}

//! Serial group element.

use flowgraph_core::Status;

use crate::element::{Element, ElementContext};

/// A group of child behaviors driven serially as one schedulable unit.
///
/// `run` executes children in insertion order and stops at the first
/// failure. `init` mirrors that; `destroy` always visits every child so
/// each can release what it set up, remembering the first failure.
#[derive(Default)]
pub struct ClusterElement {
    children: Vec<Box<dyn Element>>,
}

impl ClusterElement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child behavior. Insertion order is execution order.
    pub fn with_child(mut self, child: Box<dyn Element>) -> Self {
        self.children.push(child);
        self
    }

    pub fn add_child(&mut self, child: Box<dyn Element>) {
        self.children.push(child);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

impl Element for ClusterElement {
    fn init(&mut self, ctx: &ElementContext<'_>) -> Status {
        for child in &mut self.children {
            let status = child.init(ctx);
            if status.is_err() {
                return status;
            }
        }
        Status::ok()
    }

    fn run(&mut self, ctx: &ElementContext<'_>) -> Status {
        for child in &mut self.children {
            let status = child.run(ctx);
            if status.is_err() {
                return status;
            }
        }
        Status::ok()
    }

    fn destroy(&mut self, ctx: &ElementContext<'_>) -> Status {
        let mut combined = Status::ok();
        for child in &mut self.children {
            combined.absorb(child.destroy(ctx));
        }
        combined
    }
}

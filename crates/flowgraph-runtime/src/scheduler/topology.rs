//! Graph feasibility checks.

use std::collections::VecDeque;
use std::sync::Arc;

use flowgraph_core::{ElementId, GraphError, GraphResult};

use crate::element::ElementNode;

/// Kahn-style check that the dependence sets form a DAG.
///
/// Returns a cycle error naming how many elements could never be scheduled.
pub(crate) fn ensure_acyclic(elements: &[Arc<ElementNode>]) -> GraphResult<()> {
    let total = elements.len();
    let mut indegree: Vec<usize> = elements.iter().map(|e| e.dependence().len()).collect();
    let mut queue: VecDeque<ElementId> = indegree
        .iter()
        .enumerate()
        .filter(|(_, &deg)| deg == 0)
        .map(|(id, _)| id)
        .collect();

    let mut visited = 0usize;
    while let Some(id) = queue.pop_front() {
        visited += 1;
        for succ in elements[id].run_before() {
            indegree[succ] -= 1;
            if indegree[succ] == 0 {
                queue.push_back(succ);
            }
        }
    }

    if visited == total {
        Ok(())
    } else {
        Err(GraphError::CycleDetected {
            remaining: total - visited,
        })
    }
}

/// Whether `start` transitively depends on `target`.
///
/// Used at wiring time: adding the edge `dep -> element` is refused when
/// `dep` already reaches `element` through its own dependence set.
pub(crate) fn depends_transitively(
    elements: &[Arc<ElementNode>],
    start: ElementId,
    target: ElementId,
) -> bool {
    let mut seen = vec![false; elements.len()];
    let mut frontier = VecDeque::from([start]);
    seen[start] = true;

    while let Some(id) = frontier.pop_front() {
        if id == target {
            return true;
        }
        for dep in elements[id].dependence() {
            if !seen[dep] {
                seen[dep] = true;
                frontier.push_back(dep);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementContext};
    use flowgraph_core::Status;

    struct Noop;
    impl Element for Noop {
        fn run(&mut self, _ctx: &ElementContext<'_>) -> Status {
            Status::ok()
        }
    }

    fn arena(count: usize) -> Vec<Arc<ElementNode>> {
        (0..count)
            .map(|id| Arc::new(ElementNode::new(id, Box::new(Noop), true)))
            .collect()
    }

    fn wire(elements: &[Arc<ElementNode>], dep: ElementId, of: ElementId) {
        elements[of].link_dependence(dep);
        elements[dep].link_run_before(of);
        elements[of].sync_left_depend();
    }

    #[test]
    fn chain_is_acyclic() {
        let elements = arena(3);
        wire(&elements, 0, 1);
        wire(&elements, 1, 2);
        assert!(ensure_acyclic(&elements).is_ok());
    }

    #[test]
    fn two_cycle_is_rejected() {
        let elements = arena(2);
        wire(&elements, 0, 1);
        wire(&elements, 1, 0);
        match ensure_acyclic(&elements) {
            Err(GraphError::CycleDetected { remaining }) => assert_eq!(remaining, 2),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn cycle_off_the_main_path_is_still_found() {
        let elements = arena(4);
        wire(&elements, 0, 1);
        wire(&elements, 2, 3);
        wire(&elements, 3, 2);
        match ensure_acyclic(&elements) {
            Err(GraphError::CycleDetected { remaining }) => assert_eq!(remaining, 2),
            other => panic!("expected cycle error, got {other:?}"),
        }
    }

    #[test]
    fn transitive_reachability() {
        let elements = arena(4);
        wire(&elements, 0, 1);
        wire(&elements, 1, 2);
        assert!(depends_transitively(&elements, 2, 0));
        assert!(depends_transitively(&elements, 2, 2));
        assert!(!depends_transitively(&elements, 0, 2));
        assert!(!depends_transitively(&elements, 3, 0));
    }

    #[test]
    fn empty_graph_is_fine() {
        assert!(ensure_acyclic(&[]).is_ok());
    }
}

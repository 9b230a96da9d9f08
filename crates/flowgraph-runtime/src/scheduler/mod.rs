//! Dependency scheduler.
//!
//! Walks a validated DAG of elements, dispatches whatever is ready to the
//! worker pool, and drains a completion inbox to unlock successors. Ready
//! peers dispatch highest level first, ties broken by insertion order. On
//! the first failure no new work is dispatched; in-flight work drains to
//! completion and the first non-OK status becomes the epoch result.

pub(crate) mod topology;

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use flowgraph_core::{fg_sched, ElementId, Level, Status};

use crate::element::{ElementNode, Phase};
use crate::pool::task::panic_message;
use crate::pool::{TaskQueue, WorkerPool};

/// Dispatch key: larger level first, then earlier insertion.
#[derive(PartialEq, Eq)]
struct ReadyKey {
    level: Level,
    index: ElementId,
}

impl Ord for ReadyKey {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.level
            .cmp(&other.level)
            .then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for ReadyKey {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// One-epoch executor over a frozen element arena.
pub(crate) struct Scheduler<'a> {
    elements: &'a [Arc<ElementNode>],
    pool: &'a Arc<WorkerPool>,
}

impl<'a> Scheduler<'a> {
    pub(crate) fn new(elements: &'a [Arc<ElementNode>], pool: &'a Arc<WorkerPool>) -> Self {
        Self { elements, pool }
    }

    /// Run every element to completion honoring dependencies.
    pub(crate) fn execute(&self) -> Status {
        if self.elements.is_empty() {
            return Status::ok();
        }
        if let Err(err) = topology::ensure_acyclic(self.elements) {
            return err.into_status();
        }

        // Fresh epoch: clear per-run state left by the previous activation.
        for node in self.elements {
            node.before_run();
        }

        let completions: Arc<TaskQueue<(ElementId, Status)>> = Arc::new(TaskQueue::new());
        let mut ready = BinaryHeap::new();
        for node in self.elements {
            if node.is_runnable() {
                ready.push(ReadyKey {
                    level: node.level(),
                    index: node.id(),
                });
            }
        }

        fg_sched!(
            debug,
            elements = self.elements.len(),
            seeds = ready.len(),
            "epoch started"
        );

        let mut overall = Status::ok();
        let mut in_flight = 0usize;

        loop {
            while overall.is_ok() {
                let Some(key) = ready.pop() else {
                    break;
                };
                match self.dispatch(key.index, &completions) {
                    Ok(()) => in_flight += 1,
                    Err(status) => overall.absorb(status),
                }
            }

            if in_flight == 0 {
                break;
            }

            let Some((id, status)) = completions.wait_pop() else {
                break;
            };
            in_flight -= 1;
            let node = &self.elements[id];

            if status.is_ok() {
                // afterRun: release successors, then flag this epoch done.
                // Acting on each decrement's return value dispatches every
                // successor exactly once even with concurrent predecessors.
                let mut unlocked = Vec::new();
                for succ in node.run_before() {
                    if self.elements[succ].notify_dependency_done() {
                        unlocked.push(succ);
                    }
                }
                node.mark_done();

                fg_sched!(
                    trace,
                    element = %node.name(),
                    unlocked = unlocked.len(),
                    "element completed"
                );
                if overall.is_ok() {
                    for succ in unlocked {
                        ready.push(ReadyKey {
                            level: self.elements[succ].level(),
                            index: succ,
                        });
                    }
                }
            } else {
                fg_sched!(
                    debug,
                    element = %node.name(),
                    code = status.code(),
                    "element failed; draining in-flight work"
                );
                overall.absorb(status);
            }
        }

        fg_sched!(debug, ok = overall.is_ok(), "epoch finished");
        overall
    }

    /// Submit one element's run phase; completion lands in the inbox.
    fn dispatch(
        &self,
        id: ElementId,
        completions: &Arc<TaskQueue<(ElementId, Status)>>,
    ) -> Result<(), Status> {
        let node = Arc::clone(&self.elements[id]);
        let completions = Arc::clone(completions);

        self.pool
            .spawn_job(Box::new(move || {
                // The processor traps user panics itself; this outer net
                // keeps a hook panic from swallowing the completion.
                let status = catch_unwind(AssertUnwindSafe(|| node.phase_processor(Phase::Run)))
                    .unwrap_or_else(|payload| Status::crashed(panic_message(payload.as_ref())));
                completions.push((node.id(), status));
            }))
            .map_err(|err| Status::cancelled(format!("dispatch refused: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, ElementContext};
    use crate::pool::PoolConfig;
    use parking_lot::Mutex;

    struct Recording {
        log: Arc<Mutex<Vec<&'static str>>>,
        tag: &'static str,
    }

    impl Element for Recording {
        fn run(&mut self, _ctx: &ElementContext<'_>) -> Status {
            self.log.lock().push(self.tag);
            Status::ok()
        }
    }

    fn pool() -> Arc<WorkerPool> {
        Arc::new(
            WorkerPool::new(PoolConfig::default().with_thread_count(2))
                .expect("pool construction failed"),
        )
    }

    #[test]
    fn ready_key_orders_by_level_then_insertion() {
        let mut heap = BinaryHeap::new();
        heap.push(ReadyKey { level: 0, index: 2 });
        heap.push(ReadyKey { level: 5, index: 3 });
        heap.push(ReadyKey { level: 0, index: 1 });
        heap.push(ReadyKey { level: 5, index: 0 });

        let order: Vec<_> = std::iter::from_fn(|| heap.pop().map(|k| k.index)).collect();
        assert_eq!(order, vec![0, 3, 1, 2]);
    }

    #[test]
    fn chain_executes_in_dependency_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let tags = ["first", "second", "third"];
        let elements: Vec<Arc<ElementNode>> = tags
            .iter()
            .enumerate()
            .map(|(id, tag)| {
                Arc::new(ElementNode::new(
                    id,
                    Box::new(Recording {
                        log: Arc::clone(&log),
                        tag,
                    }),
                    true,
                ))
            })
            .collect();
        for id in 1..3 {
            elements[id].link_dependence(id - 1);
            elements[id - 1].link_run_before(id);
            elements[id].sync_left_depend();
        }

        let pool = pool();
        let status = Scheduler::new(&elements, &pool).execute();
        assert!(status.is_ok());
        assert_eq!(*log.lock(), vec!["first", "second", "third"]);
        assert!(elements.iter().all(|e| e.is_done()));
    }

    #[test]
    fn empty_arena_is_ok_immediately() {
        let pool = pool();
        let status = Scheduler::new(&[], &pool).execute();
        assert!(status.is_ok());
    }

    #[test]
    fn cycle_reports_distinct_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let elements: Vec<Arc<ElementNode>> = (0..2)
            .map(|id| {
                Arc::new(ElementNode::new(
                    id,
                    Box::new(Recording {
                        log: Arc::clone(&log),
                        tag: "never",
                    }),
                    true,
                ))
            })
            .collect();
        elements[0].link_dependence(1);
        elements[1].link_run_before(0);
        elements[1].link_dependence(0);
        elements[0].link_run_before(1);
        elements[0].sync_left_depend();
        elements[1].sync_left_depend();

        let pool = pool();
        let status = Scheduler::new(&elements, &pool).execute();
        assert!(status.is_err());
        assert!(status.message().contains("cycle"));
        assert!(log.lock().is_empty());
    }
}

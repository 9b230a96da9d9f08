//! Worker loop and stealing strategy.
//!
//! Each worker owns a local FIFO deque. One loop iteration looks for work in
//! cheapest-first order:
//!
//! 1. its own local queue,
//! 2. a batched drain of the shared global queue (first job runs, the rest
//!    land in the local queue where peers can steal them),
//! 3. the other workers' deques, round-robin,
//! 4. a bounded blocking wait on the global queue.
//!
//! The bounded wait keeps parked workers responsive to stealable work and to
//! shutdown.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_deque::{Steal, Stealer, Worker};
use flowgraph_core::fg_pool;

use crate::pool::task::Job;
use crate::pool::PoolShared;

const PARK_TIMEOUT: Duration = Duration::from_millis(20);

/// Stealers for every worker's local deque.
pub(crate) struct WorkStealing {
    stealers: Vec<Stealer<Job>>,
}

impl WorkStealing {
    /// Build one local deque per worker and the stealer set over them.
    pub(crate) fn new(workers: usize) -> (Self, Vec<Worker<Job>>) {
        let mut stealers = Vec::with_capacity(workers);
        let mut locals = Vec::with_capacity(workers);
        for _ in 0..workers {
            let local = Worker::new_fifo();
            stealers.push(local.stealer());
            locals.push(local);
        }
        (Self { stealers }, locals)
    }

    /// Steal one job from another worker, round-robin starting after
    /// `worker_id`. A contended steal is retried once.
    fn steal_from_peers(&self, worker_id: usize) -> Option<Job> {
        let n = self.stealers.len();
        if n <= 1 {
            return None;
        }
        for i in 1..n {
            let target = (worker_id + i) % n;
            match self.stealers[target].steal() {
                Steal::Success(job) => return Some(job),
                Steal::Empty => continue,
                Steal::Retry => {
                    if let Steal::Success(job) = self.stealers[target].steal() {
                        return Some(job);
                    }
                }
            }
        }
        None
    }
}

/// Main worker loop. Runs until the pool shuts down and no work remains.
pub(crate) fn worker_loop(worker_id: usize, local: Worker<Job>, shared: Arc<PoolShared>) {
    fg_pool!(debug, worker = worker_id, "worker started");
    let mut batch: Vec<Job> = Vec::with_capacity(shared.max_batch_size);

    loop {
        if shared.discard.load(Ordering::Acquire) {
            // Dropping the deque drops its queued jobs; their handles
            // resolve as cancelled.
            break;
        }

        if let Some(job) = local.pop() {
            execute(&shared, worker_id, job);
            continue;
        }

        if shared.queue.try_pop_batch(&mut batch, shared.max_batch_size) {
            let mut jobs = batch.drain(..);
            if let Some(first) = jobs.next() {
                for job in jobs {
                    local.push(job);
                }
                execute(&shared, worker_id, first);
            }
            continue;
        }

        if let Some(job) = shared.stealing.steal_from_peers(worker_id) {
            execute(&shared, worker_id, job);
            continue;
        }

        match shared.queue.wait_pop_timeout(PARK_TIMEOUT) {
            Some(job) => execute(&shared, worker_id, job),
            None => {
                if shared.queue.is_closed() && shared.queue.is_empty() && local.is_empty() {
                    break;
                }
            }
        }
    }
    fg_pool!(debug, worker = worker_id, "worker exiting");
}

/// Run one job. A panic escaping the job is contained here so the worker
/// survives; packaged tasks resolve their own handles before unwinding.
fn execute(shared: &PoolShared, worker_id: usize, job: Job) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        shared.metrics.record_panicked();
        fg_pool!(warn, worker = worker_id, "task panicked; worker continues");
    }
    shared.metrics.record_executed();
}

//! Worker pool.
//!
//! A fixed set of long-lived OS worker threads fed by a shared blocking
//! queue plus per-worker stealable deques. The pool outlives any one
//! scheduler run; graphs borrow it for the duration of an epoch.
//!
//! Failure semantics: a task that panics resolves its own handle with the
//! captured payload and the worker continues. Shutdown stops intake, then
//! either drains or discards queued work per [`ShutdownPolicy`], and joins
//! every worker.

pub mod config;
pub mod queue;
pub mod task;
pub(crate) mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;
use thiserror::Error;

use flowgraph_core::fg_pool;

pub use config::{PoolConfig, ShutdownPolicy};
pub use queue::TaskQueue;
pub use task::{TaskError, TaskHandle, TaskOutcome};

use task::Job;
use worker::WorkStealing;

/// Errors raised by the pool's public surface.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool no longer accepts work.
    #[error("worker pool is shut down")]
    ShutDown,
    /// Configuration failed validation.
    #[error("invalid pool configuration: {0}")]
    InvalidConfig(String),
    /// The OS refused to spawn a worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Counters for pool observability.
#[derive(Default)]
pub struct PoolMetrics {
    submitted: AtomicU64,
    executed: AtomicU64,
    panicked: AtomicU64,
}

impl PoolMetrics {
    fn record_submitted(&self, count: u64) {
        self.submitted.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_executed(&self) {
        self.executed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_panicked(&self) {
        self.panicked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }

    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }

    pub fn panicked(&self) -> u64 {
        self.panicked.load(Ordering::Relaxed)
    }
}

/// State shared between the pool handle and its workers.
pub(crate) struct PoolShared {
    pub(crate) queue: TaskQueue<Job>,
    pub(crate) stealing: WorkStealing,
    pub(crate) max_batch_size: usize,
    pub(crate) discard: AtomicBool,
    pub(crate) metrics: PoolMetrics,
}

/// Fixed-size pool of OS worker threads.
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    accepting: AtomicBool,
    config: PoolConfig,
}

impl WorkerPool {
    /// Validate `config`, build the queues, and spawn the workers.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate().map_err(PoolError::InvalidConfig)?;

        let (stealing, locals) = WorkStealing::new(config.thread_count);
        let shared = Arc::new(PoolShared {
            queue: TaskQueue::new(),
            stealing,
            max_batch_size: config.max_batch_size,
            discard: AtomicBool::new(false),
            metrics: PoolMetrics::default(),
        });

        let mut workers = Vec::with_capacity(config.thread_count);
        for (worker_id, local) in locals.into_iter().enumerate() {
            let shared = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("flowgraph-worker-{worker_id}"))
                .spawn(move || worker::worker_loop(worker_id, local, shared))
                .map_err(|e| PoolError::Spawn(e.to_string()))?;
            workers.push(handle);
        }

        fg_pool!(
            info,
            threads = config.thread_count,
            batch = config.max_batch_size,
            "worker pool started"
        );

        Ok(Self {
            shared,
            workers: Mutex::new(workers),
            accepting: AtomicBool::new(true),
            config,
        })
    }

    /// Pool with default configuration.
    pub fn with_defaults() -> Result<Self, PoolError> {
        Self::new(PoolConfig::default())
    }

    /// Submit a closure whose return value is retrievable via the handle.
    /// Submission never blocks.
    pub fn submit<F, R>(&self, f: F) -> Result<TaskHandle<R>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (job, handle) = task::package(f);
        self.spawn_job(job)?;
        Ok(handle)
    }

    /// Submit a sequence of closures under a single queue lock.
    pub fn submit_batch<F, R>(
        &self,
        fs: impl IntoIterator<Item = F>,
    ) -> Result<Vec<TaskHandle<R>>, PoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }
        let (jobs, handles): (Vec<Job>, Vec<TaskHandle<R>>) =
            fs.into_iter().map(task::package).unzip();
        let count = jobs.len() as u64;
        let pushed = self.shared.queue.push_batch(jobs);
        if pushed == 0 && count > 0 {
            return Err(PoolError::ShutDown);
        }
        self.shared.metrics.record_submitted(count);
        Ok(handles)
    }

    /// Fire-and-forget submission for callers that track completion on their
    /// own channel.
    pub(crate) fn spawn_job(&self, job: Job) -> Result<(), PoolError> {
        if !self.accepting.load(Ordering::Acquire) {
            return Err(PoolError::ShutDown);
        }
        if !self.shared.queue.push(job) {
            return Err(PoolError::ShutDown);
        }
        self.shared.metrics.record_submitted(1);
        Ok(())
    }

    /// Stop intake, resolve queued work per the configured policy, and join
    /// every worker. Idempotent.
    pub fn shutdown(&self) {
        if self.accepting.swap(false, Ordering::AcqRel) {
            match self.config.shutdown_policy {
                ShutdownPolicy::Drain => {
                    self.shared.queue.close(ShutdownPolicy::Drain);
                }
                ShutdownPolicy::Discard => {
                    self.shared.discard.store(true, Ordering::Release);
                    let dropped = self.shared.queue.close(ShutdownPolicy::Discard);
                    fg_pool!(debug, discarded = dropped.len(), "queued tasks discarded");
                    drop(dropped);
                }
            }
        }
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            let _ = handle.join();
        }
    }

    /// Whether the pool still accepts submissions.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire)
    }

    pub fn thread_count(&self) -> usize {
        self.config.thread_count
    }

    /// Approximate number of tasks waiting in the global queue.
    pub fn queued_len(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn metrics(&self) -> &PoolMetrics {
        &self.shared.metrics
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

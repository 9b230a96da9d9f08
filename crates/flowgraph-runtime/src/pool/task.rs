//! Task packaging and completion handles.
//!
//! A submitted closure is wrapped into an opaque [`Job`] whose outcome
//! (return value, panic, or cancellation) resolves a shared slot the
//! [`TaskHandle`] waits on. A panicking task never unwinds into the worker:
//! the payload is rendered to a message and captured in the handle. A job
//! dropped without ever running (discard shutdown) resolves the handle as
//! cancelled instead of leaving waiters hanging.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use thiserror::Error;

/// Type-erased unit of work as stored in the queues.
pub(crate) type Job = Box<dyn FnOnce() + Send + 'static>;

/// Why a task failed to produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    /// The task body panicked; the payload is rendered here.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task was discarded at shutdown before it could execute.
    #[error("task discarded before execution")]
    Cancelled,
}

/// Outcome of a submitted task.
pub type TaskOutcome<R> = Result<R, TaskError>;

struct Slot<R> {
    value: Mutex<Option<TaskOutcome<R>>>,
    ready: Condvar,
}

/// Handle to a submitted task's eventual result.
pub struct TaskHandle<R> {
    slot: Arc<Slot<R>>,
}

impl<R> TaskHandle<R> {
    /// Block until the task resolves and take its outcome.
    pub fn wait(self) -> TaskOutcome<R> {
        let mut value = self.slot.value.lock();
        loop {
            if let Some(outcome) = value.take() {
                return outcome;
            }
            self.slot.ready.wait(&mut value);
        }
    }

    /// Block for at most `timeout`. `None` means the task has not resolved.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskOutcome<R>> {
        let deadline = Instant::now() + timeout;
        let mut value = self.slot.value.lock();
        loop {
            if let Some(outcome) = value.take() {
                return Some(outcome);
            }
            if self.slot.ready.wait_until(&mut value, deadline).timed_out() {
                return value.take();
            }
        }
    }

    /// Take the outcome if already resolved. Never blocks.
    pub fn try_take(&self) -> Option<TaskOutcome<R>> {
        self.slot.value.lock().take()
    }
}

/// Wrap `f` into an erased job plus the handle observing it.
pub(crate) fn package<R, F>(f: F) -> (Job, TaskHandle<R>)
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    let slot = Arc::new(Slot {
        value: Mutex::new(None),
        ready: Condvar::new(),
    });
    let handle = TaskHandle {
        slot: Arc::clone(&slot),
    };

    let mut guard = CompletionGuard { slot, done: false };
    let job: Job = Box::new(move || {
        let outcome = catch_unwind(AssertUnwindSafe(f))
            .map_err(|payload| TaskError::Panicked(panic_message(payload.as_ref())));
        guard.fill(outcome);
    });

    (job, handle)
}

/// Resolves the slot exactly once: with the task's outcome when it ran, or
/// with `Cancelled` when the job is dropped unexecuted.
struct CompletionGuard<R> {
    slot: Arc<Slot<R>>,
    done: bool,
}

impl<R> CompletionGuard<R> {
    fn fill(&mut self, outcome: TaskOutcome<R>) {
        let mut value = self.slot.value.lock();
        *value = Some(outcome);
        self.done = true;
        drop(value);
        self.slot.ready.notify_all();
    }
}

impl<R> Drop for CompletionGuard<R> {
    fn drop(&mut self) {
        if !self.done {
            self.fill(Err(TaskError::Cancelled));
        }
    }
}

/// Render a panic payload into a displayable message.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_string()
    }
}

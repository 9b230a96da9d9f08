//! Worker-pool configuration.

use serde::{Deserialize, Serialize};

/// What happens to queued-but-unstarted tasks at shutdown.
///
/// In-flight tasks always run to completion; there is no mid-task
/// cancellation signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Execute everything already queued before the workers exit.
    Drain,
    /// Drop queued tasks; their handles resolve as cancelled.
    Discard,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        ShutdownPolicy::Drain
    }
}

/// Configuration for the worker pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of long-lived worker threads.
    ///
    /// Default: number of logical CPUs.
    #[serde(default = "default_thread_count")]
    pub thread_count: usize,

    /// Per-pop drain cap when a worker batches tasks out of the global
    /// queue. Trades latency for throughput.
    ///
    /// Default: 4
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Policy applied to queued tasks at shutdown.
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            thread_count: default_thread_count(),
            max_batch_size: default_max_batch_size(),
            shutdown_policy: ShutdownPolicy::default(),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of worker threads.
    pub fn with_thread_count(mut self, thread_count: usize) -> Self {
        self.thread_count = thread_count;
        self
    }

    /// Set the per-pop batch cap.
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Set the shutdown policy.
    pub fn with_shutdown_policy(mut self, policy: ShutdownPolicy) -> Self {
        self.shutdown_policy = policy;
        self
    }

    /// Validate the configuration.
    ///
    /// Returns an error message if any field is out of range.
    pub fn validate(&self) -> Result<(), String> {
        if self.thread_count == 0 {
            return Err("thread_count must be > 0".to_string());
        }
        if self.max_batch_size == 0 {
            return Err("max_batch_size must be > 0".to_string());
        }
        Ok(())
    }
}

fn default_thread_count() -> usize {
    num_cpus::get().max(1)
}

fn default_max_batch_size() -> usize {
    4
}

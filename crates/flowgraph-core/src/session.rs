//! Process-wide session generator.
//!
//! Every element is stamped with a unique session string at construction.
//! A single never-reset atomic counter backs the whole process; sessions are
//! opaque to everything except diagnostics.

use std::sync::atomic::{AtomicU64, Ordering};

static SESSION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Issue the next process-unique session string.
pub fn next_session() -> String {
    let id = SESSION_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("el-{id:08x}")
}

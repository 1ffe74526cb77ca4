//! In-flight task tracking for cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::warn;

/// Cooperative cancellation flag shared between an executor and a
/// concurrent cancel request. Firing it never interrupts in-flight I/O; the
/// executor polls it and short-circuits post-upstream work.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Thread-safe map from task id to its cancellation signal.
#[derive(Debug, Default)]
pub struct TaskSessionRegistry {
    inner: DashMap<String, CancelSignal>,
}

impl TaskSessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a signal for a task. A duplicate registration keeps the
    /// new signal.
    pub fn register(&self, task_id: &str, signal: CancelSignal) {
        if self.inner.insert(task_id.to_string(), signal).is_some() {
            warn!(task = %task_id, "replacing cancellation signal for already-registered task");
        }
    }

    /// Removes a task's signal; a no-op when absent.
    pub fn deregister(&self, task_id: &str) {
        self.inner.remove(task_id);
    }

    /// Fires the signal for a task. Returns whether a signal was found.
    pub fn cancel(&self, task_id: &str) -> bool {
        match self.inner.get(task_id) {
            Some(signal) => {
                signal.cancel();
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

//! Scoped finalize guarantee
//!
//! Every task registered in a [`FinalizeScope`] is finalized exactly once,
//! in reverse registration order, when the scope is closed or dropped.

use crate::error::{Result, TaskError};
use crate::task::Task;

/// Tasks awaiting finalize for one verb invocation
pub struct FinalizeScope<'a> {
    pending: Vec<&'a dyn Task>,
}

impl<'a> FinalizeScope<'a> {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
        }
    }

    /// Register a task; call this before the task's `validate`
    pub fn register(&mut self, task: &'a dyn Task) {
        self.pending.push(task);
    }

    /// Number of tasks still awaiting finalize
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Finalize every registered task and fold the results into `outcome`
    ///
    /// The verb's own error wins. If the verb succeeded, the first finalize
    /// error is returned instead.
    pub fn close(mut self, outcome: Result<()>) -> Result<()> {
        let first_failure = self.run_all();

        match (outcome, first_failure) {
            (Err(e), _) => Err(e),
            (Ok(()), Some(e)) => Err(e),
            (Ok(()), None) => Ok(()),
        }
    }

    fn run_all(&mut self) -> Option<TaskError> {
        let mut first_failure = None;

        while let Some(task) = self.pending.pop() {
            log::debug!("finalize {}", task.name());
            if let Err(e) = task.finalize() {
                log::warn!("finalize of {} failed: {}", task.name(), e);
                if first_failure.is_none() {
                    first_failure = Some(match e {
                        TaskError::Finalize { .. } => e,
                        other => TaskError::Finalize {
                            task: task.name().to_string(),
                            message: other.to_string(),
                        },
                    });
                }
            }
        }

        first_failure
    }
}

impl Default for FinalizeScope<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for FinalizeScope<'_> {
    fn drop(&mut self) {
        // Only reached with pending tasks when close() was skipped (unwind)
        let _ = self.run_all();
    }
}

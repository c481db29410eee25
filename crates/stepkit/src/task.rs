//! Task trait and options for provisioning operations
//!
//! A Task is a single provisioning operation with a fixed lifecycle:
//! validate, plan, apply, destroy, and finalize.

use crate::error::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Substring of a source locator that marks a connectivity-bootstrap task.
///
/// Such tasks establish the access configuration (cluster credentials) that
/// other tasks in the same region depend on, so they are torn down last.
pub const CONNECTIVITY_MARKER: &str = "kubeconfig";

/// Options owned by a task
///
/// `name` doubles as the remote-state object key and must be unique per
/// deployment. `path` is the task's exclusive working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOptions {
    pub name: String,
    pub source: String,
    pub path: PathBuf,
    pub env_vars: BTreeMap<String, String>,
    /// Declared input values for the external tool
    pub vars: BTreeMap<String, String>,
    /// Cross-task state references: reference name -> upstream task name
    pub remote_states: BTreeMap<String, String>,
}

impl TaskOptions {
    /// Create options for a task with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    pub fn env_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    pub fn env_vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.env_vars.extend(vars);
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn vars(mut self, vars: BTreeMap<String, String>) -> Self {
        self.vars.extend(vars);
        self
    }

    /// Reference another task's remote state under `name`
    pub fn remote_state(mut self, name: impl Into<String>, task: impl Into<String>) -> Self {
        self.remote_states.insert(name.into(), task.into());
        self
    }

    /// Whether the source locator marks this as a connectivity-bootstrap task
    pub fn is_connectivity_bootstrap(&self) -> bool {
        self.source.contains(CONNECTIVITY_MARKER)
    }
}

/// Core trait for provisioning tasks
///
/// Implementations must be individually idempotent. The sequencer never
/// touches task internals; it only calls these lifecycle methods.
pub trait Task: Send + Sync + fmt::Debug {
    /// Options the task was built with
    fn options(&self) -> &TaskOptions;

    /// Task name (also its remote-state key)
    fn name(&self) -> &str {
        &self.options().name
    }

    /// Prepare and check the task. Always paired with `finalize`.
    fn validate(&self) -> Result<()>;

    fn plan(&self) -> Result<()>;

    fn apply(&self) -> Result<()>;

    fn destroy(&self) -> Result<()>;

    /// Release whatever `validate` acquired. Must be idempotent.
    fn finalize(&self) -> Result<()>;

    /// Whether this task bootstraps connectivity for others
    fn is_connectivity_bootstrap(&self) -> bool {
        self.options().is_connectivity_bootstrap()
    }
}

/// A boxed task for type-erased storage
pub type BoxedTask = Box<dyn Task>;

/// An ordered group of tasks executed together for one provisioning concern
#[derive(Debug, Default)]
pub struct Step {
    tasks: Vec<BoxedTask>,
}

impl Step {
    pub fn new(tasks: Vec<BoxedTask>) -> Self {
        Self { tasks }
    }

    /// A step holding a single task
    pub fn single(task: impl Task + 'static) -> Self {
        Self {
            tasks: vec![Box::new(task)],
        }
    }

    pub fn push(&mut self, task: impl Task + 'static) {
        self.tasks.push(Box::new(task));
    }

    pub fn tasks(&self) -> impl DoubleEndedIterator<Item = &dyn Task> {
        self.tasks.iter().map(|t| t.as_ref())
    }
}

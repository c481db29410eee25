//! # Stepkit
//!
//! Lifecycle engine for sequenced infrastructure provisioning.
//!
//! ## Core Concepts
//!
//! - **Task**: one idempotent provisioning operation with a
//!   validate / plan / apply / destroy / finalize lifecycle
//! - **Step**: an ordered group of tasks for one provisioning concern
//! - **Sequencer**: runs a verb across a list of steps, sequentially,
//!   stopping at the first failure
//! - **FinalizeScope**: guarantees every validated task is finalized
//!
//! ## Destroy ordering
//!
//! Tasks whose source locator contains [`CONNECTIVITY_MARKER`] establish
//! access for the tasks around them. `execute_destroy` re-applies them first,
//! tears down everything else in reverse step order, and only then destroys
//! them.
//!
//! ## Example
//!
//! ```ignore
//! use stepkit::{Step, Task, TaskOptions, Verb};
//!
//! let steps = vec![
//!     Step::single(state_check),
//!     Step::new(vec![Box::new(kubeconfig), Box::new(namespaces)]),
//! ];
//!
//! stepkit::execute(Verb::Destroy, &steps)?;
//! ```

pub mod error;
pub mod finalize;
pub mod sequencer;
pub mod task;

pub use error::{ErrorCategory, Result, TaskError};
pub use finalize::FinalizeScope;
pub use sequencer::{
    Verb, execute, execute_apply, execute_destroy, execute_plan, execute_validate,
};
pub use task::{BoxedTask, CONNECTIVITY_MARKER, Step, Task, TaskOptions};

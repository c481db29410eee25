//! Error types for task lifecycle operations.
//!
//! Errors are categorized so callers can tell a bad configuration apart from
//! an unreachable backend or a failing external tool. Every variant carries
//! the task name or the offending value, enough to diagnose a failure without
//! re-running.

use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Categories of task errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Invalid configuration, detected before any I/O
    Config,
    /// Backend session or source fetch failed
    Connectivity,
    /// Remote state did not round-trip
    Consistency,
    /// The external tool failed or its pipes broke
    Process,
    /// Filesystem or finalize errors
    Other,
}

impl ErrorCategory {
    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Config => "Configuration error",
            Self::Connectivity => "Connectivity error",
            Self::Consistency => "Consistency error",
            Self::Process => "External process error",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Config => "Check the settings and platform definitions in the config file",
            Self::Connectivity => "Check credentials and network access to the backend or source",
            Self::Consistency => "Another writer may be using the same state key; check task names",
            Self::Process => "Inspect the tool output above for the failing command",
            Self::Other => "Check the error details for more information",
        }
    }
}

/// Errors that can occur while running a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Remote-state backend kind is not supported
    #[error("remote state backend in {backend} is not supported")]
    UnsupportedBackend {
        /// Configured backend identifier
        backend: String,
    },

    /// Source locator uses a scheme other than http/https
    #[error("task {task}: scheme {scheme:?} is not supported")]
    UnsupportedScheme {
        /// Task name
        task: String,
        /// Offending scheme
        scheme: String,
    },

    /// Source locator could not be parsed
    #[error("task {task}: invalid source {source_url:?}: {message}")]
    InvalidSource {
        /// Task name
        task: String,
        /// The locator as configured
        source_url: String,
        /// Parser message
        message: String,
    },

    /// A remote-state backend operation failed
    #[error("task {task}: failed to {operation} in the remote state backend {backend}: {message}")]
    Backend {
        /// Backend identifier
        backend: String,
        /// Task name
        task: String,
        /// What was attempted (e.g. "create a session", "put an object")
        operation: String,
        /// Underlying error message
        message: String,
    },

    /// Fetching the task's source module failed
    #[error("task {task}: failed to fetch {source_url}: {message}")]
    SourceFetch {
        /// Task name
        task: String,
        /// Source locator
        source_url: String,
        /// Underlying error message
        message: String,
    },

    /// Value read back from the state backend differs from what was written
    #[error("read back an incorrect value from the remote state backend for {key}: want {expected}, got {actual}")]
    StateMismatch {
        /// Object key
        key: String,
        /// Written value
        expected: String,
        /// Value read back
        actual: String,
    },

    /// External command could not be started
    #[error("task {task}: failed to execute {command}: {source}")]
    Spawn {
        /// Task name
        task: String,
        /// Command line
        command: String,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// A subprocess pipe was not available
    #[error("task {task}: {stream} pipe failed")]
    Pipe {
        /// Task name
        task: String,
        /// Stream name ("stdout" or "stderr")
        stream: &'static str,
    },

    /// External command exited unsuccessfully
    #[error("task {task}: {command} exited with {status}")]
    ProcessFailed {
        /// Task name
        task: String,
        /// Command line
        command: String,
        /// Exit status
        status: ExitStatus,
    },

    /// Filesystem error on a task-owned path
    #[error("task {task}: IO error on {}: {source}", path.display())]
    Io {
        /// Task name
        task: String,
        /// Path involved
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: io::Error,
    },

    /// Finalize failed to release task resources
    #[error("task {task}: finalize failed: {message}")]
    Finalize {
        /// Task name
        task: String,
        /// Underlying error message
        message: String,
    },
}

impl TaskError {
    /// Get the error category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnsupportedBackend { .. }
            | Self::UnsupportedScheme { .. }
            | Self::InvalidSource { .. } => ErrorCategory::Config,
            Self::Backend { .. } | Self::SourceFetch { .. } => ErrorCategory::Connectivity,
            Self::StateMismatch { .. } => ErrorCategory::Consistency,
            Self::Spawn { .. } | Self::Pipe { .. } | Self::ProcessFailed { .. } => {
                ErrorCategory::Process
            }
            Self::Io { .. } | Self::Finalize { .. } => ErrorCategory::Other,
        }
    }

    /// Build an IO error for a task-owned path.
    pub fn io(task: &str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            task: task.to_string(),
            path: path.into(),
            source,
        }
    }
}

/// Result type for task operations.
pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_error_is_config() {
        let err = TaskError::UnsupportedScheme {
            task: "k8s".into(),
            scheme: "ftp".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Config);
        assert!(err.to_string().contains("ftp"));
        assert!(err.to_string().contains("k8s"));
    }

    #[test]
    fn test_mismatch_message_names_values() {
        let err = TaskError::StateMismatch {
            key: "plat-prod-state".into(),
            expected: "plat-prod-state".into(),
            actual: "garbage".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Consistency);
        assert_eq!(
            err.to_string(),
            "read back an incorrect value from the remote state backend for plat-prod-state: want plat-prod-state, got garbage"
        );
    }

    #[test]
    fn test_backend_error_is_connectivity() {
        let err = TaskError::Backend {
            backend: "aws".into(),
            task: "plat-prod-state".into(),
            operation: "put an object".into(),
            message: "access denied".into(),
        };
        assert_eq!(err.category(), ErrorCategory::Connectivity);
        assert!(err.to_string().contains("aws"));
    }
}

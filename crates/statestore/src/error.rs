//! Error types for remote-state backend operations.

use thiserror::Error;

/// Errors that can occur while talking to a remote-state backend.
#[derive(Debug, Error)]
pub enum Error {
    /// Backend identifier is not one of the supported kinds
    #[error("remote state backend in {0} is not supported")]
    UnsupportedBackend(String),

    /// Could not establish a session with the backend
    #[error("failed to create a session: {message}")]
    Session {
        /// Underlying error message
        message: String,
    },

    /// Writing an object failed
    #[error("failed to put {key}: {message}")]
    Put {
        /// Object key
        key: String,
        /// Underlying error message
        message: String,
    },

    /// Reading an object failed
    #[error("failed to read back {key}: {message}")]
    Get {
        /// Object key
        key: String,
        /// Underlying error message
        message: String,
    },

    /// Object does not exist
    #[error("object {0} not found")]
    NotFound(String),

    /// Deleting an object failed
    #[error("failed to delete {key}: {message}")]
    Delete {
        /// Object key
        key: String,
        /// Underlying error message
        message: String,
    },
}

impl Error {
    /// Short description of the operation that failed
    pub fn operation(&self) -> &'static str {
        match self {
            Self::UnsupportedBackend(_) => "select a backend",
            Self::Session { .. } => "create a session",
            Self::Put { .. } => "put an object",
            Self::Get { .. } | Self::NotFound(_) => "read back an object",
            Self::Delete { .. } => "delete an object",
        }
    }
}

/// Result type for remote-state operations.
pub type Result<T> = std::result::Result<T, Error>;

//! # statestore
//!
//! Access to the remote-state backend that stores terraform state.
//!
//! The backend is used two ways: provisioning tasks point terraform at it,
//! and a check writes, reads back and deletes an object before anything runs
//! to prove the backend is reachable and consistent.
//!
//! ## Example
//!
//! ```no_run
//! use statestore::{BackendKind, BackendSettings, StateStore};
//!
//! let settings = BackendSettings {
//!     region: "us-west-2".to_string(),
//!     bucket: "infra-terraform-state".to_string(),
//!     lock_table: "infra-terraform-lock".to_string(),
//! };
//!
//! let kind: BackendKind = "aws".parse().expect("supported backend");
//! let store = statestore::connect(kind, &settings).expect("session");
//! store.put("healthcheck", b"ok").expect("put");
//! ```

pub mod backend;
pub mod error;

pub use backend::memory::MemoryStore;
pub use backend::s3::S3Store;
pub use backend::{StateStore, StoreOperation};
pub use error::{Error, Result};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported remote-state backend kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// S3 bucket with a DynamoDB lock table
    Aws,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aws => "aws",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aws" => Ok(Self::Aws),
            other => Err(Error::UnsupportedBackend(other.to_string())),
        }
    }
}

/// Location of the state bucket and lock table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSettings {
    pub region: String,
    pub bucket: String,
    pub lock_table: String,
}

/// Open a session with the backend of the given kind
pub fn connect(kind: BackendKind, settings: &BackendSettings) -> Result<Box<dyn StateStore>> {
    match kind {
        BackendKind::Aws => Ok(Box::new(S3Store::connect(settings)?)),
    }
}

//! Backend trait and implementations for the remote-state object store.
//!
//! [`s3::S3Store`] talks to a real S3 bucket. [`memory::MemoryStore`] keeps
//! objects in memory for testing without network access:
//!
//! ```
//! use statestore::{MemoryStore, StateStore};
//!
//! let store = MemoryStore::new();
//! store.put("healthcheck", b"ok").unwrap();
//! assert_eq!(store.get("healthcheck").unwrap(), b"ok");
//! store.delete("healthcheck").unwrap();
//! assert!(store.is_empty());
//! ```

pub mod memory;
pub mod s3;

use crate::error::Result;

/// Object-store operations the remote-state backend must support.
///
/// Keys are task names, so callers must keep them unique per deployment.
pub trait StateStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous object.
    fn put(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Read the object stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `Error::NotFound` if no object exists.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete the object stored under `key`.
    fn delete(&self, key: &str) -> Result<()>;
}

/// One of the store operations, used to inject failures in tests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    Put,
    Get,
    Delete,
}

//! Remote-state reachability probe
//!
//! Writes an object keyed by the task name, reads it back, and deletes it.
//! Runs as the first step of every capability so nothing is provisioned
//! against a backend that cannot hold state.

use std::fmt;
use std::sync::Arc;

use statestore::{BackendKind, BackendSettings, StateStore};
use stepkit::{Result, Task, TaskError, TaskOptions};

use crate::config::Settings;

/// Opens a store session for a backend kind
pub type StoreConnector =
    Arc<dyn Fn(BackendKind, &BackendSettings) -> statestore::Result<Box<dyn StateStore>> + Send + Sync>;

pub struct StateProbe {
    options: TaskOptions,
    backend: String,
    settings: BackendSettings,
    connector: StoreConnector,
}

impl StateProbe {
    /// Probe the backend described by `settings` using the real store
    pub fn new(name: impl Into<String>, settings: &Settings) -> Self {
        Self {
            options: TaskOptions::new(name),
            backend: settings.state_store.clone(),
            settings: settings.backend(),
            connector: Arc::new(statestore::connect),
        }
    }

    /// Replace how store sessions are opened
    pub fn with_connector<F>(mut self, connector: F) -> Self
    where
        F: Fn(BackendKind, &BackendSettings) -> statestore::Result<Box<dyn StateStore>>
            + Send
            + Sync
            + 'static,
    {
        self.connector = Arc::new(connector);
        self
    }

    fn round_trip(&self) -> Result<()> {
        let key = self.name();

        let kind: BackendKind = self
            .backend
            .parse()
            .map_err(|_| TaskError::UnsupportedBackend {
                backend: self.backend.clone(),
            })?;

        let store = (self.connector)(kind, &self.settings).map_err(|e| self.backend_error(e))?;

        store
            .put(key, key.as_bytes())
            .map_err(|e| self.backend_error(e))?;

        let read = store.get(key).map_err(|e| self.backend_error(e))?;
        if read != key.as_bytes() {
            return Err(TaskError::StateMismatch {
                key: key.to_string(),
                expected: key.to_string(),
                actual: String::from_utf8_lossy(&read).into_owned(),
            });
        }

        store.delete(key).map_err(|e| self.backend_error(e))
    }

    fn backend_error(&self, e: statestore::Error) -> TaskError {
        TaskError::Backend {
            backend: self.backend.clone(),
            task: self.name().to_string(),
            operation: e.operation().to_string(),
            message: e.to_string(),
        }
    }
}

impl fmt::Debug for StateProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateProbe")
            .field("options", &self.options)
            .field("backend", &self.backend)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl Task for StateProbe {
    fn options(&self) -> &TaskOptions {
        &self.options
    }

    fn validate(&self) -> Result<()> {
        match self.round_trip() {
            Ok(()) => {
                log::info!("remote state backend in {} is valid", self.backend);
                Ok(())
            }
            Err(e) => {
                log::error!("remote state backend in {} is invalid", self.backend);
                Err(e)
            }
        }
    }

    fn plan(&self) -> Result<()> {
        Ok(())
    }

    fn apply(&self) -> Result<()> {
        Ok(())
    }

    fn destroy(&self) -> Result<()> {
        Ok(())
    }

    fn finalize(&self) -> Result<()> {
        Ok(())
    }
}

//! Centralized path resolution for platctl
//!
//! # Environment Variables
//!
//! - `PLATCTL_CONFIG` - Path of the config file itself
//! - `PLATCTL_CONFIG_DIR` - Override config directory
//!
//! # Path Resolution Priority
//!
//! For config_file():
//! 1. `--config` flag (handled by the caller)
//! 2. `PLATCTL_CONFIG` environment variable
//! 3. `config.toml` in config_dir()
//!
//! For config_dir():
//! 1. `PLATCTL_CONFIG_DIR` environment variable
//! 2. `XDG_CONFIG_HOME/platctl` (if set)
//! 3. `~/.config/platctl`

use anyhow::{Context, Result};
use std::path::PathBuf;

/// Environment variable for the config file path
pub const ENV_CONFIG: &str = "PLATCTL_CONFIG";

/// Environment variable for config directory override
pub const ENV_CONFIG_DIR: &str = "PLATCTL_CONFIG_DIR";

/// Get the platctl config directory path
pub fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(ENV_CONFIG_DIR) {
        let path = expand(&dir);
        log::debug!(
            "Using config dir from {}: {}",
            ENV_CONFIG_DIR,
            path.display()
        );
        return Ok(path);
    }

    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        let path = PathBuf::from(xdg_config).join("platctl");
        log::debug!("Using XDG_CONFIG_HOME: {}", path.display());
        return Ok(path);
    }

    let home = dirs::home_dir().context("Could not determine home directory")?;
    let path = home.join(".config").join("platctl");
    log::debug!("Using default config dir: {}", path.display());
    Ok(path)
}

/// Get the config file path, preferring an explicit path when given
pub fn config_file(explicit: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(expand(path));
    }

    if let Ok(path) = std::env::var(ENV_CONFIG) {
        let path = expand(&path);
        log::debug!("Using config file from {}: {}", ENV_CONFIG, path.display());
        return Ok(path);
    }

    Ok(config_dir()?.join("config.toml"))
}

/// Default root for task working directories
pub fn default_work_dir() -> PathBuf {
    std::env::temp_dir()
}

/// Expand ~ and environment variables in a path string.
///
/// Unknown variables are left as-is.
pub fn expand(path: &str) -> PathBuf {
    PathBuf::from(expand_str(path))
}

/// Like [`expand`], for values that are not filesystem paths on this host
pub fn expand_str(value: &str) -> String {
    shellexpand::full(value)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| value.to_string())
}

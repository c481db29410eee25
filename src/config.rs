use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;
use crate::platform::{Capability, Platform};
use statestore::BackendSettings;

/// Environment variable that overrides the provider token
pub const ENV_DO_TOKEN: &str = "PLATCTL_DO_TOKEN";

// ============================================================================
// Settings
// ============================================================================

/// Settings shared by every task of an invocation
///
/// Built once from the config file and passed to whatever needs it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Remote-state backend kind (only "aws" is supported)
    pub state_store: String,
    pub aws_region: String,
    pub aws_s3_bucket: String,
    pub aws_dynamodb_table: String,
    /// Base URL that module repositories live under
    pub base_source: String,
    /// DigitalOcean provider token
    pub do_token: String,
    pub terraform_bin: String,
    pub git_bin: String,
    /// Root for task working directories
    pub work_dir: String,
    /// Leave working directories in place after each run
    pub keep_work_dirs: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            state_store: "aws".to_string(),
            aws_region: "us-west-2".to_string(),
            aws_s3_bucket: "wha-infra-terraform-state".to_string(),
            aws_dynamodb_table: "wha-infra-terraform-lock".to_string(),
            base_source: "https://github.com/w-h-a".to_string(),
            do_token: String::new(),
            terraform_bin: "terraform".to_string(),
            git_bin: "git".to_string(),
            work_dir: paths::default_work_dir().to_string_lossy().into_owned(),
            keep_work_dirs: false,
        }
    }
}

impl Settings {
    /// State bucket coordinates for the backend
    pub fn backend(&self) -> BackendSettings {
        BackendSettings {
            region: self.aws_region.clone(),
            bucket: self.aws_s3_bucket.clone(),
            lock_table: self.aws_dynamodb_table.clone(),
        }
    }

    /// Locator of a module repository under `base_source`
    pub fn module_source(&self, module: &str) -> String {
        format!("{}/{}.git", self.base_source.trim_end_matches('/'), module)
    }

    /// Working directory for the task named `task`
    pub fn task_dir(&self, task: &str) -> PathBuf {
        paths::expand(&self.work_dir).join(task)
    }
}

// ============================================================================
// Config File
// ============================================================================

/// Contents of the platctl config file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    /// Platforms to provision, in order
    #[serde(default)]
    pub platforms: Vec<Platform>,

    /// Declared inputs per capability (e.g. `[vars.service]`)
    #[serde(default)]
    pub vars: BTreeMap<String, BTreeMap<String, String>>,
}

impl Config {
    /// Load and check the config file at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;

        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        if let Ok(token) = std::env::var(ENV_DO_TOKEN) {
            config.settings.do_token = token;
        }

        if config.platforms.is_empty() {
            bail!("no platforms defined in the config file {}", path.display());
        }

        Ok(config)
    }

    /// Parse config from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Invalid TOML format")?;

        let mut names = HashSet::new();
        for platform in &config.platforms {
            platform.check()?;
            if !names.insert(platform.name.as_str()) {
                bail!("platform {} is declared more than once", platform.name);
            }
        }

        Ok(config)
    }

    /// Declared inputs for `capability`, overlaid with `overrides`
    pub fn capability_vars(
        &self,
        capability: Capability,
        overrides: &[(String, String)],
    ) -> BTreeMap<String, String> {
        let mut vars = self
            .vars
            .get(capability.as_str())
            .cloned()
            .unwrap_or_default();

        for (k, v) in overrides {
            vars.insert(k.clone(), v.clone());
        }

        vars
    }
}

//! Platform declarations and the steps each capability provisions
//!
//! A platform is a named environment spread over one or more provider
//! regions. Every capability first checks the remote-state backend, then
//! emits its per-region steps. Task names are
//! `<platform>-<env>-<region>-<provider>-<suffix>` and double as state keys,
//! so they must stay stable across runs.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use stepkit::{Step, Task, TaskOptions};

use crate::config::Settings;
use crate::paths;
use crate::tasks::{StateProbe, TerraformTask};

/// Provider whose cluster is reached through the local kube config
pub const LOCAL_PROVIDER: &str = "kind";

const DEFAULT_KUBE_CONFIG: &str = "~/.kube/config";

/// What a command provisions on each platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Kubernetes clusters
    Infra,
    /// Cluster access and namespaces
    K8s,
    Cockroach,
    Nats,
    Service,
    Runtime,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Infra => "infra",
            Self::K8s => "k8s",
            Self::Cockroach => "cockroach",
            Self::Nats => "nats",
            Self::Service => "service",
            Self::Runtime => "runtime",
        }
    }

    /// Module repository for capabilities deployed into a cluster
    fn workload_module(&self) -> Option<&'static str> {
        match self {
            Self::Infra | Self::K8s => None,
            Self::Cockroach => Some("cockroachdb"),
            Self::Nats => Some("nats"),
            Self::Service => Some("service"),
            Self::Runtime => Some("runtime"),
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One provider region of a platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub provider: String,
    pub region: String,
}

impl Region {
    fn is_local(&self) -> bool {
        self.provider == LOCAL_PROVIDER
    }
}

/// A named environment deployed to one or more regions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub name: String,
    pub env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    pub regions: Vec<Region>,
}

impl Platform {
    /// Reject declarations that would produce malformed or colliding task names
    ///
    /// Names end up in state keys, HCL strings and working directory paths,
    /// so every part is limited to ASCII letters, digits, `-` and `_`.
    pub fn check(&self) -> Result<()> {
        check_identifier("platform name", &self.name)?;
        check_identifier(&format!("env of platform {}", self.name), &self.env)?;

        if self.regions.is_empty() {
            bail!("platform {} has no regions", self.name);
        }

        let mut seen = HashSet::new();
        for r in &self.regions {
            check_identifier(&format!("provider of platform {}", self.name), &r.provider)?;
            check_identifier(&format!("region of platform {}", self.name), &r.region)?;

            if !seen.insert((r.provider.as_str(), r.region.as_str())) {
                bail!(
                    "platform {} lists {}/{} more than once",
                    self.name,
                    r.provider,
                    r.region
                );
            }
        }
        Ok(())
    }

    /// Steps that provision `capability` on this platform
    ///
    /// `vars` are the capability's declared inputs; only workload
    /// capabilities consume them.
    pub fn steps(
        &self,
        capability: Capability,
        settings: &Arc<Settings>,
        vars: &BTreeMap<String, String>,
    ) -> Vec<Step> {
        let mut steps = vec![self.state_check(settings)];

        for region in &self.regions {
            match capability {
                Capability::Infra => steps.push(self.cluster_step(region, settings)),
                Capability::K8s => steps.extend(self.access_steps(region, settings)),
                workload => {
                    if let Some(module) = workload.workload_module() {
                        steps.push(self.workload_step(workload, module, region, settings, vars));
                    }
                }
            }
        }

        steps
    }

    fn task_name(&self, region: &Region, suffix: &str) -> String {
        format!(
            "{}-{}-{}-{}-{}",
            self.name, self.env, region.region, region.provider, suffix
        )
    }

    fn options(&self, name: String, module: &str, settings: &Settings) -> TaskOptions {
        let path = settings.task_dir(&name);
        TaskOptions::new(name)
            .source(settings.module_source(module))
            .path(path)
    }

    fn state_check(&self, settings: &Settings) -> Step {
        Step::single(StateProbe::new(format!("{}-check-state", self.name), settings))
    }

    fn cluster_step(&self, region: &Region, settings: &Arc<Settings>) -> Step {
        let module = format!("kubernetes-{}", region.provider);
        let options = self
            .options(self.task_name(region, "k8s"), &module, settings)
            .var("do_token", &settings.do_token)
            .var("name", &self.name)
            .var("region", &region.region);

        Step::single(TerraformTask::new(options, Arc::clone(settings)))
    }

    /// Cluster credentials task, absent for local clusters
    fn kubeconfig_task(&self, region: &Region, settings: &Arc<Settings>) -> Option<TerraformTask> {
        if region.is_local() {
            return None;
        }

        let options = self
            .options(self.task_name(region, "kubeconfig"), "kubeconfig", settings)
            .remote_state("k8s", self.task_name(region, "k8s"))
            .var("do_token", &settings.do_token)
            .var("kubernetes", &region.provider);

        Some(TerraformTask::new(options, Arc::clone(settings)))
    }

    /// Where the cluster credentials for `region` end up
    fn kube_config_path(&self, region: &Region, settings: &Settings) -> String {
        if region.is_local() {
            return paths::expand_str(DEFAULT_KUBE_CONFIG);
        }

        settings
            .task_dir(&self.task_name(region, "kubeconfig"))
            .join("kubeconfig")
            .to_string_lossy()
            .into_owned()
    }

    fn access_steps(&self, region: &Region, settings: &Arc<Settings>) -> Vec<Step> {
        let mut steps = Vec::new();

        if let Some(kubeconfig) = self.kubeconfig_task(region, settings) {
            steps.push(Step::single(kubeconfig));
        }

        let options = self
            .options(
                self.task_name(region, "namespaces"),
                "kubernetes-namespaces",
                settings,
            )
            .env_var("KUBE_CONFIG_PATH", self.kube_config_path(region, settings))
            .var(
                "resource_namespace",
                format!("{}-resource", self.name).to_lowercase(),
            );

        steps.push(Step::single(TerraformTask::new(options, Arc::clone(settings))));
        steps
    }

    fn workload_step(
        &self,
        capability: Capability,
        module: &str,
        region: &Region,
        settings: &Arc<Settings>,
        vars: &BTreeMap<String, String>,
    ) -> Step {
        let mut step = Step::default();

        let mut options = self
            .options(self.task_name(region, capability.as_str()), module, settings)
            .env_var("KUBE_CONFIG_PATH", self.kube_config_path(region, settings))
            .vars(vars.clone())
            .var("name", &self.name)
            .var("env", &self.env);

        if let Some(domain) = &self.domain {
            options = options.var("domain", domain);
        }

        if let Some(kubeconfig) = self.kubeconfig_task(region, settings) {
            options = options.remote_state("kubeconfig", kubeconfig.options().name.clone());
            step.push(kubeconfig);
        }

        step.push(TerraformTask::new(options, Arc::clone(settings)));
        step
    }
}

fn check_identifier(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        bail!("{what} must not be empty");
    }
    if let Some(c) = value
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        bail!("{what} {value:?} contains {c:?}; use letters, digits, '-' or '_'");
    }
    Ok(())
}

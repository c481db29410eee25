//! Task that provisions a module with terraform
//!
//! `validate` checks the source locator, clones the module into the task's
//! working directory, writes the backend artifacts, and runs `terraform init`
//! and `terraform validate`. The remaining verbs run the matching terraform
//! subcommand in that directory.

pub mod render;
pub mod source;

use std::fs;
use std::io;
use std::process::Command;
use std::sync::Arc;

use stepkit::{Result, Task, TaskError, TaskOptions};

use crate::config::Settings;
use crate::runner;

/// Prefix terraform reads input variables from
const TF_VAR_PREFIX: &str = "TF_VAR_";

#[derive(Debug)]
pub struct TerraformTask {
    options: TaskOptions,
    settings: Arc<Settings>,
}

impl TerraformTask {
    pub fn new(options: TaskOptions, settings: Arc<Settings>) -> Self {
        Self { options, settings }
    }

    /// Build a terraform invocation in the working directory
    ///
    /// The child inherits this process's environment, plus the task's
    /// `env_vars` and one `TF_VAR_<name>` per declared input.
    fn command(&self, args: &[&str]) -> Result<Command> {
        let program = runner::find_program(self.name(), &self.settings.terraform_bin)?;

        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(&self.options.path);

        cmd.envs(&self.options.env_vars);
        for (name, value) in &self.options.vars {
            cmd.env(format!("{TF_VAR_PREFIX}{name}"), value);
        }

        Ok(cmd)
    }

    fn terraform(&self, args: &[&str]) -> Result<()> {
        let cmd = self.command(args)?;
        runner::run(self.name(), cmd)
    }
}

impl Task for TerraformTask {
    fn options(&self) -> &TaskOptions {
        &self.options
    }

    fn validate(&self) -> Result<()> {
        let name = self.name();
        let url = source::parse(name, &self.options.source)?;

        fs::create_dir_all(&self.options.path)
            .map_err(|e| TaskError::io(name, &self.options.path, e))?;

        source::fetch(name, &self.settings.git_bin, &url, &self.options.path)?;

        render::write_artifacts(
            name,
            &self.options.path,
            &self.settings.state_store,
            &self.settings.backend(),
            &self.options.remote_states,
        )?;

        self.terraform(&["init", "-input=false"])?;
        self.terraform(&["validate"])
    }

    fn plan(&self) -> Result<()> {
        self.terraform(&["plan", "-input=false"])
    }

    fn apply(&self) -> Result<()> {
        self.terraform(&["apply", "-input=false", "-auto-approve"])
    }

    fn destroy(&self) -> Result<()> {
        self.terraform(&["destroy", "-input=false", "-auto-approve"])
    }

    fn finalize(&self) -> Result<()> {
        let path = &self.options.path;

        if self.settings.keep_work_dirs {
            log::info!("[{}] keeping {}", self.name(), path.display());
            return Ok(());
        }

        match fs::remove_dir_all(path) {
            Ok(()) => {
                log::debug!("[{}] removed {}", self.name(), path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(TaskError::io(self.name(), path, e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Write an executable shell script into `dir`
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn settings(terraform: &Path, git: &Path) -> Arc<Settings> {
        Arc::new(Settings {
            terraform_bin: terraform.to_string_lossy().into_owned(),
            git_bin: git.to_string_lossy().into_owned(),
            ..Default::default()
        })
    }

    fn options(work: &Path) -> TaskOptions {
        TaskOptions::new("p-prod-nyc1-do-nats")
            .source("https://github.com/w-h-a/nats.git")
            .path(work)
            .var("name", "p")
            .env_var("KUBE_CONFIG_PATH", "/tmp/kubeconfig")
            .remote_state("kubeconfig", "p-prod-nyc1-do-kubeconfig")
    }

    #[test]
    fn test_unsupported_scheme_has_no_side_effects() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        let bin = script(root.path(), "tool", "exit 0");

        let task = TerraformTask::new(
            options(&work).source("ftp://example.com/mod.git"),
            settings(&bin, &bin),
        );
        let err = task.validate().unwrap_err();

        assert!(matches!(err, TaskError::UnsupportedScheme { ref scheme, .. } if scheme == "ftp"));
        assert!(!work.exists());
    }

    #[test]
    fn test_validate_clones_renders_and_runs_init() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        let calls = root.path().join("calls.log");

        // Fake git: create the checkout at the last argument
        let git = script(
            root.path(),
            "git",
            "for last; do :; done; mkdir -p \"$last/.git\"",
        );
        let terraform = script(
            root.path(),
            "terraform",
            &format!(
                "echo \"$* $TF_VAR_name $KUBE_CONFIG_PATH\" >> {}",
                calls.display()
            ),
        );

        let task = TerraformTask::new(options(&work), settings(&terraform, &git));
        task.validate().unwrap();

        assert!(work.join(".git").is_dir());
        let backend = fs::read_to_string(work.join(render::BACKEND_FILE)).unwrap();
        assert!(backend.contains("key            = \"p-prod-nyc1-do-nats\""));
        let refs = fs::read_to_string(work.join(render::REMOTE_STATES_FILE)).unwrap();
        assert!(refs.contains("\"kubeconfig\""));

        let calls = fs::read_to_string(&calls).unwrap();
        assert_eq!(
            calls.lines().collect::<Vec<_>>(),
            vec![
                "init -input=false p /tmp/kubeconfig",
                "validate p /tmp/kubeconfig",
            ]
        );
    }

    #[test]
    fn test_repeat_validate_skips_clone() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(work.join(".git")).unwrap();

        let git = script(root.path(), "git", "exit 1");
        let terraform = script(root.path(), "terraform", "exit 0");

        let task = TerraformTask::new(options(&work), settings(&terraform, &git));
        task.validate().unwrap();
        task.validate().unwrap();
    }

    #[test]
    fn test_failed_plan_is_process_error() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(&work).unwrap();
        let terraform = script(root.path(), "terraform", "exit 2");

        let task = TerraformTask::new(options(&work), settings(&terraform, &terraform));
        let err = task.plan().unwrap_err();

        assert!(matches!(
            err,
            TaskError::ProcessFailed { ref status, .. } if status.code() == Some(2)
        ));
    }

    #[test]
    fn test_command_environment() {
        let root = tempfile::tempdir().unwrap();
        let terraform = script(root.path(), "terraform", "exit 0");

        let task = TerraformTask::new(options(root.path()), settings(&terraform, &terraform));
        let cmd = task.command(&["plan"]).unwrap();

        let envs: Vec<_> = cmd.get_envs().collect();
        assert!(envs.contains(&(OsStr::new("TF_VAR_name"), Some(OsStr::new("p")))));
        assert!(envs.contains(&(
            OsStr::new("KUBE_CONFIG_PATH"),
            Some(OsStr::new("/tmp/kubeconfig"))
        )));
        assert_eq!(cmd.get_current_dir(), Some(root.path()));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(work.join("nested")).unwrap();
        let bin = script(root.path(), "tool", "exit 0");

        let task = TerraformTask::new(options(&work), settings(&bin, &bin));
        task.finalize().unwrap();
        assert!(!work.exists());
        task.finalize().unwrap();
    }

    #[test]
    fn test_finalize_keeps_work_dir_when_asked() {
        let root = tempfile::tempdir().unwrap();
        let work = root.path().join("work");
        fs::create_dir_all(&work).unwrap();

        let settings = Arc::new(Settings {
            keep_work_dirs: true,
            ..Default::default()
        });
        let task = TerraformTask::new(options(&work), settings);
        task.finalize().unwrap();
        assert!(work.exists());
    }

    #[test]
    fn test_connectivity_detection() {
        let bin = PathBuf::from("/bin/true");
        let task = TerraformTask::new(
            TaskOptions::new("p-prod-nyc1-do-kubeconfig")
                .source("https://github.com/w-h-a/kubeconfig.git"),
            settings(&bin, &bin),
        );
        assert!(task.is_connectivity_bootstrap());
    }
}

//! Source locator checks and module checkout

use std::path::Path;
use std::process::Command;

use stepkit::{Result, TaskError};
use url::Url;

use crate::runner;

/// Parse `source` and require an http(s) scheme
///
/// Does no I/O, so a bad locator is rejected before anything is created.
pub fn parse(task: &str, source: &str) -> Result<Url> {
    let url = Url::parse(source).map_err(|e| TaskError::InvalidSource {
        task: task.to_string(),
        source_url: source.to_string(),
        message: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(TaskError::UnsupportedScheme {
            task: task.to_string(),
            scheme: scheme.to_string(),
        }),
    }
}

/// Clone `url` into `dest` unless a checkout is already there
pub fn fetch(task: &str, git: &str, url: &Url, dest: &Path) -> Result<()> {
    if dest.join(".git").is_dir() {
        log::debug!("[{task}] {} already cloned, skipping", dest.display());
        return Ok(());
    }

    let fetch_error = |message: String| TaskError::SourceFetch {
        task: task.to_string(),
        source_url: url.to_string(),
        message,
    };

    let program = runner::find_program(task, git).map_err(|e| fetch_error(e.to_string()))?;

    log::info!("[{task}] cloning repo {url}");

    let mut cmd = Command::new(program);
    cmd.args(["clone", "--progress", url.as_str()]).arg(dest);

    runner::run(task, cmd).map_err(|e| fetch_error(e.to_string()))?;

    log::info!("[{task}] successfully cloned repo {url}");
    Ok(())
}

//! Backend configuration artifacts written into a task's working directory

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use statestore::{BackendKind, BackendSettings};
use stepkit::{Result, TaskError};

pub const BACKEND_FILE: &str = "backend-config.tf";
pub const REMOTE_STATES_FILE: &str = "remote-state-data-sources.tf";

/// `terraform { backend "s3" { ... } }` block storing state under `key`
pub fn backend_config(backend: &BackendSettings, key: &str) -> String {
    let mut out = String::from("terraform {\n  backend \"s3\" {\n");
    push_coordinates(&mut out, backend, key, "    ");
    out.push_str("  }\n}\n");
    out
}

/// One `terraform_remote_state` data source per reference, in key order
pub fn remote_state_sources(backend: &BackendSettings, refs: &BTreeMap<String, String>) -> String {
    let mut out = String::new();

    for (name, key) in refs {
        if !out.is_empty() {
            out.push('\n');
        }
        let _ = writeln!(out, "data \"terraform_remote_state\" \"{name}\" {{");
        out.push_str("  backend = \"s3\"\n\n  config = {\n");
        push_coordinates(&mut out, backend, key, "    ");
        out.push_str("  }\n}\n");
    }

    out
}

fn push_coordinates(out: &mut String, backend: &BackendSettings, key: &str, indent: &str) {
    let _ = writeln!(out, "{indent}bucket         = {}", quote(&backend.bucket));
    let _ = writeln!(out, "{indent}dynamodb_table = {}", quote(&backend.lock_table));
    let _ = writeln!(out, "{indent}key            = {}", quote(key));
    let _ = writeln!(out, "{indent}region         = {}", quote(&backend.region));
}

/// HCL string literal with quotes, backslashes and template openers escaped
fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Write both artifacts into `dir`, replacing previous contents
pub fn write_artifacts(
    task: &str,
    dir: &Path,
    state_store: &str,
    backend: &BackendSettings,
    refs: &BTreeMap<String, String>,
) -> Result<()> {
    let kind: BackendKind = state_store
        .parse()
        .map_err(|_| TaskError::UnsupportedBackend {
            backend: state_store.to_string(),
        })?;

    match kind {
        BackendKind::Aws => {
            let backend_path = dir.join(BACKEND_FILE);
            fs::write(&backend_path, backend_config(backend, task))
                .map_err(|e| TaskError::io(task, &backend_path, e))?;

            let refs_path = dir.join(REMOTE_STATES_FILE);
            fs::write(&refs_path, remote_state_sources(backend, refs))
                .map_err(|e| TaskError::io(task, &refs_path, e))?;
        }
    }

    log::debug!("[{task}] wrote state files to {}", dir.display());
    Ok(())
}

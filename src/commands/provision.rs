//! Run one lifecycle verb for a capability across every configured platform

use anyhow::{Context as _, Result};
use std::sync::Arc;

use stepkit::Verb;

use crate::Context;
use crate::cli::{RunArgs, SettingsOverrides};
use crate::config::{Config, Settings};
use crate::paths;
use crate::platform::{Capability, Platform};
use crate::ui;

pub fn run(ctx: &Context, capability: Capability, verb: Verb, args: RunArgs) -> Result<()> {
    let path = paths::config_file(ctx.config.as_deref())?;
    log::debug!("Loading config from {}", path.display());

    let mut config = Config::load(&path)?;
    apply_overrides(&mut config.settings, &ctx.overrides, &args);

    if verb == Verb::Destroy && !args.yes && !confirm_destroy(capability, &config.platforms)? {
        ui::info("Destroy cancelled");
        return Ok(());
    }

    let settings = Arc::new(config.settings.clone());
    let vars = config.capability_vars(capability, &args.vars);

    for platform in &config.platforms {
        if !ctx.quiet {
            ui::header(&format!(
                "{capability} {verb}: {} ({})",
                platform.name, platform.env
            ));
        }

        let steps = platform.steps(capability, &settings, &vars);
        log::debug!("{} step(s) for platform {}", steps.len(), platform.name);

        stepkit::execute(verb, &steps)
            .with_context(|| format!("{verb} failed for platform {}", platform.name))?;
    }

    ui::success(&format!("{verb} succeeded"));
    Ok(())
}

/// Command-line values win over the config file
fn apply_overrides(settings: &mut Settings, overrides: &SettingsOverrides, args: &RunArgs) {
    let pairs = [
        (&overrides.do_token, &mut settings.do_token),
        (&overrides.aws_s3_bucket, &mut settings.aws_s3_bucket),
        (&overrides.aws_dynamodb_table, &mut settings.aws_dynamodb_table),
        (&overrides.base_source, &mut settings.base_source),
    ];

    for (value, slot) in pairs {
        if let Some(value) = value {
            slot.clone_from(value);
        }
    }

    if args.keep_work_dirs {
        settings.keep_work_dirs = true;
    }
}

fn confirm_destroy(capability: Capability, platforms: &[Platform]) -> Result<bool> {
    ui::warn(&format!("This destroys {capability} on:"));
    for p in platforms {
        let regions: Vec<_> = p
            .regions
            .iter()
            .map(|r| format!("{}/{}", r.provider, r.region))
            .collect();
        ui::kv(&format!("{} ({})", p.name, p.env), &regions.join(", "));
    }

    let confirmed = dialoguer::Confirm::new()
        .with_prompt("Continue?")
        .default(false)
        .interact()
        .context("Failed to read confirmation (pass --yes to skip)")?;

    Ok(confirmed)
}

/// Render the category and advice for a failed run
pub fn explain(err: &anyhow::Error) -> Option<(&'static str, &'static str)> {
    err.chain()
        .find_map(|e| e.downcast_ref::<stepkit::TaskError>())
        .map(|e| {
            let category = e.category();
            (category.description(), category.advice())
        })
}

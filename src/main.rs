mod cli;
mod commands;
mod config;
mod paths;
mod platform;
mod runner;
mod tasks;
mod ui;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::generate;
use cli::{Cli, Command, SettingsOverrides};
use std::io;
use std::process::ExitCode;

/// Global context for the application
pub struct Context {
    pub quiet: bool,
    /// Explicit config file from `--config`
    pub config: Option<String>,
    pub overrides: SettingsOverrides,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    env_logger::Builder::new()
        .filter_level(if cli.quiet {
            log::LevelFilter::Error
        } else {
            log_level
        })
        .format_timestamp(None)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            ui::error(&format!("{err:#}"));
            if let Some((category, advice)) = commands::provision::explain(&err) {
                ui::dim(&format!("{category}: {advice}"));
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let ctx = Context {
        quiet: cli.quiet,
        config: cli.config,
        overrides: cli.overrides,
    };

    match cli.command {
        Command::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "platctl", &mut io::stdout());
            Ok(())
        }
        command => match command.provision() {
            Some((capability, verb, args)) => commands::provision::run(&ctx, capability, verb, args),
            None => Ok(()),
        },
    }
}

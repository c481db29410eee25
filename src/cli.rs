use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use stepkit::Verb;

use crate::platform::Capability;

#[derive(Parser)]
#[command(name = "platctl")]
#[command(version)]
#[command(about = "Provision platforms: clusters, cluster access, and the workloads on them", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(flatten)]
    pub overrides: SettingsOverrides,

    #[command(subcommand)]
    pub command: Command,
}

/// Settings that can be given on the command line instead of the config file
#[derive(Args, Debug, Default, Clone)]
pub struct SettingsOverrides {
    /// DigitalOcean provider token
    #[arg(short, long, global = true)]
    pub do_token: Option<String>,

    /// S3 bucket holding remote state
    #[arg(short = 'b', long, global = true)]
    pub aws_s3_bucket: Option<String>,

    /// DynamoDB table used for state locks
    #[arg(short = 't', long, global = true)]
    pub aws_dynamodb_table: Option<String>,

    /// Base URL of the module repositories
    #[arg(short = 's', long, global = true)]
    pub base_source: Option<String>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage the platform's kubernetes clusters
    #[command(subcommand)]
    Infra(InfraCommand),

    /// Manage the platform's k8s access and namespaces
    #[command(subcommand)]
    K8s(VerbCommand),

    /// Manage the platform's cockroachdb
    #[command(subcommand)]
    Cockroach(VerbCommand),

    /// Manage the platform's nats
    #[command(subcommand)]
    Nats(VerbCommand),

    /// Manage the platform's services
    #[command(subcommand)]
    Service(VerbCommand),

    /// Manage the platform's runtime
    #[command(subcommand)]
    Runtime(VerbCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Command {
    /// Capability and verb for provisioning commands
    pub fn provision(self) -> Option<(Capability, Verb, RunArgs)> {
        let (capability, verb) = match self {
            Self::Infra(cmd) => (Capability::Infra, VerbCommand::from(cmd)),
            Self::K8s(cmd) => (Capability::K8s, cmd),
            Self::Cockroach(cmd) => (Capability::Cockroach, cmd),
            Self::Nats(cmd) => (Capability::Nats, cmd),
            Self::Service(cmd) => (Capability::Service, cmd),
            Self::Runtime(cmd) => (Capability::Runtime, cmd),
            Self::Completions { .. } => return None,
        };

        let (verb, args) = verb.split();
        Some((capability, verb, args))
    }
}

// ============================================================================
// Verbs
// ============================================================================

/// Clusters only support the read-only verbs
#[derive(Subcommand)]
pub enum InfraCommand {
    /// Validate infra
    Validate(RunArgs),

    /// Plan infra
    Plan(RunArgs),
}

impl From<InfraCommand> for VerbCommand {
    fn from(cmd: InfraCommand) -> Self {
        match cmd {
            InfraCommand::Validate(args) => Self::Validate(args),
            InfraCommand::Plan(args) => Self::Plan(args),
        }
    }
}

#[derive(Subcommand)]
pub enum VerbCommand {
    /// Fetch modules and validate them
    Validate(RunArgs),

    /// Show what apply would change
    Plan(RunArgs),

    /// Create or update resources
    Apply(RunArgs),

    /// Tear resources down, cluster access last
    Destroy(RunArgs),
}

impl VerbCommand {
    pub fn split(self) -> (Verb, RunArgs) {
        match self {
            Self::Validate(args) => (Verb::Validate, args),
            Self::Plan(args) => (Verb::Plan, args),
            Self::Apply(args) => (Verb::Apply, args),
            Self::Destroy(args) => (Verb::Destroy, args),
        }
    }
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Skip the confirmation prompt on destroy
    #[arg(short, long)]
    pub yes: bool,

    /// Leave task working directories in place
    #[arg(long)]
    pub keep_work_dirs: bool,

    /// Module input as KEY=VALUE (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_var)]
    pub vars: Vec<(String, String)>,
}

fn parse_var(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))?;

    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing key in '{s}'"));
    }

    Ok((key.to_string(), value.to_string()))
}

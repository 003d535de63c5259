//! CLI argument parsing.
//!
//! The CLI stays thin: each subcommand maps onto one workflow handler and all
//! deployment settings live in the config file.
use crate::config::Preset;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "site-deploy",
    version,
    about = "Deploy the results page: copy markup, run the scheduler, publish its JSON",
    after_help = "Commands:\n  init      Write a deploy.json for a preset\n  validate  Check config and environment without writing anything\n  plan      Show the ordered steps and what each would change\n  run       Execute the deployment, stopping at the first failure\n\nExamples:\n  site-deploy init --preset server --dest-root /var/www/html\n  site-deploy plan --json\n  site-deploy run",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Path to deploy.json (else $SITE_DEPLOY_CONFIG, ./deploy.json, the user config dir)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log step details at debug level
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    /// Check config and environment without writing anything
    Validate(RootOverrides),
    Plan(PlanArgs),
    /// Execute the deployment, stopping at the first failure
    Run(RootOverrides),
}

#[derive(Parser, Debug)]
#[command(about = "Write a config stub for a deployment preset")]
pub struct InitArgs {
    /// Which deploy script variant to start from
    #[arg(long, value_enum, default_value_t = Preset::Local)]
    pub preset: Preset,

    /// Overwrite an existing config
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub roots: RootOverrides,
}

// Per-invocation overrides for the two configured roots.
#[derive(Parser, Debug, Default, Clone)]
pub struct RootOverrides {
    /// Directory holding index.html and the scheduler
    #[arg(long, value_name = "DIR")]
    pub source_root: Option<PathBuf>,

    /// Web server document root
    #[arg(long, value_name = "DIR")]
    pub dest_root: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[command(about = "Show the ordered steps without running them")]
pub struct PlanArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub roots: RootOverrides,
}

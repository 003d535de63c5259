use clap::Parser;
use std::process::ExitCode;

mod cli;
mod config;
mod environment;
mod error;
mod job;
mod layout;
mod logging;
mod sequencer;
mod staging;
mod steps;
mod util;
mod workflow;

use cli::{Command, RootArgs};
use error::DeployError;

fn main() -> ExitCode {
    let args = RootArgs::parse();
    if let Err(err) = logging::init_logging(args.verbose) {
        eprintln!("warning: {err}");
    }

    let config = args.config.as_deref();
    let result = match &args.command {
        Command::Init(init) => workflow::run_init(config, init),
        Command::Validate(roots) => workflow::run_validate(config, roots),
        Command::Plan(plan) => workflow::run_plan(config, plan),
        Command::Run(roots) => workflow::run_run(config, roots),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

/// Exit status for a failed command: the typed code when the chain carries a
/// `DeployError`, otherwise 1.
fn exit_code_for(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<DeployError>())
        .map(DeployError::exit_code)
        .unwrap_or(1)
}

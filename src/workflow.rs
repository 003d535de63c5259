//! Command handlers for `init`, `validate`, `plan`, and `run`.
//!
//! Handlers own config lookup and user-facing output; the sequencing itself
//! lives in `sequencer`.
use crate::cli::{InitArgs, PlanArgs, RootOverrides};
use crate::config::{
    config_path_for_write, default_config, load_config, locate_config, validate_config,
    write_config, DeployConfig,
};
use crate::job::ProcessRunner;
use crate::layout::SiteLayout;
use crate::sequencer::DeploymentJob;
use crate::steps::{build_steps, plan_steps, PlannedStep, Step, TargetState};
use crate::util::display_path;
use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

pub fn run_init(config_path: Option<&Path>, args: &InitArgs) -> Result<()> {
    let path = config_path_for_write(config_path);
    if path.is_file() && !args.force {
        return Err(anyhow!(
            "config already exists at {} (use --force to overwrite)",
            path.display()
        ));
    }
    let source_root = args.roots.source_root.as_deref().map(absolutize).transpose()?;
    let dest_root = args.roots.dest_root.as_deref().map(absolutize).transpose()?;
    let config = default_config(args.preset, source_root, dest_root)?;
    validate_config(&config)?;
    write_config(&path, &config)?;
    println!("wrote {}", path.display());
    Ok(())
}

pub fn run_validate(config_path: Option<&Path>, overrides: &RootOverrides) -> Result<()> {
    let config = load_effective_config(config_path, overrides)?;
    let job = DeploymentJob::from_config(&config)?;
    for planned in plan_steps(job.steps())? {
        if planned.state == TargetState::Missing {
            tracing::warn!(step = planned.name, "{}: input missing", planned.description);
        }
    }
    println!(
        "config ok: {} steps, job program {}",
        job.steps().len(),
        job.job().program.display()
    );
    Ok(())
}

pub fn run_plan(config_path: Option<&Path>, args: &PlanArgs) -> Result<()> {
    let config = load_effective_config(config_path, &args.roots)?;
    let layout = SiteLayout::from_config(&config);
    let planned = plan_steps(&build_steps(&config, &layout))?;
    if args.json {
        let text = serde_json::to_string_pretty(&planned).context("serialize plan")?;
        println!("{text}");
        return Ok(());
    }
    println!(
        "deploy {} -> {}",
        layout.source_root().display(),
        layout.dest_root().display()
    );
    for entry in &planned {
        println!("{}", format_planned_step(entry, layout.source_root()));
    }
    Ok(())
}

pub fn run_run(config_path: Option<&Path>, overrides: &RootOverrides) -> Result<()> {
    let config = load_effective_config(config_path, overrides)?;
    let job = DeploymentJob::from_config(&config)?;
    let reports = job.execute(&ProcessRunner)?;
    let elapsed_ms: u128 = reports.iter().map(|report| report.elapsed_ms).sum();
    tracing::info!(steps = reports.len(), elapsed_ms, "deploy complete");
    println!(
        "deployed {} ({} steps, {elapsed_ms} ms)",
        job.layout().dest_root().display(),
        reports.len()
    );
    Ok(())
}

/// Load the located config and apply command-line root overrides.
fn load_effective_config(
    config_path: Option<&Path>,
    overrides: &RootOverrides,
) -> Result<DeployConfig> {
    let path = locate_config(config_path);
    tracing::debug!(config = %path.display(), "loading config");
    let mut config = load_config(&path)?;
    if let Some(source_root) = overrides.source_root.as_deref() {
        config.source_root = absolutize(source_root)?;
    }
    if let Some(dest_root) = overrides.dest_root.as_deref() {
        config.dest_root = absolutize(dest_root)?;
    }
    validate_config(&config)?;
    Ok(config)
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("resolve current directory")?;
    Ok(cwd.join(path))
}

fn format_planned_step(entry: &PlannedStep, source_root: &Path) -> String {
    let state = match entry.state {
        TargetState::UpToDate => "up to date",
        TargetState::WillChange => "will change",
        TargetState::Missing => "MISSING",
        TargetState::ProducedByJob => "from job",
        TargetState::WillRun => "will run",
    };
    let description = match &entry.step {
        Step::CopyMarkup { source, dest } | Step::CopyArtifact { source, dest } => format!(
            "copy {} -> {}",
            display_path(source, Some(source_root)),
            dest.display()
        ),
        _ => entry.description.clone(),
    };
    format!(
        "{:>2}. {:<18} [{state}] {description}",
        entry.index, entry.name
    )
}

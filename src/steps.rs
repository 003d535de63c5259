//! The ordered step list and its dry-run plan.
use crate::config::DeployConfig;
use crate::job::Privilege;
use crate::layout::SiteLayout;
use crate::staging::collect_files_recursive;
use crate::util::files_match;
use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// One side-effecting action of a deployment.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Step {
    EnsureDestination {
        path: PathBuf,
        create: bool,
    },
    MirrorAssets {
        source: PathBuf,
        dest: PathBuf,
    },
    CopyMarkup {
        source: PathBuf,
        dest: PathBuf,
    },
    RunJob {
        command: String,
        cwd: PathBuf,
        privilege: Privilege,
    },
    CopyArtifact {
        source: PathBuf,
        dest: PathBuf,
    },
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Step::EnsureDestination { .. } => "ensure-destination",
            Step::MirrorAssets { .. } => "mirror-assets",
            Step::CopyMarkup { .. } => "copy-markup",
            Step::RunJob { .. } => "run-job",
            Step::CopyArtifact { .. } => "copy-artifact",
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Step::EnsureDestination { path, create: true } => {
                format!("create {} if absent", path.display())
            }
            Step::EnsureDestination {
                path,
                create: false,
            } => format!("require {} to exist", path.display()),
            Step::MirrorAssets { source, dest } => {
                format!("replace {} with {}", dest.display(), source.display())
            }
            Step::CopyMarkup { source, dest } | Step::CopyArtifact { source, dest } => {
                format!("copy {} to {}", source.display(), dest.display())
            }
            Step::RunJob {
                command,
                cwd,
                privilege,
            } => {
                let via = match privilege {
                    Privilege::Inherit => "",
                    Privilege::Sudo => " via sudo",
                };
                format!("run `{command}`{via} in {}", cwd.display())
            }
        }
    }
}

/// Build the fixed step order for a config.
pub fn build_steps(config: &DeployConfig, layout: &SiteLayout) -> Vec<Step> {
    let mut steps = vec![Step::EnsureDestination {
        path: layout.dest_root().to_path_buf(),
        create: config.create_dest_root,
    }];
    if config.mirror_assets {
        steps.push(Step::MirrorAssets {
            source: layout.source_assets(),
            dest: layout.dest_assets(),
        });
    }
    steps.push(Step::CopyMarkup {
        source: layout.source_markup(),
        dest: layout.dest_markup(),
    });
    steps.push(Step::RunJob {
        command: config.job.command.clone(),
        cwd: layout.source_root().to_path_buf(),
        privilege: config.job.privilege,
    });
    steps.push(Step::CopyArtifact {
        source: layout.source_artifact(),
        dest: layout.dest_artifact(),
    });
    steps
}

/// What a step would do to its target if run now.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TargetState {
    UpToDate,
    WillChange,
    /// An input the step needs is absent; the run would abort here.
    Missing,
    /// The input is regenerated by the job, so it cannot be compared yet.
    ProducedByJob,
    WillRun,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub index: usize,
    pub name: &'static str,
    pub description: String,
    pub state: TargetState,
    pub step: Step,
}

/// Inspect the filesystem and report each step's expected effect.
pub fn plan_steps(steps: &[Step]) -> Result<Vec<PlannedStep>> {
    steps
        .iter()
        .enumerate()
        .map(|(index, step)| {
            Ok(PlannedStep {
                index: index + 1,
                name: step.name(),
                description: step.describe(),
                state: target_state(step)?,
                step: step.clone(),
            })
        })
        .collect()
}

fn target_state(step: &Step) -> Result<TargetState> {
    let state = match step {
        Step::EnsureDestination { path, create } => {
            if path.is_dir() {
                TargetState::UpToDate
            } else if *create {
                TargetState::WillChange
            } else {
                TargetState::Missing
            }
        }
        Step::MirrorAssets { source, dest } => {
            if !source.is_dir() {
                TargetState::Missing
            } else if trees_match(source, dest)? {
                TargetState::UpToDate
            } else {
                TargetState::WillChange
            }
        }
        Step::CopyMarkup { source, dest } => copy_state(source, dest)?,
        Step::RunJob { .. } => TargetState::WillRun,
        Step::CopyArtifact { .. } => TargetState::ProducedByJob,
    };
    Ok(state)
}

fn copy_state(source: &Path, dest: &Path) -> Result<TargetState> {
    if !source.is_file() {
        return Ok(TargetState::Missing);
    }
    if files_match(source, dest)? {
        Ok(TargetState::UpToDate)
    } else {
        Ok(TargetState::WillChange)
    }
}

fn trees_match(source: &Path, dest: &Path) -> Result<bool> {
    let source_files = collect_files_recursive(source)?;
    let dest_files = collect_files_recursive(dest)?;
    if source_files.len() != dest_files.len() {
        return Ok(false);
    }
    for (left, right) in source_files.iter().zip(&dest_files) {
        if left.strip_prefix(source).ok() != right.strip_prefix(dest).ok() {
            return Ok(false);
        }
        if !files_match(left, right)? {
            return Ok(false);
        }
    }
    Ok(true)
}

//! Fail-fast execution of a deployment.
//!
//! A `DeploymentJob` is built once per invocation, runs its steps strictly in
//! order, and stops at the first failure. Nothing is retried and nothing is
//! resumed; running again from the first step is the recovery path.
use crate::config::{validate_config, DeployConfig};
use crate::environment;
use crate::error::DeployError;
use crate::job::{JobInvocation, JobRunner};
use crate::layout::SiteLayout;
use crate::staging::{ensure_dir, mirror_dir, publish_file};
use crate::steps::{build_steps, Step};
use std::time::Instant;

/// Ordered steps plus the resolved job they run.
#[derive(Debug, Clone)]
pub struct DeploymentJob {
    layout: SiteLayout,
    steps: Vec<Step>,
    job: JobInvocation,
}

/// Timing for one completed step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub name: &'static str,
    pub elapsed_ms: u128,
}

impl DeploymentJob {
    /// Validate the config, activate the environment, and resolve the job.
    ///
    /// Fails before any filesystem write when the source root is missing or
    /// the environment cannot be activated.
    pub fn from_config(config: &DeployConfig) -> Result<Self, DeployError> {
        validate_config(config)?;
        if !config.source_root.is_dir() {
            return Err(DeployError::MissingArtifact {
                path: config.source_root.clone(),
            });
        }
        let activated = environment::activate(config)?;
        let job = environment::prepare_job(config, &activated)?;
        Ok(Self::new(config, job))
    }

    pub fn new(config: &DeployConfig, job: JobInvocation) -> Self {
        let layout = SiteLayout::from_config(config);
        let steps = build_steps(config, &layout);
        Self { layout, steps, job }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn layout(&self) -> &SiteLayout {
        &self.layout
    }

    pub fn job(&self) -> &JobInvocation {
        &self.job
    }

    /// Run every step in order, stopping at the first error.
    pub fn execute<R>(&self, runner: &R) -> Result<Vec<StepReport>, DeployError>
    where
        R: JobRunner + ?Sized,
    {
        let span = tracing::info_span!(
            "deploy",
            source = %self.layout.source_root().display(),
            dest = %self.layout.dest_root().display()
        );
        let _guard = span.enter();

        let total = self.steps.len();
        let mut reports = Vec::with_capacity(total);
        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();
            tracing::info!(step = name, index = index + 1, total, "{}", step.describe());
            let start = Instant::now();
            if let Err(err) = self.run_step(step, runner) {
                tracing::error!(step = name, error = %err, "step failed");
                return Err(err);
            }
            let elapsed_ms = start.elapsed().as_millis();
            tracing::info!(step = name, elapsed_ms, "step complete");
            reports.push(StepReport { name, elapsed_ms });
        }
        Ok(reports)
    }

    fn run_step<R>(&self, step: &Step, runner: &R) -> Result<(), DeployError>
    where
        R: JobRunner + ?Sized,
    {
        match step {
            Step::EnsureDestination { path, create } => {
                if *create {
                    ensure_dir(path)
                } else if path.is_dir() {
                    Ok(())
                } else {
                    Err(DeployError::MissingDestination { path: path.clone() })
                }
            }
            Step::MirrorAssets { source, dest } => {
                let files = mirror_dir(source, dest)?;
                tracing::debug!(files, "assets mirrored");
                Ok(())
            }
            Step::CopyMarkup { source, dest } | Step::CopyArtifact { source, dest } => {
                let bytes = publish_file(source, dest)?;
                tracing::debug!(bytes, dest = %dest.display(), "published");
                Ok(())
            }
            Step::RunJob { .. } => {
                let exit = runner.run(&self.job)?;
                if exit.success {
                    Ok(())
                } else {
                    Err(DeployError::JobFailed {
                        command: self.job.command.clone(),
                        code: exit.code,
                    })
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "sequencer_tests.rs"]
mod tests;

//! External job invocation.
//!
//! The job is opaque: it runs to completion from the source root and its exit
//! status is the only signal. Privilege escalation is an explicit field on the
//! invocation rather than ambient state.
use crate::error::DeployError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::Instant;

/// Environment variables always forwarded through `sudo`.
const SUDO_PRESERVED_ENV: [&str; 2] = ["PATH", "VIRTUAL_ENV"];

/// Capability the job runs with.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Privilege {
    /// Run as the invoking user.
    #[default]
    Inherit,
    /// Run through `sudo`.
    Sudo,
}

/// A fully resolved job ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInvocation {
    /// Original command line, used for diagnostics.
    pub command: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: BTreeMap<String, OsString>,
    pub privilege: Privilege,
    /// Resolved `sudo` binary; required when `privilege` is `Sudo`.
    pub sudo: Option<PathBuf>,
}

/// Observed outcome of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobExit {
    pub success: bool,
    pub code: Option<i32>,
}

impl From<ExitStatus> for JobExit {
    fn from(status: ExitStatus) -> Self {
        Self {
            success: status.success(),
            code: status.code(),
        }
    }
}

/// Seam between the sequencer and process execution.
pub trait JobRunner {
    /// Run the job to completion, blocking until it exits.
    fn run(&self, job: &JobInvocation) -> Result<JobExit, DeployError>;
}

/// Spawns the job as a child process with inherited stdio and no timeout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl JobRunner for ProcessRunner {
    fn run(&self, job: &JobInvocation) -> Result<JobExit, DeployError> {
        let mut command = build_command(job)?;
        let start = Instant::now();
        let status = command.status().map_err(|source| DeployError::JobSpawn {
            command: job.command.clone(),
            source,
        })?;
        let elapsed_ms = start.elapsed().as_millis();
        tracing::info!(
            elapsed_ms,
            code = status.code(),
            command = %job.command,
            "job exited"
        );
        Ok(status.into())
    }
}

/// Build the process command for an invocation, wrapping it in `sudo` when
/// escalation is requested and the process is not already privileged.
pub fn build_command(job: &JobInvocation) -> Result<Command, DeployError> {
    let mut command = if needs_sudo(job.privilege) {
        let sudo = job.sudo.as_ref().ok_or_else(|| DeployError::PermissionDenied {
            detail: format!("`{}` requires sudo, which was not found", job.command),
            source: None,
        })?;
        let mut command = Command::new(sudo);
        command
            .arg(format!("--preserve-env={}", sudo_preserved_env(job)))
            .arg("--")
            .arg(&job.program);
        command
    } else {
        Command::new(&job.program)
    };
    command.args(&job.args).current_dir(&job.cwd);
    for (key, value) in &job.env {
        command.env(key, value);
    }
    Ok(command)
}

/// Comma-separated names `sudo` keeps under `env_reset`: the activation
/// variables plus every variable set on the job.
fn sudo_preserved_env(job: &JobInvocation) -> String {
    let mut names: Vec<&str> = SUDO_PRESERVED_ENV.to_vec();
    for key in job.env.keys() {
        if !names.contains(&key.as_str()) {
            names.push(key);
        }
    }
    names.join(",")
}

fn needs_sudo(privilege: Privilege) -> bool {
    match privilege {
        Privilege::Inherit => false,
        Privilege::Sudo => !running_as_root(),
    }
}

#[cfg(unix)]
fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}

#[cfg(not(unix))]
fn running_as_root() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn invocation(privilege: Privilege, sudo: Option<PathBuf>) -> JobInvocation {
        JobInvocation {
            command: "python scheduler.py".to_string(),
            program: PathBuf::from("/opt/venv/bin/python"),
            args: vec!["scheduler.py".to_string()],
            cwd: PathBuf::from("/srv/site"),
            env: BTreeMap::from([
                ("OPENAI_API_KEY".to_string(), OsString::from("k")),
                ("VIRTUAL_ENV".to_string(), OsString::from("/opt/venv")),
            ]),
            privilege,
            sudo,
        }
    }

    #[test]
    fn inherit_runs_program_directly() {
        let command = build_command(&invocation(Privilege::Inherit, None)).expect("build");
        assert_eq!(command.get_program(), OsStr::new("/opt/venv/bin/python"));
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(args, vec![OsStr::new("scheduler.py")]);
        assert_eq!(
            command.get_current_dir(),
            Some(std::path::Path::new("/srv/site"))
        );
        let envs: Vec<_> = command.get_envs().collect();
        assert_eq!(
            envs,
            vec![
                (OsStr::new("OPENAI_API_KEY"), Some(OsStr::new("k"))),
                (OsStr::new("VIRTUAL_ENV"), Some(OsStr::new("/opt/venv"))),
            ]
        );
    }

    #[test]
    fn sudo_wraps_program_unless_root() {
        let job = invocation(Privilege::Sudo, Some(PathBuf::from("/usr/bin/sudo")));
        let command = build_command(&job).expect("build");
        let envs: Vec<_> = command.get_envs().map(|(key, _)| key).collect();
        assert!(envs.contains(&OsStr::new("OPENAI_API_KEY")));
        if running_as_root() {
            assert_eq!(command.get_program(), OsStr::new("/opt/venv/bin/python"));
            return;
        }
        assert_eq!(command.get_program(), OsStr::new("/usr/bin/sudo"));
        let args: Vec<_> = command.get_args().collect();
        assert_eq!(
            args,
            vec![
                OsStr::new("--preserve-env=PATH,VIRTUAL_ENV,OPENAI_API_KEY"),
                OsStr::new("--"),
                OsStr::new("/opt/venv/bin/python"),
                OsStr::new("scheduler.py"),
            ]
        );
    }

    #[test]
    fn sudo_keeps_every_configured_variable() {
        let mut job = invocation(Privilege::Sudo, Some(PathBuf::from("/usr/bin/sudo")));
        job.env.insert("PATH".to_string(), OsString::from("/opt/venv/bin:/usr/bin"));
        job.env.insert("SERPER_API_KEY".to_string(), OsString::from("s"));
        assert_eq!(
            sudo_preserved_env(&job),
            "PATH,VIRTUAL_ENV,OPENAI_API_KEY,SERPER_API_KEY"
        );

        job.env.clear();
        assert_eq!(sudo_preserved_env(&job), "PATH,VIRTUAL_ENV");
    }

    #[test]
    fn missing_sudo_is_permission_denied() {
        if running_as_root() {
            return;
        }
        let err = build_command(&invocation(Privilege::Sudo, None)).expect_err("no sudo");
        assert!(matches!(err, DeployError::PermissionDenied { .. }));
    }

    #[test]
    fn privilege_serializes_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Privilege::Sudo).expect("serialize"),
            "\"sudo\""
        );
        let parsed: Privilege = serde_json::from_str("\"inherit\"").expect("parse");
        assert_eq!(parsed, Privilege::Inherit);
    }

    #[cfg(unix)]
    #[test]
    fn process_runner_reports_exit_code() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let job = JobInvocation {
            command: "sh -c 'exit 3'".to_string(),
            program: PathBuf::from("/bin/sh"),
            args: vec!["-c".to_string(), "exit 3".to_string()],
            cwd: dir.path().to_path_buf(),
            env: BTreeMap::new(),
            privilege: Privilege::Inherit,
            sudo: None,
        };
        let exit = ProcessRunner.run(&job).expect("run job");
        assert!(!exit.success);
        assert_eq!(exit.code, Some(3));
    }
}

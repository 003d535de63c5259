//! Environment activation for the external job.
//!
//! Activating a virtualenv amounts to prepending its `bin/` directory to
//! `PATH` and exporting `VIRTUAL_ENV`; the job's program is then resolved
//! against that search path before any step runs.
use crate::config::DeployConfig;
use crate::error::DeployError;
use crate::job::{JobInvocation, Privilege};
use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[cfg(windows)]
const VENV_BIN_DIR: &str = "Scripts";
#[cfg(not(windows))]
const VENV_BIN_DIR: &str = "bin";

/// Environment the job will see on top of the inherited one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivatedEnvironment {
    /// Search path used to resolve programs.
    pub search_path: OsString,
    pub vars: BTreeMap<String, OsString>,
}

/// Activate the configured environment against the inherited `PATH`.
pub fn activate(config: &DeployConfig) -> Result<ActivatedEnvironment, DeployError> {
    let inherited = env::var_os("PATH").unwrap_or_default();
    activate_with_path(config, inherited)
}

fn activate_with_path(
    config: &DeployConfig,
    inherited: OsString,
) -> Result<ActivatedEnvironment, DeployError> {
    let mut vars: BTreeMap<String, OsString> = config
        .environment
        .vars
        .iter()
        .map(|(key, value)| (key.clone(), OsString::from(value)))
        .collect();

    let Some(venv) = config.environment.venv.as_deref() else {
        return Ok(ActivatedEnvironment {
            search_path: inherited,
            vars,
        });
    };

    let venv_root = resolve_venv_root(&config.source_root, venv);
    let bin_dir = venv_root.join(VENV_BIN_DIR);
    if !bin_dir.is_dir() {
        return Err(DeployError::EnvironmentActivation(format!(
            "virtualenv {} has no {VENV_BIN_DIR}/ directory",
            venv_root.display()
        )));
    }
    let mut dirs = vec![bin_dir];
    dirs.extend(env::split_paths(&inherited));
    let search_path = env::join_paths(dirs).map_err(|err| {
        DeployError::EnvironmentActivation(format!("build PATH for {}: {err}", venv_root.display()))
    })?;

    vars.insert("PATH".to_string(), search_path.clone());
    vars.insert("VIRTUAL_ENV".to_string(), venv_root.into_os_string());
    Ok(ActivatedEnvironment { search_path, vars })
}

fn resolve_venv_root(source_root: &Path, venv: &Path) -> PathBuf {
    if venv.is_absolute() {
        venv.to_path_buf()
    } else {
        source_root.join(venv)
    }
}

/// Resolve the configured job into a spawnable invocation.
pub fn prepare_job(
    config: &DeployConfig,
    activated: &ActivatedEnvironment,
) -> Result<JobInvocation, DeployError> {
    let mut argv = shell_words::split(&config.job.command)
        .map_err(|err| DeployError::Config(format!("job.command: {err}")))?
        .into_iter();
    let program_name = argv
        .next()
        .ok_or_else(|| DeployError::Config("job.command must be non-empty".to_string()))?;
    let program = which::which_in(
        &program_name,
        Some(&activated.search_path),
        &config.source_root,
    )
    .map_err(|err| {
        DeployError::EnvironmentActivation(format!("cannot resolve `{program_name}`: {err}"))
    })?;

    let sudo = match config.job.privilege {
        Privilege::Inherit => None,
        Privilege::Sudo => {
            which::which_in("sudo", Some(&activated.search_path), &config.source_root).ok()
        }
    };

    Ok(JobInvocation {
        command: config.job.command.clone(),
        program,
        args: argv.collect(),
        cwd: config.source_root.clone(),
        env: activated.vars.clone(),
        privilege: config.job.privilege,
        sudo,
    })
}

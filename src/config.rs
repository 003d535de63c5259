//! Deploy configuration: loading, validation, and presets.
//!
//! The config replaces the path variables that used to be edited in place in
//! the deploy scripts. Both historical script variants are available as
//! presets of the same schema.
use crate::error::DeployError;
use crate::job::Privilege;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;
pub const CONFIG_FILE_NAME: &str = "deploy.json";
/// Environment variable consulted when `--config` is not given.
pub const CONFIG_ENV_VAR: &str = "SITE_DEPLOY_CONFIG";

const DEFAULT_MARKUP_FILE: &str = "index.html";
const DEFAULT_ARTIFACT_FILE: &str = "match_results.json";
const DEFAULT_ASSETS_DIR: &str = "images";
const DEFAULT_DEST_ROOT: &str = "/var/www/html";
const DEFAULT_JOB_COMMAND: &str = "python serper_agent_scheduler.py";
const DEFAULT_VENV: &str = "venv";

/// Pack-owned deploy settings, stored as `deploy.json`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DeployConfig {
    pub schema_version: u32,
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    #[serde(default = "default_markup_file")]
    pub markup_file: String,
    #[serde(default = "default_artifact_file")]
    pub artifact_file: String,
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,
    #[serde(default)]
    pub mirror_assets: bool,
    #[serde(default = "default_true")]
    pub create_dest_root: bool,
    pub job: JobConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct JobConfig {
    /// Command line in shell-words syntax, run from the source root.
    pub command: String,
    #[serde(default)]
    pub privilege: Privilege,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct EnvironmentConfig {
    /// Virtualenv root; relative paths resolve against the source root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venv: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, String>,
}

/// Named defaults matching the two deploy script variants.
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Preset {
    /// Create the document root and run the job as the current user
    #[default]
    Local,
    /// Expect an existing document root and run the job through sudo
    Server,
}

fn default_markup_file() -> String {
    DEFAULT_MARKUP_FILE.to_string()
}

fn default_artifact_file() -> String {
    DEFAULT_ARTIFACT_FILE.to_string()
}

fn default_assets_dir() -> String {
    DEFAULT_ASSETS_DIR.to_string()
}

fn default_true() -> bool {
    true
}

/// Build the config written by `init` for a preset.
pub fn default_config(
    preset: Preset,
    source_root: Option<PathBuf>,
    dest_root: Option<PathBuf>,
) -> Result<DeployConfig> {
    let source_root = match source_root {
        Some(path) => path,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let dest_root = dest_root.unwrap_or_else(|| PathBuf::from(DEFAULT_DEST_ROOT));
    let (create_dest_root, privilege) = match preset {
        Preset::Local => (true, Privilege::Inherit),
        Preset::Server => (false, Privilege::Sudo),
    };
    Ok(DeployConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        source_root,
        dest_root,
        markup_file: default_markup_file(),
        artifact_file: default_artifact_file(),
        assets_dir: default_assets_dir(),
        mirror_assets: false,
        create_dest_root,
        job: JobConfig {
            command: DEFAULT_JOB_COMMAND.to_string(),
            privilege,
        },
        environment: EnvironmentConfig {
            venv: Some(PathBuf::from(DEFAULT_VENV)),
            vars: BTreeMap::new(),
        },
    })
}

/// Load a config from disk.
///
/// A missing or unparsable file is a config error, not an I/O error, so the
/// process exits with the config status.
pub fn load_config(path: &Path) -> Result<DeployConfig> {
    if !path.is_file() {
        return Err(DeployError::Config(format!(
            "no config at {} (run `site-deploy init` to create one)",
            path.display()
        ))
        .into());
    }
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: DeployConfig = serde_json::from_slice(&bytes)
        .map_err(|err| DeployError::Config(format!("parse {}: {err}", path.display())))?;
    Ok(config)
}

/// Persist a config in a stable JSON format.
pub fn write_config(path: &Path, config: &DeployConfig) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let mut text = serde_json::to_string_pretty(config).context("serialize deploy config")?;
    text.push('\n');
    fs::write(path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Check the config schema and the invariants the sequencer relies on.
pub fn validate_config(config: &DeployConfig) -> Result<(), DeployError> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(DeployError::Config(format!(
            "unsupported schema_version {}",
            config.schema_version
        )));
    }
    validate_root(&config.source_root, "source_root")?;
    validate_root(&config.dest_root, "dest_root")?;
    if config.source_root == config.dest_root {
        return Err(DeployError::Config(
            "source_root and dest_root must differ".to_string(),
        ));
    }
    validate_file_name(&config.markup_file, "markup_file")?;
    validate_file_name(&config.artifact_file, "artifact_file")?;
    validate_file_name(&config.assets_dir, "assets_dir")?;
    if config.markup_file == config.artifact_file {
        return Err(DeployError::Config(
            "markup_file and artifact_file must differ".to_string(),
        ));
    }
    let argv = shell_words::split(&config.job.command)
        .map_err(|err| DeployError::Config(format!("job.command: {err}")))?;
    if argv.is_empty() {
        return Err(DeployError::Config(
            "job.command must be non-empty".to_string(),
        ));
    }
    if let Some(venv) = &config.environment.venv {
        if venv.as_os_str().is_empty() {
            return Err(DeployError::Config(
                "environment.venv must be non-empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_root(path: &Path, label: &str) -> Result<(), DeployError> {
    if !path.is_absolute() {
        return Err(DeployError::Config(format!(
            "{label} must be an absolute path (got {})",
            path.display()
        )));
    }
    Ok(())
}

/// File names must name a single entry directly under a root.
fn validate_file_name(name: &str, label: &str) -> Result<(), DeployError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(DeployError::Config(format!(
            "{label} must be a plain file name (got {name:?})"
        ))),
    }
}

/// Path `init` writes to: `--config`, then `$SITE_DEPLOY_CONFIG`, then
/// `./deploy.json`.
pub fn config_path_for_write(explicit: Option<&Path>) -> PathBuf {
    config_path_for_write_in(explicit, config_env_path())
}

fn config_path_for_write_in(explicit: Option<&Path>, env_value: Option<PathBuf>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| env_value.filter(|p| !p.as_os_str().is_empty()))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// Locate the config to load.
///
/// Falls back to the per-user config directory only when no local
/// `deploy.json` exists.
pub fn locate_config(explicit: Option<&Path>) -> PathBuf {
    let user_config = dirs::config_dir().map(|dir| dir.join("site-deploy").join(CONFIG_FILE_NAME));
    locate_config_in(explicit, config_env_path(), Path::new("."), user_config)
}

fn config_env_path() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from)
}

fn locate_config_in(
    explicit: Option<&Path>,
    env_value: Option<PathBuf>,
    cwd: &Path,
    user_config: Option<PathBuf>,
) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = env_value.filter(|p| !p.as_os_str().is_empty()) {
        return path;
    }
    let local = cwd.join(CONFIG_FILE_NAME);
    if local.is_file() {
        return local;
    }
    match user_config {
        Some(path) if path.is_file() => path,
        _ => local,
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

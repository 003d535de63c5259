//! Shared test infrastructure for integration tests.

use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Name of the stand-in scheduler script written into the source root.
pub const JOB_SCRIPT: &str = "scheduler.sh";

/// A throwaway source tree, document root, and config file.
pub struct SiteFixture {
    _temp_dir: TempDir,
    pub source_root: PathBuf,
    pub dest_root: PathBuf,
    pub config_path: PathBuf,
}

impl SiteFixture {
    /// Create a source root holding `index.html` and a job script with `body`.
    pub fn new(markup: Option<&str>, job_body: &str) -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let source_root = temp_dir.path().join("site");
        let dest_root = temp_dir.path().join("www");
        let config_path = temp_dir.path().join("deploy.json");
        std::fs::create_dir_all(&source_root)?;
        if let Some(markup) = markup {
            std::fs::write(source_root.join("index.html"), markup)?;
        }
        let fixture = Self {
            _temp_dir: temp_dir,
            source_root,
            dest_root,
            config_path,
        };
        fixture.write_job(job_body)?;
        fixture.write_config(true)?;
        Ok(fixture)
    }

    /// Replace the job script.
    pub fn write_job(&self, body: &str) -> anyhow::Result<()> {
        let path = self.source_root.join(JOB_SCRIPT);
        std::fs::write(&path, format!("#!/bin/sh\nset -e\n{body}\n"))?;
        make_executable(&path)?;
        Ok(())
    }

    pub fn write_config(&self, create_dest_root: bool) -> anyhow::Result<()> {
        let config = json!({
            "schema_version": 1,
            "source_root": self.source_root,
            "dest_root": self.dest_root,
            "create_dest_root": create_dest_root,
            "job": { "command": format!("./{JOB_SCRIPT}") },
        });
        std::fs::write(&self.config_path, serde_json::to_string_pretty(&config)?)?;
        Ok(())
    }

    /// Run the binary with `--config` pointing at the fixture config.
    pub fn run(&self, args: &[&str]) -> anyhow::Result<Output> {
        let output = Command::new(bin())
            .args(args)
            .arg("--config")
            .arg(&self.config_path)
            .env_remove("RUST_LOG")
            .output()?;
        Ok(output)
    }

    pub fn dest_file(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.dest_root.join(name)).ok()
    }
}

pub fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_site-deploy")
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

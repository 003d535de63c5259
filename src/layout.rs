//! Typed paths into the source tree and the document root.
use crate::config::DeployConfig;
use std::path::{Path, PathBuf};

/// Source and destination locations derived from a config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    source_root: PathBuf,
    dest_root: PathBuf,
    markup_file: String,
    artifact_file: String,
    assets_dir: String,
}

impl SiteLayout {
    pub fn from_config(config: &DeployConfig) -> Self {
        Self {
            source_root: config.source_root.clone(),
            dest_root: config.dest_root.clone(),
            markup_file: config.markup_file.clone(),
            artifact_file: config.artifact_file.clone(),
            assets_dir: config.assets_dir.clone(),
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Return the document root path.
    pub fn dest_root(&self) -> &Path {
        &self.dest_root
    }

    /// Return `<source_root>/index.html`.
    pub fn source_markup(&self) -> PathBuf {
        self.source_root.join(&self.markup_file)
    }

    /// Return `<dest_root>/index.html`.
    pub fn dest_markup(&self) -> PathBuf {
        self.dest_root.join(&self.markup_file)
    }

    /// Return `<source_root>/match_results.json`, written by the job.
    pub fn source_artifact(&self) -> PathBuf {
        self.source_root.join(&self.artifact_file)
    }

    /// Return `<dest_root>/match_results.json`.
    pub fn dest_artifact(&self) -> PathBuf {
        self.dest_root.join(&self.artifact_file)
    }

    pub fn source_assets(&self) -> PathBuf {
        self.source_root.join(&self.assets_dir)
    }

    pub fn dest_assets(&self) -> PathBuf {
        self.dest_root.join(&self.assets_dir)
    }
}

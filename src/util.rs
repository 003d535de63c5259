use anyhow::{Context, Result};
use sha2::Digest;
use std::fs;
use std::path::Path;

pub fn display_path(path: &Path, base: Option<&Path>) -> String {
    if let Some(base) = base {
        if let Ok(relative) = path.strip_prefix(base) {
            return relative.display().to_string();
        }
    }
    path.display().to_string()
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = sha2::Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Digest of a file, or `None` when it does not exist.
pub fn file_sha256(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    Ok(Some(sha256_hex(&bytes)))
}

/// Whether two files exist and have identical contents.
pub fn files_match(a: &Path, b: &Path) -> Result<bool> {
    match (file_sha256(a)?, file_sha256(b)?) {
        (Some(left), Some(right)) => Ok(left == right),
        _ => Ok(false),
    }
}

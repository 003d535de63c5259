//! Filesystem primitives used by the copy and mirror steps.
//!
//! Files are published through a hidden temporary sibling and renamed into
//! place so the document root never serves a partially written file.
use crate::error::DeployError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Create `dir` and any missing parents.
pub fn ensure_dir(dir: &Path) -> Result<(), DeployError> {
    fs::create_dir_all(dir).map_err(|err| DeployError::from_write(dir, err))
}

/// Copy `source` over `dest`, replacing any existing file.
///
/// Returns the number of bytes copied.
pub fn publish_file(source: &Path, dest: &Path) -> Result<u64, DeployError> {
    if !source.is_file() {
        return Err(DeployError::MissingArtifact {
            path: source.to_path_buf(),
        });
    }
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("staged");
    let tmp_path = dest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    let bytes = match fs::copy(source, &tmp_path) {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = fs::remove_file(&tmp_path);
            if err.kind() == io::ErrorKind::NotFound && !source.exists() {
                return Err(DeployError::MissingArtifact {
                    path: source.to_path_buf(),
                });
            }
            return Err(DeployError::from_write(dest, err));
        }
    };
    if let Err(err) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(DeployError::from_write(dest, err));
    }
    Ok(bytes)
}

/// Replace `dest` with a copy of the `source` tree.
///
/// Destructive: the destination subtree is removed before copying, so an
/// interrupted mirror leaves a partial tree until the next run.
pub fn mirror_dir(source: &Path, dest: &Path) -> Result<usize, DeployError> {
    if !source.is_dir() {
        return Err(DeployError::MissingArtifact {
            path: source.to_path_buf(),
        });
    }
    let files = collect_files_recursive(source)?;
    match fs::remove_dir_all(dest) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(DeployError::from_write(dest, err)),
    }
    ensure_dir(dest)?;
    for file in &files {
        let rel = file
            .strip_prefix(source)
            .map_err(|_| DeployError::Io {
                context: format!("strip prefix {}", source.display()),
                source: io::Error::from(io::ErrorKind::InvalidInput),
            })?;
        let target = dest.join(rel);
        if let Some(parent) = target.parent() {
            ensure_dir(parent)?;
        }
        fs::copy(file, &target).map_err(|err| DeployError::from_write(&target, err))?;
    }
    Ok(files.len())
}

/// List every regular file under `root`, sorted.
///
/// Symlinks are not followed and not listed.
pub fn collect_files_recursive(root: &Path) -> Result<Vec<PathBuf>, DeployError> {
    let mut files = Vec::new();
    if !root.exists() {
        return Ok(files);
    }
    let entries = fs::read_dir(root).map_err(|source| DeployError::Io {
        context: format!("read {}", root.display()),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| DeployError::Io {
            context: format!("read {}", root.display()),
            source,
        })?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| DeployError::Io {
            context: format!("stat {}", path.display()),
            source,
        })?;
        if file_type.is_dir() {
            files.extend(collect_files_recursive(&path)?);
        } else if file_type.is_file() {
            files.push(path);
        } else if file_type.is_symlink() {
            tracing::warn!(path = %path.display(), "skipping symlink");
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent directory");
        }
        fs::write(path, contents.as_bytes()).expect("write file");
    }

    #[test]
    fn publish_overwrites_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = dir.path().join("src").join("index.html");
        let dest_dir = dir.path().join("www");
        let dest = dest_dir.join("index.html");
        write_file(&source, "new");
        write_file(&dest, "old contents");

        let bytes = publish_file(&source, &dest).expect("publish");
        assert_eq!(bytes, 3);
        assert_eq!(fs::read_to_string(&dest).expect("read dest"), "new");
        assert!(!dest_dir.join(".index.html.tmp").exists());
    }

    #[test]
    fn publish_missing_source_is_missing_artifact() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let dest = dir.path().join("index.html");
        let err = publish_file(&dir.path().join("absent.html"), &dest).expect_err("missing");
        assert!(matches!(err, DeployError::MissingArtifact { .. }));
        assert!(!dest.exists());
    }

    #[test]
    fn mirror_replaces_destination_tree() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let source = dir.path().join("images");
        let dest = dir.path().join("www").join("images");
        write_file(&source.join("logo.png"), "logo");
        write_file(&source.join("teams").join("a.png"), "a");
        write_file(&dest.join("stale.png"), "stale");

        let copied = mirror_dir(&source, &dest).expect("mirror");
        assert_eq!(copied, 2);
        assert_eq!(fs::read_to_string(dest.join("logo.png")).expect("read"), "logo");
        assert_eq!(
            fs::read_to_string(dest.join("teams").join("a.png")).expect("read"),
            "a"
        );
        assert!(!dest.join("stale.png").exists());

        let again = mirror_dir(&source, &dest).expect("mirror again");
        assert_eq!(again, 2);
        assert_eq!(
            collect_files_recursive(&dest).expect("list"),
            vec![dest.join("logo.png"), dest.join("teams").join("a.png")]
        );
    }

    #[cfg(unix)]
    #[test]
    fn mirror_skips_symlinks() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().expect("create temp dir");
        let source = dir.path().join("images");
        let dest = dir.path().join("www").join("images");
        write_file(&source.join("a.png"), "a");
        symlink(&source, source.join("self")).expect("link dir");
        symlink(source.join("a.png"), source.join("b.png")).expect("link file");

        let copied = mirror_dir(&source, &dest).expect("mirror");
        assert_eq!(copied, 1);
        assert_eq!(
            collect_files_recursive(&dest).expect("list"),
            vec![dest.join("a.png")]
        );
        assert!(!dest.join("self").exists());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_copy_leaves_no_temp_file() {
        // Listed as a regular file, but reading from offset 0 fails.
        let unreadable = Path::new("/proc/self/mem");
        if !unreadable.is_file() {
            return;
        }
        let dir = tempfile::tempdir().expect("create temp dir");
        let dest = dir.path().join("index.html");
        write_file(&dest, "old");

        publish_file(unreadable, &dest).expect_err("copy fails");
        assert!(!dir.path().join(".index.html.tmp").exists());
        assert_eq!(fs::read_to_string(&dest).expect("read dest"), "old");
    }

    #[test]
    fn mirror_without_source_keeps_destination() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let dest = dir.path().join("www").join("images");
        write_file(&dest.join("keep.png"), "keep");
        let err = mirror_dir(&dir.path().join("images"), &dest).expect_err("missing source");
        assert!(matches!(err, DeployError::MissingArtifact { .. }));
        assert!(dest.join("keep.png").exists());
    }
}

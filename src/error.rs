//! Failure taxonomy for a deployment run.
//!
//! Every step maps its failure onto one of these variants so `main` can pick
//! an exit code without parsing messages.
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a missing input file or directory (sysexits `EX_NOINPUT`).
pub const EXIT_MISSING: u8 = 66;
/// Exit code when the environment cannot be activated (`EX_UNAVAILABLE`).
pub const EXIT_ENVIRONMENT: u8 = 69;
/// Exit code for unexpected I/O failures (`EX_IOERR`).
pub const EXIT_IO: u8 = 74;
/// Exit code for insufficient permissions (`EX_NOPERM`).
pub const EXIT_PERMISSION: u8 = 77;
/// Exit code for an invalid configuration (`EX_CONFIG`).
pub const EXIT_CONFIG: u8 = 78;

#[derive(Error, Debug)]
pub enum DeployError {
    #[error("missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("missing destination: {} does not exist", path.display())]
    MissingDestination { path: PathBuf },

    #[error("job failed: `{command}` {}", describe_exit(*code))]
    JobFailed { command: String, code: Option<i32> },

    #[error("could not start job `{command}`")]
    JobSpawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("permission denied: {detail}")]
    PermissionDenied {
        detail: String,
        #[source]
        source: Option<io::Error>,
    },

    #[error("environment activation failed: {0}")]
    EnvironmentActivation(String),

    #[error("invalid config: {0}")]
    Config(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

impl DeployError {
    /// Wrap an I/O error raised while writing under `path`.
    ///
    /// Permission failures are surfaced as their own variant. Both variants
    /// keep the original error as their source.
    pub fn from_write(path: &std::path::Path, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::PermissionDenied {
            return DeployError::PermissionDenied {
                detail: format!("write {}", path.display()),
                source: Some(source),
            };
        }
        DeployError::Io {
            context: format!("write {}", path.display()),
            source,
        }
    }

    /// Process exit code for this failure.
    ///
    /// A failed job propagates its own status so callers see what the job
    /// reported; a job killed by a signal exits 1.
    pub fn exit_code(&self) -> u8 {
        match self {
            DeployError::MissingArtifact { .. } | DeployError::MissingDestination { .. } => {
                EXIT_MISSING
            }
            DeployError::JobFailed { code, .. } => match code {
                Some(code) => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
                None => 1,
            },
            DeployError::JobSpawn { .. } | DeployError::EnvironmentActivation(_) => {
                EXIT_ENVIRONMENT
            }
            DeployError::PermissionDenied { .. } => EXIT_PERMISSION,
            DeployError::Config(_) => EXIT_CONFIG,
            DeployError::Io { .. } => EXIT_IO,
        }
    }
}

fn describe_exit(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exited with status {code}"),
        None => "was terminated by a signal".to_string(),
    }
}

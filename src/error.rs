//! Error types and process exit codes.
//!
//! Every fatal failure the library can report is a [`ClearCacheError`]. Each
//! variant maps to a stable process exit code so scripts can tell a broken
//! configuration file apart from other failures.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the crate.
pub type Result<T> = std::result::Result<T, ClearCacheError>;

/// Exit code used for configuration failures (unreadable, malformed, unlockable).
pub const EXIT_CONFIG: i32 = 3;

/// Exit code used when the process environment cannot be inspected.
pub const EXIT_ENVIRONMENT: i32 = 4;

/// Exit code used for every other failure.
pub const EXIT_FAILURE: i32 = 1;

/// Top-level error type for clearcache.
#[derive(Debug, Error)]
pub enum ClearCacheError {
    /// The platform configuration directory could not be determined.
    #[error("could not determine the user configuration directory")]
    ConfigDirUnavailable,

    /// Reading, creating or writing the configuration file failed.
    #[error("failed to access config file at {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The exclusive advisory lock on the configuration file could not be taken.
    #[error("failed to lock config file at {}: {source}", path.display())]
    ConfigLock {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configuration file exists but does not hold a valid configuration.
    #[error("failed to parse config file at {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The in-memory configuration could not be serialized.
    #[error("failed to serialize configuration: {0}")]
    ConfigSerialize(#[source] serde_json::Error),

    /// The current working directory could not be read.
    #[error("failed to determine the current working directory: {0}")]
    WorkingDir(#[source] io::Error),

    /// Writing the report failed.
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
}

impl ClearCacheError {
    /// Process exit code for this error kind.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::ConfigDirUnavailable
            | Self::ConfigIo { .. }
            | Self::ConfigLock { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigSerialize(_) => EXIT_CONFIG,
            Self::WorkingDir(_) => EXIT_ENVIRONMENT,
            Self::Output(_) => EXIT_FAILURE,
        }
    }

    pub(crate) fn config_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }
}

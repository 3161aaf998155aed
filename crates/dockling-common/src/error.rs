//! Error types shared across the Dockling workspace.
//!
//! The launch path (root setup, namespace creation, process supervision)
//! is spread over `dockling-core` and `dockling-runtime`, so its error enum
//! lives here. Image resolution has its own enum in `dockling-image`.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::LaunchPhase;

/// A failure while preparing or running the container process.
///
/// Every variant is terminal: a launch is never retried or resumed.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Preparing the container root failed (copying the executable,
    /// changing directory, or changing the filesystem root).
    #[error("root setup failed at {path}: {source}")]
    RootSetup {
        /// Path the failing operation was applied to.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Creating the PID namespace failed.
    #[error("PID namespace creation failed: {source}")]
    Namespace {
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The container command could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command that was being started.
        command: String,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Relaying one of the child's output streams failed.
    #[error("relaying child {stream} failed: {source}")]
    Relay {
        /// Name of the stream (`stdout` or `stderr`).
        stream: &'static str,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Waiting for the child to terminate failed.
    #[error("waiting for child failed: {source}")]
    Wait {
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// A launch step was attempted from the wrong phase.
    #[error("cannot enter {attempted} while {current}")]
    OutOfOrder {
        /// Phase the caller tried to move to.
        attempted: LaunchPhase,
        /// Phase the launcher is actually in.
        current: LaunchPhase,
    },
}

/// A configuration value could not be understood.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A platform string is not of the form `os/architecture`.
    #[error("invalid platform `{value}`: expected <os>/<architecture>")]
    InvalidPlatform {
        /// The rejected value.
        value: String,
    },
}

/// Convenience alias used throughout the launch path.
pub type LaunchResult<T> = std::result::Result<T, LaunchError>;

//! Error type for the runtime crate.

use dockling_common::error::LaunchError;
use dockling_image::ImageError;
use thiserror::Error;

/// A failure while populating a container root or launching into it.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Materializing the image failed.
    #[error(transparent)]
    Image(#[from] ImageError),

    /// Preparing the root or running the command failed.
    #[error(transparent)]
    Launch(#[from] LaunchError),

    /// A bare command name could not be found on the host `PATH`.
    #[error("`{command}` not found on the host PATH: {source}")]
    CommandNotFound {
        /// The name that was looked up.
        command: String,
        /// Lookup failure.
        source: which::Error,
    },
}

/// Convenience alias used throughout the runtime crate.
pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

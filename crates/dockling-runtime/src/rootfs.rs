//! Container root population.

use std::path::{Path, PathBuf};

use dockling_common::config::DocklingConfig;
use dockling_image::{MaterializedImage, Materializer};

use crate::error::{RuntimeError, RuntimeResult};

/// How a fresh container root gets its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootPopulationStrategy {
    /// Pull the image named by the reference and extract it into the root.
    FetchRemoteImage(String),
    /// Copy a single host executable into the root at its own path.
    /// A bare name is looked up on the host `PATH`.
    CopyLocalBinary(PathBuf),
}

/// What a populated root now contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Population {
    /// An extracted image.
    Image(MaterializedImage),
    /// One executable, at the given path inside the root.
    Binary(PathBuf),
}

impl RootPopulationStrategy {
    /// Fills `root` according to the strategy.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::Image`] if materialization fails,
    /// [`RuntimeError::CommandNotFound`] if a bare name is not on `PATH`,
    /// or [`RuntimeError::Launch`] if the copy fails.
    pub fn populate(&self, root: &Path, config: &DocklingConfig) -> RuntimeResult<Population> {
        match self {
            Self::FetchRemoteImage(reference) => {
                let image = Materializer::new(config)?.materialize(reference, root)?;
                Ok(Population::Image(image))
            }
            Self::CopyLocalBinary(path) => {
                let host_path = resolve_host_binary(path)?;
                let target =
                    dockling_core::filesystem::install::install_executable(root, &host_path)?;
                Ok(Population::Binary(target))
            }
        }
    }
}

fn resolve_host_binary(path: &Path) -> RuntimeResult<PathBuf> {
    if path.components().count() > 1 {
        return Ok(path.to_path_buf());
    }
    let resolved = which::which(path).map_err(|source| RuntimeError::CommandNotFound {
        command: path.display().to_string(),
        source,
    })?;
    tracing::debug!(command = %path.display(), resolved = %resolved.display(), "resolved on host PATH");
    Ok(resolved)
}

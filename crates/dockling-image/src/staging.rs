//! Temporary storage for downloaded layer blobs.
//!
//! Blobs are written as files named by their layer index inside a private
//! directory that is removed once the image has been materialized, whether
//! or not that succeeded.

use std::path::{Path, PathBuf};

use dockling_common::constants::STAGING_PREFIX;
use tempfile::TempDir;

use crate::error::{ImageError, ImageResult};

/// A private directory holding staged layer blobs.
///
/// Dropping the area removes it and everything in it.
#[derive(Debug)]
pub struct StagingArea {
    dir: TempDir,
}

impl StagingArea {
    /// Creates a fresh staging directory under `parent`, or under the system
    /// temporary directory when `parent` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Staging`] if the directory cannot be created.
    pub fn create(parent: Option<&Path>) -> ImageResult<Self> {
        let parent = parent.map_or_else(std::env::temp_dir, Path::to_path_buf);
        let dir = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)
            .map_err(|source| ImageError::Staging {
                path: parent.clone(),
                source,
            })?;
        tracing::debug!(path = %dir.path().display(), "created staging area");
        Ok(Self { dir })
    }

    /// Writes the blob of layer `index` and returns where it was stored.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Staging`] if the file cannot be written.
    pub fn stage(&self, index: usize, bytes: &[u8]) -> ImageResult<PathBuf> {
        let path = self.layer_path(index);
        std::fs::write(&path, bytes).map_err(|source| ImageError::Staging {
            path: path.clone(),
            source,
        })?;
        tracing::trace!(index, path = %path.display(), size = bytes.len(), "staged blob");
        Ok(path)
    }

    /// Returns the path the blob of layer `index` is staged at.
    #[must_use]
    pub fn layer_path(&self, index: usize) -> PathBuf {
        self.dir.path().join(index.to_string())
    }

    /// Returns the staging directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Removes the staging directory now.
    ///
    /// Removal failures are logged and otherwise ignored: the image has
    /// already been materialized or has already failed.
    pub fn release(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove staging area");
        } else {
            tracing::debug!(path = %path.display(), "removed staging area");
        }
    }
}

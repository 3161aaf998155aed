//! Filesystem jail via `chroot(2)`.
//!
//! After [`enter_root`] succeeds, no path outside the container root is
//! reachable by name from this process or anything it spawns. There is no
//! way back.

use std::path::Path;

use dockling_common::error::{LaunchError, LaunchResult};

/// Changes the working directory to `root`, then makes `root` the
/// process's filesystem root.
///
/// The working directory is changed first so that it already lies inside
/// the jail when the root moves.
///
/// # Errors
///
/// Returns [`LaunchError::RootSetup`] naming `root` if either `chdir(2)`
/// or `chroot(2)` fails. `chroot(2)` requires `CAP_SYS_CHROOT`.
#[cfg(target_os = "linux")]
pub fn enter_root(root: &Path) -> LaunchResult<()> {
    let setup_error = |e: nix::errno::Errno| LaunchError::RootSetup {
        path: root.to_path_buf(),
        source: std::io::Error::from(e),
    };

    nix::unistd::chdir(root).map_err(setup_error)?;
    nix::unistd::chroot(root).map_err(setup_error)?;

    tracing::info!(root = %root.display(), "entered container root");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: the filesystem jail requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn enter_root(root: &Path) -> LaunchResult<()> {
    Err(LaunchError::RootSetup {
        path: root.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "chroot requires Linux",
        ),
    })
}

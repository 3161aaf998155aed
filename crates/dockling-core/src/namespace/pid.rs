//! PID namespace isolation.
//!
//! Gives the container its own process ID space, where the first child
//! spawned afterwards becomes PID 1.

use dockling_common::error::{LaunchError, LaunchResult};

/// Moves all future children of the calling process into a new PID namespace.
///
/// The calling process keeps its own PID; only processes forked after a
/// successful call see the new numbering. The kernel also refuses to create
/// new threads in the caller from this point on, so any helper threads must
/// already be running.
///
/// # Errors
///
/// Returns [`LaunchError::Namespace`] if `unshare(CLONE_NEWPID)` fails,
/// typically because the caller lacks `CAP_SYS_ADMIN`.
#[cfg(target_os = "linux")]
pub fn create_pid_namespace() -> LaunchResult<()> {
    use nix::sched::{CloneFlags, unshare};

    unshare(CloneFlags::CLONE_NEWPID).map_err(|e| LaunchError::Namespace {
        source: std::io::Error::from(e),
    })?;
    tracing::debug!("PID namespace created for children");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error: PID namespaces require Linux.
#[cfg(not(target_os = "linux"))]
pub fn create_pid_namespace() -> LaunchResult<()> {
    Err(LaunchError::Namespace {
        source: std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "PID namespaces require Linux",
        ),
    })
}

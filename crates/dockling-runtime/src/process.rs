//! Child process supervision.
//!
//! Spawns the container command with piped stdio, relays its output, and
//! maps its termination status to an exit code.

use std::io::Write;
use std::os::unix::process::ExitStatusExt;
use std::process::{Child, Command, ExitStatus, Stdio};

use dockling_common::constants::SIGNAL_EXIT_BASE;
use dockling_common::error::LaunchError;
use nix::sys::signal::Signal;

use crate::relay::RelayWorker;

/// Spawns `command` with `args`, with all three standard streams piped.
///
/// # Errors
///
/// Returns [`LaunchError::Spawn`] if the command cannot be executed.
pub fn spawn_piped(command: &str, args: &[String]) -> Result<Child, LaunchError> {
    let child = Command::new(command)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            command: command.to_string(),
            source,
        })?;
    tracing::info!(command, pid = child.id(), "spawned child");
    Ok(child)
}

/// Exit code reported for a terminated child.
///
/// A normal exit reports the child's own code; termination by a signal
/// reports `128 + signal`, as shells do.
#[must_use]
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    match status.signal() {
        Some(signo) => {
            match Signal::try_from(signo) {
                Ok(signal) => tracing::info!(signal = signal.as_str(), "child terminated by signal"),
                Err(_) => tracing::info!(signo, "child terminated by unknown signal"),
            }
            SIGNAL_EXIT_BASE + signo
        }
        None => SIGNAL_EXIT_BASE,
    }
}

/// How a supervised child ended.
#[derive(Debug)]
pub struct Finished<O, E> {
    /// Exit code as computed by [`exit_code`].
    pub code: i32,
    /// Writer the child's stdout was relayed into.
    pub stdout: O,
    /// Writer the child's stderr was relayed into.
    pub stderr: E,
    /// Bytes relayed from stdout.
    pub stdout_bytes: u64,
    /// Bytes relayed from stderr.
    pub stderr_bytes: u64,
}

/// A running child with its output streams being relayed.
#[derive(Debug)]
pub struct ChildSession<O, E> {
    child: Child,
    stdout: RelayWorker<O>,
    stderr: RelayWorker<E>,
}

impl<O, E> ChildSession<O, E>
where
    O: Write + Send + 'static,
    E: Write + Send + 'static,
{
    /// Starts relay workers into `out` and `err`, then spawns the command.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Relay`] or [`LaunchError::Spawn`].
    pub fn start(command: &str, args: &[String], out: O, err: E) -> Result<Self, LaunchError> {
        let stdout = RelayWorker::start("stdout", out)?;
        let stderr = RelayWorker::start("stderr", err)?;
        Self::attach(spawn_piped(command, args)?, stdout, stderr)
    }

    /// Connects an already spawned child to running relay workers.
    ///
    /// The child's stdin is closed immediately. If the pipes cannot be
    /// handed over, the child is killed and reaped.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Relay`] if a worker refuses its pipe.
    pub fn attach(
        mut child: Child,
        mut stdout: RelayWorker<O>,
        mut stderr: RelayWorker<E>,
    ) -> Result<Self, LaunchError> {
        drop(child.stdin.take());

        let attached = child
            .stdout
            .take()
            .map_or(Ok(()), |pipe| stdout.attach(pipe))
            .and_then(|()| child.stderr.take().map_or(Ok(()), |pipe| stderr.attach(pipe)));

        if let Err(e) = attached {
            tracing::warn!(pid = child.id(), error = %e, "killing child after relay failure");
            let _ = child.kill();
            let _ = child.wait();
            return Err(e);
        }

        Ok(Self {
            child,
            stdout,
            stderr,
        })
    }

    /// Process ID of the child.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Drains both relays, then reaps the child.
    ///
    /// The child is reaped even if relaying failed.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::Relay`] if either stream failed, or
    /// [`LaunchError::Wait`] if the child could not be reaped.
    pub fn wait(mut self) -> Result<Finished<O, E>, LaunchError> {
        let pid = self.child.id();
        let stdout = self.stdout.finish();
        let stderr = self.stderr.finish();
        let status = self
            .child
            .wait()
            .map_err(|source| LaunchError::Wait { source })?;

        let (stdout, stdout_bytes) = stdout?;
        let (stderr, stderr_bytes) = stderr?;
        let code = exit_code(status);
        tracing::info!(pid, code, "child exited");

        Ok(Finished {
            code,
            stdout,
            stderr,
            stdout_bytes,
            stderr_bytes,
        })
    }
}

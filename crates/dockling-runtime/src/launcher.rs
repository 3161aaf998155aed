//! Container launch state machine.
//!
//! A [`Launcher`] jails the current process inside a populated root,
//! unshares the PID namespace for its children, and runs one command
//! there. Every step changes process-wide state that cannot be undone, so
//! the steps must happen in order and each is refused from any other
//! phase than the one right before it.

use std::io::{self, Stderr, Stdout};
use std::path::{Path, PathBuf};

use dockling_common::error::{LaunchError, LaunchResult};
use dockling_common::types::LaunchPhase;
use dockling_core::filesystem::{chroot, install};
use dockling_core::namespace::pid;

use crate::process::{self, ChildSession};
use crate::relay::RelayWorker;

/// Drives one container launch through its [`LaunchPhase`]s.
#[derive(Debug)]
pub struct Launcher {
    root: PathBuf,
    phase: LaunchPhase,
    relays: Option<(RelayWorker<Stdout>, RelayWorker<Stderr>)>,
    session: Option<ChildSession<Stdout, Stderr>>,
}

impl Launcher {
    /// Creates a launcher for the container root at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            phase: LaunchPhase::Uninitialized,
            relays: None,
            session: None,
        }
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> LaunchPhase {
        self.phase
    }

    /// The container root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Makes `command` available inside the root when it is given by path
    /// and the root does not already provide it.
    ///
    /// Only allowed before the root is entered.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::OutOfOrder`] after the root has been entered,
    /// or [`LaunchError::RootSetup`] if the copy fails.
    pub fn install_executable(&self, command: &str) -> LaunchResult<install::Installed> {
        self.require(LaunchPhase::RootChanged)?;
        install::ensure_executable(&self.root, command)
    }

    /// Jails the process inside the root.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::OutOfOrder`] or [`LaunchError::RootSetup`].
    pub fn enter_root(&mut self) -> LaunchResult<()> {
        self.require(LaunchPhase::RootChanged)?;
        chroot::enter_root(&self.root)?;
        self.advance(LaunchPhase::RootChanged);
        Ok(())
    }

    /// Starts the output relays, then unshares the PID namespace so the
    /// command becomes PID 1 of a fresh namespace.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::OutOfOrder`], [`LaunchError::Relay`] if a
    /// relay thread cannot be started, or [`LaunchError::Namespace`].
    pub fn isolate_pids(&mut self) -> LaunchResult<()> {
        self.require(LaunchPhase::NamespaceCreated)?;
        // No thread can be created once the namespace is unshared.
        let stdout = RelayWorker::start("stdout", io::stdout())?;
        let stderr = RelayWorker::start("stderr", io::stderr())?;
        pid::create_pid_namespace()?;
        self.relays = Some((stdout, stderr));
        self.advance(LaunchPhase::NamespaceCreated);
        Ok(())
    }

    /// Spawns the command with its output relayed to this process's
    /// stdout and stderr.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::OutOfOrder`], [`LaunchError::Spawn`], or
    /// [`LaunchError::Relay`].
    pub fn spawn(&mut self, command: &str, args: &[String]) -> LaunchResult<u32> {
        self.require(LaunchPhase::ChildSpawned)?;
        let Some((stdout, stderr)) = self.relays.take() else {
            return Err(self.out_of_order(LaunchPhase::ChildSpawned));
        };
        let session = ChildSession::attach(process::spawn_piped(command, args)?, stdout, stderr)?;
        let pid = session.pid();
        self.session = Some(session);
        self.advance(LaunchPhase::ChildSpawned);
        Ok(pid)
    }

    /// Waits for both streams to drain and the command to exit.
    ///
    /// Returns the command's exit code, or `128 + signal` if it was killed.
    ///
    /// # Errors
    ///
    /// Returns [`LaunchError::OutOfOrder`], [`LaunchError::Relay`], or
    /// [`LaunchError::Wait`].
    pub fn wait(&mut self) -> LaunchResult<i32> {
        self.require(LaunchPhase::Exited)?;
        let Some(session) = self.session.take() else {
            return Err(self.out_of_order(LaunchPhase::Exited));
        };
        let finished = session.wait()?;
        self.advance(LaunchPhase::Exited);
        Ok(finished.code)
    }

    fn require(&self, attempted: LaunchPhase) -> LaunchResult<()> {
        if attempted.predecessor() == Some(self.phase) {
            Ok(())
        } else {
            Err(self.out_of_order(attempted))
        }
    }

    const fn out_of_order(&self, attempted: LaunchPhase) -> LaunchError {
        LaunchError::OutOfOrder {
            attempted,
            current: self.phase,
        }
    }

    fn advance(&mut self, to: LaunchPhase) {
        tracing::debug!(from = %self.phase, to = %to, "launch phase");
        self.phase = to;
    }
}

/// Runs `command` with `args` inside `root` and returns its exit code.
///
/// Installs the command into the root if needed, jails the process, and
/// spawns the command in a fresh PID namespace. The calling process stays
/// jailed afterwards.
///
/// # Errors
///
/// Returns the [`LaunchError`] of the first step that failed.
pub fn launch(root: &Path, command: &str, args: &[String]) -> LaunchResult<i32> {
    let mut launcher = Launcher::new(root);
    let _ = launcher.install_executable(command)?;
    launcher.enter_root()?;
    launcher.isolate_pids()?;
    let pid = launcher.spawn(command, args)?;
    tracing::debug!(pid, command, "waiting for container command");
    launcher.wait()
}

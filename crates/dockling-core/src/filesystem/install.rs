//! Installing host executables inside a container root.
//!
//! A command given by path (for example `/usr/local/bin/tool`) is looked up
//! at the same path once the process is jailed. When the image does not
//! provide it, the host's copy is placed there before the jail is entered.

use std::ffi::OsStr;
use std::fs::{File, Permissions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Component, Path, PathBuf};

use dockling_common::error::{LaunchError, LaunchResult};
use nix::fcntl::{self, OFlag};
use nix::sys::stat::Mode;

/// Outcome of [`ensure_executable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Installed {
    /// The command has no `/` and is resolved through `PATH` inside the root.
    SearchPath,
    /// The root already contains a file at the command's path.
    Present(PathBuf),
    /// The host file was copied to the given location inside the root.
    Copied(PathBuf),
}

/// Makes `command` invocable from inside `root` at the path it is invoked with.
///
/// Any entry already at that path counts as present, including a symbolic
/// link: image links are absolute and only resolve once the root is entered.
///
/// # Errors
///
/// Returns [`LaunchError::RootSetup`] if the path escapes the root, or if
/// the file is missing from the root and cannot be copied from the host.
pub fn ensure_executable(root: &Path, command: &str) -> LaunchResult<Installed> {
    if !command.contains('/') {
        return Ok(Installed::SearchPath);
    }
    let host_path = Path::new(command);
    let target = path_in_root(root, host_path)?;
    if std::fs::symlink_metadata(&target).is_ok() {
        tracing::debug!(path = %target.display(), "executable already present in root");
        return Ok(Installed::Present(target));
    }
    install_executable(root, host_path).map(Installed::Copied)
}

/// Copies the host file at `host_path` to the same path under `root`,
/// creating intermediate directories. Permission bits are preserved.
///
/// Nothing is written through a symbolic link below `root`, so the copy
/// cannot land outside it.
///
/// Returns the location of the copy.
///
/// # Errors
///
/// Returns [`LaunchError::RootSetup`] if the path contains `..`, if a
/// directory on the way or the target itself is a symbolic link, or if
/// directory creation or the copy fails.
pub fn install_executable(root: &Path, host_path: &Path) -> LaunchResult<PathBuf> {
    let parts = relative_parts(host_path)?;
    let Some((file_name, dirs)) = parts.split_last() else {
        return Err(root_setup(
            host_path,
            io::Error::new(io::ErrorKind::InvalidInput, "command path names no file"),
        ));
    };

    let mut source = File::open(host_path).map_err(|e| root_setup(host_path, e))?;
    let mode = source
        .metadata()
        .map_err(|e| root_setup(host_path, e))?
        .permissions()
        .mode();

    let mut target = root.to_path_buf();
    for dir in dirs {
        target.push(dir);
        create_real_dir(&target)?;
    }
    target.push(file_name);

    let fd = fcntl::open(
        &target,
        OFlag::O_WRONLY | OFlag::O_CREAT | OFlag::O_TRUNC | OFlag::O_NOFOLLOW | OFlag::O_CLOEXEC,
        Mode::S_IRUSR | Mode::S_IWUSR,
    )
    .map_err(|errno| root_setup(&target, io::Error::from(errno)))?;
    let mut copy = File::from(fd);
    let bytes = io::copy(&mut source, &mut copy).map_err(|e| root_setup(&target, e))?;
    copy.set_permissions(Permissions::from_mode(mode & 0o7777))
        .map_err(|e| root_setup(&target, e))?;

    tracing::info!(
        source = %host_path.display(),
        target = %target.display(),
        bytes,
        "installed executable into root"
    );
    Ok(target)
}

/// Ensures `dir` is a real directory, creating it when missing.
fn create_real_dir(dir: &Path) -> LaunchResult<()> {
    match std::fs::symlink_metadata(dir) {
        Ok(meta) if meta.file_type().is_symlink() => Err(root_setup(
            dir,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                "refusing to write through a symbolic link",
            ),
        )),
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(root_setup(
            dir,
            io::Error::new(io::ErrorKind::NotADirectory, "not a directory"),
        )),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            std::fs::create_dir(dir).map_err(|e| root_setup(dir, e))
        }
        Err(e) => Err(root_setup(dir, e)),
    }
}

/// Maps an absolute or relative command path onto its location under `root`.
fn path_in_root(root: &Path, command: &Path) -> LaunchResult<PathBuf> {
    let mut target = root.to_path_buf();
    target.extend(relative_parts(command)?);
    Ok(target)
}

/// The normal components of `command`, refusing `..`.
fn relative_parts(command: &Path) -> LaunchResult<Vec<&OsStr>> {
    let mut parts = Vec::new();
    for component in command.components() {
        match component {
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::Normal(part) => parts.push(part),
            Component::ParentDir => {
                return Err(root_setup(
                    command,
                    io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "command path must not contain `..`",
                    ),
                ));
            }
        }
    }
    Ok(parts)
}

fn root_setup(path: &Path, source: io::Error) -> LaunchError {
    LaunchError::RootSetup {
        path: path.to_path_buf(),
        source,
    }
}

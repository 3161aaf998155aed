//! Domain primitive types used across the Dockling workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_OS;

/// Progress of a container launch.
///
/// Each step of a launch changes process-wide state that cannot be
/// undone (the filesystem root, the PID namespace for children), so the
/// launcher only ever moves forward through these phases, one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LaunchPhase {
    /// Nothing has been changed yet.
    Uninitialized,
    /// The process is jailed inside the container root.
    RootChanged,
    /// Children will be created in a fresh PID namespace.
    NamespaceCreated,
    /// The container command is running.
    ChildSpawned,
    /// The container command has terminated.
    Exited,
}

impl LaunchPhase {
    /// Returns the phase that must be current before entering `self`.
    #[must_use]
    pub const fn predecessor(self) -> Option<Self> {
        match self {
            Self::Uninitialized => None,
            Self::RootChanged => Some(Self::Uninitialized),
            Self::NamespaceCreated => Some(Self::RootChanged),
            Self::ChildSpawned => Some(Self::NamespaceCreated),
            Self::Exited => Some(Self::ChildSpawned),
        }
    }
}

impl fmt::Display for LaunchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::RootChanged => write!(f, "root-changed"),
            Self::NamespaceCreated => write!(f, "namespace-created"),
            Self::ChildSpawned => write!(f, "child-spawned"),
            Self::Exited => write!(f, "exited"),
        }
    }
}

/// Target platform used to pick an entry out of a multi-platform manifest list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Platform {
    /// Operating system, e.g. `linux`.
    pub os: String,
    /// Registry architecture name, e.g. `amd64` or `arm64`.
    pub architecture: String,
    /// CPU variant, e.g. `v7` for `linux/arm/v7`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

impl Platform {
    /// Creates a platform from its two components.
    #[must_use]
    pub fn new(os: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            os: os.into(),
            architecture: architecture.into(),
            variant: None,
        }
    }

    /// Sets the CPU variant.
    #[must_use]
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// Whether a manifest list entry for `other` can run here.
    ///
    /// The variant only narrows the match when this platform names one.
    #[must_use]
    pub fn accepts(&self, other: &Self) -> bool {
        self.os == other.os
            && self.architecture == other.architecture
            && self
                .variant
                .as_ref()
                .is_none_or(|variant| other.variant.as_ref() == Some(variant))
    }

    /// Returns the Linux platform matching the architecture this binary runs on.
    #[must_use]
    pub fn host() -> Self {
        Self::new(DEFAULT_OS, registry_arch(std::env::consts::ARCH))
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)?;
        if let Some(variant) = &self.variant {
            write!(f, "/{variant}")?;
        }
        Ok(())
    }
}

impl FromStr for Platform {
    type Err = crate::error::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [os, arch] if !os.is_empty() && !arch.is_empty() => Ok(Self::new(*os, *arch)),
            [os, arch, variant] if !os.is_empty() && !arch.is_empty() && !variant.is_empty() => {
                Ok(Self::new(*os, *arch).with_variant(*variant))
            }
            _ => Err(crate::error::ConfigError::InvalidPlatform {
                value: s.to_string(),
            }),
        }
    }
}

/// Maps a Rust target architecture name onto the name registries use.
fn registry_arch(rust_arch: &str) -> &str {
    match rust_arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        "arm" => "arm",
        "powerpc64" => "ppc64le",
        "s390x" => "s390x",
        "riscv64" => "riscv64",
        other => other,
    }
}

//! Container launch for the Dockling runtime.
//!
//! Populates a container root (from a registry image or a single host
//! binary), then jails the process inside it and runs one command in a
//! fresh PID namespace, relaying its output and exit status.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod error;
pub mod launcher;
pub mod process;
pub mod relay;
pub mod rootfs;

pub use error::{RuntimeError, RuntimeResult};
pub use launcher::{Launcher, launch};
pub use rootfs::{Population, RootPopulationStrategy};

//! # dockling-core
//!
//! Low-level Linux isolation primitives for the Dockling runtime.
//!
//! This crate provides safe wrappers over:
//! - **Filesystem jail**: `chdir(2)` + `chroot(2)` into a container root.
//! - **Root preparation**: installing a host executable inside a root.
//! - **Namespaces**: a fresh PID namespace for the container's children.
//!
//! Every wrapper reports failures as a
//! [`LaunchError`](dockling_common::error::LaunchError) naming the step.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod filesystem;
pub mod namespace;

//! Filesystem management for container isolation.
//!
//! Provides the `chroot` jail and the helpers that make a command
//! available inside the root before the jail is entered.

pub mod chroot;
pub mod install;

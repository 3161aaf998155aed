//! # dockling
//!
//! Runs one command inside a container image: pulls and extracts the image
//! into a fresh root, jails itself there, and relays the command's output
//! and exit status.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

mod commands;

use clap::Parser;
use dockling_common::constants::{APP_NAME, FATAL_EXIT_CODE};
use tracing_subscriber::EnvFilter;

use crate::commands::Cli;

#[allow(clippy::print_stderr)]
fn main() {
    // Logs go to stderr so relayed stdout stays byte-exact.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match commands::execute(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("{}", fatal_message(&e));
            std::process::exit(FATAL_EXIT_CODE);
        }
    }
}

/// One-line diagnostic for a failure of Dockling itself, with its causes.
fn fatal_message(error: &anyhow::Error) -> String {
    format!("{APP_NAME}: {error:#}")
}

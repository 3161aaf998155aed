//! CLI command definitions and dispatch.

pub mod run;

use clap::{Parser, Subcommand};

/// Dockling — run a command inside a container image.
#[derive(Parser, Debug)]
#[command(name = "dockling", version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a command inside a freshly populated container root.
    Run(run::RunArgs),
}

/// Dispatches the parsed CLI command to its handler.
///
/// Returns the exit code the process should terminate with.
///
/// # Errors
///
/// Returns an error if the command fails before the container command
/// produced an exit status.
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Command::Run(args) => run::execute(args),
    }
}

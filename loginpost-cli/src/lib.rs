//! Loginpost CLI library: argument definitions, command handlers and output rendering.
//!
//! The `loginpost` binary is a thin wrapper around [`run`].

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

use cli::{Cli, Commands};
use error::CliError;
use output::OutputWriter;

/// Dispatch a parsed command line to its handler.
pub async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        Commands::Read(args) => commands::read::execute(args, &cli.config, &writer).await,
        Commands::State(args) => commands::state::execute(args, &cli.config, &writer).await,
        Commands::Config(args) => commands::config::execute(args, &cli.config, &writer).await,
    }
}

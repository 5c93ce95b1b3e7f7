//! zvuk-dl - download tracks, releases and artists from Zvuk with tags,
//! cover art and lyrics.
//!
//! Run without a subcommand for usage.

pub mod cli;
pub mod config;
pub mod cover;
pub mod downloader;
pub mod error;
pub mod lyrics;
pub mod metadata;
pub mod model;
pub mod organizer;
pub mod quality;
pub mod service;
pub mod stats;
#[cfg(test)]
pub mod test_utils;
pub mod transport;

use clap::{CommandFactory, Parser};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy()
                .add_directive("zvuk_dl=info".parse()?),
        )
        .init();

    // Try to run a CLI command
    if cli::run_command(&args)? {
        return Ok(());
    }

    cli::Cli::command().print_help()?;
    println!();
    Ok(())
}

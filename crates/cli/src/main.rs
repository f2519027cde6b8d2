mod cli;
mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chunklab_core::config::{load_dotenv, Config};

use crate::cli::{CliArgs, Command};

#[tokio::main]
async fn main() -> Result<()> {
    load_dotenv();
    let args = CliArgs::parse();

    let filter = match args.log_level.as_deref() {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = Config::from_env();
    config.log_summary();

    match &args.command {
        Command::List => commands::list(&config),
        Command::Chunk(chunk) => commands::chunk(&config, args.config.as_deref(), chunk).await,
        Command::Index(index) => commands::index(&config, index),
        Command::Analyze { command } => commands::analyze(&config, command),
    }
}

//! Morpho simulator CLI - run, plan and fund action sequences offline.

mod cli;
mod commands;
mod output;
mod scenario;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{Cli, Commands};
use commands::{run_funding, run_reallocate, run_simulate};

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    match &cli.command {
        Commands::Simulate(args) => run_simulate(args, cli.format, cli.chain.0)?,
        Commands::Reallocate(args) => run_reallocate(args, cli.format, cli.chain.0)?,
        Commands::Funding(args) => run_funding(args, cli.format, cli.chain.0)?,
    }

    Ok(())
}

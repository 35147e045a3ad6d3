//! CLI argument definitions using clap.

use std::path::PathBuf;
use std::str::FromStr;

use alloy_chains::NamedChain;
use clap::{Parser, Subcommand, ValueEnum};

/// Morpho simulator - preview action sequences against a snapshot
#[derive(Parser, Debug)]
#[command(name = "morpho-sim")]
#[command(about = "CLI tool for simulating Morpho actions offline", long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(long, global = true, default_value = "table")]
    pub format: OutputFormat,

    /// Chain whose address book is used when the scenario carries no config
    #[arg(long, global = true, default_value = "ethereum")]
    pub chain: ChainArg,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scenario's actions and show the resulting state
    Simulate(SimulateArgs),
    /// Plan public-allocator reallocations toward a market
    Reallocate(ReallocateArgs),
    /// Estimate the funding a holder needs to run the scenario's actions
    Funding(FundingArgs),
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Scenario file (snapshot and actions as JSON)
    pub scenario: PathBuf,

    /// Include the snapshots produced inside callbacks
    #[arg(long)]
    pub trace: bool,
}

#[derive(Parser, Debug)]
pub struct ReallocateArgs {
    /// Scenario file (only the snapshot is used)
    pub scenario: PathBuf,

    /// Market to pull liquidity into
    #[arg(long)]
    pub market: String,

    /// Default utilization ceiling of source markets, in percent
    #[arg(long)]
    pub max_utilization: Option<f64>,

    /// Only consider these vaults (repeatable)
    #[arg(long = "vault")]
    pub vaults: Vec<String>,

    /// Maximum number of planning rounds
    #[arg(long)]
    pub max_iterations: Option<u32>,
}

#[derive(Parser, Debug)]
pub struct FundingArgs {
    /// Scenario file (snapshot and actions as JSON)
    pub scenario: PathBuf,

    /// Holder executing the actions (default: the bundler adapter)
    #[arg(long)]
    pub holder: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// Wrapper for NamedChain that implements FromStr with aliases
#[derive(Clone, Copy, Debug)]
pub struct ChainArg(pub NamedChain);

impl FromStr for ChainArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chain = match s.to_lowercase().as_str() {
            "ethereum" | "eth" | "mainnet" | "1" => NamedChain::Mainnet,
            "base" | "8453" => NamedChain::Base,
            _ => return Err(format!("Unknown chain: {}", s)),
        };
        Ok(ChainArg(chain))
    }
}

impl std::fmt::Display for ChainArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

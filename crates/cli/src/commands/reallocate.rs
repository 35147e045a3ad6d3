//! `reallocate` command implementation.

use alloy_chains::NamedChain;
use alloy_primitives::{Address, U256};
use anyhow::{Context, Result};
use morpho_rs_simulation::{
    plan_reallocation, Interpreter, MarketId, ReallocationOptions, WAD,
};
use serde_json::json;

use crate::cli::{OutputFormat, ReallocateArgs};
use crate::output::format_reallocation;
use crate::scenario::Scenario;

/// Percent to WAD, e.g. 92.5 -> 0.925e18
fn percent_to_wad(percent: f64) -> Result<U256> {
    if !(0.0..=100.0).contains(&percent) {
        anyhow::bail!("Utilization must be between 0 and 100, got {}", percent);
    }
    let basis_points = (percent * 100.0).round() as u64;
    Ok(U256::from(basis_points) * WAD / U256::from(10_000))
}

fn build_options(args: &ReallocateArgs) -> Result<ReallocationOptions> {
    let mut options = ReallocationOptions::default();
    if let Some(percent) = args.max_utilization {
        options.default_max_withdrawal_utilization = percent_to_wad(percent)?;
    }
    if let Some(max_iterations) = args.max_iterations {
        options.max_iterations = max_iterations;
    }
    if !args.vaults.is_empty() {
        let vaults = args
            .vaults
            .iter()
            .map(|vault| {
                vault
                    .parse::<Address>()
                    .with_context(|| format!("Invalid vault address: {}", vault))
            })
            .collect::<Result<Vec<_>>>()?;
        options.vaults = Some(vaults);
    }
    Ok(options)
}

pub fn run_reallocate(args: &ReallocateArgs, format: OutputFormat, chain: NamedChain) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let interpreter = Interpreter::new(scenario.config(chain)?);
    let market_id: MarketId = args
        .market
        .parse()
        .with_context(|| format!("Invalid market id: {}", args.market))?;
    let options = build_options(args)?;

    let plan = plan_reallocation(&interpreter, &scenario.snapshot, market_id, &options)
        .context("Reallocation planning failed")?;

    match format {
        OutputFormat::Table => {
            println!("{}", format_reallocation(&plan, &scenario.snapshot)?);
        }
        OutputFormat::Json => {
            let output = json!({
                "target_market_id": plan.target_market_id,
                "withdrawals": plan.withdrawals,
                "total_withdrawn": plan.total_withdrawn(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

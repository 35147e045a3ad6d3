//! `funding` command implementation.

use alloy_chains::NamedChain;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use morpho_rs_simulation::{estimate_funding, Interpreter};

use crate::cli::{FundingArgs, OutputFormat};
use crate::output::format_funding_table;
use crate::scenario::Scenario;

pub fn run_funding(args: &FundingArgs, format: OutputFormat, chain: NamedChain) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let interpreter = Interpreter::new(scenario.config(chain)?);
    let holder = args
        .holder
        .as_deref()
        .map(|holder| {
            holder
                .parse::<Address>()
                .with_context(|| format!("Invalid holder address: {}", holder))
        })
        .transpose()?;

    let requirements = estimate_funding(&interpreter, &scenario.snapshot, &scenario.actions, holder)
        .context("Funding estimation failed")?;

    match format {
        OutputFormat::Table => {
            println!("{}", format_funding_table(&requirements, &scenario.snapshot));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&requirements)?;
            println!("{}", json);
        }
    }

    Ok(())
}

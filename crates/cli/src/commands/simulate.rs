//! `simulate` command implementation.

use alloy_chains::NamedChain;
use anyhow::{Context, Result};
use colored::Colorize;
use morpho_rs_simulation::Interpreter;

use crate::cli::{OutputFormat, SimulateArgs};
use crate::output::format_simulation;
use crate::scenario::Scenario;

pub fn run_simulate(args: &SimulateArgs, format: OutputFormat, chain: NamedChain) -> Result<()> {
    let scenario = Scenario::load(&args.scenario)?;
    let interpreter = Interpreter::new(scenario.config(chain)?);

    let snapshots = if args.trace {
        interpreter.run_traced(&scenario.snapshot, &scenario.actions)
    } else {
        interpreter.run(&scenario.snapshot, &scenario.actions)
    }
    .context("Simulation failed")?;

    match format {
        OutputFormat::Table => {
            println!("{}", format_simulation(&scenario.actions, &snapshots));
            println!(
                "{} {} actions applied, {} snapshots",
                "OK".green().bold(),
                scenario.actions.len(),
                snapshots.len()
            );
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&snapshots)?;
            println!("{}", json);
        }
    }

    Ok(())
}

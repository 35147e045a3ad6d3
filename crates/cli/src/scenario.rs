//! Scenario files: a snapshot, an optional configuration and the actions to run.

use std::path::Path;

use alloy_chains::NamedChain;
use anyhow::{Context, Result};
use morpho_rs_simulation::{Action, SimulationConfig, Snapshot};
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// Overrides the chain address book when present
    #[serde(default)]
    pub config: Option<SimulationConfig>,
    pub snapshot: Snapshot,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        let scenario: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid scenario {}", path.display()))?;
        debug!(
            path = %path.display(),
            actions = scenario.actions.len(),
            timestamp = scenario.snapshot.timestamp(),
            "Loaded scenario"
        );
        Ok(scenario)
    }

    /// The scenario's own config, else the address book of `chain`
    pub fn config(&self, chain: NamedChain) -> Result<SimulationConfig> {
        match &self.config {
            Some(config) => Ok(config.clone()),
            None => SimulationConfig::for_chain(chain)
                .with_context(|| format!("No address book for chain {}", chain)),
        }
    }
}

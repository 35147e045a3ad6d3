//! Test helper utilities for CLI integration tests.

#![allow(deprecated)] // Command::cargo_bin deprecation

use assert_cmd::Command;

/// Market the reallocation fixture pulls liquidity from
pub const SOURCE_MARKET: &str = "0x1111111111111111111111111111111111111111111111111111111111111111";

/// Market the reallocation fixture pulls liquidity into
pub const TARGET_MARKET: &str = "0x2222222222222222222222222222222222222222222222222222222222222222";

pub const VAULT: &str = "0x1010101010101010101010101010101010101010";

/// Create a CLI command.
pub fn morpho_sim_cmd() -> Command {
    Command::cargo_bin("morpho-sim").unwrap()
}

/// Path of a scenario fixture.
pub fn fixture_path(name: &str) -> String {
    format!("{}/tests/fixtures/{}.json", env!("CARGO_MANIFEST_DIR"), name)
}

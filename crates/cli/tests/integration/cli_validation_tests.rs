//! CLI argument validation tests.

use predicates::prelude::*;

use super::helpers::{fixture_path, morpho_sim_cmd};

#[test]
fn test_help_output() {
    morpho_sim_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("morpho-sim"))
        .stdout(predicate::str::contains("simulate"))
        .stdout(predicate::str::contains("reallocate"))
        .stdout(predicate::str::contains("funding"));
}

#[test]
fn test_reallocate_help_output() {
    morpho_sim_cmd()
        .args(["reallocate", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--market"))
        .stdout(predicate::str::contains("--max-utilization"))
        .stdout(predicate::str::contains("--vault"));
}

#[test]
fn test_invalid_command() {
    morpho_sim_cmd()
        .arg("invalid_command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_simulate_missing_scenario() {
    morpho_sim_cmd()
        .arg("simulate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_reallocate_missing_market() {
    morpho_sim_cmd()
        .args(["reallocate", &fixture_path("reallocate")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--market"));
}

#[test]
fn test_invalid_chain_value() {
    morpho_sim_cmd()
        .args(["--chain", "invalid_chain", "simulate", &fixture_path("transfer")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown chain"));
}

#[test]
fn test_invalid_format_value() {
    morpho_sim_cmd()
        .args(["--format", "xml", "simulate", &fixture_path("transfer")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_missing_scenario_file() {
    morpho_sim_cmd()
        .args(["simulate", "does/not/exist.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read scenario"));
}

#[test]
fn test_invalid_market_id() {
    morpho_sim_cmd()
        .args(["reallocate", &fixture_path("reallocate"), "--market", "0x1234"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid market id"));
}

#[test]
fn test_invalid_holder_address() {
    morpho_sim_cmd()
        .args(["funding", &fixture_path("funding"), "--holder", "not_an_address"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid holder address"));
}

#[test]
fn test_max_utilization_out_of_range() {
    morpho_sim_cmd()
        .args([
            "reallocate",
            &fixture_path("reallocate"),
            "--market",
            super::helpers::TARGET_MARKET,
            "--max-utilization",
            "150",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("between 0 and 100"));
}

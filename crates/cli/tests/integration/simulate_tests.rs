//! `simulate` command tests.

use predicates::prelude::*;

use super::helpers::{fixture_path, morpho_sim_cmd};

#[test]
fn test_simulate_table_output() {
    morpho_sim_cmd()
        .args(["simulate", &fixture_path("transfer")])
        .assert()
        .success()
        .stdout(predicate::str::contains("approve"))
        .stdout(predicate::str::contains("transfer"))
        .stdout(predicate::str::contains("LOAN"))
        .stdout(predicate::str::contains("2 actions applied, 3 snapshots"));
}

#[test]
fn test_simulate_json_output() {
    let output = morpho_sim_cmd()
        .args(["--format", "json", "simulate", &fixture_path("transfer")])
        .output()
        .unwrap();
    assert!(output.status.success());

    let snapshots: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let snapshots = snapshots.as_array().unwrap();
    assert_eq!(snapshots.len(), 3);

    let bob = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";
    let last = &snapshots[2];
    let holding = last["holdings"]
        .as_array()
        .unwrap()
        .iter()
        .find(|holding| holding["user"].as_str().unwrap().eq_ignore_ascii_case(bob))
        .unwrap();
    // 30 LOAN
    assert_eq!(holding["balance"], "0x1a055690d9db80000");
}

#[test]
fn test_simulate_failing_batch() {
    morpho_sim_cmd()
        .args(["simulate", &fixture_path("insufficient_balance")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Simulation failed"))
        .stderr(predicate::str::contains("Insufficient balance"));
}

#[test]
fn test_simulate_trace_without_callbacks() {
    morpho_sim_cmd()
        .args(["simulate", "--trace", &fixture_path("transfer")])
        .assert()
        .success()
        .stdout(predicate::str::contains("3 snapshots"));
}

#[test]
fn test_simulate_unfunded_bundler() {
    // The funding scenario expects the bundler to be funded first
    morpho_sim_cmd()
        .args(["simulate", "--trace", &fixture_path("funding")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Insufficient balance"));
}

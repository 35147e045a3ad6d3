//! `reallocate` command tests.

use predicates::prelude::*;

use super::helpers::{fixture_path, morpho_sim_cmd, SOURCE_MARKET, TARGET_MARKET, VAULT};

#[test]
fn test_reallocate_table_output() {
    morpho_sim_cmd()
        .args(["reallocate", &fixture_path("reallocate"), "--market", TARGET_MARKET])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reallocation Plan"))
        .stdout(predicate::str::contains("Withdrawals"))
        .stdout(predicate::str::contains("400"));
}

#[test]
fn test_reallocate_json_output() {
    let output = morpho_sim_cmd()
        .args([
            "--format",
            "json",
            "reallocate",
            &fixture_path("reallocate"),
            "--market",
            TARGET_MARKET,
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["target_market_id"], TARGET_MARKET);

    // Capped by the 400 LOAN cap of the target market
    let withdrawals = plan["withdrawals"].as_array().unwrap();
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0]["market_id"], SOURCE_MARKET);
    assert!(withdrawals[0]["vault"].as_str().unwrap().eq_ignore_ascii_case(VAULT));
    assert_eq!(withdrawals[0]["assets"], "0x15af1d78b58c400000");
    assert_eq!(plan["total_withdrawn"], "0x15af1d78b58c400000");
}

#[test]
fn test_reallocate_from_source_market_finds_nothing() {
    // The source market has no inflow capacity
    morpho_sim_cmd()
        .args(["reallocate", &fixture_path("reallocate"), "--market", SOURCE_MARKET])
        .assert()
        .success()
        .stdout(predicate::str::contains("No liquidity can be reallocated."));
}

#[test]
fn test_reallocate_vault_filter() {
    morpho_sim_cmd()
        .args([
            "reallocate",
            &fixture_path("reallocate"),
            "--market",
            TARGET_MARKET,
            "--vault",
            "0x9999999999999999999999999999999999999999",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("No liquidity can be reallocated."));
}

#[test]
fn test_reallocate_iteration_limit() {
    morpho_sim_cmd()
        .args([
            "reallocate",
            &fixture_path("reallocate"),
            "--market",
            TARGET_MARKET,
            "--max-iterations",
            "0",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Reallocation planning failed"));
}

#[test]
fn test_reallocate_unknown_market() {
    morpho_sim_cmd()
        .args([
            "reallocate",
            &fixture_path("reallocate"),
            "--market",
            "0x3333333333333333333333333333333333333333333333333333333333333333",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Reallocation planning failed"));
}

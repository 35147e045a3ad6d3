//! Sequencing and token movement through the public interpreter API.

use alloy_primitives::U256;
use morpho_rs_simulation::{Action, Holding, SimError, Snapshot};

use super::helpers::{
    create_data, create_holding, create_interpreter, create_market, wad, ALICE, BOB, COLLATERAL,
    LOAN, MORPHO,
};

fn create_snapshot() -> Snapshot {
    let mut data = create_data();
    let market = create_market(86, 1_000, 500);
    data.holdings = vec![
        create_holding(ALICE, LOAN, wad(100), &[MORPHO]),
        create_holding(ALICE, COLLATERAL, wad(100), &[MORPHO]),
        Holding::new(BOB, LOAN, U256::ZERO),
    ];
    data.markets = vec![market];
    Snapshot::try_from(data).unwrap()
}

fn market_id() -> morpho_rs_simulation::MarketId {
    create_market(86, 1_000, 500).id
}

fn balance(snapshot: &Snapshot, user: alloy_primitives::Address) -> U256 {
    snapshot.holding(user, LOAN).unwrap().balance
}

#[test]
fn test_transfer_from_empty_balance_fails() {
    let snapshot = create_snapshot();
    let action = Action::Transfer {
        sender: MORPHO,
        token: LOAN,
        from: BOB,
        to: ALICE,
        amount: U256::from(1),
    };

    let result = create_interpreter().run(&snapshot, &[action]);
    assert_eq!(
        result,
        Err(SimError::InsufficientBalance {
            token: LOAN,
            user: BOB
        })
    );
}

#[test]
fn test_approve_then_transfer_from() {
    let snapshot = create_snapshot();
    let amount = wad(30);
    let actions = [
        Action::Approve {
            sender: ALICE,
            token: LOAN,
            spender: BOB,
            amount,
        },
        Action::Transfer {
            sender: BOB,
            token: LOAN,
            from: ALICE,
            to: BOB,
            amount,
        },
    ];

    let snapshots = create_interpreter().run(&snapshot, &actions).unwrap();
    assert_eq!(snapshots.len(), 3);

    let approved = snapshots[1].holding(ALICE, LOAN).unwrap();
    assert_eq!(approved.allowance(BOB), amount);
    assert_eq!(balance(&snapshots[1], BOB), U256::ZERO);

    let spent = snapshots[2].holding(ALICE, LOAN).unwrap();
    assert_eq!(spent.allowance(BOB), U256::ZERO);
    assert_eq!(balance(&snapshots[2], BOB), amount);
    assert_eq!(balance(&snapshots[2], ALICE), wad(70));
}

#[test]
fn test_runs_are_deterministic_and_pure() {
    let snapshot = create_snapshot();
    let before = snapshot.clone();
    let actions = [
        Action::SupplyCollateral {
            sender: ALICE,
            market_id: market_id(),
            on_behalf: ALICE,
            assets: wad(100),
            callback: Vec::new(),
        },
        Action::Borrow {
            sender: ALICE,
            market_id: market_id(),
            on_behalf: ALICE,
            receiver: BOB,
            assets: wad(50),
            shares: U256::ZERO,
        },
    ];

    let interpreter = create_interpreter();
    let first = interpreter.run(&snapshot, &actions).unwrap();
    let second = interpreter.run(&snapshot, &actions).unwrap();

    assert_eq!(first, second);
    assert_eq!(snapshot, before);
    assert_eq!(first[0], snapshot);
    assert_eq!(balance(&first[2], BOB), wad(50));
}

#[test]
fn test_failure_reports_first_error_only() {
    let snapshot = create_snapshot();
    let borrow = |assets| Action::Borrow {
        sender: ALICE,
        market_id: market_id(),
        on_behalf: ALICE,
        receiver: ALICE,
        assets,
        shares: U256::ZERO,
    };

    // No collateral yet, then a borrow far above any limit
    let result = create_interpreter().run(&snapshot, &[borrow(wad(1)), borrow(wad(10_000))]);
    assert_eq!(
        result,
        Err(SimError::InsufficientCollateral {
            user: ALICE,
            market_id: market_id()
        })
    );
}

#[test]
fn test_actions_from_json() {
    let snapshot = create_snapshot();
    let json = format!(
        r#"[
            {{
                "type": "supply",
                "sender": "{ALICE}",
                "market_id": "{id}",
                "on_behalf": "{ALICE}",
                "assets": "0x4e1003b28d9280000"
            }},
            {{
                "type": "transfer",
                "sender": "{ALICE}",
                "token": "{LOAN}",
                "from": "{ALICE}",
                "to": "{BOB}",
                "amount": "0x8ac7230489e80000"
            }}
        ]"#,
        id = market_id(),
    );
    let actions: Vec<Action> = serde_json::from_str(&json).unwrap();
    assert_eq!(actions[0].kind(), "supply");

    let snapshots = create_interpreter().run(&snapshot, &actions).unwrap();
    let last = snapshots.last().unwrap();
    // 90 supplied, 10 sent
    assert_eq!(balance(last, ALICE), U256::ZERO);
    assert_eq!(balance(last, BOB), wad(10));
    assert_eq!(
        last.position(ALICE, market_id()).unwrap().supply_shares,
        wad(90) * U256::from(1_000_000)
    );
}

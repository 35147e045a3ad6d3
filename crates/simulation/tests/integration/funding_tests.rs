//! Funding estimation for bundled flows with nested callbacks.

use alloy_primitives::U256;
use morpho_rs_simulation::{
    estimate_funding, Action, FundingRequirement, Snapshot, User, FUNDING_SENTINEL,
};

use super::helpers::{
    create_data, create_holding, create_interpreter, create_market, wad, ALICE, BUNDLER,
    COLLATERAL, LOAN, MORPHO,
};

fn create_snapshot() -> Snapshot {
    let mut data = create_data();
    data.markets = vec![create_market(86, 1_000, 500)];
    data.users = vec![User {
        is_bundler_authorized: true,
        ..User::new(ALICE)
    }];
    data.holdings = vec![
        create_holding(BUNDLER, LOAN, U256::ZERO, &[MORPHO]),
        create_holding(BUNDLER, COLLATERAL, U256::ZERO, &[MORPHO]),
    ];
    Snapshot::try_from(data).unwrap()
}

/// Collateral supply whose callback supplies 80 and then borrows 50 back
fn create_leveraged_supply() -> Action {
    let market_id = create_market(86, 1_000, 500).id;
    Action::SupplyCollateral {
        sender: BUNDLER,
        market_id,
        on_behalf: ALICE,
        assets: wad(100),
        callback: vec![
            Action::Supply {
                sender: BUNDLER,
                market_id,
                on_behalf: ALICE,
                assets: wad(80),
                shares: U256::ZERO,
                callback: Vec::new(),
            },
            Action::Borrow {
                sender: BUNDLER,
                market_id,
                on_behalf: ALICE,
                receiver: BUNDLER,
                assets: wad(50),
                shares: U256::ZERO,
            },
        ],
    }
}

#[test]
fn test_requirement_is_the_nested_peak() {
    let snapshot = create_snapshot();
    let actions = [create_leveraged_supply()];
    let interpreter = create_interpreter();

    let requirements = estimate_funding(&interpreter, &snapshot, &actions, None).unwrap();
    assert_eq!(
        requirements,
        vec![
            FundingRequirement {
                token: LOAN,
                amount: wad(80),
            },
            FundingRequirement {
                token: COLLATERAL,
                amount: wad(100),
            },
        ]
    );

    // The final state alone only shows the net 30
    let mut data = snapshot.to_data();
    for holding in &mut data.holdings {
        holding.balance = FUNDING_SENTINEL;
    }
    let probe = Snapshot::try_from(data).unwrap();
    let snapshots = interpreter.run(&probe, &actions).unwrap();
    let last = snapshots.last().unwrap();
    assert_eq!(
        FUNDING_SENTINEL - last.holding(BUNDLER, LOAN).unwrap().balance,
        wad(30)
    );
}

#[test]
fn test_funded_batch_succeeds() {
    let snapshot = create_snapshot();
    let actions = [create_leveraged_supply()];
    let interpreter = create_interpreter();
    let requirements = estimate_funding(&interpreter, &snapshot, &actions, None).unwrap();

    let mut data = snapshot.to_data();
    for holding in &mut data.holdings {
        if let Some(requirement) = requirements.iter().find(|r| r.token == holding.token) {
            holding.balance = requirement.amount;
        }
    }
    let funded = Snapshot::try_from(data).unwrap();
    let snapshots = interpreter.run(&funded, &actions).unwrap();
    let last = snapshots.last().unwrap();

    assert_eq!(last.holding(BUNDLER, LOAN).unwrap().balance, wad(50));
    assert_eq!(last.holding(BUNDLER, COLLATERAL).unwrap().balance, U256::ZERO);

    // One wei less of loan token and the nested supply fails
    let mut data = funded.to_data();
    for holding in &mut data.holdings {
        if holding.token == LOAN {
            holding.balance -= U256::from(1);
        }
    }
    let short = Snapshot::try_from(data).unwrap();
    assert!(interpreter.run(&short, &actions).is_err());
}

#[test]
fn test_requirements_are_never_negative() {
    let snapshot = create_snapshot();
    let market_id = create_market(86, 1_000, 500).id;
    // Borrowing only brings tokens in
    let actions = [
        Action::SupplyCollateral {
            sender: BUNDLER,
            market_id,
            on_behalf: ALICE,
            assets: wad(10),
            callback: vec![Action::Borrow {
                sender: BUNDLER,
                market_id,
                on_behalf: ALICE,
                receiver: BUNDLER,
                assets: wad(5),
                shares: U256::ZERO,
            }],
        },
    ];

    let requirements = estimate_funding(&create_interpreter(), &snapshot, &actions, None).unwrap();
    assert_eq!(
        requirements,
        vec![FundingRequirement {
            token: COLLATERAL,
            amount: wad(10),
        }]
    );
}

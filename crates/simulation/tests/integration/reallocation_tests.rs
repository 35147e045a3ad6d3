//! Public-allocator planning across two vaults sharing a source and a target market.

use alloy_primitives::{Address, U256};
use morpho_rs_simulation::{
    plan_reallocation, Market, Position, ReallocationOptions, Snapshot, WAD,
};

use super::helpers::{
    create_data, create_interpreter, create_market, create_market_config, create_public_allocator,
    create_vault, wad,
};

const FIRST_VAULT: Address = Address::repeat_byte(0x10);
const SECOND_VAULT: Address = Address::repeat_byte(0x20);

struct Setup {
    snapshot: Snapshot,
    source: Market,
    target: Market,
}

/// Both vaults hold 500 on an unborrowed source market. The first may move 400
/// into the target, the second is capped at 200 and may only take 50 out.
fn create_setup() -> Setup {
    let source = create_market(86, 1_000, 0);
    let target = create_market(77, 100, 90);

    let mut data = create_data();
    data.vaults = vec![
        create_vault(FIRST_VAULT, &[&source, &target], wad(500)),
        create_vault(SECOND_VAULT, &[&source, &target], wad(500)),
    ];
    data.vault_market_configs = vec![
        create_market_config(FIRST_VAULT, &source, wad(1_000), U256::ZERO, wad(1_000)),
        create_market_config(FIRST_VAULT, &target, wad(400), wad(1_000), U256::ZERO),
        create_market_config(SECOND_VAULT, &source, wad(1_000), U256::ZERO, wad(50)),
        create_market_config(SECOND_VAULT, &target, wad(200), wad(1_000), U256::ZERO),
    ];
    data.positions = [FIRST_VAULT, SECOND_VAULT]
        .into_iter()
        .map(|vault| Position {
            supply_shares: wad(500) * U256::from(1_000_000),
            ..Position::empty(vault, source.id)
        })
        .collect();
    data.vault_users = vec![
        create_public_allocator(FIRST_VAULT),
        create_public_allocator(SECOND_VAULT),
    ];
    data.markets = vec![source.clone(), target.clone()];

    Setup {
        snapshot: Snapshot::try_from(data).unwrap(),
        source,
        target,
    }
}

#[test]
fn test_plan_orders_withdrawals_by_size() {
    let setup = create_setup();
    let plan = plan_reallocation(
        &create_interpreter(),
        &setup.snapshot,
        setup.target.id,
        &ReallocationOptions::default(),
    )
    .unwrap();

    let moves: Vec<_> = plan
        .withdrawals
        .iter()
        .map(|withdrawal| (withdrawal.vault, withdrawal.market_id, withdrawal.assets))
        .collect();
    assert_eq!(
        moves,
        vec![
            (FIRST_VAULT, setup.source.id, wad(400)),
            (SECOND_VAULT, setup.source.id, wad(50)),
        ]
    );

    let before = setup.snapshot.market(setup.target.id).unwrap().liquidity();
    let after = plan.snapshot.market(setup.target.id).unwrap().liquidity();
    assert_eq!(after, before + plan.total_withdrawn());
}

#[test]
fn test_plan_respects_every_limit() {
    let setup = create_setup();
    let plan = plan_reallocation(
        &create_interpreter(),
        &setup.snapshot,
        setup.target.id,
        &ReallocationOptions::default(),
    )
    .unwrap();

    for withdrawal in &plan.withdrawals {
        let source = setup
            .snapshot
            .vault_market_config(withdrawal.vault, withdrawal.market_id)
            .unwrap();
        let target = setup
            .snapshot
            .vault_market_config(withdrawal.vault, setup.target.id)
            .unwrap();
        let source_caps = source.flow_caps.clone().unwrap();
        let target_caps = target.flow_caps.clone().unwrap();

        assert!(withdrawal.assets <= source_caps.max_out);
        assert!(withdrawal.assets <= target_caps.max_in);
        assert!(withdrawal.assets <= target.cap);
    }

    // Every vault ends within its cap on the target
    for vault in [FIRST_VAULT, SECOND_VAULT] {
        let supplied = plan
            .snapshot
            .accrual_position(vault, setup.target.id)
            .unwrap()
            .supply_assets();
        let cap = plan.snapshot.vault_market_config(vault, setup.target.id).unwrap().cap;
        assert!(supplied <= cap);
    }
}

#[test]
fn test_plan_respects_utilization_ceiling() {
    let setup = create_setup();
    let mut data = setup.snapshot.to_data();
    // 600 of 1000 borrowed: 652 stays needed at 92%, 347 can leave
    for market in &mut data.markets {
        if market.id == setup.source.id {
            market.total_borrow_assets = wad(600);
            market.total_borrow_shares = wad(600) * U256::from(1_000_000);
        }
    }
    let snapshot = Snapshot::try_from(data).unwrap();

    let plan = plan_reallocation(
        &create_interpreter(),
        &snapshot,
        setup.target.id,
        &ReallocationOptions::default(),
    )
    .unwrap();

    let source = plan.snapshot.market(setup.source.id).unwrap();
    let ceiling = U256::from(920_000_000_000_000_000u64);
    assert!(source.total_borrow_assets * WAD <= source.total_supply_assets * ceiling + WAD);
    assert!(plan.withdrawals[0].assets < wad(400));
}

//! Snapshot builders shared by the integration tests.

use alloy_primitives::{Address, U256};
use morpho_rs_simulation::{
    AddressBook, ChainContext, FlowCaps, Holding, Interpreter, Market, MarketParams,
    SimulationConfig, SnapshotData, Token, Vault, VaultMarketConfig, VaultPublicAllocatorConfig,
    VaultUser, ORACLE_PRICE_SCALE, WAD,
};

pub const TIMESTAMP: u64 = 1_700_000_000;

pub const LOAN: Address = Address::repeat_byte(0x01);
pub const COLLATERAL: Address = Address::repeat_byte(0x02);
pub const ALICE: Address = Address::repeat_byte(0xAA);
pub const BOB: Address = Address::repeat_byte(0xBB);
pub const MORPHO: Address = Address::repeat_byte(0xC0);
pub const PERMIT2: Address = Address::repeat_byte(0xC1);
pub const BUNDLER: Address = Address::repeat_byte(0xC2);
pub const PUBLIC_ALLOCATOR: Address = Address::repeat_byte(0xC3);

pub fn wad(amount: u64) -> U256 {
    U256::from(amount) * WAD
}

pub fn create_interpreter() -> Interpreter {
    Interpreter::new(SimulationConfig::new(AddressBook {
        morpho: MORPHO,
        permit2: PERMIT2,
        bundler_adapter: BUNDLER,
        public_allocator: Some(PUBLIC_ALLOCATOR),
        wrapped_native: None,
    }))
}

/// Empty tables with the loan and collateral tokens declared
pub fn create_data() -> SnapshotData {
    let mut data = SnapshotData::new(ChainContext {
        chain_id: 1,
        block_number: 19_000_000,
        timestamp: TIMESTAMP,
        fee_recipient: Address::repeat_byte(0xFE),
    });
    data.tokens = vec![
        Token::new(LOAN, 18, "LOAN"),
        Token::new(COLLATERAL, 18, "COLL"),
    ];
    data
}

/// A 1:1 priced market with 1e6 shares per asset and no pending interest
pub fn create_market(lltv: u64, supply: u64, borrow: u64) -> Market {
    let params = MarketParams {
        loan_token: LOAN,
        collateral_token: COLLATERAL,
        oracle: Address::repeat_byte(0x0A),
        irm: Address::repeat_byte(0x0B),
        lltv: U256::from(lltv) * U256::from(10_000_000_000_000_000u64),
    };
    Market {
        total_supply_assets: wad(supply),
        total_supply_shares: wad(supply) * U256::from(1_000_000),
        total_borrow_assets: wad(borrow),
        total_borrow_shares: wad(borrow) * U256::from(1_000_000),
        price: Some(ORACLE_PRICE_SCALE),
        ..Market::new(params, TIMESTAMP)
    }
}

pub fn create_holding(user: Address, token: Address, balance: U256, spenders: &[Address]) -> Holding {
    let mut holding = Holding::new(user, token, balance);
    for &spender in spenders {
        holding.set_allowance(spender, U256::MAX);
    }
    holding
}

/// A vault of LOAN with the public allocator enabled at no fee
pub fn create_vault(address: Address, markets: &[&Market], total_assets: U256) -> Vault {
    let queue: Vec<_> = markets.iter().map(|market| market.id).collect();
    Vault {
        address,
        asset: LOAN,
        decimals_offset: 0,
        owner: Address::repeat_byte(0x11),
        curator: Address::repeat_byte(0x12),
        guardian: Address::ZERO,
        fee: U256::ZERO,
        fee_recipient: Address::repeat_byte(0x13),
        timelock: 86_400,
        supply_queue: queue.clone(),
        withdraw_queue: queue,
        total_assets,
        last_total_assets: total_assets,
        total_supply: total_assets,
        public_allocator_config: Some(VaultPublicAllocatorConfig {
            admin: Address::repeat_byte(0x11),
            fee: U256::ZERO,
            accrued_fee: U256::ZERO,
        }),
    }
}

pub fn create_market_config(
    vault: Address,
    market: &Market,
    cap: U256,
    max_in: U256,
    max_out: U256,
) -> VaultMarketConfig {
    VaultMarketConfig {
        cap,
        enabled: true,
        flow_caps: Some(FlowCaps { max_in, max_out }),
        ..VaultMarketConfig::empty(vault, market.id)
    }
}

pub fn create_public_allocator(vault: Address) -> VaultUser {
    VaultUser {
        vault,
        user: PUBLIC_ALLOCATOR,
        is_allocator: true,
        allowance: U256::ZERO,
    }
}

//! Morpho Simulation SDK
//!
//! A deterministic state-transition simulator for Morpho Blue markets and
//! MetaMorpho vaults. It replays the accounting of the on-chain contracts,
//! rounding included, over immutable snapshots of chain state.
//!
//! # Overview
//!
//! - [`Snapshot`]: the entity tables (markets, positions, vaults, holdings, ...)
//!   at one point in time
//! - [`Action`]: the closed catalogue of protocol operations, with nested
//!   callbacks for Morpho's `onMorphoSupply`-style flows
//! - [`Interpreter`]: applies actions one after the other and returns every
//!   intermediate snapshot
//! - [`plan_reallocation`]: greedy public-allocator rebalancing toward a market
//! - [`estimate_funding`]: tokens an intermediary must hold to execute a batch
//!
//! # Example
//!
//! ```rust,ignore
//! use morpho_rs_simulation::{Action, Interpreter, SimulationConfig, Snapshot};
//! use alloy_chains::NamedChain;
//!
//! let config = SimulationConfig::for_chain(NamedChain::Mainnet).unwrap();
//! let snapshot: Snapshot = serde_json::from_str(&json)?;
//! let actions: Vec<Action> = serde_json::from_str(&actions_json)?;
//!
//! let snapshots = Interpreter::new(config).run(&snapshot, &actions)?;
//! let last = snapshots.last().unwrap();
//! println!("{:?}", last.position(user, market_id)?);
//! ```

pub mod action;
pub mod config;
pub mod draft;
pub mod error;
pub mod funding;
mod handlers;
pub mod holding;
pub mod interpreter;
pub mod irm;
pub mod market;
pub mod math;
pub mod position;
pub mod reallocation;
pub mod snapshot;
pub mod token;
pub mod user;
pub mod vault;

// Re-export commonly used types
pub use error::{MarketId, SimError};

// Engine exports
pub use action::{Action, MarketAllocation, Withdrawal};
pub use config::{
    AddressBook, SimulationConfig, DEFAULT_MAX_CALLBACK_DEPTH, MORPHO_ADDRESS, PERMIT2_ADDRESS,
};
pub use draft::Draft;
pub use funding::{estimate_funding, FundingRequirement, FUNDING_SENTINEL};
pub use interpreter::Interpreter;
pub use reallocation::{
    plan_reallocation, PlannedWithdrawal, ReallocationOptions, ReallocationPlan,
    DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_WITHDRAWAL_UTILIZATION, DEFAULT_REALLOCATION_SLIPPAGE,
};
pub use snapshot::{ChainContext, Snapshot, SnapshotData};

// Entity exports
pub use holding::{Holding, Permit2Allowance};
pub use market::{
    get_liquidation_incentive_factor, get_utilization, get_withdraw_to_utilization, Liquidation,
    Market, MarketParams, LIQUIDATION_CURSOR, MAX_LIQUIDATION_INCENTIVE_FACTOR,
    ORACLE_PRICE_SCALE,
};
pub use position::{AccrualPosition, Position};
pub use token::{PermitDomain, Token, WrapRelation, WrappedToken, NATIVE_ADDRESS};
pub use user::User;
pub use vault::{
    AccrualVault, FlowCaps, PendingCap, Vault, VaultMarketAllocation, VaultMarketConfig,
    VaultPublicAllocatorConfig, VaultUser, MAX_QUEUE_LENGTH,
};

// Math exports
pub use math::{RoundingDirection, MAX_UINT_160, SECONDS_PER_YEAR, WAD};

// IRM exports
pub use irm::{
    get_borrow_rate, w_exp, BorrowRateResult, ADJUSTMENT_SPEED, CURVE_STEEPNESS,
    INITIAL_RATE_AT_TARGET, MAX_RATE_AT_TARGET, MIN_RATE_AT_TARGET, TARGET_UTILIZATION,
};

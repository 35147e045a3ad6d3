//! Error types for the simulation library.

use alloy_primitives::{Address, FixedBytes, U256};
use thiserror::Error;

/// Type alias for a 32-byte market ID
pub type MarketId = FixedBytes<32>;

/// Errors that can occur during simulation.
///
/// Every variant names the entities involved so a caller can surface them as-is.
/// Simulation is deterministic: retrying an action list that failed reproduces
/// the same error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SimError {
    // ==================== Unknown entities ====================
    /// Market missing from the snapshot
    #[error("Unknown market {market_id}")]
    UnknownMarket { market_id: MarketId },

    /// User missing from the snapshot
    #[error("Unknown user {user}")]
    UnknownUser { user: Address },

    /// Token missing from the snapshot
    #[error("Unknown token {token}")]
    UnknownToken { token: Address },

    /// Vault missing from the snapshot
    #[error("Unknown vault {vault}")]
    UnknownVault { vault: Address },

    /// No position tracked for this user and market
    #[error("Unknown position of user {user} on market {market_id}")]
    UnknownPosition { user: Address, market_id: MarketId },

    /// No holding tracked for this user and token
    #[error("Unknown holding of user {user} for token {token}")]
    UnknownHolding { user: Address, token: Address },

    /// No config tracked for this vault and market
    #[error("Unknown config of vault {vault} for market {market_id}")]
    UnknownVaultMarketConfig { vault: Address, market_id: MarketId },

    /// No record tracked for this vault and user
    #[error("Unknown user {user} of vault {vault}")]
    UnknownVaultUser { vault: Address, user: Address },

    /// Token is neither a declared wrapper nor a vault share
    #[error("Unknown wrapped token {token}")]
    UnknownWrappedToken { token: Address },

    // ==================== Composite lookups ====================
    /// An accrual position could not be built from its parts
    #[error("Cannot build accrual position of user {user} on market {market_id}: {source}")]
    AccrualPosition {
        user: Address,
        market_id: MarketId,
        #[source]
        source: Box<SimError>,
    },

    /// An accrual vault could not be built from its parts
    #[error("Cannot build accrual vault {vault}: {source}")]
    AccrualVault {
        vault: Address,
        #[source]
        source: Box<SimError>,
    },

    // ==================== Balances and allowances ====================
    /// Balance below the amount moved
    #[error("Insufficient balance of {token} for user {user}")]
    InsufficientBalance { token: Address, user: Address },

    /// ERC-20 allowance below the amount pulled
    #[error("Insufficient allowance of {token} from {owner} to {spender}")]
    InsufficientAllowance {
        token: Address,
        owner: Address,
        spender: Address,
    },

    /// Permit2 allowance below the amount pulled
    #[error("Insufficient Permit2 allowance of {token} from {owner} to {spender}")]
    InsufficientPermit2Allowance {
        token: Address,
        owner: Address,
        spender: Address,
    },

    /// Permit2 allowance past its expiration
    #[error("Permit2 allowance of {token} from {owner} to {spender} expired")]
    Permit2AllowanceExpired {
        token: Address,
        owner: Address,
        spender: Address,
    },

    /// Permit2 nonce differs from the holding's
    #[error("Invalid Permit2 nonce {nonce} for {token} from {owner} to {spender}")]
    InvalidPermit2Nonce {
        token: Address,
        owner: Address,
        spender: Address,
        nonce: U256,
    },

    /// EIP-2612 nonce differs from the holding's
    #[error("Invalid EIP-2612 nonce {nonce} for {token} from {owner}")]
    InvalidErc2612Nonce {
        token: Address,
        owner: Address,
        nonce: U256,
    },

    // ==================== Signatures ====================
    /// Permit on a token without a permit domain
    #[error("Unknown permit domain for token {token}")]
    UnknownPermitDomain { token: Address },

    /// Signature required by the config but absent
    #[error("Missing signature from {signer}")]
    MissingSignature { signer: Address },

    /// Signature deadline before the snapshot timestamp
    #[error("Signature from {signer} expired at {deadline}")]
    ExpiredSignature { signer: Address, deadline: u64 },

    /// Morpho authorization nonce differs from the user's
    #[error("Invalid authorization nonce {nonce} for {signer}")]
    InvalidAuthorizationNonce { signer: Address, nonce: U256 },

    // ==================== Markets ====================
    /// Interest accrual was attempted with a timestamp before the last update
    #[error("Invalid interest accrual: timestamp {timestamp} is before last update {last_update}")]
    InvalidInterestAccrual { timestamp: u64, last_update: u64 },

    /// Both or neither of assets and shares were given
    #[error("Exactly one of assets or shares must be non-zero on market {market_id}")]
    InconsistentInput { market_id: MarketId },

    /// Zero collateral supplied or withdrawn
    #[error("Zero assets on market {market_id}")]
    ZeroAssets { market_id: MarketId },

    /// Sender may not act for the position owner
    #[error("{sender} is not authorized to manage positions of {on_behalf}")]
    Unauthorized { sender: Address, on_behalf: Address },

    /// Insufficient position for operation
    #[error("Insufficient position for user {user} in market {market_id}")]
    InsufficientPosition { user: Address, market_id: MarketId },

    /// Insufficient collateral for borrow
    #[error("Insufficient collateral for user {user} in market {market_id}")]
    InsufficientCollateral { user: Address, market_id: MarketId },

    /// Insufficient liquidity in market
    #[error("Insufficient liquidity in market {market_id}")]
    InsufficientMarketLiquidity { market_id: MarketId },

    /// Unknown oracle price
    #[error("Oracle price unknown for market {market_id}")]
    UnknownOraclePrice { market_id: MarketId },

    /// Liquidation of a healthy position
    #[error("Position of {user} on market {market_id} is healthy")]
    HealthyPosition { user: Address, market_id: MarketId },

    // ==================== Vaults ====================
    /// All market supply caps have been reached during a vault deposit
    #[error("All caps reached for vault {vault}: {remaining} assets could not be deposited")]
    AllCapsReached { vault: Address, remaining: U256 },

    /// Not enough liquidity for withdrawal
    #[error("Not enough liquidity for vault {vault}: {remaining} assets could not be withdrawn")]
    NotEnoughLiquidity { vault: Address, remaining: U256 },

    /// Sender is neither owner, curator nor allocator
    #[error("{sender} does not have the allocator role on vault {vault}")]
    NotAllocatorRole { vault: Address, sender: Address },

    /// Sender is neither owner nor curator
    #[error("{sender} does not have the curator role on vault {vault}")]
    NotCuratorRole { vault: Address, sender: Address },

    /// Market not enabled in vault
    #[error("Market {market_id} not enabled in vault {vault}")]
    MarketNotEnabled { vault: Address, market_id: MarketId },

    /// Unauthorized market (cap is zero)
    #[error("Unauthorized market {market_id} in vault {vault}")]
    UnauthorizedMarket { vault: Address, market_id: MarketId },

    /// Supply cap exceeded
    #[error("Supply cap exceeded for market {market_id} in vault {vault}: cap is {cap}")]
    SupplyCapExceeded {
        vault: Address,
        market_id: MarketId,
        cap: U256,
    },

    /// Inconsistent reallocation (total supplied != total withdrawn)
    #[error("Inconsistent reallocation in vault {vault}: supplied {supplied}, withdrawn {withdrawn}")]
    InconsistentReallocation {
        vault: Address,
        supplied: U256,
        withdrawn: U256,
    },

    /// Cap submitted for a market lending another asset
    #[error("Loan token of market {market_id} is not the asset of vault {vault}")]
    InconsistentAsset { vault: Address, market_id: MarketId },

    /// A cap is already pending for this market
    #[error("A cap is already pending for market {market_id} in vault {vault}")]
    AlreadyPending { vault: Address, market_id: MarketId },

    /// Submitted cap equals the current one
    #[error("Cap of market {market_id} in vault {vault} is already set")]
    AlreadySet { vault: Address, market_id: MarketId },

    /// Accepting a cap that was never submitted
    #[error("No pending cap for market {market_id} in vault {vault}")]
    NoPendingValue { vault: Address, market_id: MarketId },

    /// Accepting a cap before its timelock
    #[error("Timelock of market {market_id} in vault {vault} elapses at {valid_at}")]
    TimelockNotElapsed {
        vault: Address,
        market_id: MarketId,
        valid_at: u64,
    },

    /// Enabling one more market would exceed the queue limit
    #[error("Withdraw queue of vault {vault} is full")]
    MaxQueueLengthExceeded { vault: Address },

    /// Public allocator not configured
    #[error("Public allocator not configured for vault {vault}")]
    PublicAllocatorNotConfigured { vault: Address },

    /// Max inflow exceeded for public allocator
    #[error("Max inflow exceeded for market {market_id} in vault {vault}")]
    MaxInflowExceeded { vault: Address, market_id: MarketId },

    /// Max outflow exceeded for public allocator
    #[error("Max outflow exceeded for market {market_id} in vault {vault}")]
    MaxOutflowExceeded { vault: Address, market_id: MarketId },

    /// Public reallocation withdraws more than the vault supplies
    #[error("Vault {vault} supplies less than the requested withdrawal on market {market_id}")]
    NotEnoughSupply { vault: Address, market_id: MarketId },

    /// Empty withdrawals list for public reallocate
    #[error("Empty withdrawals list for vault {vault}")]
    EmptyWithdrawals { vault: Address },

    /// Public reallocation withdraws zero from a market
    #[error("Zero withdrawal on market {market_id} for vault {vault}")]
    WithdrawZero { vault: Address, market_id: MarketId },

    /// Deposit market included in withdrawals
    #[error("Deposit market {market_id} included in withdrawals for vault {vault}")]
    DepositMarketInWithdrawals { vault: Address, market_id: MarketId },

    /// Withdrawals not sorted
    #[error("Withdrawals not sorted for vault {vault}")]
    WithdrawalsNotSorted { vault: Address },

    // ==================== Engine ====================
    /// Callbacks nested deeper than the configured limit
    #[error("Callback nesting exceeds {max_depth} levels")]
    CallbackDepthExceeded { max_depth: usize },

    /// The reallocation planner did not settle
    #[error("Reallocation planning did not converge within {max_iterations} rounds")]
    ConvergenceFailure { max_iterations: u32 },
}

impl SimError {
    /// Whether the error comes from a failed entity lookup
    pub fn is_unknown_entity(&self) -> bool {
        matches!(
            self,
            SimError::UnknownMarket { .. }
                | SimError::UnknownUser { .. }
                | SimError::UnknownToken { .. }
                | SimError::UnknownVault { .. }
                | SimError::UnknownPosition { .. }
                | SimError::UnknownHolding { .. }
                | SimError::UnknownVaultMarketConfig { .. }
                | SimError::UnknownVaultUser { .. }
                | SimError::UnknownWrappedToken { .. }
        )
    }
}

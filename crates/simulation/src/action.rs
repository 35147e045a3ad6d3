//! The closed catalogue of simulated actions.
//!
//! Actions serialize with an internal `type` tag in snake_case:
//!
//! ```json
//! { "type": "transfer", "sender": "0x…", "token": "0x…", "from": "0x…", "to": "0x…", "amount": "100" }
//! ```
//!
//! Amounts equal to `U256::MAX` mean "everything available"; each handler documents
//! what that resolves to. Supply, supply collateral and repay carry a `callback`
//! list executed after their own accounting and before tokens are pulled.

use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

use crate::error::MarketId;

/// Target allocation of a vault in one market, used by [`Action::Reallocate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketAllocation {
    pub market_id: MarketId,
    /// Assets the vault should hold in the market afterwards. `U256::MAX` supplies
    /// whatever was withdrawn and not yet supplied.
    pub assets: U256,
}

/// One source market of a [`Action::PublicReallocate`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Withdrawal {
    pub market_id: MarketId,
    pub amount: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    // ==================== Tokens ====================
    NativeTransfer {
        sender: Address,
        to: Address,
        amount: U256,
    },
    /// `transfer` when `sender == from`, `transferFrom` otherwise
    Transfer {
        sender: Address,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
    Approve {
        sender: Address,
        token: Address,
        spender: Address,
        amount: U256,
    },
    /// EIP-2612 permit submitted by `sender` on behalf of `owner`
    Permit {
        sender: Address,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
        nonce: U256,
        deadline: u64,
        #[serde(default)]
        signature: Option<Bytes>,
    },
    /// Permit2 signature allowance
    Permit2 {
        sender: Address,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
        expiration: u64,
        nonce: U256,
        deadline: u64,
        #[serde(default)]
        signature: Option<Bytes>,
    },
    /// Permit2 `transferFrom`, spending the allowance `from` granted to `sender`
    Transfer2 {
        sender: Address,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
    /// Wraps `amount` of the underlying of `token`, crediting `owner`
    Wrap {
        sender: Address,
        token: Address,
        owner: Address,
        amount: U256,
    },
    /// Unwraps `amount` of `token`, crediting `receiver` with the underlying
    Unwrap {
        sender: Address,
        token: Address,
        receiver: Address,
        amount: U256,
    },

    // ==================== Morpho Blue ====================
    AccrueInterest {
        sender: Address,
        market_id: MarketId,
    },
    /// Direct when `sender == authorizer`, signed otherwise
    SetAuthorization {
        sender: Address,
        authorizer: Address,
        authorized: Address,
        is_authorized: bool,
        #[serde(default)]
        nonce: Option<U256>,
        #[serde(default)]
        deadline: Option<u64>,
        #[serde(default)]
        signature: Option<Bytes>,
    },
    Supply {
        sender: Address,
        market_id: MarketId,
        on_behalf: Address,
        #[serde(default)]
        assets: U256,
        #[serde(default)]
        shares: U256,
        #[serde(default)]
        callback: Vec<Action>,
    },
    SupplyCollateral {
        sender: Address,
        market_id: MarketId,
        on_behalf: Address,
        assets: U256,
        #[serde(default)]
        callback: Vec<Action>,
    },
    Borrow {
        sender: Address,
        market_id: MarketId,
        on_behalf: Address,
        receiver: Address,
        #[serde(default)]
        assets: U256,
        #[serde(default)]
        shares: U256,
    },
    Repay {
        sender: Address,
        market_id: MarketId,
        on_behalf: Address,
        #[serde(default)]
        assets: U256,
        #[serde(default)]
        shares: U256,
        #[serde(default)]
        callback: Vec<Action>,
    },
    Withdraw {
        sender: Address,
        market_id: MarketId,
        on_behalf: Address,
        receiver: Address,
        #[serde(default)]
        assets: U256,
        #[serde(default)]
        shares: U256,
    },
    WithdrawCollateral {
        sender: Address,
        market_id: MarketId,
        on_behalf: Address,
        receiver: Address,
        assets: U256,
    },
    Liquidate {
        sender: Address,
        market_id: MarketId,
        borrower: Address,
        #[serde(default)]
        seized_assets: U256,
        #[serde(default)]
        repaid_shares: U256,
    },

    // ==================== MetaMorpho ====================
    VaultAccrueInterest {
        sender: Address,
        vault: Address,
    },
    Deposit {
        sender: Address,
        vault: Address,
        assets: U256,
        owner: Address,
    },
    Mint {
        sender: Address,
        vault: Address,
        shares: U256,
        owner: Address,
    },
    VaultWithdraw {
        sender: Address,
        vault: Address,
        assets: U256,
        receiver: Address,
        owner: Address,
    },
    Redeem {
        sender: Address,
        vault: Address,
        shares: U256,
        receiver: Address,
        owner: Address,
    },
    Reallocate {
        sender: Address,
        vault: Address,
        allocations: Vec<MarketAllocation>,
    },
    /// Public allocator `reallocateTo`, paying the vault's fee in native token
    PublicReallocate {
        sender: Address,
        vault: Address,
        withdrawals: Vec<Withdrawal>,
        supply_market_id: MarketId,
    },
    SubmitCap {
        sender: Address,
        vault: Address,
        market_id: MarketId,
        cap: U256,
    },
    AcceptCap {
        sender: Address,
        vault: Address,
        market_id: MarketId,
    },
}

impl Action {
    /// The account submitting the action
    pub fn sender(&self) -> Address {
        match self {
            Action::NativeTransfer { sender, .. }
            | Action::Transfer { sender, .. }
            | Action::Approve { sender, .. }
            | Action::Permit { sender, .. }
            | Action::Permit2 { sender, .. }
            | Action::Transfer2 { sender, .. }
            | Action::Wrap { sender, .. }
            | Action::Unwrap { sender, .. }
            | Action::AccrueInterest { sender, .. }
            | Action::SetAuthorization { sender, .. }
            | Action::Supply { sender, .. }
            | Action::SupplyCollateral { sender, .. }
            | Action::Borrow { sender, .. }
            | Action::Repay { sender, .. }
            | Action::Withdraw { sender, .. }
            | Action::WithdrawCollateral { sender, .. }
            | Action::Liquidate { sender, .. }
            | Action::VaultAccrueInterest { sender, .. }
            | Action::Deposit { sender, .. }
            | Action::Mint { sender, .. }
            | Action::VaultWithdraw { sender, .. }
            | Action::Redeem { sender, .. }
            | Action::Reallocate { sender, .. }
            | Action::PublicReallocate { sender, .. }
            | Action::SubmitCap { sender, .. }
            | Action::AcceptCap { sender, .. } => *sender,
        }
    }

    /// Stable name of the action kind, matching its serialized tag
    pub fn kind(&self) -> &'static str {
        match self {
            Action::NativeTransfer { .. } => "native_transfer",
            Action::Transfer { .. } => "transfer",
            Action::Approve { .. } => "approve",
            Action::Permit { .. } => "permit",
            Action::Permit2 { .. } => "permit2",
            Action::Transfer2 { .. } => "transfer2",
            Action::Wrap { .. } => "wrap",
            Action::Unwrap { .. } => "unwrap",
            Action::AccrueInterest { .. } => "accrue_interest",
            Action::SetAuthorization { .. } => "set_authorization",
            Action::Supply { .. } => "supply",
            Action::SupplyCollateral { .. } => "supply_collateral",
            Action::Borrow { .. } => "borrow",
            Action::Repay { .. } => "repay",
            Action::Withdraw { .. } => "withdraw",
            Action::WithdrawCollateral { .. } => "withdraw_collateral",
            Action::Liquidate { .. } => "liquidate",
            Action::VaultAccrueInterest { .. } => "vault_accrue_interest",
            Action::Deposit { .. } => "deposit",
            Action::Mint { .. } => "mint",
            Action::VaultWithdraw { .. } => "vault_withdraw",
            Action::Redeem { .. } => "redeem",
            Action::Reallocate { .. } => "reallocate",
            Action::PublicReallocate { .. } => "public_reallocate",
            Action::SubmitCap { .. } => "submit_cap",
            Action::AcceptCap { .. } => "accept_cap",
        }
    }

    /// Nested actions run inside this one, empty for kinds without callbacks
    pub fn callback(&self) -> &[Action] {
        match self {
            Action::Supply { callback, .. }
            | Action::SupplyCollateral { callback, .. }
            | Action::Repay { callback, .. } => callback,
            _ => &[],
        }
    }
}

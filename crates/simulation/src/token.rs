//! Tokens and wrap relations.
//!
//! Wrapper tokens come in two flavours: a constant ratio to their underlying
//! (e.g. WETH over the native asset) and a moving exchange rate (e.g. wstETH over
//! stETH). A MetaMorpho vault is also treated as a wrapper of its asset; that case
//! is resolved by [`crate::Snapshot::wrapped_token`].

use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

use crate::math::{mul_div_down, WAD};

/// Reserved address standing for the chain's native asset
pub const NATIVE_ADDRESS: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// EIP-712 domain a token uses for EIP-2612 permits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitDomain {
    pub name: String,
    pub version: String,
    pub chain_id: u64,
    pub verifying_contract: Address,
}

/// How a wrapper token converts to its underlying
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WrapRelation {
    /// `wrapped = underlying * ratio / WAD`
    ConstantRatio { underlying: Address, ratio: U256 },
    /// `underlying = wrapped * rate / WAD`, with the rate read at snapshot time
    ExchangeRate { underlying: Address, rate: U256 },
}

impl WrapRelation {
    pub fn underlying(&self) -> Address {
        match self {
            WrapRelation::ConstantRatio { underlying, .. }
            | WrapRelation::ExchangeRate { underlying, .. } => *underlying,
        }
    }

    /// Wrapped amount minted for `assets` of underlying, rounded down
    pub fn to_wrapped(&self, assets: U256) -> U256 {
        match self {
            WrapRelation::ConstantRatio { ratio, .. } => mul_div_down(assets, *ratio, WAD),
            WrapRelation::ExchangeRate { rate, .. } => mul_div_down(assets, WAD, *rate),
        }
    }

    /// Underlying released for `amount` of wrapped, rounded down
    pub fn to_underlying(&self, amount: U256) -> U256 {
        match self {
            WrapRelation::ConstantRatio { ratio, .. } => mul_div_down(amount, WAD, *ratio),
            WrapRelation::ExchangeRate { rate, .. } => mul_div_down(amount, *rate, WAD),
        }
    }
}

/// A fungible asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub decimals: u8,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub permit_domain: Option<PermitDomain>,
    #[serde(default)]
    pub wrap: Option<WrapRelation>,
}

impl Token {
    pub fn new(address: Address, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            address,
            decimals,
            symbol: symbol.into(),
            name: String::new(),
            permit_domain: None,
            wrap: None,
        }
    }

    pub fn native(symbol: impl Into<String>) -> Self {
        Self::new(NATIVE_ADDRESS, 18, symbol)
    }

    pub fn is_native(&self) -> bool {
        self.address == NATIVE_ADDRESS
    }
}

/// A token resolved as a wrapper of another token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WrappedToken {
    /// A genuine wrapper contract
    Wrapper {
        wrapped: Address,
        relation: WrapRelation,
    },
    /// A MetaMorpho vault, wrapping its asset through deposit and redeem
    Vault { vault: Address, underlying: Address },
}

impl WrappedToken {
    pub fn address(&self) -> Address {
        match self {
            WrappedToken::Wrapper { wrapped, .. } => *wrapped,
            WrappedToken::Vault { vault, .. } => *vault,
        }
    }

    pub fn underlying(&self) -> Address {
        match self {
            WrappedToken::Wrapper { relation, .. } => relation.underlying(),
            WrappedToken::Vault { underlying, .. } => *underlying,
        }
    }
}

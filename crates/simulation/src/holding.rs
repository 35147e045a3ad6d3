//! A user's stake in a token: balance and the allowance tiers governing it.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// An allowance granted through the Permit2 contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permit2Allowance {
    pub amount: U256,
    /// Unix timestamp after which the allowance can no longer be used
    pub expiration: u64,
    pub nonce: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holding {
    pub user: Address,
    pub token: Address,
    pub balance: U256,
    /// Direct ERC-20 allowances by spender. Covers allowances set by `approve`,
    /// by EIP-2612 permits and the allowance granted to Permit2 itself.
    #[serde(default)]
    pub erc20_allowances: BTreeMap<Address, U256>,
    /// Permit2 allowances by spender
    #[serde(default)]
    pub permit2_allowances: BTreeMap<Address, Permit2Allowance>,
    /// EIP-2612 nonce, `None` for tokens without permit support
    #[serde(default)]
    pub erc2612_nonce: Option<U256>,
}

impl Holding {
    pub fn new(user: Address, token: Address, balance: U256) -> Self {
        Self {
            user,
            token,
            balance,
            erc20_allowances: BTreeMap::new(),
            permit2_allowances: BTreeMap::new(),
            erc2612_nonce: None,
        }
    }

    /// Direct allowance granted to `spender`, zero when unset
    pub fn allowance(&self, spender: Address) -> U256 {
        self.erc20_allowances
            .get(&spender)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_allowance(&mut self, spender: Address, amount: U256) {
        self.erc20_allowances.insert(spender, amount);
    }

    pub fn permit2_allowance(&self, spender: Address) -> Permit2Allowance {
        self.permit2_allowances
            .get(&spender)
            .cloned()
            .unwrap_or_default()
    }
}

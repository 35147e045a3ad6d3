//! Protocol-wide user state on Morpho Blue.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub address: Address,
    /// Whether the user authorized the bundler adapter to manage their positions
    #[serde(default)]
    pub is_bundler_authorized: bool,
    /// Nonce consumed by signed authorizations
    #[serde(default)]
    pub morpho_nonce: U256,
}

impl User {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            is_bundler_authorized: false,
            morpho_nonce: U256::ZERO,
        }
    }
}

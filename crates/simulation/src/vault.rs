//! MetaMorpho vault state.
//!
//! [MetaMorpho](https://docs.morpho.org/metamorpho/overview) vaults are ERC4626 vaults
//! that spread their asset across Morpho Blue markets:
//! - **Supply Queue**: ordered list of markets deposits fill, first market first
//! - **Withdraw Queue**: ordered list withdrawals drain, first market first
//! - **Supply Caps**: maximum amount the vault can supply to each market
//! - **Public Allocator**: permissionless reallocation within per-market flow caps
//! - **Performance fee**: taken as shares on accrued interest
//!
//! The stored [`Vault`] holds the values last written on-chain. [`AccrualVault`]
//! recomputes total assets from the vault's accrued positions and prices shares
//! including the pending fee.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::MarketId;
use crate::math::{mul_div, w_mul_down, zero_floor_sub, RoundingDirection};
use crate::position::AccrualPosition;

/// Virtual assets constant for vault share calculations (1)
pub const VAULT_VIRTUAL_ASSETS: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Maximum number of markets in a withdraw queue
pub const MAX_QUEUE_LENGTH: usize = 30;

/// A cap increase waiting for the timelock
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingCap {
    pub value: U256,
    pub valid_at: u64,
}

/// Public allocator flow limits for one market of a vault
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowCaps {
    /// Maximum assets that can flow into this market
    pub max_in: U256,
    /// Maximum assets that can flow out of this market
    pub max_out: U256,
}

/// A vault's policy for one market
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultMarketConfig {
    pub vault: Address,
    pub market_id: MarketId,
    /// Maximum supply cap for this market
    #[serde(default)]
    pub cap: U256,
    #[serde(default)]
    pub pending_cap: Option<PendingCap>,
    /// Whether this market is in the withdraw queue
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub removable_at: u64,
    #[serde(default)]
    pub flow_caps: Option<FlowCaps>,
}

impl VaultMarketConfig {
    /// A disabled config with no cap
    pub fn empty(vault: Address, market_id: MarketId) -> Self {
        Self {
            vault,
            market_id,
            cap: U256::ZERO,
            pending_cap: None,
            enabled: false,
            removable_at: 0,
            flow_caps: None,
        }
    }
}

/// Vault-level public allocator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPublicAllocatorConfig {
    pub admin: Address,
    /// Fee to use the public allocator (in native token)
    #[serde(default)]
    pub fee: U256,
    /// Fees collected and not yet withdrawn by the admin
    #[serde(default)]
    pub accrued_fee: U256,
}

/// A user's rights on a vault
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultUser {
    pub vault: Address,
    pub user: Address,
    #[serde(default)]
    pub is_allocator: bool,
    /// Allowance of the vault's asset granted by the user to the vault
    #[serde(default)]
    pub allowance: U256,
}

/// Represents a MetaMorpho vault state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    /// The vault's address, which is also its share token
    pub address: Address,
    /// The underlying asset
    pub asset: Address,
    /// `18 - asset decimals`, offsetting share decimals from asset decimals
    #[serde(default)]
    pub decimals_offset: u8,
    pub owner: Address,
    #[serde(default)]
    pub curator: Address,
    #[serde(default)]
    pub guardian: Address,
    /// Performance fee (WAD-scaled)
    #[serde(default)]
    pub fee: U256,
    #[serde(default)]
    pub fee_recipient: Address,
    /// Delay before a cap increase can be accepted, in seconds
    #[serde(default)]
    pub timelock: u64,
    /// Ordered supply queue (markets to deposit into)
    #[serde(default)]
    pub supply_queue: Vec<MarketId>,
    /// Ordered withdraw queue (markets to withdraw from)
    #[serde(default)]
    pub withdraw_queue: Vec<MarketId>,
    /// Total assets as last computed
    #[serde(default)]
    pub total_assets: U256,
    /// Total assets at the last fee accrual
    #[serde(default)]
    pub last_total_assets: U256,
    /// Total vault shares outstanding
    #[serde(default)]
    pub total_supply: U256,
    #[serde(default)]
    pub public_allocator_config: Option<VaultPublicAllocatorConfig>,
}

impl Vault {
    /// Virtual shares for this vault (10^decimals_offset)
    pub fn virtual_shares(&self) -> U256 {
        U256::from(10u64).pow(U256::from(self.decimals_offset))
    }

    /// Convert vault shares to assets at the stored totals
    pub fn to_assets(&self, shares: U256, rounding: RoundingDirection) -> U256 {
        convert_to_assets(shares, self.total_supply, self.total_assets, self.virtual_shares(), rounding)
    }

    /// Convert assets to vault shares at the stored totals
    pub fn to_shares(&self, assets: U256, rounding: RoundingDirection) -> U256 {
        convert_to_shares(assets, self.total_supply, self.total_assets, self.virtual_shares(), rounding)
    }

    /// Whether `user` may reallocate, given the user's [`VaultUser`] record
    pub fn is_allocator(&self, user: Address, vault_user: Option<&VaultUser>) -> bool {
        user == self.owner || user == self.curator || vault_user.is_some_and(|u| u.is_allocator)
    }

    pub fn is_curator(&self, user: Address) -> bool {
        user == self.owner || user == self.curator
    }
}

/// `assets * (totalSupply + 10^offset) / (totalAssets + 1)`
pub fn convert_to_shares(
    assets: U256,
    total_supply: U256,
    total_assets: U256,
    virtual_shares: U256,
    rounding: RoundingDirection,
) -> U256 {
    mul_div(
        assets,
        total_supply + virtual_shares,
        total_assets + VAULT_VIRTUAL_ASSETS,
        rounding,
    )
}

/// `shares * (totalAssets + 1) / (totalSupply + 10^offset)`
pub fn convert_to_assets(
    shares: U256,
    total_supply: U256,
    total_assets: U256,
    virtual_shares: U256,
    rounding: RoundingDirection,
) -> U256 {
    mul_div(
        shares,
        total_assets + VAULT_VIRTUAL_ASSETS,
        total_supply + virtual_shares,
        rounding,
    )
}

/// One withdraw-queue market of an [`AccrualVault`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultMarketAllocation {
    pub config: VaultMarketConfig,
    /// The vault's own position, against the accrued market
    pub position: AccrualPosition,
}

impl VaultMarketAllocation {
    pub fn supply_assets(&self) -> U256 {
        self.position.supply_assets()
    }

    /// Room left under the cap
    pub fn max_supply(&self) -> U256 {
        zero_floor_sub(self.config.cap, self.supply_assets())
    }
}

/// A vault joined with its withdraw-queue markets, accrued to a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualVault {
    pub vault: Vault,
    pub allocations: BTreeMap<MarketId, VaultMarketAllocation>,
    /// Sum of the vault's supply across its withdraw queue
    pub total_assets: U256,
    /// Performance-fee shares owed on interest since the last accrual
    pub fee_shares: U256,
}

impl AccrualVault {
    pub fn new(vault: Vault, allocations: Vec<VaultMarketAllocation>) -> Self {
        let allocations: BTreeMap<_, _> = allocations
            .into_iter()
            .map(|allocation| (allocation.config.market_id, allocation))
            .collect();

        let total_assets = vault
            .withdraw_queue
            .iter()
            .filter_map(|id| allocations.get(id))
            .fold(U256::ZERO, |total, allocation| {
                total.saturating_add(allocation.supply_assets())
            });

        let total_interest = zero_floor_sub(total_assets, vault.last_total_assets);
        let fee_shares = if total_interest.is_zero() || vault.fee.is_zero() {
            U256::ZERO
        } else {
            let fee_assets = w_mul_down(total_interest, vault.fee);
            convert_to_shares(
                fee_assets,
                vault.total_supply,
                total_assets - fee_assets,
                vault.virtual_shares(),
                RoundingDirection::Down,
            )
        };

        Self {
            vault,
            allocations,
            total_assets,
            fee_shares,
        }
    }

    pub fn address(&self) -> Address {
        self.vault.address
    }

    /// Share supply including the pending fee shares
    pub fn total_supply(&self) -> U256 {
        self.vault.total_supply + self.fee_shares
    }

    pub fn to_shares(&self, assets: U256, rounding: RoundingDirection) -> U256 {
        convert_to_shares(
            assets,
            self.total_supply(),
            self.total_assets,
            self.vault.virtual_shares(),
            rounding,
        )
    }

    pub fn to_assets(&self, shares: U256, rounding: RoundingDirection) -> U256 {
        convert_to_assets(
            shares,
            self.total_supply(),
            self.total_assets,
            self.vault.virtual_shares(),
            rounding,
        )
    }

    /// Assets the supply queue can still absorb under the caps
    pub fn max_deposit(&self) -> U256 {
        self.vault
            .supply_queue
            .iter()
            .filter_map(|id| self.allocations.get(id))
            .fold(U256::ZERO, |total, allocation| {
                total.saturating_add(allocation.max_supply())
            })
    }

    /// Assets the withdraw queue can currently pay out
    pub fn liquidity(&self) -> U256 {
        self.vault
            .withdraw_queue
            .iter()
            .filter_map(|id| self.allocations.get(id))
            .fold(U256::ZERO, |total, allocation| {
                total.saturating_add(allocation.position.withdrawable_supply())
            })
    }

    /// The vault as it is stored once the fee has been accrued
    pub fn accrued(&self) -> Vault {
        Vault {
            total_assets: self.total_assets,
            last_total_assets: self.total_assets,
            total_supply: self.total_supply(),
            ..self.vault.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Market, MarketParams};
    use crate::math::WAD;
    use crate::position::Position;

    fn create_test_vault() -> Vault {
        Vault {
            address: Address::repeat_byte(0x10),
            asset: Address::repeat_byte(0x01),
            decimals_offset: 0,
            owner: Address::repeat_byte(0x11),
            curator: Address::repeat_byte(0x12),
            guardian: Address::ZERO,
            fee: U256::from(100_000_000_000_000_000u64), // 10%
            fee_recipient: Address::repeat_byte(0x13),
            timelock: 86_400,
            supply_queue: Vec::new(),
            withdraw_queue: Vec::new(),
            total_assets: U256::from(1_000) * WAD,
            last_total_assets: U256::from(1_000) * WAD,
            total_supply: U256::from(1_000) * WAD,
            public_allocator_config: None,
        }
    }

    fn create_test_allocation(vault: &Vault, supply: U256, cap: U256, lltv: u64) -> VaultMarketAllocation {
        let params = MarketParams {
            loan_token: vault.asset,
            collateral_token: Address::repeat_byte(0x02),
            oracle: Address::ZERO,
            irm: Address::ZERO,
            lltv: U256::from(lltv),
        };
        let market = Market {
            total_supply_assets: U256::from(2_000) * WAD,
            total_supply_shares: U256::from(2_000) * WAD * U256::from(1_000_000),
            total_borrow_assets: U256::from(1_500) * WAD,
            total_borrow_shares: U256::from(1_500) * WAD * U256::from(1_000_000),
            ..Market::new(params, 1000)
        };
        let position = Position {
            supply_shares: supply * U256::from(1_000_000),
            ..Position::empty(vault.address, market.id)
        };
        VaultMarketAllocation {
            config: VaultMarketConfig {
                cap,
                enabled: true,
                ..VaultMarketConfig::empty(vault.address, market.id)
            },
            position: AccrualPosition::new(position, &market, 1000).unwrap(),
        }
    }

    #[test]
    fn test_share_conversion() {
        let vault = create_test_vault();
        // 1:1 plus virtual offsets
        assert_eq!(vault.to_shares(U256::from(100), RoundingDirection::Down), U256::from(100));
        assert_eq!(vault.to_assets(U256::from(100), RoundingDirection::Up), U256::from(100));
        assert_eq!(vault.virtual_shares(), U256::from(1));

        let offset = Vault {
            decimals_offset: 12,
            ..vault
        };
        assert_eq!(offset.virtual_shares(), U256::from(1_000_000_000_000u64));
    }

    #[test]
    fn test_roles() {
        let vault = create_test_vault();
        let allocator = VaultUser {
            vault: vault.address,
            user: Address::repeat_byte(0x20),
            is_allocator: true,
            allowance: U256::ZERO,
        };

        assert!(vault.is_allocator(vault.owner, None));
        assert!(vault.is_allocator(vault.curator, None));
        assert!(vault.is_allocator(allocator.user, Some(&allocator)));
        assert!(!vault.is_allocator(Address::repeat_byte(0x21), None));
        assert!(!vault.is_curator(allocator.user));
    }

    #[test]
    fn test_accrual_vault_totals_and_fee() {
        let mut vault = create_test_vault();
        let first = create_test_allocation(&vault, U256::from(600) * WAD, U256::from(1_000) * WAD, 1);
        let second = create_test_allocation(&vault, U256::from(500) * WAD, U256::from(500) * WAD, 2);
        vault.supply_queue = vec![first.config.market_id, second.config.market_id];
        vault.withdraw_queue = vault.supply_queue.clone();

        let accrual = AccrualVault::new(vault.clone(), vec![first, second]);

        // 1100 in markets against 1000 recorded: 100 interest, 10 fee assets
        assert_eq!(accrual.total_assets, U256::from(1_100) * WAD);
        // 10 * (1000 + 1) / (1090 + 1) in shares, rounded down
        assert!(accrual.fee_shares > U256::from(9) * WAD);
        assert!(accrual.fee_shares < U256::from(10) * WAD);

        // 400 room in the first market, none in the second
        assert_eq!(accrual.max_deposit(), U256::from(400) * WAD);
        // Each market has 500 liquidity
        assert_eq!(accrual.liquidity(), U256::from(1_000) * WAD);

        let accrued = accrual.accrued();
        assert_eq!(accrued.last_total_assets, accrued.total_assets);
        assert_eq!(accrued.total_supply, vault.total_supply + accrual.fee_shares);
    }

    #[test]
    fn test_accrual_vault_without_interest() {
        let mut vault = create_test_vault();
        vault.last_total_assets = U256::from(2_000) * WAD;
        let allocation = create_test_allocation(&vault, U256::from(600) * WAD, U256::from(1_000) * WAD, 1);
        vault.withdraw_queue = vec![allocation.config.market_id];

        let accrual = AccrualVault::new(vault, vec![allocation]);
        assert_eq!(accrual.fee_shares, U256::ZERO);
    }
}

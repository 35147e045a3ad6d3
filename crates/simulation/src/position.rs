//! Position tracking for Morpho Blue markets.
//!
//! A [`Position`] only stores shares and collateral. [`AccrualPosition`] joins it
//! with its market accrued to a timestamp and exposes asset-denominated values,
//! health factor, LTV and borrowing capacity.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{MarketId, SimError};
use crate::market::Market;
use crate::math::{min, w_div_up, zero_floor_sub, RoundingDirection};

/// Represents a user's position in a Morpho Blue market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    /// The user holding this position
    pub user: Address,
    /// The market ID
    pub market_id: MarketId,
    /// Amount of supply shares held
    #[serde(default)]
    pub supply_shares: U256,
    /// Amount of borrow shares held
    #[serde(default)]
    pub borrow_shares: U256,
    /// Amount of collateral assets held
    #[serde(default)]
    pub collateral: U256,
}

impl Position {
    /// Create an empty position
    pub fn empty(user: Address, market_id: MarketId) -> Self {
        Self {
            user,
            market_id,
            supply_shares: U256::ZERO,
            borrow_shares: U256::ZERO,
            collateral: U256::ZERO,
        }
    }
}

/// A position viewed against its market accrued to a given timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccrualPosition {
    pub position: Position,
    /// The position's market, accrued
    pub market: Market,
}

impl AccrualPosition {
    /// Joins `position` with `market` accrued to `timestamp`.
    pub fn new(position: Position, market: &Market, timestamp: u64) -> Result<Self, SimError> {
        Ok(Self {
            market: market.accrue_interest(timestamp)?,
            position,
        })
    }

    pub fn user(&self) -> Address {
        self.position.user
    }

    pub fn market_id(&self) -> MarketId {
        self.position.market_id
    }

    /// Supply assets, rounded down
    pub fn supply_assets(&self) -> U256 {
        self.market
            .to_supply_assets(self.position.supply_shares, RoundingDirection::Down)
    }

    /// Borrow assets, rounded up
    pub fn borrow_assets(&self) -> U256 {
        self.market
            .to_borrow_assets(self.position.borrow_shares, RoundingDirection::Up)
    }

    /// Returns the collateral value in loan assets
    pub fn collateral_value(&self) -> Option<U256> {
        self.market.get_collateral_value(self.position.collateral)
    }

    /// Additional loan assets the position can borrow while staying healthy
    pub fn max_borrowable_assets(&self) -> Option<U256> {
        let max_borrow = self.market.get_max_borrow_assets(self.position.collateral)?;
        Some(zero_floor_sub(max_borrow, self.borrow_assets()))
    }

    pub fn is_healthy(&self) -> Option<bool> {
        self.market
            .is_healthy(self.position.collateral, self.position.borrow_shares)
    }

    /// Returns the health factor (WAD-scaled)
    pub fn health_factor(&self) -> Option<U256> {
        self.market
            .get_health_factor(self.position.collateral, self.position.borrow_shares)
    }

    /// Returns the LTV (WAD-scaled)
    pub fn ltv(&self) -> Option<U256> {
        self.market
            .get_ltv(self.position.collateral, self.position.borrow_shares)
    }

    /// Returns the borrow capacity usage (WAD-scaled)
    pub fn borrow_capacity_usage(&self) -> Option<U256> {
        let max_borrow = self.market.get_max_borrow_assets(self.position.collateral)?;
        if max_borrow.is_zero() {
            if self.position.borrow_shares.is_zero() {
                return Some(U256::ZERO);
            }
            return Some(U256::MAX);
        }

        Some(w_div_up(self.borrow_assets(), max_borrow))
    }

    /// Returns the amount of collateral that can be withdrawn
    pub fn withdrawable_collateral(&self) -> Option<U256> {
        self.market
            .get_withdrawable_collateral(self.position.collateral, self.position.borrow_shares)
    }

    /// Supply assets the market can currently pay out
    pub fn withdrawable_supply(&self) -> U256 {
        min(self.supply_assets(), self.market.liquidity())
    }
}

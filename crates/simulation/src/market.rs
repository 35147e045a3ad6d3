//! Market state and operations for Morpho Blue markets.
//!
//! A Morpho Blue market is an isolated lending pool identified by its
//! [`MarketParams`]:
//! - **Supply side**: lenders deposit loan assets and receive supply shares
//! - **Borrow side**: borrowers post collateral and take debt as borrow shares
//! - **Share-based accounting**: positions are tracked via shares, not raw assets
//! - **Adaptive interest rates**: rates adjust based on utilization
//!
//! # Key Operations
//!
//! - [`Market::accrue_interest`] - advance the market to a timestamp
//! - [`Market::supply`] / [`Market::withdraw`] - lender operations
//! - [`Market::borrow`] / [`Market::repay`] - borrower operations
//! - [`Market::liquidate`] - seize collateral of an unhealthy position
//!
//! Every operation returns a new [`Market`] and leaves `self` untouched. Principal
//! operations expect the market to be accrued already; the handlers accrue first so
//! the fee recipient can be credited.
//!
//! # Example
//!
//! ```rust
//! use morpho_rs_simulation::{Market, MarketParams, WAD};
//! use alloy_primitives::{Address, U256};
//!
//! let params = MarketParams {
//!     loan_token: Address::repeat_byte(1),
//!     collateral_token: Address::repeat_byte(2),
//!     oracle: Address::repeat_byte(3),
//!     irm: Address::repeat_byte(4),
//!     lltv: U256::from(860_000_000_000_000_000u64),
//! };
//! let market = Market::new(params, 1_000);
//!
//! let (market, assets, shares) = market.supply(U256::from(100) * WAD, U256::ZERO).unwrap();
//! assert_eq!(assets, U256::from(100) * WAD);
//! assert_eq!(market.total_supply_shares, shares);
//! ```

use alloy_primitives::{keccak256, Address, U256};
use serde::{Deserialize, Serialize};

use crate::error::{MarketId, SimError};
use crate::irm::get_borrow_rate;
use crate::math::{
    self, assets_to_shares, mul_div_down, mul_div_up, shares_to_assets,
    w_div_down, w_div_up, w_mul_down, w_taylor_compounded, zero_floor_sub,
    RoundingDirection, WAD,
};

/// Liquidation cursor used to calculate the liquidation incentive (30%)
pub const LIQUIDATION_CURSOR: U256 = U256::from_limbs([300_000_000_000_000_000, 0, 0, 0]);

/// Maximum liquidation incentive factor (115%)
pub const MAX_LIQUIDATION_INCENTIVE_FACTOR: U256 =
    U256::from_limbs([1_150_000_000_000_000_000, 0, 0, 0]);

/// Oracle price scale (1e36)
pub const ORACLE_PRICE_SCALE: U256 =
    U256::from_limbs([0xB34B_9F10_0000_0000, 0x00C0_97CE_7BC9_0715, 0, 0]);

/// Immutable parameters of a market. The market id is derived from them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketParams {
    pub loan_token: Address,
    pub collateral_token: Address,
    pub oracle: Address,
    pub irm: Address,
    /// Liquidation LTV (WAD-scaled)
    pub lltv: U256,
}

impl MarketParams {
    /// `keccak256(abi.encode(loanToken, collateralToken, oracle, irm, lltv))`
    pub fn id(&self) -> MarketId {
        let mut encoded = [0u8; 160];
        encoded[12..32].copy_from_slice(self.loan_token.as_slice());
        encoded[44..64].copy_from_slice(self.collateral_token.as_slice());
        encoded[76..96].copy_from_slice(self.oracle.as_slice());
        encoded[108..128].copy_from_slice(self.irm.as_slice());
        encoded[128..160].copy_from_slice(&self.lltv.to_be_bytes::<32>());
        keccak256(encoded)
    }
}

/// Represents a lending market on Morpho Blue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// The market's unique identifier (keccak256 hash of market params)
    pub id: MarketId,

    pub params: MarketParams,

    /// The amount of loan assets supplied in total on the market
    pub total_supply_assets: U256,

    /// The amount of loan assets borrowed in total from the market
    pub total_borrow_assets: U256,

    /// The total supply shares representing lender positions
    pub total_supply_shares: U256,

    /// The total borrow shares representing borrower debt
    pub total_borrow_shares: U256,

    /// The block timestamp (in seconds) when interest was last accrued
    pub last_update: u64,

    /// The protocol fee percentage (WAD-scaled, e.g., 0.1 WAD = 10%)
    #[serde(default)]
    pub fee: U256,

    /// Oracle price (collateral/loan, scaled by ORACLE_PRICE_SCALE).
    /// None if the oracle is not set or reverts.
    #[serde(default)]
    pub price: Option<U256>,

    /// If the market uses the Adaptive Curve IRM, the rate at target utilization.
    /// None for markets using other IRMs, which then accrue no interest.
    #[serde(default)]
    pub rate_at_target: Option<U256>,
}

/// Outcome of [`Market::liquidate`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Liquidation {
    pub market: Market,
    /// Collateral transferred to the liquidator
    pub seized_assets: U256,
    /// Borrow shares removed from the borrower
    pub repaid_shares: U256,
    /// Loan assets pulled from the liquidator
    pub repaid_assets: U256,
    /// Borrow shares written off when the collateral is exhausted
    pub bad_debt_shares: U256,
    /// Loan assets written off from both totals
    pub bad_debt_assets: U256,
}

impl Market {
    /// Creates an empty market created at `timestamp`, with its id derived from
    /// `params`.
    pub fn new(params: MarketParams, timestamp: u64) -> Self {
        Self {
            id: params.id(),
            params,
            total_supply_assets: U256::ZERO,
            total_borrow_assets: U256::ZERO,
            total_supply_shares: U256::ZERO,
            total_borrow_shares: U256::ZERO,
            last_update: timestamp,
            fee: U256::ZERO,
            price: None,
            rate_at_target: None,
        }
    }

    /// Liquidation LTV (WAD-scaled)
    pub fn lltv(&self) -> U256 {
        self.params.lltv
    }

    /// Returns the market's current liquidity (supply - borrow)
    pub fn liquidity(&self) -> U256 {
        self.total_supply_assets
            .saturating_sub(self.total_borrow_assets)
    }

    /// Returns the market's utilization rate (WAD-scaled)
    ///
    /// Utilization = totalBorrowAssets / totalSupplyAssets
    pub fn utilization(&self) -> U256 {
        get_utilization(self.total_supply_assets, self.total_borrow_assets)
    }

    fn get_accrual_borrow_rates(&self, timestamp: u64) -> Result<AccrualRates, SimError> {
        if timestamp < self.last_update {
            return Err(SimError::InvalidInterestAccrual {
                timestamp,
                last_update: self.last_update,
            });
        }

        let elapsed = timestamp - self.last_update;

        match self.rate_at_target {
            None => Ok(AccrualRates {
                elapsed,
                avg_borrow_rate: U256::ZERO,
                end_rate_at_target: None,
            }),
            Some(rate_at_target) => {
                let result = get_borrow_rate(self.utilization(), rate_at_target, elapsed);
                Ok(AccrualRates {
                    elapsed,
                    avg_borrow_rate: result.avg_borrow_rate,
                    end_rate_at_target: Some(result.end_rate_at_target),
                })
            }
        }
    }

    /// Accrues interest on the market up to the given timestamp.
    ///
    /// See [`Market::accrue_interest_with_fee`]; this variant drops the fee shares.
    pub fn accrue_interest(&self, timestamp: u64) -> Result<Market, SimError> {
        Ok(self.accrue_interest_with_fee(timestamp)?.0)
    }

    /// Accrues interest on the market up to the given timestamp and returns the
    /// supply shares minted to the fee recipient.
    ///
    /// # How Interest Accrual Works
    ///
    /// 1. Calculate elapsed time since `last_update` (nothing happens if zero)
    /// 2. Compute the average borrow rate over the period using the IRM
    /// 3. Calculate interest: `total_borrow * (e^(rate * time) - 1)`
    /// 4. Add interest to both `total_supply_assets` and `total_borrow_assets`
    /// 5. Mint fee shares: `fee_amount * shares / (total_assets - fee_amount)`
    /// 6. Update `rate_at_target` and `last_update`
    ///
    /// # Errors
    ///
    /// - [`SimError::InvalidInterestAccrual`] if `timestamp < last_update`
    pub fn accrue_interest_with_fee(&self, timestamp: u64) -> Result<(Market, U256), SimError> {
        let rates = self.get_accrual_borrow_rates(timestamp)?;
        if rates.elapsed == 0 {
            return Ok((self.clone(), U256::ZERO));
        }

        let AccruedInterest { interest, fee_shares } = get_accrued_interest(
            rates.avg_borrow_rate,
            self.total_supply_assets,
            self.total_borrow_assets,
            self.total_supply_shares,
            self.fee,
            rates.elapsed,
        );

        let market = Market {
            total_supply_assets: self.total_supply_assets + interest,
            total_borrow_assets: self.total_borrow_assets + interest,
            total_supply_shares: self.total_supply_shares + fee_shares,
            last_update: timestamp,
            rate_at_target: rates.end_rate_at_target.or(self.rate_at_target),
            ..self.clone()
        };

        Ok((market, fee_shares))
    }

    /// Supplies loan assets, by `assets` or by `shares` (exactly one non-zero).
    ///
    /// By assets rounds shares down, by shares rounds assets up. Returns
    /// `(market, assets, shares)`.
    pub fn supply(&self, assets: U256, shares: U256) -> Result<(Market, U256, U256), SimError> {
        self.require_exactly_one(assets, shares)?;

        let (assets, shares) = if assets.is_zero() {
            (self.to_supply_assets(shares, RoundingDirection::Up), shares)
        } else {
            (assets, self.to_supply_shares(assets, RoundingDirection::Down))
        };

        let mut market = self.clone();
        market.total_supply_assets += assets;
        market.total_supply_shares += shares;

        Ok((market, assets, shares))
    }

    /// Withdraws supplied loan assets. By assets rounds shares up, by shares rounds
    /// assets down.
    pub fn withdraw(&self, assets: U256, shares: U256) -> Result<(Market, U256, U256), SimError> {
        self.require_exactly_one(assets, shares)?;

        let (assets, shares) = if assets.is_zero() {
            (self.to_supply_assets(shares, RoundingDirection::Down), shares)
        } else {
            (assets, self.to_supply_shares(assets, RoundingDirection::Up))
        };

        let insufficient = || SimError::InsufficientMarketLiquidity { market_id: self.id };
        let mut market = self.clone();
        market.total_supply_assets = market
            .total_supply_assets
            .checked_sub(assets)
            .ok_or_else(insufficient)?;
        market.total_supply_shares = market
            .total_supply_shares
            .checked_sub(shares)
            .ok_or_else(insufficient)?;

        if market.total_borrow_assets > market.total_supply_assets {
            return Err(insufficient());
        }

        Ok((market, assets, shares))
    }

    /// Borrows loan assets. By assets rounds shares up, by shares rounds assets
    /// down.
    ///
    /// This only updates market totals; the borrower's health is checked by the
    /// caller against its position.
    ///
    /// # Errors
    ///
    /// - [`SimError::InsufficientMarketLiquidity`] if the borrow exceeds [`Market::liquidity`]
    pub fn borrow(&self, assets: U256, shares: U256) -> Result<(Market, U256, U256), SimError> {
        self.require_exactly_one(assets, shares)?;

        let (assets, shares) = if assets.is_zero() {
            (self.to_borrow_assets(shares, RoundingDirection::Down), shares)
        } else {
            (assets, self.to_borrow_shares(assets, RoundingDirection::Up))
        };

        let mut market = self.clone();
        market.total_borrow_assets += assets;
        market.total_borrow_shares += shares;

        if market.total_borrow_assets > market.total_supply_assets {
            return Err(SimError::InsufficientMarketLiquidity { market_id: self.id });
        }

        Ok((market, assets, shares))
    }

    /// Repays debt. By assets rounds shares down, by shares rounds assets up.
    pub fn repay(&self, assets: U256, shares: U256) -> Result<(Market, U256, U256), SimError> {
        self.require_exactly_one(assets, shares)?;

        let (assets, shares) = if assets.is_zero() {
            (self.to_borrow_assets(shares, RoundingDirection::Up), shares)
        } else {
            (assets, self.to_borrow_shares(assets, RoundingDirection::Down))
        };

        let mut market = self.clone();
        market.total_borrow_assets = zero_floor_sub(market.total_borrow_assets, assets);
        market.total_borrow_shares = zero_floor_sub(market.total_borrow_shares, shares);

        Ok((market, assets, shares))
    }

    /// Liquidates a position holding `collateral` and `borrow_shares`, by seized
    /// collateral or by repaid shares (exactly one non-zero).
    ///
    /// When the borrower's collateral is exhausted, the remaining debt is realized
    /// as bad debt against suppliers.
    pub fn liquidate(
        &self,
        borrower: Address,
        collateral: U256,
        borrow_shares: U256,
        seized_assets: U256,
        repaid_shares: U256,
    ) -> Result<Liquidation, SimError> {
        self.require_exactly_one(seized_assets, repaid_shares)?;

        let price = self
            .price
            .ok_or(SimError::UnknownOraclePrice { market_id: self.id })?;
        if self.is_healthy(collateral, borrow_shares) != Some(false) {
            return Err(SimError::HealthyPosition {
                user: borrower,
                market_id: self.id,
            });
        }

        let incentive = self.get_liquidation_incentive_factor();
        let (seized_assets, repaid_shares) = if seized_assets.is_zero() {
            let repaid_assets = self.to_borrow_assets(repaid_shares, RoundingDirection::Down);
            let seized = mul_div_down(w_mul_down(repaid_assets, incentive), ORACLE_PRICE_SCALE, price);
            (seized, repaid_shares)
        } else {
            let quoted = mul_div_up(seized_assets, price, ORACLE_PRICE_SCALE);
            let repaid = self.to_borrow_shares(w_div_up(quoted, incentive), RoundingDirection::Up);
            (seized_assets, repaid)
        };
        let repaid_assets = self.to_borrow_assets(repaid_shares, RoundingDirection::Up);

        let insufficient_position = || SimError::InsufficientPosition {
            user: borrower,
            market_id: self.id,
        };
        let remaining_shares = borrow_shares
            .checked_sub(repaid_shares)
            .ok_or_else(insufficient_position)?;
        let remaining_collateral =
            collateral
                .checked_sub(seized_assets)
                .ok_or(SimError::InsufficientCollateral {
                    user: borrower,
                    market_id: self.id,
                })?;

        let mut market = self.clone();
        market.total_borrow_shares = market
            .total_borrow_shares
            .checked_sub(repaid_shares)
            .ok_or_else(insufficient_position)?;
        market.total_borrow_assets = zero_floor_sub(market.total_borrow_assets, repaid_assets);

        let (bad_debt_shares, bad_debt_assets) = if remaining_collateral.is_zero() {
            let bad_debt_assets = math::min(
                market.total_borrow_assets,
                market.to_borrow_assets(remaining_shares, RoundingDirection::Up),
            );
            market.total_borrow_assets -= bad_debt_assets;
            market.total_supply_assets = zero_floor_sub(market.total_supply_assets, bad_debt_assets);
            market.total_borrow_shares = zero_floor_sub(market.total_borrow_shares, remaining_shares);
            (remaining_shares, bad_debt_assets)
        } else {
            (U256::ZERO, U256::ZERO)
        };

        Ok(Liquidation {
            market,
            seized_assets,
            repaid_shares,
            repaid_assets,
            bad_debt_shares,
            bad_debt_assets,
        })
    }

    fn require_exactly_one(&self, a: U256, b: U256) -> Result<(), SimError> {
        if a.is_zero() == b.is_zero() {
            return Err(SimError::InconsistentInput { market_id: self.id });
        }
        Ok(())
    }

    /// Convert supply shares to assets
    pub fn to_supply_assets(&self, shares: U256, rounding: RoundingDirection) -> U256 {
        shares_to_assets(
            shares,
            self.total_supply_assets,
            self.total_supply_shares,
            rounding,
        )
    }

    /// Convert assets to supply shares
    pub fn to_supply_shares(&self, assets: U256, rounding: RoundingDirection) -> U256 {
        assets_to_shares(
            assets,
            self.total_supply_assets,
            self.total_supply_shares,
            rounding,
        )
    }

    /// Convert borrow shares to assets
    pub fn to_borrow_assets(&self, shares: U256, rounding: RoundingDirection) -> U256 {
        shares_to_assets(
            shares,
            self.total_borrow_assets,
            self.total_borrow_shares,
            rounding,
        )
    }

    /// Convert assets to borrow shares
    pub fn to_borrow_shares(&self, assets: U256, rounding: RoundingDirection) -> U256 {
        assets_to_shares(
            assets,
            self.total_borrow_assets,
            self.total_borrow_shares,
            rounding,
        )
    }

    /// Returns the amount to withdraw until the market reaches the target utilization
    pub fn get_withdraw_to_utilization(&self, target_utilization: U256) -> U256 {
        get_withdraw_to_utilization(
            self.total_supply_assets,
            self.total_borrow_assets,
            target_utilization,
        )
    }

    // ==================== Collateral & Health ====================

    /// Returns the value of collateral in loan assets
    pub fn get_collateral_value(&self, collateral: U256) -> Option<U256> {
        self.price
            .map(|price| mul_div_down(collateral, price, ORACLE_PRICE_SCALE))
    }

    /// Returns the maximum debt allowed given a certain amount of collateral
    pub fn get_max_borrow_assets(&self, collateral: U256) -> Option<U256> {
        self.get_collateral_value(collateral)
            .map(|value| w_mul_down(value, self.lltv()))
    }

    /// Returns the liquidation incentive factor for this market
    pub fn get_liquidation_incentive_factor(&self) -> U256 {
        get_liquidation_incentive_factor(self.lltv())
    }

    /// Whether a position is healthy. Positions without debt are always healthy;
    /// otherwise `None` when the price is unknown.
    pub fn is_healthy(&self, collateral: U256, borrow_shares: U256) -> Option<bool> {
        if borrow_shares.is_zero() {
            return Some(true);
        }
        let max_borrow = self.get_max_borrow_assets(collateral)?;
        let current_borrow = self.to_borrow_assets(borrow_shares, RoundingDirection::Up);
        Some(max_borrow >= current_borrow)
    }

    /// Returns the health factor of a position (WAD-scaled)
    pub fn get_health_factor(&self, collateral: U256, borrow_shares: U256) -> Option<U256> {
        let borrow_assets = self.to_borrow_assets(borrow_shares, RoundingDirection::Up);
        if borrow_assets.is_zero() {
            return Some(U256::MAX);
        }

        let max_borrow = self.get_max_borrow_assets(collateral)?;
        Some(w_div_down(max_borrow, borrow_assets))
    }

    /// Returns the LTV of a position (WAD-scaled)
    pub fn get_ltv(&self, collateral: U256, borrow_shares: U256) -> Option<U256> {
        if borrow_shares.is_zero() {
            return Some(U256::ZERO);
        }

        let collateral_value = self.get_collateral_value(collateral)?;
        if collateral_value.is_zero() {
            return Some(U256::MAX);
        }

        let borrow_assets = self.to_borrow_assets(borrow_shares, RoundingDirection::Up);
        Some(w_div_up(borrow_assets, collateral_value))
    }

    /// Returns the amount of collateral that can be withdrawn while staying healthy
    pub fn get_withdrawable_collateral(&self, collateral: U256, borrow_shares: U256) -> Option<U256> {
        if borrow_shares.is_zero() {
            return Some(collateral);
        }
        let price = self.price?;
        if price.is_zero() || self.lltv().is_zero() {
            return Some(U256::ZERO);
        }

        let borrow_assets = self.to_borrow_assets(borrow_shares, RoundingDirection::Up);
        let required_collateral = w_div_up(
            mul_div_up(borrow_assets, ORACLE_PRICE_SCALE, price),
            self.lltv(),
        );

        Some(zero_floor_sub(collateral, required_collateral))
    }
}

struct AccrualRates {
    elapsed: u64,
    avg_borrow_rate: U256,
    end_rate_at_target: Option<U256>,
}

struct AccruedInterest {
    interest: U256,
    fee_shares: U256,
}

// ==================== Utility Functions ====================

/// Calculate the utilization rate (WAD-scaled)
pub fn get_utilization(total_supply_assets: U256, total_borrow_assets: U256) -> U256 {
    if total_supply_assets.is_zero() {
        if total_borrow_assets > U256::ZERO {
            return U256::MAX;
        }
        return U256::ZERO;
    }
    w_div_down(total_borrow_assets, total_supply_assets)
}

fn get_accrued_interest(
    borrow_rate: U256,
    total_supply_assets: U256,
    total_borrow_assets: U256,
    total_supply_shares: U256,
    fee: U256,
    elapsed: u64,
) -> AccruedInterest {
    let interest = w_mul_down(
        total_borrow_assets,
        w_taylor_compounded(borrow_rate, U256::from(elapsed)),
    );

    let fee_amount = w_mul_down(interest, fee);

    // Fee shares are priced against the supply after interest, excluding the fee itself
    let fee_shares = assets_to_shares(
        fee_amount,
        total_supply_assets + interest - fee_amount,
        total_supply_shares,
        RoundingDirection::Down,
    );

    AccruedInterest {
        interest,
        fee_shares,
    }
}

/// Calculate the liquidation incentive factor
pub fn get_liquidation_incentive_factor(lltv: U256) -> U256 {
    math::min(
        MAX_LIQUIDATION_INCENTIVE_FACTOR,
        w_div_down(
            WAD,
            WAD - w_mul_down(LIQUIDATION_CURSOR, WAD.saturating_sub(lltv)),
        ),
    )
}

/// Returns the amount to withdraw until the market reaches the target utilization
pub fn get_withdraw_to_utilization(
    total_supply_assets: U256,
    total_borrow_assets: U256,
    target_utilization: U256,
) -> U256 {
    if target_utilization.is_zero() {
        if total_borrow_assets.is_zero() {
            return total_supply_assets;
        }
        return U256::ZERO;
    }

    zero_floor_sub(
        total_supply_assets,
        w_div_up(total_borrow_assets, target_utilization),
    )
}

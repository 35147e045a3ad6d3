//! Fixed-point arithmetic matching Morpho's `MathLib` and `SharesMathLib`.
//!
//! Every conversion takes an explicit [`RoundingDirection`]. Products that would
//! overflow 256 bits saturate, and divisions by zero return `U256::MAX`; both are
//! states the on-chain contracts revert on and the handlers never reach them with
//! well-formed snapshots.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// 1e18, the fixed-point unit
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Seconds in a 365-day year
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Virtual shares added to market share totals (1e6)
pub const VIRTUAL_SHARES: U256 = U256::from_limbs([1_000_000, 0, 0, 0]);

/// Virtual assets added to market asset totals (1)
pub const VIRTUAL_ASSETS: U256 = U256::from_limbs([1, 0, 0, 0]);

/// 2^160 - 1, the largest Permit2 allowance and the funding probe balance
pub const MAX_UINT_160: U256 = U256::from_limbs([u64::MAX, u64::MAX, 0xFFFF_FFFF, 0]);

/// Direction in which a conversion rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundingDirection {
    Up,
    Down,
}

pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}

pub fn max(a: U256, b: U256) -> U256 {
    if a > b {
        a
    } else {
        b
    }
}

/// `a - b`, floored at zero
pub fn zero_floor_sub(a: U256, b: U256) -> U256 {
    a.saturating_sub(b)
}

/// `x * y / denominator` with the given rounding
pub fn mul_div(x: U256, y: U256, denominator: U256, rounding: RoundingDirection) -> U256 {
    match rounding {
        RoundingDirection::Down => mul_div_down(x, y, denominator),
        RoundingDirection::Up => mul_div_up(x, y, denominator),
    }
}

pub fn mul_div_down(x: U256, y: U256, denominator: U256) -> U256 {
    x.saturating_mul(y)
        .checked_div(denominator)
        .unwrap_or(U256::MAX)
}

pub fn mul_div_up(x: U256, y: U256, denominator: U256) -> U256 {
    if denominator.is_zero() {
        return U256::MAX;
    }
    let product = x.saturating_mul(y);
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        quotient
    } else {
        quotient.saturating_add(U256::from(1))
    }
}

pub fn w_mul_down(x: U256, y: U256) -> U256 {
    mul_div_down(x, y, WAD)
}

pub fn w_mul_up(x: U256, y: U256) -> U256 {
    mul_div_up(x, y, WAD)
}

pub fn w_div_down(x: U256, y: U256) -> U256 {
    mul_div_down(x, WAD, y)
}

pub fn w_div_up(x: U256, y: U256) -> U256 {
    mul_div_up(x, WAD, y)
}

/// Third-order Taylor approximation of `e^(x * n) - 1`, as used for interest
/// compounding.
pub fn w_taylor_compounded(x: U256, n: U256) -> U256 {
    let first_term = x.saturating_mul(n);
    let second_term = mul_div_down(first_term, first_term, WAD * U256::from(2));
    let third_term = mul_div_down(second_term, first_term, WAD * U256::from(3));

    first_term + second_term + third_term
}

/// Converts assets to shares with virtual shares/assets
pub fn assets_to_shares(
    assets: U256,
    total_assets: U256,
    total_shares: U256,
    rounding: RoundingDirection,
) -> U256 {
    mul_div(
        assets,
        total_shares + VIRTUAL_SHARES,
        total_assets + VIRTUAL_ASSETS,
        rounding,
    )
}

/// Converts shares to assets with virtual shares/assets
pub fn shares_to_assets(
    shares: U256,
    total_assets: U256,
    total_shares: U256,
    rounding: RoundingDirection,
) -> U256 {
    mul_div(
        shares,
        total_assets + VIRTUAL_ASSETS,
        total_shares + VIRTUAL_SHARES,
        rounding,
    )
}

/// Converts a WAD-scaled value to `f64` (lossy, display only)
pub fn rate_to_f64(value: U256) -> f64 {
    value.saturating_to::<u128>() as f64 / 1e18
}

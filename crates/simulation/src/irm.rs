//! Adaptive Curve Interest Rate Model (IRM).
//!
//! Morpho Blue markets created with the
//! [Adaptive Curve IRM](https://docs.morpho.org/morpho/concepts/adaptive-interest-rate-model)
//! derive their borrow rate from utilization:
//!
//! ```text
//! err = (utilization - 90%) / (utilization > 90% ? 10% : 90%)      in [-1, 1]
//! curve(r) = r * (1 + (err < 0 ? 0.75 : 3) * err)
//! ```
//!
//! `rate_at_target` drifts by `exp(ADJUSTMENT_SPEED * err * elapsed)` between two
//! interactions, bounded by [`MIN_RATE_AT_TARGET`] and [`MAX_RATE_AT_TARGET`]. The
//! average rate over the period uses the trapezoidal rule on the start, mid and end
//! rates at target.
//!
//! All arithmetic mirrors the Solidity implementation: signed WAD values with
//! truncation toward zero.

use alloy_primitives::U256;

use crate::math::{max, min, WAD};

/// Curve steepness (4 in WAD)
pub const CURVE_STEEPNESS: i128 = 4_000_000_000_000_000_000;

/// Target utilization (90% in WAD)
pub const TARGET_UTILIZATION: i128 = 900_000_000_000_000_000;

/// Initial rate at target (4% per year, per second)
pub const INITIAL_RATE_AT_TARGET: U256 = U256::from_limbs([1_268_391_679, 0, 0, 0]);

/// Adjustment speed (50 per year, per second)
pub const ADJUSTMENT_SPEED: i128 = 1_585_489_599_188;

/// Minimum rate at target (0.1% per year, per second)
pub const MIN_RATE_AT_TARGET: U256 = U256::from_limbs([31_709_791, 0, 0, 0]);

/// Maximum rate at target (200% per year, per second)
pub const MAX_RATE_AT_TARGET: U256 = U256::from_limbs([63_419_583_967, 0, 0, 0]);

/// ln(2) in WAD
pub const LN_2_INT: i128 = 693_147_180_559_945_309;

/// ln(1e-18) in WAD
pub const LN_WEI_INT: i128 = -41_446_531_673_892_822_312;

/// Inputs above this bound are clipped before exponentiation
pub const WEXP_UPPER_BOUND: i128 = 93_859_467_695_000_404_319;

/// `w_exp(WEXP_UPPER_BOUND)`
pub const WEXP_UPPER_VALUE: U256 = U256::from_limbs([
    0x3216_C1AD_5D72_C200,
    0x09BA_5D32_E9C0_DE49,
    0x80,
    0,
]);

const WAD_INT: i128 = 1_000_000_000_000_000_000;

/// Result of a borrow rate computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BorrowRateResult {
    /// Average borrow rate over the elapsed period, used for interest accrual
    pub avg_borrow_rate: U256,
    /// Instantaneous borrow rate at the end of the period
    pub end_borrow_rate: U256,
    /// Rate at target stored after the interaction
    pub end_rate_at_target: U256,
}

fn w_mul_to_zero(x: i128, y: i128) -> i128 {
    x.saturating_mul(y) / WAD_INT
}

fn w_div_to_zero(x: i128, y: i128) -> i128 {
    x.saturating_mul(WAD_INT) / y
}

/// Approximates `e^x` for a WAD-scaled `x`.
///
/// `x = q * ln(2) + r` with `|r| <= ln(2) / 2`, then `e^x = 2^q * (1 + r + r^2 / 2)`.
pub fn w_exp(x: i128) -> U256 {
    if x < LN_WEI_INT {
        return U256::ZERO;
    }
    if x >= WEXP_UPPER_BOUND {
        return WEXP_UPPER_VALUE;
    }

    let rounding_adjustment = if x < 0 { -(LN_2_INT / 2) } else { LN_2_INT / 2 };
    let q = (x + rounding_adjustment) / LN_2_INT;
    let r = x - q * LN_2_INT;

    let exp_r = U256::from((WAD_INT + r + (r * r) / WAD_INT / 2).unsigned_abs());

    if q >= 0 {
        exp_r << q.unsigned_abs() as usize
    } else {
        exp_r >> q.unsigned_abs() as usize
    }
}

fn new_rate_at_target(start_rate_at_target: U256, linear_adaptation: i128) -> U256 {
    let rate = mul_wad_down(start_rate_at_target, w_exp(linear_adaptation));
    min(max(rate, MIN_RATE_AT_TARGET), MAX_RATE_AT_TARGET)
}

fn mul_wad_down(x: U256, y: U256) -> U256 {
    x.saturating_mul(y) / WAD
}

fn curve(rate_at_target: U256, err: i128) -> U256 {
    let coeff = if err < 0 {
        WAD_INT - w_div_to_zero(WAD_INT, CURVE_STEEPNESS)
    } else {
        CURVE_STEEPNESS - WAD_INT
    };

    let factor = w_mul_to_zero(coeff, err) + WAD_INT;
    let rate = rate_at_target.saturating_to::<i128>();

    U256::from(w_mul_to_zero(factor, rate).max(0).unsigned_abs())
}

/// Computes the borrow rate for a market at `utilization` whose stored rate at
/// target is `rate_at_target`, `elapsed` seconds after its last interaction.
///
/// A zero `rate_at_target` marks the first interaction and starts from
/// [`INITIAL_RATE_AT_TARGET`]. Utilization is taken as WAD and capped at 100%.
///
/// ```rust
/// use morpho_rs_simulation::irm::{get_borrow_rate, INITIAL_RATE_AT_TARGET};
/// use alloy_primitives::U256;
///
/// let high = get_borrow_rate(U256::from(950_000_000_000_000_000u64), INITIAL_RATE_AT_TARGET, 0);
/// assert!(high.end_borrow_rate > INITIAL_RATE_AT_TARGET);
///
/// let adapted = get_borrow_rate(U256::from(950_000_000_000_000_000u64), INITIAL_RATE_AT_TARGET, 86_400);
/// assert!(adapted.end_rate_at_target > INITIAL_RATE_AT_TARGET);
/// ```
pub fn get_borrow_rate(utilization: U256, rate_at_target: U256, elapsed: u64) -> BorrowRateResult {
    let utilization = min(utilization, WAD).saturating_to::<i128>();

    let err_norm_factor = if utilization > TARGET_UTILIZATION {
        WAD_INT - TARGET_UTILIZATION
    } else {
        TARGET_UTILIZATION
    };
    let err = w_div_to_zero(utilization - TARGET_UTILIZATION, err_norm_factor);

    let (avg_rate_at_target, end_rate_at_target) = if rate_at_target.is_zero() {
        (INITIAL_RATE_AT_TARGET, INITIAL_RATE_AT_TARGET)
    } else {
        let speed = w_mul_to_zero(ADJUSTMENT_SPEED, err);
        let linear_adaptation = speed.saturating_mul(i128::from(elapsed));

        if linear_adaptation == 0 {
            (rate_at_target, rate_at_target)
        } else {
            let end = new_rate_at_target(rate_at_target, linear_adaptation);
            let mid = new_rate_at_target(rate_at_target, linear_adaptation / 2);
            let avg = (rate_at_target + end + U256::from(2) * mid) / U256::from(4);
            (avg, end)
        }
    };

    BorrowRateResult {
        avg_borrow_rate: curve(avg_rate_at_target, err),
        end_borrow_rate: curve(end_rate_at_target, err),
        end_rate_at_target,
    }
}

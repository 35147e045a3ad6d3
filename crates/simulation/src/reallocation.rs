//! Public-allocator reallocation planning.
//!
//! The planner pulls liquidity into a target market through the vaults that
//! allocate to it. Each round it picks the single largest withdrawal any vault can
//! make from one of its other markets, applies it as a [`Action::PublicReallocate`]
//! and looks again from the resulting snapshot, until no vault can move anything.
//!
//! Fees paid to the public allocator are charged on every round, so a plan made of
//! several rounds accrues the fee once per round.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::action::{Action, Withdrawal};
use crate::error::{MarketId, SimError};
use crate::interpreter::Interpreter;
use crate::math::{min, w_mul_up, zero_floor_sub, WAD};
use crate::snapshot::Snapshot;
use crate::vault::Vault;

/// Utilization a source market may be withdrawn up to (92%)
pub const DEFAULT_MAX_WITHDRAWAL_UTILIZATION: U256 =
    U256::from_limbs([920_000_000_000_000_000, 0, 0, 0]);

/// Buffer applied to the target supply when computing cap headroom (0.03%)
pub const DEFAULT_REALLOCATION_SLIPPAGE: U256 = U256::from_limbs([300_000_000_000_000, 0, 0, 0]);

pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// Tuning for [`plan_reallocation`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReallocationOptions {
    /// Vaults allowed to reallocate; every vault of the snapshot when `None`
    pub vaults: Option<Vec<Address>>,
    /// Utilization ceiling for source markets without an override (WAD-scaled)
    pub default_max_withdrawal_utilization: U256,
    /// Per source market utilization ceilings (WAD-scaled)
    pub max_withdrawal_utilization: BTreeMap<MarketId, U256>,
    /// Relative buffer on the target supply (WAD-scaled)
    pub slippage: U256,
    pub max_iterations: u32,
}

impl Default for ReallocationOptions {
    fn default() -> Self {
        Self {
            vaults: None,
            default_max_withdrawal_utilization: DEFAULT_MAX_WITHDRAWAL_UTILIZATION,
            max_withdrawal_utilization: BTreeMap::new(),
            slippage: DEFAULT_REALLOCATION_SLIPPAGE,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ReallocationOptions {
    fn withdrawal_utilization(&self, market_id: MarketId) -> U256 {
        self.max_withdrawal_utilization
            .get(&market_id)
            .copied()
            .unwrap_or(self.default_max_withdrawal_utilization)
    }

    fn includes(&self, vault: Address) -> bool {
        self.vaults
            .as_ref()
            .is_none_or(|vaults| vaults.contains(&vault))
    }
}

/// One round of the plan: `assets` moved by `vault` from `market_id` to the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedWithdrawal {
    pub vault: Address,
    pub market_id: MarketId,
    pub assets: U256,
}

/// Withdrawals in the order they were applied, and the snapshot after the last one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReallocationPlan {
    pub target_market_id: MarketId,
    pub withdrawals: Vec<PlannedWithdrawal>,
    pub snapshot: Snapshot,
}

impl ReallocationPlan {
    pub fn total_withdrawn(&self) -> U256 {
        self.withdrawals
            .iter()
            .fold(U256::ZERO, |total, withdrawal| total + withdrawal.assets)
    }
}

/// Plans reallocations toward `target_market_id`.
///
/// The plan is empty when no public allocator is configured or no vault can move
/// liquidity.
///
/// # Errors
///
/// Returns [`SimError::ConvergenceFailure`] when a withdrawal is still available
/// after `options.max_iterations` rounds, or the error of a round that fails to
/// apply.
pub fn plan_reallocation(
    interpreter: &Interpreter,
    snapshot: &Snapshot,
    target_market_id: MarketId,
    options: &ReallocationOptions,
) -> Result<ReallocationPlan, SimError> {
    snapshot.market(target_market_id)?;
    let mut plan = ReallocationPlan {
        target_market_id,
        withdrawals: Vec::new(),
        snapshot: snapshot.clone(),
    };
    let Some(public_allocator) = interpreter.config().address_book.public_allocator else {
        debug!(%target_market_id, "No public allocator, nothing to reallocate");
        return Ok(plan);
    };

    for round in 0..=options.max_iterations {
        let Some(withdrawal) = best_withdrawal(&plan.snapshot, target_market_id, options)? else {
            debug!(%target_market_id, rounds = round, withdrawn = %plan.total_withdrawn(), "Reallocation planned");
            return Ok(plan);
        };
        if round == options.max_iterations {
            break;
        }

        debug!(round, vault = %withdrawal.vault, market_id = %withdrawal.market_id, assets = %withdrawal.assets, "Reallocation round");
        let action = Action::PublicReallocate {
            sender: public_allocator,
            vault: withdrawal.vault,
            withdrawals: vec![Withdrawal {
                market_id: withdrawal.market_id,
                amount: withdrawal.assets,
            }],
            supply_market_id: target_market_id,
        };
        plan.snapshot = interpreter.apply(&plan.snapshot, &action)?;
        plan.withdrawals.push(withdrawal);
    }

    Err(SimError::ConvergenceFailure {
        max_iterations: options.max_iterations,
    })
}

/// The largest withdrawal any candidate vault can make this round
fn best_withdrawal(
    snapshot: &Snapshot,
    target_market_id: MarketId,
    options: &ReallocationOptions,
) -> Result<Option<PlannedWithdrawal>, SimError> {
    let mut best: Option<PlannedWithdrawal> = None;
    for vault in snapshot.vaults().filter(|vault| options.includes(vault.address)) {
        let Some(candidate) = vault_withdrawal(snapshot, vault, target_market_id, options)? else {
            continue;
        };
        if !matches!(&best, Some(current) if current.assets >= candidate.assets) {
            best = Some(candidate);
        }
    }
    Ok(best)
}

/// The largest withdrawal `vault` can make toward the target, if the vault can
/// reallocate into it at all
fn vault_withdrawal(
    snapshot: &Snapshot,
    vault: &Vault,
    target_market_id: MarketId,
    options: &ReallocationOptions,
) -> Result<Option<PlannedWithdrawal>, SimError> {
    if vault.public_allocator_config.is_none() {
        return Ok(None);
    }
    let Some(target) = snapshot
        .try_vault_market_config(vault.address, target_market_id)
        .filter(|config| config.enabled)
    else {
        return Ok(None);
    };
    let Some(target_flow_caps) = target.flow_caps.as_ref() else {
        return Ok(None);
    };

    let target_supply = snapshot
        .accrual_position(vault.address, target_market_id)?
        .supply_assets();
    let headroom = zero_floor_sub(target.cap, w_mul_up(target_supply, WAD + options.slippage));
    let limit = min(headroom, target_flow_caps.max_in);
    if limit.is_zero() {
        return Ok(None);
    }

    let mut best: Option<PlannedWithdrawal> = None;
    for &market_id in &vault.withdraw_queue {
        if market_id == target_market_id {
            continue;
        }
        let Some(max_out) = snapshot
            .try_vault_market_config(vault.address, market_id)
            .filter(|config| config.enabled)
            .and_then(|config| config.flow_caps.as_ref())
            .map(|flow_caps| flow_caps.max_out)
        else {
            continue;
        };

        let position = snapshot.accrual_position(vault.address, market_id)?;
        let liquidity = position
            .market
            .get_withdraw_to_utilization(options.withdrawal_utilization(market_id));
        let assets = min(
            min(position.supply_assets(), liquidity),
            min(limit, max_out),
        );
        trace!(vault = %vault.address, %market_id, %assets, "Withdrawable toward target");

        if !assets.is_zero() && !matches!(&best, Some(current) if current.assets >= assets) {
            best = Some(PlannedWithdrawal {
                vault: vault.address,
                market_id,
                assets,
            });
        }
    }
    Ok(best)
}

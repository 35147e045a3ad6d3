//! MetaMorpho vault operations and the public allocator.
//!
//! Deposits and withdrawals accrue the vault first: every withdraw-queue market is
//! accrued and the performance fee is minted to the fee recipient. Vault-to-Morpho
//! movements are internal to the protocol and never consume allowances.

use alloy_primitives::{Address, U256};
use tracing::debug;

use super::blue::accrue_market;
use super::erc20::{balance_of, credit, debit, move_tokens, pull, spend_allowance};
use super::resolve_max;
use crate::action::{MarketAllocation, Withdrawal};
use crate::config::SimulationConfig;
use crate::draft::Draft;
use crate::error::{MarketId, SimError};
use crate::math::{min, zero_floor_sub, RoundingDirection};
use crate::token::NATIVE_ADDRESS;
use crate::vault::{AccrualVault, PendingCap, VaultMarketConfig, MAX_QUEUE_LENGTH};

/// Accrues the vault's markets and its performance fee, then returns the vault
/// priced on the accrued state.
pub(super) fn accrue_vault(draft: &mut Draft, vault: Address) -> Result<AccrualVault, SimError> {
    let queue = draft.vault(vault)?.withdraw_queue.clone();
    for market_id in queue {
        accrue_market(draft, market_id)?;
    }

    let accrual = draft.accrual_vault(vault)?;
    let fee_shares = accrual.fee_shares;
    let fee_recipient = accrual.vault.fee_recipient;
    draft.set_vault(accrual.accrued());

    if fee_shares.is_zero() {
        return Ok(accrual);
    }
    debug!(%vault, %fee_shares, %fee_recipient, "Minted performance fee");
    credit(draft, vault, fee_recipient, fee_shares);
    draft.accrual_vault(vault)
}

fn supply_to_market(
    config: &SimulationConfig,
    draft: &mut Draft,
    vault: Address,
    market_id: MarketId,
    assets: U256,
) -> Result<(), SimError> {
    accrue_market(draft, market_id)?;
    let (market, assets, shares) = draft.market(market_id)?.supply(assets, U256::ZERO)?;
    let loan_token = market.params.loan_token;
    draft.set_market(market);
    draft.position_entry(vault, market_id)?.supply_shares += shares;
    move_tokens(draft, loan_token, vault, config.address_book.morpho, assets)
}

/// Withdraws from `market_id` by assets or by shares and returns the assets
/// withdrawn.
fn withdraw_from_market(
    config: &SimulationConfig,
    draft: &mut Draft,
    vault: Address,
    market_id: MarketId,
    assets: U256,
    shares: U256,
) -> Result<U256, SimError> {
    accrue_market(draft, market_id)?;
    let (market, assets, shares) = draft.market(market_id)?.withdraw(assets, shares)?;
    let loan_token = market.params.loan_token;
    draft.set_market(market);

    let position = draft.position_entry(vault, market_id)?;
    position.supply_shares =
        position
            .supply_shares
            .checked_sub(shares)
            .ok_or(SimError::InsufficientPosition {
                user: vault,
                market_id,
            })?;
    move_tokens(draft, loan_token, config.address_book.morpho, vault, assets)?;
    Ok(assets)
}

/// Pulls `assets` from `sender`, mints `shares` to `owner` and supplies the assets
/// through the supply queue.
fn enter(
    config: &SimulationConfig,
    draft: &mut Draft,
    accrual: &AccrualVault,
    sender: Address,
    owner: Address,
    assets: U256,
    shares: U256,
) -> Result<(), SimError> {
    let vault = accrual.address();
    pull(draft, accrual.vault.asset, vault, sender, vault, assets)?;
    credit(draft, vault, owner, shares);

    let mut remaining = assets;
    for &market_id in &accrual.vault.supply_queue {
        if remaining.is_zero() {
            break;
        }
        let cap = draft
            .try_vault_market_config(vault, market_id)
            .map(|config| config.cap)
            .unwrap_or_default();
        if cap.is_zero() {
            continue;
        }

        let supplied = draft.accrual_position(vault, market_id)?.supply_assets();
        let to_supply = min(zero_floor_sub(cap, supplied), remaining);
        if !to_supply.is_zero() {
            supply_to_market(config, draft, vault, market_id, to_supply)?;
            remaining -= to_supply;
        }
    }
    if !remaining.is_zero() {
        return Err(SimError::AllCapsReached { vault, remaining });
    }

    let stored = draft.vault_mut(vault)?;
    stored.total_supply += shares;
    stored.total_assets += assets;
    stored.last_total_assets += assets;
    debug!(%vault, %owner, %assets, %shares, "Vault deposit");
    Ok(())
}

/// Burns `shares` of `owner`, withdraws `assets` through the withdraw queue and
/// sends them to `receiver`.
fn exit(
    config: &SimulationConfig,
    draft: &mut Draft,
    accrual: &AccrualVault,
    sender: Address,
    receiver: Address,
    owner: Address,
    (assets, shares): (U256, U256),
) -> Result<(), SimError> {
    let vault = accrual.address();
    spend_allowance(draft, vault, owner, sender, shares)?;
    debit(draft, vault, owner, shares)?;

    let mut remaining = assets;
    for &market_id in &accrual.vault.withdraw_queue {
        if remaining.is_zero() {
            break;
        }
        let withdrawable = draft.accrual_position(vault, market_id)?.withdrawable_supply();
        let to_withdraw = min(withdrawable, remaining);
        if !to_withdraw.is_zero() {
            withdraw_from_market(config, draft, vault, market_id, to_withdraw, U256::ZERO)?;
            remaining -= to_withdraw;
        }
    }
    if !remaining.is_zero() {
        return Err(SimError::NotEnoughLiquidity { vault, remaining });
    }

    let stored = draft.vault_mut(vault)?;
    stored.total_supply = zero_floor_sub(stored.total_supply, shares);
    stored.total_assets = zero_floor_sub(stored.total_assets, assets);
    stored.last_total_assets = zero_floor_sub(stored.last_total_assets, assets);
    debug!(%vault, %owner, %receiver, %assets, %shares, "Vault withdrawal");

    move_tokens(draft, accrual.vault.asset, vault, receiver, assets)
}

pub(super) fn deposit(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    vault: Address,
    assets: U256,
    owner: Address,
) -> Result<(), SimError> {
    let accrual = accrue_vault(draft, vault)?;
    let assets = resolve_max(assets, || balance_of(draft, sender, accrual.vault.asset));
    let shares = accrual.to_shares(assets, RoundingDirection::Down);
    enter(config, draft, &accrual, sender, owner, assets, shares)
}

/// The sentinel mints as many shares as the sender's asset balance buys
pub(super) fn mint(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    vault: Address,
    shares: U256,
    owner: Address,
) -> Result<(), SimError> {
    let accrual = accrue_vault(draft, vault)?;
    let shares = resolve_max(shares, || {
        accrual.to_shares(
            balance_of(draft, sender, accrual.vault.asset),
            RoundingDirection::Down,
        )
    });
    let assets = accrual.to_assets(shares, RoundingDirection::Up);
    enter(config, draft, &accrual, sender, owner, assets, shares)
}

/// The sentinel redeems all of the owner's shares
pub(super) fn withdraw(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    vault: Address,
    assets: U256,
    receiver: Address,
    owner: Address,
) -> Result<(), SimError> {
    let accrual = accrue_vault(draft, vault)?;
    let (assets, shares) = if assets == U256::MAX {
        let shares = balance_of(draft, owner, vault);
        (accrual.to_assets(shares, RoundingDirection::Down), shares)
    } else {
        (assets, accrual.to_shares(assets, RoundingDirection::Up))
    };
    exit(config, draft, &accrual, sender, receiver, owner, (assets, shares))
}

pub(super) fn redeem(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    vault: Address,
    shares: U256,
    receiver: Address,
    owner: Address,
) -> Result<(), SimError> {
    let accrual = accrue_vault(draft, vault)?;
    let shares = resolve_max(shares, || balance_of(draft, owner, vault));
    let assets = accrual.to_assets(shares, RoundingDirection::Down);
    exit(config, draft, &accrual, sender, receiver, owner, (assets, shares))
}

/// Moves the vault's supply between markets. Markets are withdrawn down to their
/// target, or supplied up to it; a `U256::MAX` target supplies everything withdrawn
/// so far and not yet supplied. Withdrawals and supplies must balance.
pub(super) fn reallocate(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    vault: Address,
    allocations: &[MarketAllocation],
) -> Result<(), SimError> {
    if !draft
        .vault(vault)?
        .is_allocator(sender, draft.try_vault_user(vault, sender))
    {
        return Err(SimError::NotAllocatorRole { vault, sender });
    }

    let mut total_supplied = U256::ZERO;
    let mut total_withdrawn = U256::ZERO;

    for allocation in allocations {
        let market_id = allocation.market_id;
        accrue_market(draft, market_id)?;

        let market_config = draft
            .try_vault_market_config(vault, market_id)
            .cloned()
            .unwrap_or_else(|| VaultMarketConfig::empty(vault, market_id));
        let position = draft.accrual_position(vault, market_id)?;
        let supply_assets = position.supply_assets();
        let withdrawn = zero_floor_sub(supply_assets, allocation.assets);

        if !withdrawn.is_zero() {
            if !market_config.enabled {
                return Err(SimError::MarketNotEnabled { vault, market_id });
            }
            // A zero target withdraws by shares to leave no dust
            let (assets, shares) = if allocation.assets.is_zero() {
                (U256::ZERO, position.position.supply_shares)
            } else {
                (withdrawn, U256::ZERO)
            };
            let withdrawn = withdraw_from_market(config, draft, vault, market_id, assets, shares)?;
            debug!(%vault, %market_id, %withdrawn, "Reallocate withdraw");
            total_withdrawn += withdrawn;
            continue;
        }

        let supplied = if allocation.assets == U256::MAX {
            zero_floor_sub(total_withdrawn, total_supplied)
        } else {
            zero_floor_sub(allocation.assets, supply_assets)
        };
        if supplied.is_zero() {
            continue;
        }
        let cap = market_config.cap;
        if cap.is_zero() {
            return Err(SimError::UnauthorizedMarket { vault, market_id });
        }
        if supply_assets.saturating_add(supplied) > cap {
            return Err(SimError::SupplyCapExceeded {
                vault,
                market_id,
                cap,
            });
        }
        supply_to_market(config, draft, vault, market_id, supplied)?;
        debug!(%vault, %market_id, %supplied, "Reallocate supply");
        total_supplied += supplied;
    }

    if total_withdrawn != total_supplied {
        return Err(SimError::InconsistentReallocation {
            vault,
            supplied: total_supplied,
            withdrawn: total_withdrawn,
        });
    }
    Ok(())
}

/// Public allocator `reallocateTo`: withdraws the listed amounts within each
/// market's max outflow and supplies their sum to `supply_market_id` within its
/// max inflow, as a reallocation sent by the public allocator itself.
pub(super) fn public_reallocate(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    vault: Address,
    withdrawals: &[Withdrawal],
    supply_market_id: MarketId,
) -> Result<(), SimError> {
    let not_configured = SimError::PublicAllocatorNotConfigured { vault };
    let public_allocator = config
        .address_book
        .public_allocator
        .ok_or_else(|| not_configured.clone())?;
    let fee = draft
        .vault(vault)?
        .public_allocator_config
        .as_ref()
        .map(|allocator| allocator.fee)
        .ok_or(not_configured)?;

    move_tokens(draft, NATIVE_ADDRESS, sender, public_allocator, fee)?;
    if let Some(allocator) = draft.vault_mut(vault)?.public_allocator_config.as_mut() {
        allocator.accrued_fee += fee;
    }

    if withdrawals.is_empty() {
        return Err(SimError::EmptyWithdrawals { vault });
    }
    let enabled = |draft: &Draft, market_id| {
        draft
            .try_vault_market_config(vault, market_id)
            .is_some_and(|config| config.enabled)
    };
    if !enabled(draft, supply_market_id) {
        return Err(SimError::MarketNotEnabled {
            vault,
            market_id: supply_market_id,
        });
    }

    let mut allocations = Vec::with_capacity(withdrawals.len() + 1);
    let mut total_withdrawn = U256::ZERO;
    let mut previous = MarketId::ZERO;

    for withdrawal in withdrawals {
        let market_id = withdrawal.market_id;
        if !enabled(draft, market_id) {
            return Err(SimError::MarketNotEnabled { vault, market_id });
        }
        if withdrawal.amount.is_zero() {
            return Err(SimError::WithdrawZero { vault, market_id });
        }
        if market_id <= previous {
            return Err(SimError::WithdrawalsNotSorted { vault });
        }
        if market_id == supply_market_id {
            return Err(SimError::DepositMarketInWithdrawals { vault, market_id });
        }
        previous = market_id;

        accrue_market(draft, market_id)?;
        let supply_assets = draft.accrual_position(vault, market_id)?.supply_assets();

        let flow_caps = draft
            .vault_market_config_entry(vault, market_id)
            .flow_caps
            .get_or_insert_with(Default::default);
        if flow_caps.max_out < withdrawal.amount {
            return Err(SimError::MaxOutflowExceeded { vault, market_id });
        }
        if supply_assets < withdrawal.amount {
            return Err(SimError::NotEnoughSupply { vault, market_id });
        }
        flow_caps.max_in = flow_caps.max_in.saturating_add(withdrawal.amount);
        flow_caps.max_out -= withdrawal.amount;

        allocations.push(MarketAllocation {
            market_id,
            assets: supply_assets - withdrawal.amount,
        });
        total_withdrawn += withdrawal.amount;
    }

    let flow_caps = draft
        .vault_market_config_entry(vault, supply_market_id)
        .flow_caps
        .get_or_insert_with(Default::default);
    if flow_caps.max_in < total_withdrawn {
        return Err(SimError::MaxInflowExceeded {
            vault,
            market_id: supply_market_id,
        });
    }
    flow_caps.max_in -= total_withdrawn;
    flow_caps.max_out = flow_caps.max_out.saturating_add(total_withdrawn);

    allocations.push(MarketAllocation {
        market_id: supply_market_id,
        assets: U256::MAX,
    });
    debug!(%vault, %supply_market_id, %total_withdrawn, %fee, "Public reallocation");
    reallocate(config, draft, public_allocator, vault, &allocations)
}

/// Sets the cap of `market_id`. A non-zero cap on a market outside the withdraw
/// queue enables it and appends it to the queue.
fn set_cap(
    draft: &mut Draft,
    vault: Address,
    market_id: MarketId,
    cap: U256,
) -> Result<(), SimError> {
    let enabled = draft
        .try_vault_market_config(vault, market_id)
        .is_some_and(|config| config.enabled);

    if !cap.is_zero() && !enabled {
        let supply_assets = draft.accrual_position(vault, market_id)?.supply_assets();
        let stored = draft.vault_mut(vault)?;
        if stored.withdraw_queue.len() >= MAX_QUEUE_LENGTH {
            return Err(SimError::MaxQueueLengthExceeded { vault });
        }
        stored.withdraw_queue.push(market_id);
        stored.total_assets += supply_assets;
        stored.last_total_assets += supply_assets;
    }

    let config = draft.vault_market_config_entry(vault, market_id);
    if !cap.is_zero() {
        config.enabled = true;
        config.removable_at = 0;
    }
    config.cap = cap;
    config.pending_cap = None;
    debug!(%vault, %market_id, %cap, "Set cap");
    Ok(())
}

/// Lowers a cap at once, or records a raise that becomes acceptable after the
/// vault's timelock.
pub(super) fn submit_cap(
    draft: &mut Draft,
    sender: Address,
    vault: Address,
    market_id: MarketId,
    cap: U256,
) -> Result<(), SimError> {
    let stored = draft.vault(vault)?;
    if !stored.is_curator(sender) {
        return Err(SimError::NotCuratorRole { vault, sender });
    }
    let (asset, timelock) = (stored.asset, stored.timelock);

    if draft.market(market_id)?.params.loan_token != asset {
        return Err(SimError::InconsistentAsset { vault, market_id });
    }

    let current = draft
        .try_vault_market_config(vault, market_id)
        .cloned()
        .unwrap_or_else(|| VaultMarketConfig::empty(vault, market_id));
    if current.pending_cap.is_some() {
        return Err(SimError::AlreadyPending { vault, market_id });
    }
    if cap == current.cap {
        return Err(SimError::AlreadySet { vault, market_id });
    }

    if cap < current.cap {
        return set_cap(draft, vault, market_id, cap);
    }
    let valid_at = draft.timestamp().saturating_add(timelock);
    draft.vault_market_config_entry(vault, market_id).pending_cap = Some(PendingCap {
        value: cap,
        valid_at,
    });
    debug!(%vault, %market_id, %cap, valid_at, "Submitted cap");
    Ok(())
}

pub(super) fn accept_cap(
    draft: &mut Draft,
    vault: Address,
    market_id: MarketId,
) -> Result<(), SimError> {
    draft.vault(vault)?;
    let pending = draft
        .try_vault_market_config(vault, market_id)
        .and_then(|config| config.pending_cap.clone())
        .ok_or(SimError::NoPendingValue { vault, market_id })?;
    if draft.timestamp() < pending.valid_at {
        return Err(SimError::TimelockNotElapsed {
            vault,
            market_id,
            valid_at: pending.valid_at,
        });
    }
    set_cap(draft, vault, market_id, pending.value)
}

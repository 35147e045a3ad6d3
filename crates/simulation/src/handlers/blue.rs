//! Morpho Blue market operations.
//!
//! Every principal operation except supply collateral accrues the market first.
//! Supply, supply collateral and repay book their effects, run their callback and
//! only then pull tokens from the sender, so the callback can source them.

use alloy_primitives::{Address, U256};
use tracing::{debug, trace};

use super::erc20::{balance_of, move_tokens, pull};
use super::{check_signature, resolve_max};
use crate::action::Action;
use crate::config::SimulationConfig;
use crate::draft::Draft;
use crate::error::{MarketId, SimError};
use crate::interpreter::Execution;
use crate::market::{Liquidation, Market};
use crate::math::zero_floor_sub;
use crate::position::Position;

/// A loan-side operation on one market, by assets or by shares
pub(super) struct LoanOp {
    pub sender: Address,
    pub market_id: MarketId,
    pub on_behalf: Address,
    pub assets: U256,
    pub shares: U256,
}

impl LoanOp {
    pub fn new(
        sender: Address,
        market_id: MarketId,
        on_behalf: Address,
        assets: U256,
        shares: U256,
    ) -> Self {
        Self {
            sender,
            market_id,
            on_behalf,
            assets,
            shares,
        }
    }

    /// Both amounts, with either sentinel meaning all of `owned` shares
    fn resolve_shares(&self, owned: U256) -> (U256, U256) {
        if self.assets == U256::MAX || self.shares == U256::MAX {
            (U256::ZERO, owned)
        } else {
            (self.assets, self.shares)
        }
    }
}

/// Signature fields of a signed authorization
pub(super) struct Signed {
    pub nonce: Option<U256>,
    pub deadline: Option<u64>,
    pub signed: bool,
}

/// Accrues `market_id` to the snapshot timestamp and credits the protocol fee
/// shares to the chain's fee recipient.
pub(super) fn accrue_market(draft: &mut Draft, market_id: MarketId) -> Result<(), SimError> {
    let timestamp = draft.timestamp();
    let (market, fee_shares) = draft.market(market_id)?.accrue_interest_with_fee(timestamp)?;
    trace!(%market_id, total_borrow_assets = %market.total_borrow_assets, %fee_shares, "Accrued market");
    draft.set_market(market);

    if !fee_shares.is_zero() {
        let fee_recipient = draft.chain().fee_recipient;
        draft.position_entry(fee_recipient, market_id)?.supply_shares += fee_shares;
    }
    Ok(())
}

fn position_or_empty(draft: &Draft, user: Address, market_id: MarketId) -> Position {
    draft
        .try_position(user, market_id)
        .cloned()
        .unwrap_or_else(|| Position::empty(user, market_id))
}

fn authorize(
    config: &SimulationConfig,
    draft: &Draft,
    sender: Address,
    on_behalf: Address,
) -> Result<(), SimError> {
    let bundler_authorized = sender == config.address_book.bundler_adapter
        && draft
            .try_user(on_behalf)
            .is_some_and(|user| user.is_bundler_authorized);
    if sender == on_behalf || bundler_authorized {
        Ok(())
    } else {
        Err(SimError::Unauthorized { sender, on_behalf })
    }
}

fn ensure_healthy(market: &Market, position: &Position) -> Result<(), SimError> {
    match market.is_healthy(position.collateral, position.borrow_shares) {
        Some(true) => Ok(()),
        Some(false) => Err(SimError::InsufficientCollateral {
            user: position.user,
            market_id: market.id,
        }),
        None => Err(SimError::UnknownOraclePrice {
            market_id: market.id,
        }),
    }
}

/// Direct when the authorizer sends it, otherwise signed: the signature policy
/// applies and the nonce, when given, must match. Only authorizations of the
/// bundler adapter are recorded.
pub(super) fn set_authorization(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    authorizer: Address,
    authorized: Address,
    is_authorized: bool,
    signed: Signed,
) -> Result<(), SimError> {
    if sender != authorizer {
        let deadline = signed.deadline.unwrap_or(u64::MAX);
        check_signature(config, draft, authorizer, deadline, signed.signed)?;

        let user = draft.user_entry(authorizer);
        let expected = user.morpho_nonce;
        let nonce = signed.nonce.unwrap_or(expected);
        if nonce != expected {
            return Err(SimError::InvalidAuthorizationNonce {
                signer: authorizer,
                nonce,
            });
        }
        user.morpho_nonce = expected + U256::from(1);
    }

    let user = draft.user_entry(authorizer);
    if authorized == config.address_book.bundler_adapter {
        user.is_bundler_authorized = is_authorized;
    }
    Ok(())
}

pub(super) fn supply(
    execution: &mut Execution<'_>,
    draft: &mut Draft,
    op: LoanOp,
    callback: &[Action],
) -> Result<(), SimError> {
    let morpho = execution.config().address_book.morpho;
    accrue_market(draft, op.market_id)?;

    let market = draft.market(op.market_id)?;
    let loan_token = market.params.loan_token;
    let assets = resolve_max(op.assets, || balance_of(draft, op.sender, loan_token));
    let (market, assets, shares) = market.supply(assets, op.shares)?;
    debug!(market_id = %op.market_id, on_behalf = %op.on_behalf, %assets, %shares, "Supply");

    draft.set_market(market);
    draft.position_entry(op.on_behalf, op.market_id)?.supply_shares += shares;

    execution.run_callback(draft, callback)?;
    pull(draft, loan_token, morpho, op.sender, morpho, assets)
}

pub(super) fn supply_collateral(
    execution: &mut Execution<'_>,
    draft: &mut Draft,
    sender: Address,
    market_id: MarketId,
    on_behalf: Address,
    assets: U256,
    callback: &[Action],
) -> Result<(), SimError> {
    let morpho = execution.config().address_book.morpho;
    let collateral_token = draft.market(market_id)?.params.collateral_token;
    let assets = resolve_max(assets, || balance_of(draft, sender, collateral_token));
    if assets.is_zero() {
        return Err(SimError::ZeroAssets { market_id });
    }
    debug!(%market_id, %on_behalf, %assets, "Supply collateral");

    draft.position_entry(on_behalf, market_id)?.collateral += assets;

    execution.run_callback(draft, callback)?;
    pull(draft, collateral_token, morpho, sender, morpho, assets)
}

pub(super) fn borrow(
    config: &SimulationConfig,
    draft: &mut Draft,
    op: LoanOp,
    receiver: Address,
) -> Result<(), SimError> {
    authorize(config, draft, op.sender, op.on_behalf)?;
    accrue_market(draft, op.market_id)?;

    let (market, assets, shares) = draft.market(op.market_id)?.borrow(op.assets, op.shares)?;
    let mut position = position_or_empty(draft, op.on_behalf, op.market_id);
    position.borrow_shares += shares;
    ensure_healthy(&market, &position)?;
    debug!(market_id = %op.market_id, on_behalf = %op.on_behalf, %assets, %shares, "Borrow");

    let loan_token = market.params.loan_token;
    draft.set_market(market);
    draft.position_entry(op.on_behalf, op.market_id)?.borrow_shares = position.borrow_shares;
    move_tokens(draft, loan_token, config.address_book.morpho, receiver, assets)
}

pub(super) fn repay(
    execution: &mut Execution<'_>,
    draft: &mut Draft,
    op: LoanOp,
    callback: &[Action],
) -> Result<(), SimError> {
    let morpho = execution.config().address_book.morpho;
    accrue_market(draft, op.market_id)?;

    let borrow_shares = position_or_empty(draft, op.on_behalf, op.market_id).borrow_shares;
    let (assets, shares) = op.resolve_shares(borrow_shares);
    let (market, assets, shares) = draft.market(op.market_id)?.repay(assets, shares)?;
    if shares > borrow_shares {
        return Err(SimError::InsufficientPosition {
            user: op.on_behalf,
            market_id: op.market_id,
        });
    }
    debug!(market_id = %op.market_id, on_behalf = %op.on_behalf, %assets, %shares, "Repay");

    let loan_token = market.params.loan_token;
    draft.set_market(market);
    draft.position_entry(op.on_behalf, op.market_id)?.borrow_shares = borrow_shares - shares;

    execution.run_callback(draft, callback)?;
    pull(draft, loan_token, morpho, op.sender, morpho, assets)
}

pub(super) fn withdraw(
    config: &SimulationConfig,
    draft: &mut Draft,
    op: LoanOp,
    receiver: Address,
) -> Result<(), SimError> {
    authorize(config, draft, op.sender, op.on_behalf)?;
    accrue_market(draft, op.market_id)?;

    let supply_shares = position_or_empty(draft, op.on_behalf, op.market_id).supply_shares;
    let (assets, shares) = op.resolve_shares(supply_shares);
    let (market, assets, shares) = draft.market(op.market_id)?.withdraw(assets, shares)?;
    if shares > supply_shares {
        return Err(SimError::InsufficientPosition {
            user: op.on_behalf,
            market_id: op.market_id,
        });
    }
    debug!(market_id = %op.market_id, on_behalf = %op.on_behalf, %assets, %shares, "Withdraw");

    let loan_token = market.params.loan_token;
    draft.set_market(market);
    draft.position_entry(op.on_behalf, op.market_id)?.supply_shares = supply_shares - shares;
    move_tokens(draft, loan_token, config.address_book.morpho, receiver, assets)
}

pub(super) fn withdraw_collateral(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    market_id: MarketId,
    on_behalf: Address,
    receiver: Address,
    assets: U256,
) -> Result<(), SimError> {
    authorize(config, draft, sender, on_behalf)?;
    accrue_market(draft, market_id)?;

    let mut position = position_or_empty(draft, on_behalf, market_id);
    let assets = resolve_max(assets, || position.collateral);
    if assets.is_zero() {
        return Err(SimError::ZeroAssets { market_id });
    }
    position.collateral = position
        .collateral
        .checked_sub(assets)
        .ok_or(SimError::InsufficientCollateral {
            user: on_behalf,
            market_id,
        })?;

    let market = draft.market(market_id)?;
    ensure_healthy(market, &position)?;
    let collateral_token = market.params.collateral_token;
    debug!(%market_id, %on_behalf, %assets, "Withdraw collateral");

    draft.position_entry(on_behalf, market_id)?.collateral = position.collateral;
    move_tokens(draft, collateral_token, config.address_book.morpho, receiver, assets)
}

/// Liquidates `borrower` by seized collateral or by repaid shares. Either sentinel
/// resolves to the smaller of the whole collateral and the collateral the whole
/// debt buys: seizing everything falls back to repaying every share when the
/// collateral is worth more than the debt, and the other way around.
pub(super) fn liquidate(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    market_id: MarketId,
    borrower: Address,
    seized_assets: U256,
    repaid_shares: U256,
) -> Result<(), SimError> {
    accrue_market(draft, market_id)?;

    let position = position_or_empty(draft, borrower, market_id);
    let market = draft.market(market_id)?;
    let (collateral, borrow_shares) = (position.collateral, position.borrow_shares);
    let seize_all = || market.liquidate(borrower, collateral, borrow_shares, collateral, U256::ZERO);
    let repay_all =
        || market.liquidate(borrower, collateral, borrow_shares, U256::ZERO, borrow_shares);

    let liquidation = if seized_assets == U256::MAX {
        match seize_all() {
            Err(SimError::InsufficientPosition { .. }) => repay_all(),
            result => result,
        }
    } else if repaid_shares == U256::MAX {
        match repay_all() {
            Err(SimError::InsufficientCollateral { .. }) => seize_all(),
            result => result,
        }
    } else {
        market.liquidate(borrower, collateral, borrow_shares, seized_assets, repaid_shares)
    }?;

    let Liquidation {
        market,
        seized_assets,
        repaid_shares,
        repaid_assets,
        bad_debt_shares,
        bad_debt_assets,
    } = liquidation;
    debug!(
        %market_id,
        %borrower,
        %seized_assets,
        %repaid_assets,
        %bad_debt_assets,
        "Liquidate"
    );

    let params = market.params.clone();
    draft.set_market(market);
    let position = draft.position_entry(borrower, market_id)?;
    position.collateral = zero_floor_sub(collateral, seized_assets);
    position.borrow_shares = zero_floor_sub(borrow_shares, repaid_shares + bad_debt_shares);

    let morpho = config.address_book.morpho;
    move_tokens(draft, params.collateral_token, morpho, sender, seized_assets)?;
    pull(draft, params.loan_token, morpho, sender, morpho, repaid_assets)
}

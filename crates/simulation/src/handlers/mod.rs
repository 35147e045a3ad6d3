//! One handler per [`Action`] kind.
//!
//! Handlers mutate a [`Draft`] and fail with a typed [`SimError`]. Checks run
//! before effects where the protocol reverts, and since the draft is dropped on
//! error a failed action never leaks partial writes.

mod blue;
mod erc20;
mod meta_morpho;

use alloy_primitives::{Address, U256};

use crate::action::Action;
use crate::config::SimulationConfig;
use crate::draft::Draft;
use crate::error::SimError;
use crate::interpreter::Execution;

/// Resolves the `U256::MAX` sentinel to `available`
fn resolve_max(amount: U256, available: impl FnOnce() -> U256) -> U256 {
    if amount == U256::MAX {
        available()
    } else {
        amount
    }
}

/// Signature policy shared by permits and signed authorizations
fn check_signature(
    config: &SimulationConfig,
    draft: &Draft,
    signer: Address,
    deadline: u64,
    signed: bool,
) -> Result<(), SimError> {
    if config.require_signatures && !signed {
        return Err(SimError::MissingSignature { signer });
    }
    if deadline < draft.timestamp() {
        return Err(SimError::ExpiredSignature { signer, deadline });
    }
    Ok(())
}

pub(crate) fn handle(
    execution: &mut Execution<'_>,
    draft: &mut Draft,
    action: &Action,
) -> Result<(), SimError> {
    let config = execution.config();

    match action {
        Action::NativeTransfer { sender, to, amount } => {
            erc20::native_transfer(draft, *sender, *to, *amount)
        }
        Action::Transfer {
            sender,
            token,
            from,
            to,
            amount,
        } => erc20::transfer(draft, *sender, *token, *from, *to, *amount),
        Action::Approve {
            sender,
            token,
            spender,
            amount,
        } => erc20::approve(draft, *sender, *token, *spender, *amount),
        Action::Permit {
            token,
            owner,
            spender,
            amount,
            nonce,
            deadline,
            signature,
            ..
        } => erc20::permit(
            config,
            draft,
            erc20::PermitArgs {
                token: *token,
                owner: *owner,
                spender: *spender,
                amount: *amount,
                nonce: *nonce,
                deadline: *deadline,
                signed: signature.is_some(),
            },
        ),
        Action::Permit2 {
            token,
            owner,
            spender,
            amount,
            expiration,
            nonce,
            deadline,
            signature,
            ..
        } => erc20::permit2(
            config,
            draft,
            erc20::PermitArgs {
                token: *token,
                owner: *owner,
                spender: *spender,
                amount: *amount,
                nonce: *nonce,
                deadline: *deadline,
                signed: signature.is_some(),
            },
            *expiration,
        ),
        Action::Transfer2 {
            sender,
            token,
            from,
            to,
            amount,
        } => erc20::transfer2(config, draft, *sender, *token, *from, *to, *amount),
        Action::Wrap {
            sender,
            token,
            owner,
            amount,
        } => erc20::wrap(config, draft, *sender, *token, *owner, *amount),
        Action::Unwrap {
            sender,
            token,
            receiver,
            amount,
        } => erc20::unwrap(config, draft, *sender, *token, *receiver, *amount),

        Action::AccrueInterest { market_id, .. } => blue::accrue_market(draft, *market_id),
        Action::SetAuthorization {
            sender,
            authorizer,
            authorized,
            is_authorized,
            nonce,
            deadline,
            signature,
        } => blue::set_authorization(
            config,
            draft,
            *sender,
            *authorizer,
            *authorized,
            *is_authorized,
            blue::Signed {
                nonce: *nonce,
                deadline: *deadline,
                signed: signature.is_some(),
            },
        ),
        Action::Supply {
            sender,
            market_id,
            on_behalf,
            assets,
            shares,
            callback,
        } => blue::supply(
            execution,
            draft,
            blue::LoanOp::new(*sender, *market_id, *on_behalf, *assets, *shares),
            callback,
        ),
        Action::SupplyCollateral {
            sender,
            market_id,
            on_behalf,
            assets,
            callback,
        } => blue::supply_collateral(execution, draft, *sender, *market_id, *on_behalf, *assets, callback),
        Action::Borrow {
            sender,
            market_id,
            on_behalf,
            receiver,
            assets,
            shares,
        } => blue::borrow(
            config,
            draft,
            blue::LoanOp::new(*sender, *market_id, *on_behalf, *assets, *shares),
            *receiver,
        ),
        Action::Repay {
            sender,
            market_id,
            on_behalf,
            assets,
            shares,
            callback,
        } => blue::repay(
            execution,
            draft,
            blue::LoanOp::new(*sender, *market_id, *on_behalf, *assets, *shares),
            callback,
        ),
        Action::Withdraw {
            sender,
            market_id,
            on_behalf,
            receiver,
            assets,
            shares,
        } => blue::withdraw(
            config,
            draft,
            blue::LoanOp::new(*sender, *market_id, *on_behalf, *assets, *shares),
            *receiver,
        ),
        Action::WithdrawCollateral {
            sender,
            market_id,
            on_behalf,
            receiver,
            assets,
        } => blue::withdraw_collateral(config, draft, *sender, *market_id, *on_behalf, *receiver, *assets),
        Action::Liquidate {
            sender,
            market_id,
            borrower,
            seized_assets,
            repaid_shares,
        } => blue::liquidate(config, draft, *sender, *market_id, *borrower, *seized_assets, *repaid_shares),

        Action::VaultAccrueInterest { vault, .. } => {
            meta_morpho::accrue_vault(draft, *vault).map(|_| ())
        }
        Action::Deposit {
            sender,
            vault,
            assets,
            owner,
        } => meta_morpho::deposit(config, draft, *sender, *vault, *assets, *owner),
        Action::Mint {
            sender,
            vault,
            shares,
            owner,
        } => meta_morpho::mint(config, draft, *sender, *vault, *shares, *owner),
        Action::VaultWithdraw {
            sender,
            vault,
            assets,
            receiver,
            owner,
        } => meta_morpho::withdraw(config, draft, *sender, *vault, *assets, *receiver, *owner),
        Action::Redeem {
            sender,
            vault,
            shares,
            receiver,
            owner,
        } => meta_morpho::redeem(config, draft, *sender, *vault, *shares, *receiver, *owner),
        Action::Reallocate {
            sender,
            vault,
            allocations,
        } => meta_morpho::reallocate(config, draft, *sender, *vault, allocations),
        Action::PublicReallocate {
            sender,
            vault,
            withdrawals,
            supply_market_id,
        } => meta_morpho::public_reallocate(config, draft, *sender, *vault, withdrawals, *supply_market_id),
        Action::SubmitCap {
            sender,
            vault,
            market_id,
            cap,
        } => meta_morpho::submit_cap(draft, *sender, *vault, *market_id, *cap),
        Action::AcceptCap {
            vault, market_id, ..
        } => meta_morpho::accept_cap(draft, *vault, *market_id),
    }
}

//! Token movements, allowances, permits and wrappers.
//!
//! A side of a movement whose `(holder, token)` pair is not tracked in the
//! snapshot is neither checked nor recorded. Protocol contracts are normally
//! untracked, so tokens flow in and out of them freely.

use alloy_primitives::{Address, U256};
use tracing::trace;

use super::meta_morpho;
use super::{check_signature, resolve_max};
use crate::config::SimulationConfig;
use crate::draft::Draft;
use crate::error::SimError;
use crate::holding::Permit2Allowance;
use crate::math::{min, MAX_UINT_160, WAD};
use crate::token::{WrapRelation, WrappedToken, NATIVE_ADDRESS};

/// Fields common to EIP-2612 and Permit2 permits
pub(super) struct PermitArgs {
    pub token: Address,
    pub owner: Address,
    pub spender: Address,
    pub amount: U256,
    pub nonce: U256,
    pub deadline: u64,
    pub signed: bool,
}

pub(super) fn balance_of(draft: &Draft, user: Address, token: Address) -> U256 {
    draft
        .try_holding(user, token)
        .map(|holding| holding.balance)
        .unwrap_or_default()
}

fn ensure_balance(draft: &Draft, token: Address, user: Address, amount: U256) -> Result<(), SimError> {
    match draft.try_holding(user, token) {
        Some(holding) if holding.balance < amount => {
            Err(SimError::InsufficientBalance { token, user })
        }
        _ => Ok(()),
    }
}

pub(super) fn debit(
    draft: &mut Draft,
    token: Address,
    user: Address,
    amount: U256,
) -> Result<(), SimError> {
    if let Some(holding) = draft.try_holding_mut(user, token) {
        holding.balance = holding
            .balance
            .checked_sub(amount)
            .ok_or(SimError::InsufficientBalance { token, user })?;
    }
    Ok(())
}

pub(super) fn credit(draft: &mut Draft, token: Address, user: Address, amount: U256) {
    if let Some(holding) = draft.try_holding_mut(user, token) {
        holding.balance = holding.balance.saturating_add(amount);
    }
}

/// Moves `amount` without touching allowances
pub(super) fn move_tokens(
    draft: &mut Draft,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), SimError> {
    trace!(%token, %from, %to, %amount, "Moving tokens");
    debit(draft, token, from, amount)?;
    credit(draft, token, to, amount);
    Ok(())
}

/// Whether the allowance `owner` grants `spender` on `token` lives in the
/// owner's [`crate::VaultUser`] record: the vault's own asset, approved to the
/// vault.
fn is_vault_allowance(draft: &Draft, token: Address, owner: Address, spender: Address) -> bool {
    draft
        .try_vault(spender)
        .is_some_and(|vault| vault.asset == token)
        && draft.try_vault_user(spender, owner).is_some()
}

fn set_allowance(draft: &mut Draft, token: Address, owner: Address, spender: Address, amount: U256) {
    if is_vault_allowance(draft, token, owner, spender) {
        if let Some(vault_user) = draft.try_vault_user_mut(spender, owner) {
            vault_user.allowance = amount;
        }
    } else if let Some(holding) = draft.try_holding_mut(owner, token) {
        holding.set_allowance(spender, amount);
    }
}

/// Consumes `amount` of the allowance `owner` granted `spender`. An infinite
/// allowance is left as is.
pub(super) fn spend_allowance(
    draft: &mut Draft,
    token: Address,
    owner: Address,
    spender: Address,
    amount: U256,
) -> Result<(), SimError> {
    if owner == spender {
        return Ok(());
    }

    let current = if is_vault_allowance(draft, token, owner, spender) {
        draft.try_vault_user(spender, owner).map(|user| user.allowance)
    } else {
        draft
            .try_holding(owner, token)
            .map(|holding| holding.allowance(spender))
    };
    let Some(current) = current else {
        return Ok(());
    };

    if current < amount {
        return Err(SimError::InsufficientAllowance {
            token,
            owner,
            spender,
        });
    }
    if current != U256::MAX {
        set_allowance(draft, token, owner, spender, current - amount);
    }
    Ok(())
}

/// `transferFrom`: balance first, then the spender's allowance
pub(super) fn pull(
    draft: &mut Draft,
    token: Address,
    spender: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), SimError> {
    ensure_balance(draft, token, from, amount)?;
    spend_allowance(draft, token, from, spender, amount)?;
    move_tokens(draft, token, from, to, amount)
}

pub(super) fn native_transfer(
    draft: &mut Draft,
    sender: Address,
    to: Address,
    amount: U256,
) -> Result<(), SimError> {
    let amount = resolve_max(amount, || balance_of(draft, sender, NATIVE_ADDRESS));
    move_tokens(draft, NATIVE_ADDRESS, sender, to, amount)
}

/// `transfer` when the sender owns the tokens, `transferFrom` otherwise. The
/// sentinel resolves to the balance of `from`.
pub(super) fn transfer(
    draft: &mut Draft,
    sender: Address,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), SimError> {
    let amount = resolve_max(amount, || balance_of(draft, from, token));
    if sender == from {
        move_tokens(draft, token, from, to, amount)
    } else {
        pull(draft, token, sender, from, to, amount)
    }
}

pub(super) fn approve(
    draft: &mut Draft,
    sender: Address,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<(), SimError> {
    draft.holding(sender, token)?;
    set_allowance(draft, token, sender, spender, amount);
    Ok(())
}

pub(super) fn permit(
    config: &SimulationConfig,
    draft: &mut Draft,
    args: PermitArgs,
) -> Result<(), SimError> {
    let PermitArgs {
        token,
        owner,
        spender,
        amount,
        nonce,
        deadline,
        signed,
    } = args;

    if draft.token(token)?.permit_domain.is_none() {
        return Err(SimError::UnknownPermitDomain { token });
    }
    check_signature(config, draft, owner, deadline, signed)?;

    let holding = draft.holding_mut(owner, token)?;
    let expected = holding.erc2612_nonce.unwrap_or_default();
    if nonce != expected {
        return Err(SimError::InvalidErc2612Nonce {
            token,
            owner,
            nonce,
        });
    }
    holding.erc2612_nonce = Some(expected + U256::from(1));

    set_allowance(draft, token, owner, spender, amount);
    Ok(())
}

pub(super) fn permit2(
    config: &SimulationConfig,
    draft: &mut Draft,
    args: PermitArgs,
    expiration: u64,
) -> Result<(), SimError> {
    let PermitArgs {
        token,
        owner,
        spender,
        amount,
        nonce,
        deadline,
        signed,
    } = args;

    check_signature(config, draft, owner, deadline, signed)?;

    let holding = draft.holding_mut(owner, token)?;
    if holding.permit2_allowance(spender).nonce != nonce {
        return Err(SimError::InvalidPermit2Nonce {
            token,
            owner,
            spender,
            nonce,
        });
    }
    holding.permit2_allowances.insert(
        spender,
        Permit2Allowance {
            amount: min(amount, MAX_UINT_160),
            expiration,
            nonce: nonce + U256::from(1),
        },
    );
    Ok(())
}

/// Permit2 `transferFrom` by `sender`. Spends both the Permit2 allowance and the
/// direct allowance `from` granted the Permit2 contract.
pub(super) fn transfer2(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    token: Address,
    from: Address,
    to: Address,
    amount: U256,
) -> Result<(), SimError> {
    let amount = resolve_max(amount, || balance_of(draft, from, token));
    ensure_balance(draft, token, from, amount)?;

    let permit2 = config.address_book.permit2;
    let timestamp = draft.timestamp();
    if let Some(holding) = draft.try_holding_mut(from, token) {
        let allowance = holding.permit2_allowance(sender);
        if allowance.expiration < timestamp {
            return Err(SimError::Permit2AllowanceExpired {
                token,
                owner: from,
                spender: sender,
            });
        }
        if allowance.amount < amount {
            return Err(SimError::InsufficientPermit2Allowance {
                token,
                owner: from,
                spender: sender,
            });
        }
        let direct = holding.allowance(permit2);
        if direct < amount {
            return Err(SimError::InsufficientAllowance {
                token,
                owner: from,
                spender: permit2,
            });
        }

        if allowance.amount < MAX_UINT_160 {
            holding.permit2_allowances.insert(
                sender,
                Permit2Allowance {
                    amount: allowance.amount - amount,
                    ..allowance
                },
            );
        }
        if direct != U256::MAX {
            holding.set_allowance(permit2, direct - amount);
        }
    }

    move_tokens(draft, token, from, to, amount)
}

/// Resolves `token` as a wrapper. The configured wrapped native token wraps the
/// native asset 1:1 unless the snapshot says otherwise.
fn wrapped_token(
    config: &SimulationConfig,
    draft: &Draft,
    token: Address,
) -> Result<WrappedToken, SimError> {
    let declared = draft.try_token(token).is_some_and(|t| t.wrap.is_some());
    if !declared && config.address_book.wrapped_native == Some(token) {
        return Ok(WrappedToken::Wrapper {
            wrapped: token,
            relation: WrapRelation::ConstantRatio {
                underlying: NATIVE_ADDRESS,
                ratio: WAD,
            },
        });
    }
    draft.wrapped_token(token)
}

pub(super) fn wrap(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    token: Address,
    owner: Address,
    amount: U256,
) -> Result<(), SimError> {
    match wrapped_token(config, draft, token)? {
        WrappedToken::Wrapper { wrapped, relation } => {
            let underlying = relation.underlying();
            let amount = resolve_max(amount, || balance_of(draft, sender, underlying));
            if underlying == NATIVE_ADDRESS {
                move_tokens(draft, underlying, sender, wrapped, amount)?;
            } else {
                pull(draft, underlying, wrapped, sender, wrapped, amount)?;
            }
            credit(draft, wrapped, owner, relation.to_wrapped(amount));
            Ok(())
        }
        WrappedToken::Vault { vault, .. } => {
            meta_morpho::deposit(config, draft, sender, vault, amount, owner)
        }
    }
}

pub(super) fn unwrap(
    config: &SimulationConfig,
    draft: &mut Draft,
    sender: Address,
    token: Address,
    receiver: Address,
    amount: U256,
) -> Result<(), SimError> {
    match wrapped_token(config, draft, token)? {
        WrappedToken::Wrapper { wrapped, relation } => {
            let amount = resolve_max(amount, || balance_of(draft, sender, wrapped));
            debit(draft, wrapped, sender, amount)?;
            move_tokens(
                draft,
                relation.underlying(),
                wrapped,
                receiver,
                relation.to_underlying(amount),
            )
        }
        WrappedToken::Vault { vault, .. } => {
            meta_morpho::redeem(config, draft, sender, vault, amount, receiver, sender)
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, Bytes, U256};

    use super::super::tests::*;
    use crate::action::Action;
    use crate::error::SimError;
    use crate::holding::Holding;
    use crate::math::MAX_UINT_160;
    use crate::snapshot::Snapshot;
    use crate::token::{PermitDomain, Token, WrapRelation, NATIVE_ADDRESS};
    use crate::{Interpreter, WAD};

    const WRAPPER: Address = Address::repeat_byte(0x03);

    fn balance(snapshot: &Snapshot, user: Address, token: Address) -> U256 {
        snapshot.holding(user, token).unwrap().balance
    }

    fn transfer(sender: Address, from: Address, to: Address, amount: U256) -> Action {
        Action::Transfer {
            sender,
            token: LOAN,
            from,
            to,
            amount,
        }
    }

    #[test]
    fn test_transfer_from_empty_balance() {
        let snapshot = create_test_snapshot();
        let result = apply(&snapshot, transfer(MORPHO, BOB, ALICE, U256::from(1)));
        assert_eq!(
            result,
            Err(SimError::InsufficientBalance {
                token: LOAN,
                user: BOB
            })
        );
    }

    #[test]
    fn test_approve_then_transfer_from() {
        let snapshot = create_test_snapshot();
        let spender = Address::repeat_byte(0x55);
        let amount = wad(30);

        let snapshots = create_test_interpreter()
            .run(
                &snapshot,
                &[
                    Action::Approve {
                        sender: ALICE,
                        token: LOAN,
                        spender,
                        amount,
                    },
                    transfer(spender, ALICE, BOB, amount),
                ],
            )
            .unwrap();

        assert_eq!(snapshots.len(), 3);
        let approved = &snapshots[1];
        assert_eq!(approved.holding(ALICE, LOAN).unwrap().allowance(spender), amount);
        assert_eq!(balance(approved, BOB, LOAN), U256::ZERO);

        let transferred = &snapshots[2];
        assert_eq!(transferred.holding(ALICE, LOAN).unwrap().allowance(spender), U256::ZERO);
        assert_eq!(balance(transferred, BOB, LOAN), amount);
        assert_eq!(balance(transferred, ALICE, LOAN), wad(1_000) - amount);
    }

    #[test]
    fn test_transfer_from_without_allowance() {
        let snapshot = create_test_snapshot();
        let spender = Address::repeat_byte(0x55);
        assert_eq!(
            apply(&snapshot, transfer(spender, ALICE, BOB, U256::from(1))),
            Err(SimError::InsufficientAllowance {
                token: LOAN,
                owner: ALICE,
                spender
            })
        );
    }

    #[test]
    fn test_infinite_allowance_not_decremented() {
        let snapshot = create_test_snapshot();
        let next = apply(&snapshot, transfer(MORPHO, ALICE, BOB, wad(10))).unwrap();
        assert_eq!(next.holding(ALICE, LOAN).unwrap().allowance(MORPHO), U256::MAX);
        assert_eq!(balance(&next, BOB, LOAN), wad(10));
    }

    #[test]
    fn test_max_transfer_moves_whole_balance() {
        let snapshot = create_test_snapshot();
        let next = apply(&snapshot, transfer(ALICE, ALICE, BOB, U256::MAX)).unwrap();
        assert_eq!(balance(&next, ALICE, LOAN), U256::ZERO);
        assert_eq!(balance(&next, BOB, LOAN), wad(1_000));
    }

    #[test]
    fn test_untracked_receiver() {
        let snapshot = create_test_snapshot();
        let stranger = Address::repeat_byte(0x77);
        let next = apply(&snapshot, transfer(ALICE, ALICE, stranger, wad(1))).unwrap();
        assert!(next.try_holding(stranger, LOAN).is_none());
        assert_eq!(balance(&next, ALICE, LOAN), wad(999));
    }

    #[test]
    fn test_native_transfer() {
        let snapshot = create_test_snapshot();
        let next = apply(
            &snapshot,
            Action::NativeTransfer {
                sender: ALICE,
                to: BOB,
                amount: U256::MAX,
            },
        )
        .unwrap();
        assert_eq!(balance(&next, ALICE, NATIVE_ADDRESS), U256::ZERO);

        let overdraft = apply(
            &next,
            Action::NativeTransfer {
                sender: ALICE,
                to: BOB,
                amount: U256::from(1),
            },
        );
        assert!(matches!(overdraft, Err(SimError::InsufficientBalance { .. })));
    }

    fn permit(nonce: u64, deadline: u64, signature: Option<Bytes>) -> Action {
        Action::Permit {
            sender: BOB,
            token: LOAN,
            owner: ALICE,
            spender: BOB,
            amount: wad(5),
            nonce: U256::from(nonce),
            deadline,
            signature,
        }
    }

    fn create_permit_snapshot() -> Snapshot {
        let mut data = create_test_data();
        data.tokens[0].permit_domain = Some(PermitDomain {
            name: "Loan".to_string(),
            version: "1".to_string(),
            chain_id: 1,
            verifying_contract: LOAN,
        });
        Snapshot::try_from(data).unwrap()
    }

    #[test]
    fn test_permit_sets_allowance_and_nonce() {
        let snapshot = create_permit_snapshot();
        let deadline = snapshot.timestamp();

        let next = apply(&snapshot, permit(0, deadline, None)).unwrap();
        let holding = next.holding(ALICE, LOAN).unwrap();
        assert_eq!(holding.allowance(BOB), wad(5));
        assert_eq!(holding.erc2612_nonce, Some(U256::from(1)));

        // Replaying the same nonce fails
        assert!(matches!(
            apply(&next, permit(0, deadline, None)),
            Err(SimError::InvalidErc2612Nonce { .. })
        ));
    }

    #[test]
    fn test_permit_failures() {
        let snapshot = create_test_snapshot();
        let deadline = snapshot.timestamp() + 60;
        assert_eq!(
            apply(&snapshot, permit(0, deadline, None)),
            Err(SimError::UnknownPermitDomain { token: LOAN })
        );

        let snapshot = create_permit_snapshot();
        assert_eq!(
            apply(&snapshot, permit(0, snapshot.timestamp() - 1, None)),
            Err(SimError::ExpiredSignature {
                signer: ALICE,
                deadline: snapshot.timestamp() - 1
            })
        );

        let strict = Interpreter::new(create_test_config().with_required_signatures(true));
        assert_eq!(
            strict.apply(&snapshot, &permit(0, deadline, None)),
            Err(SimError::MissingSignature { signer: ALICE })
        );
        assert!(strict
            .apply(&snapshot, &permit(0, deadline, Some(Bytes::from_static(&[1; 65]))))
            .is_ok());
    }

    fn permit2(amount: U256, expiration: u64) -> Action {
        Action::Permit2 {
            sender: BOB,
            token: LOAN,
            owner: ALICE,
            spender: BOB,
            amount,
            expiration,
            nonce: U256::ZERO,
            deadline: u64::MAX,
            signature: None,
        }
    }

    fn transfer2(amount: U256) -> Action {
        Action::Transfer2 {
            sender: BOB,
            token: LOAN,
            from: ALICE,
            to: BOB,
            amount,
        }
    }

    #[test]
    fn test_permit2_then_transfer2() {
        let snapshot = create_test_snapshot();
        let expiration = snapshot.timestamp() + 3_600;

        let snapshots = create_test_interpreter()
            .run(&snapshot, &[permit2(wad(10), expiration), transfer2(wad(4))])
            .unwrap();

        let permitted = snapshots[1].holding(ALICE, LOAN).unwrap().permit2_allowance(BOB);
        assert_eq!(permitted.amount, wad(10));
        assert_eq!(permitted.nonce, U256::from(1));

        let spent = snapshots[2].holding(ALICE, LOAN).unwrap();
        assert_eq!(spent.permit2_allowance(BOB).amount, wad(6));
        // The direct allowance to Permit2 is infinite
        assert_eq!(spent.allowance(PERMIT2), U256::MAX);
        assert_eq!(balance(&snapshots[2], BOB, LOAN), wad(4));
    }

    #[test]
    fn test_transfer2_checks() {
        let snapshot = create_test_snapshot();
        let timestamp = snapshot.timestamp();

        let expired = apply(&snapshot, permit2(wad(10), timestamp - 1)).unwrap();
        assert!(matches!(
            apply(&expired, transfer2(wad(1))),
            Err(SimError::Permit2AllowanceExpired { .. })
        ));

        let small = apply(&snapshot, permit2(wad(1), timestamp)).unwrap();
        assert!(matches!(
            apply(&small, transfer2(wad(2))),
            Err(SimError::InsufficientPermit2Allowance { .. })
        ));

        // Infinite Permit2 allowance is clamped to uint160 and never decremented
        let infinite = apply(&snapshot, permit2(U256::MAX, timestamp)).unwrap();
        let next = apply(&infinite, transfer2(wad(2))).unwrap();
        assert_eq!(
            next.holding(ALICE, LOAN).unwrap().permit2_allowance(BOB).amount,
            MAX_UINT_160
        );
    }

    fn create_wrapper_snapshot() -> Snapshot {
        let mut data = create_test_data();
        data.tokens.push(Token {
            wrap: Some(WrapRelation::ConstantRatio {
                underlying: LOAN,
                ratio: U256::from(2) * WAD,
            }),
            ..Token::new(WRAPPER, 18, "WLOAN")
        });
        data.holdings[0].set_allowance(WRAPPER, U256::MAX);
        data.holdings.push(Holding::new(ALICE, WRAPPER, U256::ZERO));
        Snapshot::try_from(data).unwrap()
    }

    #[test]
    fn test_wrap_and_unwrap() {
        let snapshot = create_wrapper_snapshot();
        let wrapped = apply(
            &snapshot,
            Action::Wrap {
                sender: ALICE,
                token: WRAPPER,
                owner: ALICE,
                amount: wad(10),
            },
        )
        .unwrap();
        assert_eq!(balance(&wrapped, ALICE, LOAN), wad(990));
        assert_eq!(balance(&wrapped, ALICE, WRAPPER), wad(20));

        let unwrapped = apply(
            &wrapped,
            Action::Unwrap {
                sender: ALICE,
                token: WRAPPER,
                receiver: BOB,
                amount: U256::MAX,
            },
        )
        .unwrap();
        assert_eq!(balance(&unwrapped, ALICE, WRAPPER), U256::ZERO);
        assert_eq!(balance(&unwrapped, BOB, LOAN), wad(10));
    }

    #[test]
    fn test_wrap_rounds_down() {
        let mut data = create_test_data();
        data.tokens.push(Token {
            wrap: Some(WrapRelation::ExchangeRate {
                underlying: LOAN,
                rate: U256::from(3) * WAD,
            }),
            ..Token::new(WRAPPER, 18, "XLOAN")
        });
        data.holdings[0].set_allowance(WRAPPER, U256::MAX);
        data.holdings.push(Holding::new(ALICE, WRAPPER, U256::ZERO));
        let snapshot = Snapshot::try_from(data).unwrap();

        let next = apply(
            &snapshot,
            Action::Wrap {
                sender: ALICE,
                token: WRAPPER,
                owner: ALICE,
                amount: U256::from(10),
            },
        )
        .unwrap();
        // 10 / 3 = 3.33, rounded down
        assert_eq!(balance(&next, ALICE, WRAPPER), U256::from(3));
    }

    #[test]
    fn test_wrap_unknown_token() {
        let snapshot = create_test_snapshot();
        let result = apply(
            &snapshot,
            Action::Wrap {
                sender: ALICE,
                token: COLLATERAL,
                owner: ALICE,
                amount: wad(1),
            },
        );
        assert_eq!(result, Err(SimError::UnknownWrappedToken { token: COLLATERAL }));
    }

    #[test]
    fn test_wrap_configured_native_wrapper() {
        let weth = Address::repeat_byte(0x0E);
        let mut data = create_test_data();
        data.tokens.push(Token::new(weth, 18, "WETH"));
        data.holdings.push(Holding::new(ALICE, weth, U256::ZERO));
        let snapshot = Snapshot::try_from(data).unwrap();

        let mut config = create_test_config();
        config.address_book.wrapped_native = Some(weth);
        let next = Interpreter::new(config)
            .apply(
                &snapshot,
                &Action::Wrap {
                    sender: ALICE,
                    token: weth,
                    owner: ALICE,
                    amount: U256::MAX,
                },
            )
            .unwrap();

        assert_eq!(balance(&next, ALICE, NATIVE_ADDRESS), U256::ZERO);
        assert_eq!(balance(&next, ALICE, weth), wad(1));
    }
}

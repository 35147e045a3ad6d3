//! Funding requirements of an action batch.
//!
//! The holder that executes the batch (by default the bundler adapter) is given a
//! sentinel balance of every token it tracks. The batch is then run in traced mode
//! and the largest drop below the sentinel, over every intermediate snapshot
//! including the ones inside callbacks, is what the holder must be funded with.

use std::collections::BTreeMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::action::Action;
use crate::error::SimError;
use crate::interpreter::Interpreter;
use crate::math::{zero_floor_sub, MAX_UINT_160};
use crate::snapshot::Snapshot;

/// Balance given to the holder for every tracked token during the probe
pub const FUNDING_SENTINEL: U256 = MAX_UINT_160;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundingRequirement {
    pub token: Address,
    pub amount: U256,
}

/// Minimum amount of each token `holder` needs before running `actions`, sorted by
/// token address. Tokens the batch never draws down are left out.
///
/// # Errors
///
/// Returns the first error raised while running the batch.
pub fn estimate_funding(
    interpreter: &Interpreter,
    snapshot: &Snapshot,
    actions: &[Action],
    holder: Option<Address>,
) -> Result<Vec<FundingRequirement>, SimError> {
    let holder = holder.unwrap_or(interpreter.config().address_book.bundler_adapter);

    let mut data = snapshot.to_data();
    let mut deficits = BTreeMap::new();
    for holding in data.holdings.iter_mut().filter(|holding| holding.user == holder) {
        holding.balance = FUNDING_SENTINEL;
        deficits.insert(holding.token, U256::ZERO);
    }
    let probe = Snapshot::try_from(data)?;

    let trace = interpreter.run_traced(&probe, actions)?;
    for (step, snapshot) in trace.iter().enumerate() {
        for (&token, deficit) in &mut deficits {
            let balance = snapshot
                .try_holding(holder, token)
                .map(|holding| holding.balance)
                .unwrap_or_default();
            let drawn = zero_floor_sub(FUNDING_SENTINEL, balance);
            if drawn > *deficit {
                trace!(step, %token, %drawn, "New funding peak");
                *deficit = drawn;
            }
        }
    }

    let requirements: Vec<_> = deficits
        .into_iter()
        .filter(|(_, amount)| !amount.is_zero())
        .map(|(token, amount)| FundingRequirement { token, amount })
        .collect();
    debug!(%holder, snapshots = trace.len(), tokens = requirements.len(), "Funding estimated");
    Ok(requirements)
}

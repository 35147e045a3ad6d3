//! Copy-on-write mutation of a [`Snapshot`].
//!
//! A [`Draft`] owns a shallow copy of the snapshot it was opened on. Mutable
//! accessors go through `Arc::make_mut`, so a table and then an entity are cloned
//! the first time they are written and the source snapshot never observes a write.

use std::ops::Deref;
use std::sync::Arc;

use alloy_primitives::Address;

use crate::error::{MarketId, SimError};
use crate::holding::Holding;
use crate::market::Market;
use crate::position::Position;
use crate::snapshot::Snapshot;
use crate::user::User;
use crate::vault::{Vault, VaultMarketConfig, VaultUser};

/// Temporary mutable view over a [`Snapshot`]
#[derive(Debug)]
pub struct Draft {
    working: Snapshot,
}

impl Snapshot {
    /// Runs `routine` against a draft of this snapshot and returns the resulting
    /// snapshot with the routine's output. `self` is left untouched, also when the
    /// routine fails.
    pub fn mutate<T>(
        &self,
        routine: impl FnOnce(&mut Draft) -> Result<T, SimError>,
    ) -> Result<(Snapshot, T), SimError> {
        let mut draft = Draft {
            working: self.clone(),
        };
        let output = routine(&mut draft)?;
        Ok((draft.working, output))
    }
}

impl Deref for Draft {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.working
    }
}

impl Draft {
    /// An immutable copy of the current state
    pub fn freeze(&self) -> Snapshot {
        self.working.clone()
    }

    /// Continues from `snapshot`, typically produced by a nested run started from
    /// [`Draft::freeze`].
    pub fn replace(&mut self, snapshot: Snapshot) {
        self.working = snapshot;
    }

    pub fn market_mut(&mut self, market_id: MarketId) -> Result<&mut Market, SimError> {
        Arc::make_mut(&mut self.working.markets)
            .get_mut(&market_id)
            .map(Arc::make_mut)
            .ok_or(SimError::UnknownMarket { market_id })
    }

    pub fn set_market(&mut self, market: Market) {
        Arc::make_mut(&mut self.working.markets).insert(market.id, Arc::new(market));
    }

    pub fn user_mut(&mut self, user: Address) -> Result<&mut User, SimError> {
        Arc::make_mut(&mut self.working.users)
            .get_mut(&user)
            .map(Arc::make_mut)
            .ok_or(SimError::UnknownUser { user })
    }

    /// The user's record, created empty when absent
    pub fn user_entry(&mut self, user: Address) -> &mut User {
        Arc::make_mut(
            Arc::make_mut(&mut self.working.users)
                .entry(user)
                .or_insert_with(|| Arc::new(User::new(user))),
        )
    }

    pub fn vault_mut(&mut self, vault: Address) -> Result<&mut Vault, SimError> {
        Arc::make_mut(&mut self.working.vaults)
            .get_mut(&vault)
            .map(Arc::make_mut)
            .ok_or(SimError::UnknownVault { vault })
    }

    pub fn set_vault(&mut self, vault: Vault) {
        Arc::make_mut(&mut self.working.vaults).insert(vault.address, Arc::new(vault));
    }

    /// The position of `user` on `market_id`, created empty when absent. The market
    /// itself must exist.
    pub fn position_entry(
        &mut self,
        user: Address,
        market_id: MarketId,
    ) -> Result<&mut Position, SimError> {
        self.working.market(market_id)?;
        Ok(Arc::make_mut(
            Arc::make_mut(&mut self.working.positions)
                .entry((user, market_id))
                .or_insert_with(|| Arc::new(Position::empty(user, market_id))),
        ))
    }

    /// The holding, `None` when the pair is untracked
    pub fn try_holding_mut(&mut self, user: Address, token: Address) -> Option<&mut Holding> {
        if !self.working.holdings.contains_key(&(user, token)) {
            return None;
        }
        Arc::make_mut(&mut self.working.holdings)
            .get_mut(&(user, token))
            .map(Arc::make_mut)
    }

    pub fn holding_mut(&mut self, user: Address, token: Address) -> Result<&mut Holding, SimError> {
        self.try_holding_mut(user, token)
            .ok_or(SimError::UnknownHolding { user, token })
    }

    pub fn set_holding(&mut self, holding: Holding) {
        Arc::make_mut(&mut self.working.holdings)
            .insert((holding.user, holding.token), Arc::new(holding));
    }

    pub fn vault_market_config_mut(
        &mut self,
        vault: Address,
        market_id: MarketId,
    ) -> Result<&mut VaultMarketConfig, SimError> {
        Arc::make_mut(&mut self.working.vault_market_configs)
            .get_mut(&(vault, market_id))
            .map(Arc::make_mut)
            .ok_or(SimError::UnknownVaultMarketConfig { vault, market_id })
    }

    /// The vault's config for `market_id`, created disabled when absent
    pub fn vault_market_config_entry(
        &mut self,
        vault: Address,
        market_id: MarketId,
    ) -> &mut VaultMarketConfig {
        Arc::make_mut(
            Arc::make_mut(&mut self.working.vault_market_configs)
                .entry((vault, market_id))
                .or_insert_with(|| Arc::new(VaultMarketConfig::empty(vault, market_id))),
        )
    }

    pub fn try_vault_user_mut(&mut self, vault: Address, user: Address) -> Option<&mut VaultUser> {
        if !self.working.vault_users.contains_key(&(vault, user)) {
            return None;
        }
        Arc::make_mut(&mut self.working.vault_users)
            .get_mut(&(vault, user))
            .map(Arc::make_mut)
    }
}

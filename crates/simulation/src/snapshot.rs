//! Immutable protocol state at one instant.
//!
//! Every entity table is an `Arc<BTreeMap<_, Arc<_>>>`. Cloning a [`Snapshot`] only
//! bumps reference counts, and a [`crate::Draft`] copies a table, then an entity,
//! the first time it writes to it. Tables are ordered maps so iteration, and with it
//! every simulation, is deterministic.

use std::collections::BTreeMap;
use std::sync::Arc;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{MarketId, SimError};
use crate::holding::Holding;
use crate::market::Market;
use crate::position::{AccrualPosition, Position};
use crate::token::{Token, WrappedToken};
use crate::user::User;
use crate::vault::{AccrualVault, Vault, VaultMarketAllocation, VaultMarketConfig, VaultUser};

pub(crate) type Table<K, V> = Arc<BTreeMap<K, Arc<V>>>;

/// Point-in-time chain context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainContext {
    pub chain_id: u64,
    pub block_number: u64,
    /// Block timestamp every accrual is projected to
    pub timestamp: u64,
    /// Morpho Blue's global fee recipient
    pub fee_recipient: Address,
}

/// A self-consistent set of entity tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SnapshotData", into = "SnapshotData")]
pub struct Snapshot {
    pub(crate) chain: ChainContext,
    pub(crate) markets: Table<MarketId, Market>,
    pub(crate) users: Table<Address, User>,
    pub(crate) tokens: Table<Address, Token>,
    pub(crate) vaults: Table<Address, Vault>,
    pub(crate) positions: Table<(Address, MarketId), Position>,
    pub(crate) holdings: Table<(Address, Address), Holding>,
    pub(crate) vault_market_configs: Table<(Address, MarketId), VaultMarketConfig>,
    pub(crate) vault_users: Table<(Address, Address), VaultUser>,
}

/// Flat, serializable form of a [`Snapshot`]: one list per table, every entity
/// carrying its own key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub chain: ChainContext,
    #[serde(default)]
    pub markets: Vec<Market>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub vaults: Vec<Vault>,
    #[serde(default)]
    pub positions: Vec<Position>,
    #[serde(default)]
    pub holdings: Vec<Holding>,
    #[serde(default)]
    pub vault_market_configs: Vec<VaultMarketConfig>,
    #[serde(default)]
    pub vault_users: Vec<VaultUser>,
}

impl SnapshotData {
    pub fn new(chain: ChainContext) -> Self {
        Self {
            chain,
            markets: Vec::new(),
            users: Vec::new(),
            tokens: Vec::new(),
            vaults: Vec::new(),
            positions: Vec::new(),
            holdings: Vec::new(),
            vault_market_configs: Vec::new(),
            vault_users: Vec::new(),
        }
    }
}

fn table<K: Ord, V>(entries: impl IntoIterator<Item = V>, key: impl Fn(&V) -> K) -> Table<K, V> {
    Arc::new(
        entries
            .into_iter()
            .map(|entity| (key(&entity), Arc::new(entity)))
            .collect(),
    )
}

fn values<K, V: Clone>(table: &Table<K, V>) -> Vec<V> {
    table.values().map(|entity| V::clone(entity)).collect()
}

impl TryFrom<SnapshotData> for Snapshot {
    type Error = SimError;

    /// Builds the tables and checks that positions and holdings reference known
    /// markets and tokens. Vault shares count as tokens.
    fn try_from(data: SnapshotData) -> Result<Self, Self::Error> {
        let snapshot = Snapshot {
            chain: data.chain,
            markets: table(data.markets, |market| market.id),
            users: table(data.users, |user| user.address),
            tokens: table(data.tokens, |token| token.address),
            vaults: table(data.vaults, |vault| vault.address),
            positions: table(data.positions, |position| (position.user, position.market_id)),
            holdings: table(data.holdings, |holding| (holding.user, holding.token)),
            vault_market_configs: table(data.vault_market_configs, |config| {
                (config.vault, config.market_id)
            }),
            vault_users: table(data.vault_users, |user| (user.vault, user.user)),
        };

        for position in snapshot.positions.values() {
            snapshot.market(position.market_id)?;
        }
        for holding in snapshot.holdings.values() {
            if !snapshot.tokens.contains_key(&holding.token) {
                snapshot.vault(holding.token).map_err(|_| SimError::UnknownToken {
                    token: holding.token,
                })?;
            }
        }

        Ok(snapshot)
    }
}

impl From<Snapshot> for SnapshotData {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            chain: snapshot.chain.clone(),
            markets: values(&snapshot.markets),
            users: values(&snapshot.users),
            tokens: values(&snapshot.tokens),
            vaults: values(&snapshot.vaults),
            positions: values(&snapshot.positions),
            holdings: values(&snapshot.holdings),
            vault_market_configs: values(&snapshot.vault_market_configs),
            vault_users: values(&snapshot.vault_users),
        }
    }
}

impl Snapshot {
    pub fn chain(&self) -> &ChainContext {
        &self.chain
    }

    pub fn timestamp(&self) -> u64 {
        self.chain.timestamp
    }

    pub fn to_data(&self) -> SnapshotData {
        SnapshotData::from(self.clone())
    }

    // ==================== Lookups ====================

    pub fn try_market(&self, market_id: MarketId) -> Option<&Market> {
        self.markets.get(&market_id).map(Arc::as_ref)
    }

    pub fn market(&self, market_id: MarketId) -> Result<&Market, SimError> {
        self.try_market(market_id)
            .ok_or(SimError::UnknownMarket { market_id })
    }

    pub fn try_user(&self, user: Address) -> Option<&User> {
        self.users.get(&user).map(Arc::as_ref)
    }

    pub fn user(&self, user: Address) -> Result<&User, SimError> {
        self.try_user(user).ok_or(SimError::UnknownUser { user })
    }

    pub fn try_token(&self, token: Address) -> Option<&Token> {
        self.tokens.get(&token).map(Arc::as_ref)
    }

    pub fn token(&self, token: Address) -> Result<&Token, SimError> {
        self.try_token(token).ok_or(SimError::UnknownToken { token })
    }

    pub fn try_vault(&self, vault: Address) -> Option<&Vault> {
        self.vaults.get(&vault).map(Arc::as_ref)
    }

    pub fn vault(&self, vault: Address) -> Result<&Vault, SimError> {
        self.try_vault(vault).ok_or(SimError::UnknownVault { vault })
    }

    pub fn try_position(&self, user: Address, market_id: MarketId) -> Option<&Position> {
        self.positions.get(&(user, market_id)).map(Arc::as_ref)
    }

    pub fn position(&self, user: Address, market_id: MarketId) -> Result<&Position, SimError> {
        self.try_position(user, market_id)
            .ok_or(SimError::UnknownPosition { user, market_id })
    }

    pub fn try_holding(&self, user: Address, token: Address) -> Option<&Holding> {
        self.holdings.get(&(user, token)).map(Arc::as_ref)
    }

    pub fn holding(&self, user: Address, token: Address) -> Result<&Holding, SimError> {
        self.try_holding(user, token)
            .ok_or(SimError::UnknownHolding { user, token })
    }

    pub fn try_vault_market_config(
        &self,
        vault: Address,
        market_id: MarketId,
    ) -> Option<&VaultMarketConfig> {
        self.vault_market_configs
            .get(&(vault, market_id))
            .map(Arc::as_ref)
    }

    pub fn vault_market_config(
        &self,
        vault: Address,
        market_id: MarketId,
    ) -> Result<&VaultMarketConfig, SimError> {
        self.try_vault_market_config(vault, market_id)
            .ok_or(SimError::UnknownVaultMarketConfig { vault, market_id })
    }

    pub fn try_vault_user(&self, vault: Address, user: Address) -> Option<&VaultUser> {
        self.vault_users.get(&(vault, user)).map(Arc::as_ref)
    }

    pub fn vault_user(&self, vault: Address, user: Address) -> Result<&VaultUser, SimError> {
        self.try_vault_user(vault, user)
            .ok_or(SimError::UnknownVaultUser { vault, user })
    }

    // ==================== Iteration ====================

    pub fn markets(&self) -> impl Iterator<Item = &Market> {
        self.markets.values().map(Arc::as_ref)
    }

    pub fn vaults(&self) -> impl Iterator<Item = &Vault> {
        self.vaults.values().map(Arc::as_ref)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.tokens.values().map(Arc::as_ref)
    }

    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.values().map(Arc::as_ref)
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.values().map(Arc::as_ref)
    }

    /// Holdings of `user`, ordered by token address
    pub fn holdings_of(&self, user: Address) -> impl Iterator<Item = &Holding> {
        self.holdings
            .range((user, Address::ZERO)..=(user, Address::repeat_byte(0xFF)))
            .map(|(_, holding)| holding.as_ref())
    }

    pub fn vault_market_configs(&self) -> impl Iterator<Item = &VaultMarketConfig> {
        self.vault_market_configs.values().map(Arc::as_ref)
    }

    // ==================== Composite lookups ====================

    /// The position of `user` on `market_id`, with the market accrued to the
    /// snapshot timestamp.
    pub fn accrual_position(
        &self,
        user: Address,
        market_id: MarketId,
    ) -> Result<AccrualPosition, SimError> {
        self.build_accrual_position(user, market_id)
            .map_err(|source| SimError::AccrualPosition {
                user,
                market_id,
                source: Box::new(source),
            })
    }

    fn build_accrual_position(
        &self,
        user: Address,
        market_id: MarketId,
    ) -> Result<AccrualPosition, SimError> {
        let market = self.market(market_id)?;
        let position = self
            .try_position(user, market_id)
            .cloned()
            .unwrap_or_else(|| Position::empty(user, market_id));
        AccrualPosition::new(position, market, self.timestamp())
    }

    /// The vault joined with each withdraw-queue market, accrued to the snapshot
    /// timestamp.
    pub fn accrual_vault(&self, vault: Address) -> Result<AccrualVault, SimError> {
        self.build_accrual_vault(vault)
            .map_err(|source| SimError::AccrualVault {
                vault,
                source: Box::new(source),
            })
    }

    fn build_accrual_vault(&self, address: Address) -> Result<AccrualVault, SimError> {
        let vault = self.vault(address)?;
        let allocations = vault
            .withdraw_queue
            .iter()
            .map(|market_id| {
                Ok(VaultMarketAllocation {
                    config: self.vault_market_config(address, *market_id)?.clone(),
                    position: self.build_accrual_position(address, *market_id)?,
                })
            })
            .collect::<Result<Vec<_>, SimError>>()?;

        Ok(AccrualVault::new(vault.clone(), allocations))
    }

    /// Resolves `token` as a wrapper: a token with a wrap relation, else a vault
    /// wrapping its asset.
    pub fn wrapped_token(&self, token: Address) -> Result<WrappedToken, SimError> {
        if let Some(relation) = self.try_token(token).and_then(|t| t.wrap.clone()) {
            return Ok(WrappedToken::Wrapper {
                wrapped: token,
                relation,
            });
        }
        if let Some(vault) = self.try_vault(token) {
            return Ok(WrappedToken::Vault {
                vault: token,
                underlying: vault.asset,
            });
        }
        Err(SimError::UnknownWrappedToken { token })
    }
}

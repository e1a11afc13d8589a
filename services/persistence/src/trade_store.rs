//! Trade Store: derived trades, replaced one account at a time
//!
//! Trades are never patched in place. A recompute produces the account's
//! complete trade set and the store swaps it in as a single step, so a
//! reader sees either the old set or the new one and nothing in between.

use std::collections::BTreeMap;
use std::sync::RwLock;

use tracing::debug;
use types::ids::AccountId;
use types::trade::TradeSet;

use crate::error::StoreError;

/// Destination for matching output.
pub trait TradeStore: Send + Sync {
    /// Atomically replace every trade and leg of `account_id` with `set`.
    ///
    /// `set` must only contain trades of that account.
    fn replace_trades(&self, account_id: AccountId, set: &TradeSet) -> Result<(), StoreError>;

    /// The account's current trade set; empty if never written.
    fn load_trades(&self, account_id: AccountId) -> Result<TradeSet, StoreError>;
}

/// Reject a set carrying trades of another account.
pub(crate) fn check_scope(account_id: AccountId, set: &TradeSet) -> Result<(), StoreError> {
    match set.trades.iter().find(|t| t.account_id != account_id) {
        Some(foreign) => Err(StoreError::ScopeMismatch {
            expected: account_id,
            found: foreign.account_id,
        }),
        None => Ok(()),
    }
}

/// In-memory trade store.
#[derive(Debug, Default)]
pub struct MemoryTradeStore {
    sets: RwLock<BTreeMap<AccountId, TradeSet>>,
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accounts with a stored trade set.
    pub fn accounts(&self) -> Result<Vec<AccountId>, StoreError> {
        let sets = self.sets.read().map_err(|_| StoreError::Poisoned)?;
        Ok(sets.keys().copied().collect())
    }
}

impl TradeStore for MemoryTradeStore {
    fn replace_trades(&self, account_id: AccountId, set: &TradeSet) -> Result<(), StoreError> {
        check_scope(account_id, set)?;
        let mut sets = self.sets.write().map_err(|_| StoreError::Poisoned)?;
        sets.insert(account_id, set.clone());
        debug!(%account_id, trades = set.trades.len(), legs = set.legs.len(), "Trades replaced");
        Ok(())
    }

    fn load_trades(&self, account_id: AccountId) -> Result<TradeSet, StoreError> {
        let sets = self.sets.read().map_err(|_| StoreError::Poisoned)?;
        Ok(sets.get(&account_id).cloned().unwrap_or_default())
    }
}

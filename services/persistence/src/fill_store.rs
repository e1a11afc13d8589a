//! Fill Store: immutable executions keyed by external id
//!
//! Fills are inserted once and never edited. A second insert of the same
//! external id is reported as a duplicate and ignored (first write wins),
//! which makes re-importing a statement or re-polling a broker harmless.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::RwLock;

use tracing::{debug, info};
use types::fill::Fill;
use types::ids::{AccountId, ExternalFillId};

use crate::error::StoreError;

// ── Insert Outcome ──────────────────────────────────────────────────

/// What happened to a batch of incoming fills.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    /// External ids newly stored, in batch order.
    pub inserted: Vec<ExternalFillId>,
    /// External ids already present (or repeated within the batch).
    pub duplicates: Vec<ExternalFillId>,
    /// Accounts that received at least one new fill.
    pub affected_accounts: BTreeSet<AccountId>,
}

impl InsertOutcome {
    pub fn inserted_count(&self) -> usize {
        self.inserted.len()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.len()
    }
}

// ── Fill Store ──────────────────────────────────────────────────────

/// Source of fills for the matching engine.
pub trait FillStore: Send + Sync {
    /// Store new fills, skipping any whose external id is already known.
    fn insert_fills(&self, fills: Vec<Fill>) -> Result<InsertOutcome, StoreError>;

    /// All fills for one account, in no particular order.
    fn fills_for_account(&self, account_id: AccountId) -> Result<Vec<Fill>, StoreError>;

    /// Every account with at least one fill.
    fn accounts(&self) -> Result<Vec<AccountId>, StoreError>;

    /// Bulk reset: drop every fill for the account. Returns how many went.
    fn reset_account(&self, account_id: AccountId) -> Result<usize, StoreError>;
}

/// In-memory fill store.
///
/// `BTreeMap` keyed by external id keeps iteration order stable.
#[derive(Debug, Default)]
pub struct MemoryFillStore {
    fills: RwLock<BTreeMap<ExternalFillId, Fill>>,
}

impl MemoryFillStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fills.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FillStore for MemoryFillStore {
    fn insert_fills(&self, fills: Vec<Fill>) -> Result<InsertOutcome, StoreError> {
        let mut stored = self.fills.write().map_err(|_| StoreError::Poisoned)?;
        let mut outcome = InsertOutcome::default();

        for fill in fills {
            if stored.contains_key(&fill.external_id) {
                debug!(fill_id = %fill.external_id, "Duplicate fill ignored");
                outcome.duplicates.push(fill.external_id);
                continue;
            }
            outcome.affected_accounts.insert(fill.account_id);
            outcome.inserted.push(fill.external_id.clone());
            stored.insert(fill.external_id.clone(), fill);
        }

        info!(
            inserted = outcome.inserted.len(),
            duplicates = outcome.duplicates.len(),
            accounts = outcome.affected_accounts.len(),
            "Fills stored"
        );
        Ok(outcome)
    }

    fn fills_for_account(&self, account_id: AccountId) -> Result<Vec<Fill>, StoreError> {
        let stored = self.fills.read().map_err(|_| StoreError::Poisoned)?;
        Ok(stored
            .values()
            .filter(|f| f.account_id == account_id)
            .cloned()
            .collect())
    }

    fn accounts(&self) -> Result<Vec<AccountId>, StoreError> {
        let stored = self.fills.read().map_err(|_| StoreError::Poisoned)?;
        let accounts: BTreeSet<AccountId> = stored.values().map(|f| f.account_id).collect();
        Ok(accounts.into_iter().collect())
    }

    fn reset_account(&self, account_id: AccountId) -> Result<usize, StoreError> {
        let mut stored = self.fills.write().map_err(|_| StoreError::Poisoned)?;
        let before = stored.len();
        stored.retain(|_, f| f.account_id != account_id);
        let removed = before - stored.len();
        info!(%account_id, removed, "Account fills reset");
        Ok(removed)
    }
}

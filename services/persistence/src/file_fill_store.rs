//! File-backed fill store
//!
//! All fills live in one checksummed ledger file, `fills.ledger`, loaded
//! into memory on open. Every mutation rewrites the ledger through the same
//! temp file + fsync + rename path as trade snapshots and only then updates
//! the in-memory copy, so memory never runs ahead of disk.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use types::fill::Fill;
use types::ids::{AccountId, ExternalFillId};

use crate::error::StoreError;
use crate::file_store::write_atomic;
use crate::fill_store::{FillStore, InsertOutcome};
use crate::snapshot::digest;

pub const FILL_LEDGER_FILE: &str = "fills.ledger";
const LEDGER_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct FillLedger {
    version: u32,
    fills: Vec<Fill>,
    checksum: String,
}

impl FillLedger {
    fn decode(bytes: &[u8]) -> Result<Vec<Fill>, StoreError> {
        let ledger: FillLedger = bincode::deserialize(bytes)?;
        if ledger.version > LEDGER_VERSION {
            return Err(StoreError::UnsupportedVersion(ledger.version));
        }
        let actual = digest(&ledger.fills)?;
        if actual != ledger.checksum {
            return Err(StoreError::IntegrityFailure {
                expected: ledger.checksum,
                actual,
            });
        }
        Ok(ledger.fills)
    }
}

pub struct FileFillStore {
    path: PathBuf,
    fills: RwLock<BTreeMap<ExternalFillId, Fill>>,
}

impl FileFillStore {
    /// Open (and create if needed) the ledger in `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(FILL_LEDGER_FILE);

        let fills = match fs::read(&path) {
            Ok(bytes) => FillLedger::decode(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), fills = fills.len(), "File fill store opened");

        Ok(Self {
            path,
            fills: RwLock::new(fills.into_iter().map(|f| (f.external_id.clone(), f)).collect()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.fills.read().map(|f| f.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, fills: &BTreeMap<ExternalFillId, Fill>) -> Result<(), StoreError> {
        let fills: Vec<Fill> = fills.values().cloned().collect();
        let checksum = digest(&fills)?;
        let ledger = FillLedger {
            version: LEDGER_VERSION,
            fills,
            checksum,
        };
        let data = bincode::serialize(&ledger)?;
        write_atomic(&self.path, &data)?;
        debug!(fills = ledger.fills.len(), bytes = data.len(), "Fill ledger written");
        Ok(())
    }
}

impl FillStore for FileFillStore {
    fn insert_fills(&self, fills: Vec<Fill>) -> Result<InsertOutcome, StoreError> {
        let mut stored = self.fills.write().map_err(|_| StoreError::Poisoned)?;
        let mut next = stored.clone();
        let mut outcome = InsertOutcome::default();

        for fill in fills {
            if next.contains_key(&fill.external_id) {
                debug!(fill_id = %fill.external_id, "Duplicate fill ignored");
                outcome.duplicates.push(fill.external_id);
                continue;
            }
            outcome.affected_accounts.insert(fill.account_id);
            outcome.inserted.push(fill.external_id.clone());
            next.insert(fill.external_id.clone(), fill);
        }

        if !outcome.inserted.is_empty() {
            self.persist(&next)?;
            *stored = next;
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
        let mut next = stored.clone();
        next.retain(|_, f| f.account_id != account_id);
        let removed = stored.len() - next.len();

        if removed > 0 {
            self.persist(&next)?;
            *stored = next;
        }
        info!(%account_id, removed, "Account fills reset");
        Ok(removed)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use types::fill::Side;
    use types::ids::Ticker;

    fn fill(id: &str, account: AccountId, side: Side) -> Fill {
        Fill::new(
            id,
            account,
            Ticker::new("NVDA"),
            Utc.with_ymd_and_hms(2024, 10, 1, 14, 0, 0).unwrap(),
            side,
            25,
            Decimal::new(11875, 2),
            Decimal::new(35, 2),
        )
    }

    #[test]
    fn test_fills_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let account = AccountId::new();
        {
            let store = FileFillStore::open(dir.path()).unwrap();
            store.insert_fills(vec![fill("E1", account, Side::BUY)]).unwrap();
        }
        let store = FileFillStore::open(dir.path()).unwrap();
        store.insert_fills(vec![fill("E2", account, Side::SELL)]).unwrap();

        let reopened = FileFillStore::open(dir.path()).unwrap();
        let fills = reopened.fills_for_account(account).unwrap();
        assert_eq!(fills.len(), 2);
        assert_eq!(fills[0], fill("E1", account, Side::BUY));
        assert_eq!(reopened.accounts().unwrap(), vec![account]);
    }

    #[test]
    fn test_duplicate_across_reopen_ignored() {
        let dir = TempDir::new().unwrap();
        let account = AccountId::new();
        FileFillStore::open(dir.path())
            .unwrap()
            .insert_fills(vec![fill("E1", account, Side::BUY)])
            .unwrap();

        let store = FileFillStore::open(dir.path()).unwrap();
        let outcome = store.insert_fills(vec![fill("E1", account, Side::SELL)]).unwrap();
        assert_eq!(outcome.duplicate_count(), 1);
        assert!(outcome.affected_accounts.is_empty());
        assert_eq!(store.fills_for_account(account).unwrap()[0].side, Side::BUY);
    }

    #[test]
    fn test_reset_is_durable() {
        let dir = TempDir::new().unwrap();
        let a = AccountId::new();
        let b = AccountId::new();
        let store = FileFillStore::open(dir.path()).unwrap();
        store
            .insert_fills(vec![fill("A1", a, Side::BUY), fill("B1", b, Side::BUY)])
            .unwrap();
        assert_eq!(store.reset_account(a).unwrap(), 1);

        let reopened = FileFillStore::open(dir.path()).unwrap();
        assert!(reopened.fills_for_account(a).unwrap().is_empty());
        assert_eq!(reopened.len(), 1);
    }

    #[test]
    fn test_corrupt_ledger_detected() {
        let dir = TempDir::new().unwrap();
        let store = FileFillStore::open(dir.path()).unwrap();
        store
            .insert_fills(vec![fill("E1", AccountId::new(), Side::BUY)])
            .unwrap();

        let path = dir.path().join(FILL_LEDGER_FILE);
        let mut bytes = fs::read(&path).unwrap();
        // Flip a byte inside the commission string, well before the checksum
        let pos = bytes.windows(4).position(|w| w == b"0.35").unwrap();
        bytes[pos + 3] = b'6';
        fs::write(&path, bytes).unwrap();

        assert!(matches!(
            FileFillStore::open(dir.path()),
            Err(StoreError::IntegrityFailure { .. })
        ));
    }
}

//! Snapshot System: per-account trade-set snapshots with integrity checks
//!
//! Features:
//! - One snapshot holds the complete trade set of a single account
//! - SHA-256 integrity hash over the bincode-serialized trade set
//! - Snapshot versioning for forward compatibility
//! - `fingerprint` doubles as the determinism check: equal trade sets
//!   always serialize to the same bytes, so they hash the same

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use types::ids::AccountId;
use types::trade::TradeSet;

use crate::error::StoreError;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// SHA-256 hex digest of a trade set's bincode encoding.
pub fn fingerprint(set: &TradeSet) -> Result<String, StoreError> {
    digest(set)
}

/// SHA-256 hex digest of any value's bincode encoding.
pub(crate) fn digest<T: Serialize + ?Sized>(value: &T) -> Result<String, StoreError> {
    let bytes = bincode::serialize(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(format!("{:x}", hasher.finalize()))
}

// ── Snapshot ────────────────────────────────────────────────────────

/// The complete derived trades of one account, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSnapshot {
    /// Snapshot format version for forward compatibility.
    pub version: u32,
    pub account_id: AccountId,
    pub set: TradeSet,
    /// SHA-256 hash of the serialized trade set.
    pub checksum: String,
}

impl TradeSnapshot {
    /// Create a new snapshot with computed integrity hash.
    pub fn new(account_id: AccountId, set: TradeSet) -> Result<Self, StoreError> {
        let checksum = fingerprint(&set)?;
        Ok(Self {
            version: SNAPSHOT_VERSION,
            account_id,
            set,
            checksum,
        })
    }

    /// Check version and checksum. Scope is checked by the caller, which
    /// knows which account it asked for.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        if self.version > SNAPSHOT_VERSION {
            return Err(StoreError::UnsupportedVersion(self.version));
        }
        let actual = fingerprint(&self.set)?;
        if actual != self.checksum {
            return Err(StoreError::IntegrityFailure {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, StoreError> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode and verify in one step.
    pub fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let snapshot: TradeSnapshot = bincode::deserialize(bytes)?;
        snapshot.verify_integrity()?;
        Ok(snapshot)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

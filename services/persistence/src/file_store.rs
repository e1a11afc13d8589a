//! File-backed trade store
//!
//! One snapshot file per account: `trades-{account}.snap`, or
//! `trades-{account}.snap.zst` when compression is on. Replacing an
//! account writes a temp file, fsyncs it and renames it over the old one,
//! so a crash leaves either the previous snapshot or the new one.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};
use types::ids::AccountId;
use types::trade::TradeSet;

use crate::error::StoreError;
use crate::snapshot::TradeSnapshot;
use crate::trade_store::{check_scope, TradeStore};

const ZSTD_LEVEL: i32 = 3;

/// Write `data` to `path` via a fsynced temp file and a rename.
pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StoreError> {
    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

pub struct FileTradeStore {
    dir: PathBuf,
    compress: bool,
    /// Serializes writers; readers rely on rename atomicity.
    write_lock: Mutex<()>,
}

impl FileTradeStore {
    /// Open (and create if needed) a store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!(dir = %dir.display(), compress, "File trade store opened");
        Ok(Self {
            dir,
            compress,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, account_id: AccountId, compressed: bool) -> PathBuf {
        let ext = if compressed { "snap.zst" } else { "snap" };
        self.dir.join(format!("trades-{}.{}", account_id, ext))
    }

    fn read_snapshot(&self, path: &Path, compressed: bool) -> Result<Option<TradeSnapshot>, StoreError> {
        let mut data = Vec::new();
        match File::open(path) {
            Ok(mut file) => {
                file.read_to_end(&mut data)?;
            }
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let decoded = if compressed {
            zstd::decode_all(data.as_slice()).map_err(|e| StoreError::Compression(e.to_string()))?
        } else {
            data
        };

        TradeSnapshot::decode(&decoded).map(Some)
    }
}

impl TradeStore for FileTradeStore {
    fn replace_trades(&self, account_id: AccountId, set: &TradeSet) -> Result<(), StoreError> {
        check_scope(account_id, set)?;

        let snapshot = TradeSnapshot::new(account_id, set.clone())?;
        let data = snapshot.encode()?;
        let final_data = if self.compress {
            zstd::encode_all(data.as_slice(), ZSTD_LEVEL)
                .map_err(|e| StoreError::Compression(e.to_string()))?
        } else {
            data
        };

        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;

        let path = self.path_for(account_id, self.compress);
        write_atomic(&path, &final_data)?;

        // The new set is live from here on; a leftover in the other format
        // is only ever read when this one is missing.
        let stale = self.path_for(account_id, !self.compress);
        match fs::remove_file(&stale) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(%account_id, path = %stale.display(), error = %e, "Stale snapshot not removed"),
        }

        debug!(
            %account_id,
            trades = set.trades.len(),
            bytes = final_data.len(),
            checksum = %snapshot.checksum,
            "Trade snapshot written"
        );
        Ok(())
    }

    fn load_trades(&self, account_id: AccountId) -> Result<TradeSet, StoreError> {
        for compressed in [self.compress, !self.compress] {
            let path = self.path_for(account_id, compressed);
            if let Some(snapshot) = self.read_snapshot(&path, compressed)? {
                if snapshot.account_id != account_id {
                    return Err(StoreError::ScopeMismatch {
                        expected: account_id,
                        found: snapshot.account_id,
                    });
                }
                return Ok(snapshot.set);
            }
        }
        Ok(TradeSet::default())
    }
}

// ── Tests ───────────────────────────────────────────────────────────

//! Persistence Service
//!
//! Fill and trade storage at the boundary of the matching engine:
//! a fill store deduplicated by external execution id, and trade stores
//! that only ever swap a whole account's trade set in one step.
//!
//! # Modules
//! - `fill_store`: immutable fills, dedup on insert, bulk reset
//! - `trade_store`: `TradeStore` contract and the in-memory store
//! - `snapshot`: versioned, checksummed trade-set snapshots
//! - `file_store`: one snapshot file per account, atomic rename on replace
//! - `file_fill_store`: durable fill ledger sharing the same atomic write

pub mod error;
pub mod fill_store;
pub mod trade_store;
pub mod snapshot;
pub mod file_store;
pub mod file_fill_store;

pub use error::StoreError;
pub use file_fill_store::FileFillStore;
pub use file_store::FileTradeStore;
pub use fill_store::{FillStore, InsertOutcome, MemoryFillStore};
pub use snapshot::{fingerprint, TradeSnapshot};
pub use trade_store::{MemoryTradeStore, TradeStore};

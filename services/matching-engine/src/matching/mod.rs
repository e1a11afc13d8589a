//! Matching logic module
//!
//! Deterministic ordering plus the per-partition position fold

pub mod fold;
pub mod ordering;

pub use fold::PartitionFold;
pub use ordering::{find_ambiguous, partition, sort_fills, Partition};

//! Matching Engine Service
//!
//! Rebuilds round-trip trades from a batch of broker fills. Fills are
//! sorted, split by (account, ticker) and folded into trades with ENTRY /
//! ADD / TRIM / EXIT legs.
//!
//! **Key Invariants:**
//! - Deterministic matching (same fills in any order → same output)
//! - Conservation of shares on every trade
//! - CLOSED ⟺ no remaining shares
//! - Malformed input never aborts a run

pub mod matching;
pub mod engine;
pub mod warnings;

pub use engine::{match_fills, match_fills_parallel, MatchResult, MatchingEngine};
pub use warnings::{MatchWarning, WarningReason, WarningSummary};

//! Warnings surfaced alongside match output
//!
//! Matching never aborts on bad input. Problems with individual fills, or
//! with a whole partition, are collected here and returned next to the
//! trades so callers can show them in an import summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::errors::FillError;
use types::fill::Fill;
use types::ids::{AccountId, ExternalFillId, Ticker};

/// Why a fill (or its partition) was left out of matching
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WarningReason {
    /// Fill failed validation and was skipped
    #[error("malformed fill: {0}")]
    Malformed(FillError),

    /// Two fills share (executed_at, external_id); the partition was dropped
    #[error("ambiguous ordering at {executed_at}: partition skipped")]
    AmbiguousOrdering { executed_at: DateTime<Utc> },
}

/// One problem found during matching, keyed by the fill's external id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchWarning {
    pub fill_external_id: ExternalFillId,
    pub account_id: AccountId,
    pub ticker: Ticker,
    pub reason: WarningReason,
}

impl MatchWarning {
    pub fn malformed(fill: &Fill, err: FillError) -> Self {
        Self {
            fill_external_id: fill.external_id.clone(),
            account_id: fill.account_id,
            ticker: fill.ticker.clone(),
            reason: WarningReason::Malformed(err),
        }
    }

    pub fn ambiguous(fill: &Fill) -> Self {
        Self {
            fill_external_id: fill.external_id.clone(),
            account_id: fill.account_id,
            ticker: fill.ticker.clone(),
            reason: WarningReason::AmbiguousOrdering { executed_at: fill.executed_at },
        }
    }

    /// True when the whole partition was skipped, not just this fill
    pub fn is_partition_fatal(&self) -> bool {
        matches!(self.reason, WarningReason::AmbiguousOrdering { .. })
    }

    /// Serializable summary row for import reports
    pub fn summary(&self) -> WarningSummary {
        WarningSummary {
            fill_external_id: self.fill_external_id.clone(),
            ticker: self.ticker.clone(),
            reason: self.reason.to_string(),
        }
    }
}

impl std::fmt::Display for MatchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "fill {} ({}): {}", self.fill_external_id, self.ticker, self.reason)
    }
}

/// Flattened warning for JSON output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarningSummary {
    pub fill_external_id: ExternalFillId,
    pub ticker: Ticker,
    pub reason: String,
}

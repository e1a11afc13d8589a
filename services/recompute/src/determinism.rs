//! Determinism Guarantees: double-match and idempotent-recompute checks
//!
//! Features:
//! - Double match: match the same fills twice, the second time in reverse
//!   input order, and compare trade-set fingerprints
//! - Sequential vs parallel comparison
//! - Idempotent recompute: recompute an unchanged account twice and
//!   compare what the trade store holds after each run
//! - Divergence report with a short diff summary

use matching_engine::{match_fills, match_fills_parallel, MatchResult};
use persistence::{fingerprint, StoreError};
use types::fill::Fill;
use types::ids::AccountId;
use types::trade::TradeSet;

use crate::error::RecomputeError;
use crate::recomputer::Recomputer;

// ── Divergence Report ───────────────────────────────────────────────

/// Detailed report when two runs produce different results.
#[derive(Debug, Clone)]
pub struct DivergenceReport {
    pub hash_a: String,
    pub hash_b: String,
    pub trades_match: bool,
    pub legs_match: bool,
    pub warnings_match: bool,
    pub detail: String,
}

impl DivergenceReport {
    /// Check if the two runs are identical.
    pub fn is_match(&self) -> bool {
        self.hash_a == self.hash_b && self.warnings_match
    }
}

// ── Determinism Verifier ────────────────────────────────────────────

pub struct DeterminismVerifier;

impl DeterminismVerifier {
    /// Match `fills` as given and reversed, then compare.
    pub fn verify_double_match(fills: &[Fill]) -> Result<DivergenceReport, StoreError> {
        let a = match_fills(fills);
        let reversed: Vec<Fill> = fills.iter().rev().cloned().collect();
        let b = match_fills(&reversed);
        Self::compare_results(&a, &b)
    }

    /// Sequential matching against the scoped-thread path.
    pub fn verify_parallel(fills: &[Fill], workers: usize) -> Result<DivergenceReport, StoreError> {
        let a = match_fills(fills);
        let b = match_fills_parallel(fills, workers);
        Self::compare_results(&a, &b)
    }

    /// Recompute twice with no new fills in between and compare the
    /// stored trade sets.
    pub async fn verify_idempotent_recompute(
        recomputer: &Recomputer,
        account_id: AccountId,
    ) -> Result<DivergenceReport, RecomputeError> {
        recomputer.recompute(account_id).await?;
        let first = recomputer.trade_store().load_trades(account_id)?;
        recomputer.recompute(account_id).await?;
        let second = recomputer.trade_store().load_trades(account_id)?;
        Self::compare_sets(&first, &second, true).map_err(RecomputeError::from)
    }

    pub fn compare_results(a: &MatchResult, b: &MatchResult) -> Result<DivergenceReport, StoreError> {
        Self::compare_sets(&a.set, &b.set, a.warnings == b.warnings)
    }

    /// Generate a divergence report from two trade sets.
    pub fn compare_sets(
        a: &TradeSet,
        b: &TradeSet,
        warnings_match: bool,
    ) -> Result<DivergenceReport, StoreError> {
        let hash_a = fingerprint(a)?;
        let hash_b = fingerprint(b)?;

        let trades_match = a.trades == b.trades;
        let legs_match = a.legs == b.legs;

        let mut details = Vec::new();
        if !trades_match {
            let first = a.trades.iter().zip(&b.trades).position(|(x, y)| x != y);
            details.push(format!(
                "Trades differ: {} vs {} entries, first mismatch at {:?}",
                a.trades.len(),
                b.trades.len(),
                first
            ));
        }
        if !legs_match {
            details.push(format!("Legs differ: {} vs {} entries", a.legs.len(), b.legs.len()));
        }
        if !warnings_match {
            details.push("Warnings differ".to_string());
        }

        let detail = if details.is_empty() {
            "Runs are identical".to_string()
        } else {
            details.join("; ")
        };

        Ok(DivergenceReport {
            hash_a,
            hash_b,
            trades_match,
            legs_match,
            warnings_match,
            detail,
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

//! JSON shapes printed by the CLI

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use matching_engine::WarningSummary;
use persistence::TradeStore;
use recompute::{DivergenceReport, ImportSummary};
use serde::Serialize;
use types::fill::Fill;
use types::ids::{AccountId, ExternalFillId};
use types::trade::TradeSet;

#[derive(Debug, Serialize)]
pub struct AccountOutput {
    pub account_id: AccountId,
    pub fills: usize,
    pub trades: TradeSet,
    pub warnings: Vec<WarningSummary>,
}

#[derive(Debug, Serialize)]
pub struct FailureOutput {
    pub account_id: AccountId,
    pub error: String,
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub inserted: usize,
    pub duplicates: Vec<ExternalFillId>,
    pub accounts: Vec<AccountOutput>,
    pub failures: Vec<FailureOutput>,
}

impl RunOutput {
    /// Pair each report with what the trade store now holds.
    pub fn collect(summary: &ImportSummary, store: &dyn TradeStore) -> Result<Self> {
        let mut accounts = Vec::with_capacity(summary.reports.len());
        for (account_id, report) in &summary.reports {
            let trades = store
                .load_trades(*account_id)
                .with_context(|| format!("loading trades for {account_id}"))?;
            accounts.push(AccountOutput {
                account_id: *account_id,
                fills: report.fills,
                trades,
                warnings: report.warnings.iter().map(|w| w.summary()).collect(),
            });
        }

        let failures = summary
            .failures
            .iter()
            .map(|(account_id, e)| FailureOutput {
                account_id: *account_id,
                error: e.to_string(),
                retryable: e.is_retryable(),
            })
            .collect();

        Ok(Self {
            inserted: summary.inserted,
            duplicates: summary.duplicates.clone(),
            accounts,
            failures,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct VerifyOutput {
    pub identical: bool,
    pub hash_a: String,
    pub hash_b: String,
    pub detail: String,
}

impl From<DivergenceReport> for VerifyOutput {
    fn from(report: DivergenceReport) -> Self {
        Self {
            identical: report.is_match(),
            hash_a: report.hash_a,
            hash_b: report.hash_b,
            detail: report.detail,
        }
    }
}

/// Read a JSON array of fills from a file, or stdin for `-`.
pub fn read_fills(path: &Path) -> Result<Vec<Fill>> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf).context("reading fills from stdin")?;
        buf
    } else {
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
    };
    parse_fills(&raw)
}

pub fn parse_fills(raw: &str) -> Result<Vec<Fill>> {
    serde_json::from_str(raw).context("fills must be a JSON array of fill objects")
}

pub fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let out = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{out}");
    Ok(())
}

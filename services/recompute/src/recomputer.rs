//! Recomputer: rematch an account from scratch and swap its trades
//!
//! A recompute never looks at the trades it is about to replace. It reads
//! every fill of the account, matches them on a blocking thread, and hands
//! the complete new set to the trade store in a single `replace_trades`
//! call. Runs for one account are serialized through a per-account async
//! mutex; different accounts proceed in parallel.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use matching_engine::{MatchResult, MatchWarning, MatchingEngine};
use persistence::{FillStore, TradeStore};
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error, info, warn};
use types::fill::Fill;
use types::ids::{AccountId, ExternalFillId};

use crate::config::RecomputeConfig;
use crate::error::RecomputeError;

// ── Reports ─────────────────────────────────────────────────────────

/// Outcome of one committed recompute.
#[derive(Debug, Clone)]
pub struct RecomputeReport {
    pub account_id: AccountId,
    pub fills: usize,
    pub trades: usize,
    pub open_trades: usize,
    pub legs: usize,
    pub warnings: Vec<MatchWarning>,
    pub elapsed: Duration,
}

/// Result of importing a batch of fills.
///
/// Per-account failures do not fail the import: the fills are stored
/// either way and the failed accounts can be recomputed later.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub inserted: usize,
    pub duplicates: Vec<ExternalFillId>,
    pub reports: BTreeMap<AccountId, RecomputeReport>,
    pub failures: BTreeMap<AccountId, RecomputeError>,
}

impl ImportSummary {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn warnings(&self) -> impl Iterator<Item = &MatchWarning> {
        self.reports.values().flat_map(|r| r.warnings.iter())
    }

    /// Accounts worth retrying
    pub fn retryable_accounts(&self) -> Vec<AccountId> {
        self.failures
            .iter()
            .filter(|(_, e)| e.is_retryable())
            .map(|(account, _)| *account)
            .collect()
    }
}

// ── Recomputer ──────────────────────────────────────────────────────

struct Inner {
    fills: Arc<dyn FillStore>,
    trades: Arc<dyn TradeStore>,
    engine: MatchingEngine,
    config: RecomputeConfig,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

/// Cheap to clone; clones share stores and account locks.
#[derive(Clone)]
pub struct Recomputer {
    inner: Arc<Inner>,
}

impl Recomputer {
    pub fn new(
        fills: Arc<dyn FillStore>,
        trades: Arc<dyn TradeStore>,
        config: RecomputeConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                fills,
                trades,
                engine: MatchingEngine::new(config.match_workers),
                config,
                locks: DashMap::new(),
            }),
        }
    }

    pub fn config(&self) -> &RecomputeConfig {
        &self.inner.config
    }

    pub fn fill_store(&self) -> &Arc<dyn FillStore> {
        &self.inner.fills
    }

    pub fn trade_store(&self) -> &Arc<dyn TradeStore> {
        &self.inner.trades
    }

    fn lock_for(&self, account_id: AccountId) -> Arc<Mutex<()>> {
        self.inner
            .locks
            .entry(account_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the account's lock entry once no run holds or waits on it.
    fn release_lock(&self, account_id: AccountId) {
        self.inner
            .locks
            .remove_if(&account_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Rematch every fill of `account_id` and replace its trades.
    ///
    /// The timeout covers lock wait, fill load and matching. Once the
    /// commit starts it runs to completion, so a timeout never leaves a
    /// half-written account behind.
    pub async fn recompute(&self, account_id: AccountId) -> Result<RecomputeReport, RecomputeError> {
        let lock = self.lock_for(account_id);
        let outcome = self.recompute_serialized(account_id, &lock).await;
        drop(lock);
        self.release_lock(account_id);
        outcome
    }

    async fn recompute_serialized(
        &self,
        account_id: AccountId,
        lock: &Mutex<()>,
    ) -> Result<RecomputeReport, RecomputeError> {
        let started = Instant::now();
        let timeout = self.inner.config.timeout;
        let deadline = started + timeout;
        let timed_out = || RecomputeError::Timeout { account_id, timeout };

        let _guard = timeout_at(deadline, lock.lock()).await.map_err(|_| timed_out())?;

        let fills = Arc::clone(&self.inner.fills);
        let engine = self.inner.engine;
        let work = tokio::task::spawn_blocking(move || {
            let fills = fills.fills_for_account(account_id)?;
            let result = engine.run(&fills);
            Ok::<_, RecomputeError>((fills.len(), result))
        });

        let (fill_count, result) = match timeout_at(deadline, work).await {
            Err(_) => {
                warn!(%account_id, ?timeout, "Recompute timed out before commit");
                return Err(timed_out());
            }
            Ok(Err(join)) => return Err(RecomputeError::TaskFailed(join.to_string())),
            Ok(Ok(outcome)) => outcome?,
        };

        if Instant::now() >= deadline {
            warn!(%account_id, ?timeout, "Recompute deadline passed, commit abandoned");
            return Err(timed_out());
        }

        let mut report = self.commit(account_id, fill_count, result).await?;
        report.elapsed = started.elapsed();
        info!(
            %account_id,
            fills = report.fills,
            trades = report.trades,
            open = report.open_trades,
            warnings = report.warnings.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Recompute committed"
        );
        Ok(report)
    }

    async fn commit(
        &self,
        account_id: AccountId,
        fill_count: usize,
        result: MatchResult,
    ) -> Result<RecomputeReport, RecomputeError> {
        let started = Instant::now();
        let trades = result.trades().len();
        let open_trades = result.open_trades().count();
        let legs = result.legs().len();
        let (set, warnings) = result.into_parts();

        let store = Arc::clone(&self.inner.trades);
        tokio::task::spawn_blocking(move || store.replace_trades(account_id, &set))
            .await
            .map_err(|e| RecomputeError::TaskFailed(e.to_string()))?
            .map_err(|e| {
                error!(%account_id, error = %e, retryable = e.is_retryable(), "Trade replace failed");
                e
            })?;

        debug!(%account_id, commit_ms = started.elapsed().as_millis() as u64, "Trades replaced");
        Ok(RecomputeReport {
            account_id,
            fills: fill_count,
            trades,
            open_trades,
            legs,
            warnings,
            elapsed: started.elapsed(),
        })
    }

    /// Recompute several accounts, at most `max_parallel_accounts` at a time.
    pub async fn recompute_many(
        &self,
        accounts: Vec<AccountId>,
    ) -> Vec<(AccountId, Result<RecomputeReport, RecomputeError>)> {
        let limit = self.inner.config.max_parallel_accounts.max(1);
        stream::iter(accounts)
            .map(|account_id| {
                let this = self.clone();
                async move { (account_id, this.recompute(account_id).await) }
            })
            .buffer_unordered(limit)
            .collect()
            .await
    }

    /// Recompute every account that has fills.
    pub async fn recompute_all(&self) -> Result<ImportSummary, RecomputeError> {
        let store = Arc::clone(&self.inner.fills);
        let accounts = tokio::task::spawn_blocking(move || store.accounts())
            .await
            .map_err(|e| RecomputeError::TaskFailed(e.to_string()))??;

        let mut summary = ImportSummary::default();
        self.collect(&mut summary, accounts).await;
        Ok(summary)
    }

    /// Store new fills and recompute each account that got at least one.
    ///
    /// Storing is the only step that can fail the whole import; recompute
    /// failures are reported per account.
    pub async fn import(&self, fills: Vec<Fill>) -> Result<ImportSummary, RecomputeError> {
        let submitted = fills.len();
        let store = Arc::clone(&self.inner.fills);
        let outcome = tokio::task::spawn_blocking(move || store.insert_fills(fills))
            .await
            .map_err(|e| RecomputeError::TaskFailed(e.to_string()))??;

        info!(
            submitted,
            inserted = outcome.inserted_count(),
            duplicates = outcome.duplicate_count(),
            accounts = outcome.affected_accounts.len(),
            "Import stored"
        );

        let mut summary = ImportSummary {
            inserted: outcome.inserted_count(),
            duplicates: outcome.duplicates,
            ..Default::default()
        };
        let accounts = outcome.affected_accounts.into_iter().collect();
        self.collect(&mut summary, accounts).await;
        Ok(summary)
    }

    /// Bulk reset: drop the account's fills, then recompute it to an
    /// empty trade set. Returns how many fills were removed.
    pub async fn reset_account(&self, account_id: AccountId) -> Result<usize, RecomputeError> {
        let store = Arc::clone(&self.inner.fills);
        let removed = tokio::task::spawn_blocking(move || store.reset_account(account_id))
            .await
            .map_err(|e| RecomputeError::TaskFailed(e.to_string()))??;
        self.recompute(account_id).await?;
        Ok(removed)
    }

    async fn collect(&self, summary: &mut ImportSummary, accounts: Vec<AccountId>) {
        for (account_id, outcome) in self.recompute_many(accounts).await {
            match outcome {
                Ok(report) => {
                    summary.reports.insert(account_id, report);
                }
                Err(e) => {
                    error!(%account_id, error = %e, retryable = e.is_retryable(), "Recompute failed");
                    summary.failures.insert(account_id, e);
                }
            }
        }
    }
}

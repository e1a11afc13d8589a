//! Orchestrator behavior against misbehaving stores

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use persistence::{
    FileFillStore, FileTradeStore, FillStore, InsertOutcome, MemoryFillStore, MemoryTradeStore, StoreError,
    TradeStore,
};
use recompute::{RecomputeConfig, RecomputeError, Recomputer};
use rust_decimal::Decimal;
use tempfile::TempDir;
use types::fill::{Fill, Side};
use types::ids::{AccountId, Ticker};
use types::trade::{TradeDirection, TradeSet, TradeStatus};

fn fill(id: &str, account: AccountId, minute: i64, side: Side, qty: i64, price: i64) -> Fill {
    Fill::new(
        id,
        account,
        Ticker::new("IWM"),
        Utc.with_ymd_and_hms(2024, 9, 3, 14, 0, 0).unwrap() + ChronoDuration::minutes(minute),
        side,
        qty,
        Decimal::from(price),
        Decimal::new(100, 2),
    )
}

/// Fill store that sleeps on every read and records overlap per account.
struct SlowFillStore {
    inner: MemoryFillStore,
    delay: Duration,
    in_flight: Mutex<HashMap<AccountId, usize>>,
    max_same_account: AtomicUsize,
    total_in_flight: AtomicUsize,
    max_total: AtomicUsize,
}

impl SlowFillStore {
    fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryFillStore::new(),
            delay,
            in_flight: Mutex::new(HashMap::new()),
            max_same_account: AtomicUsize::new(0),
            total_in_flight: AtomicUsize::new(0),
            max_total: AtomicUsize::new(0),
        }
    }
}

impl FillStore for SlowFillStore {
    fn insert_fills(&self, fills: Vec<Fill>) -> Result<InsertOutcome, StoreError> {
        self.inner.insert_fills(fills)
    }

    fn fills_for_account(&self, account_id: AccountId) -> Result<Vec<Fill>, StoreError> {
        {
            let mut map = self.in_flight.lock().unwrap();
            let n = map.entry(account_id).or_default();
            *n += 1;
            self.max_same_account.fetch_max(*n, Ordering::SeqCst);
        }
        let total = self.total_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_total.fetch_max(total, Ordering::SeqCst);

        thread::sleep(self.delay);

        self.total_in_flight.fetch_sub(1, Ordering::SeqCst);
        *self.in_flight.lock().unwrap().get_mut(&account_id).unwrap() -= 1;
        self.inner.fills_for_account(account_id)
    }

    fn accounts(&self) -> Result<Vec<AccountId>, StoreError> {
        self.inner.accounts()
    }

    fn reset_account(&self, account_id: AccountId) -> Result<usize, StoreError> {
        self.inner.reset_account(account_id)
    }
}

/// Trade store whose writes fail while `failing` is set.
#[derive(Default)]
struct FlakyTradeStore {
    inner: MemoryTradeStore,
    failing: AtomicBool,
    writes: AtomicUsize,
}

impl TradeStore for FlakyTradeStore {
    fn replace_trades(&self, account_id: AccountId, set: &TradeSet) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.replace_trades(account_id, set)
    }

    fn load_trades(&self, account_id: AccountId) -> Result<TradeSet, StoreError> {
        self.inner.load_trades(account_id)
    }
}

#[tokio::test]
async fn test_failed_replace_keeps_previous_set() {
    let trades = Arc::new(FlakyTradeStore::default());
    let r = Recomputer::new(
        Arc::new(MemoryFillStore::new()),
        trades.clone(),
        RecomputeConfig::default(),
    );
    let account = AccountId::new();

    r.import(vec![fill("F1", account, 0, Side::BUY, 100, 50)]).await.unwrap();
    let before = trades.load_trades(account).unwrap();
    assert_eq!(before.trades.len(), 1);

    trades.failing.store(true, Ordering::SeqCst);
    let summary = r
        .import(vec![fill("F2", account, 1, Side::SELL, 100, 55)])
        .await
        .unwrap();

    // Fill stored, recompute failed, old trades intact
    assert_eq!(summary.inserted, 1);
    assert!(!summary.is_complete());
    assert_eq!(summary.retryable_accounts(), vec![account]);
    assert_eq!(trades.load_trades(account).unwrap(), before);

    // Retry once the store is back
    trades.failing.store(false, Ordering::SeqCst);
    let report = r.recompute(account).await.unwrap();
    assert_eq!(report.open_trades, 0);
    let after = trades.load_trades(account).unwrap();
    assert!(after.trades[0].is_closed());
}

#[tokio::test]
async fn test_timeout_commits_nothing() {
    let fills = Arc::new(SlowFillStore::new(Duration::from_millis(200)));
    let trades = Arc::new(FlakyTradeStore::default());
    let config = RecomputeConfig {
        timeout: Duration::from_millis(20),
        ..Default::default()
    };
    let r = Recomputer::new(fills.clone(), trades.clone(), config);
    let account = AccountId::new();
    fills
        .insert_fills(vec![fill("F1", account, 0, Side::BUY, 10, 10)])
        .unwrap();

    let err = r.recompute(account).await.unwrap_err();
    assert!(matches!(err, RecomputeError::Timeout { .. }));
    assert!(err.is_retryable());
    assert_eq!(trades.writes.load(Ordering::SeqCst), 0);
    assert!(trades.load_trades(account).unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_account_runs_are_serialized() {
    let fills = Arc::new(SlowFillStore::new(Duration::from_millis(20)));
    let r = Recomputer::new(
        fills.clone(),
        Arc::new(MemoryTradeStore::new()),
        RecomputeConfig::default(),
    );
    let account = AccountId::new();
    fills
        .insert_fills(vec![fill("F1", account, 0, Side::BUY, 10, 10)])
        .unwrap();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let r = r.clone();
            tokio::spawn(async move { r.recompute(account).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(fills.max_same_account.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_different_accounts_run_in_parallel() {
    let fills = Arc::new(SlowFillStore::new(Duration::from_millis(150)));
    let r = Recomputer::new(
        fills.clone(),
        Arc::new(MemoryTradeStore::new()),
        RecomputeConfig {
            max_parallel_accounts: 4,
            ..Default::default()
        },
    );
    let batch: Vec<Fill> = (0..4)
        .map(|i| fill(&format!("F{i}"), AccountId::new(), 0, Side::BUY, 10, 10))
        .collect();

    let summary = r.import(batch).await.unwrap();

    assert_eq!(summary.reports.len(), 4);
    assert!(fills.max_total.load(Ordering::SeqCst) >= 2);
    assert_eq!(fills.max_same_account.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_parallelism_limit_respected() {
    let fills = Arc::new(SlowFillStore::new(Duration::from_millis(30)));
    let r = Recomputer::new(
        fills.clone(),
        Arc::new(MemoryTradeStore::new()),
        RecomputeConfig {
            max_parallel_accounts: 1,
            ..Default::default()
        },
    );
    let batch: Vec<Fill> = (0..3)
        .map(|i| fill(&format!("F{i}"), AccountId::new(), 0, Side::BUY, 10, 10))
        .collect();

    r.import(batch).await.unwrap();
    assert_eq!(fills.max_total.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_file_store_recompute_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let account = AccountId::new();
    let fills = Arc::new(MemoryFillStore::new());

    {
        let store = Arc::new(FileTradeStore::new(dir.path(), true).unwrap());
        let r = Recomputer::new(fills.clone(), store, RecomputeConfig::default());
        r.import(vec![
            fill("F1", account, 0, Side::BUY, 100, 10),
            fill("F2", account, 1, Side::BUY, 100, 12),
            fill("F3", account, 2, Side::SELL, 200, 15),
        ])
        .await
        .unwrap();
    }

    let reopened = FileTradeStore::new(dir.path(), true).unwrap();
    let set = reopened.load_trades(account).unwrap();
    assert_eq!(set.trades.len(), 1);
    let trade = &set.trades[0];
    assert_eq!(trade.entry_price, Decimal::from(11));
    assert_eq!(trade.exit_price, Some(Decimal::from(15)));
    // 200 × (15 − 11) − 3 × 1.00
    assert_eq!(trade.realized_pnl, Some(Decimal::new(79700, 2)));
}

#[tokio::test]
async fn test_second_import_rematches_full_history() {
    let dir = TempDir::new().unwrap();
    let account = AccountId::new();

    let open_store = || -> Recomputer {
        Recomputer::new(
            Arc::new(FileFillStore::open(dir.path()).unwrap()),
            Arc::new(FileTradeStore::new(dir.path(), false).unwrap()),
            RecomputeConfig::default(),
        )
    };

    open_store()
        .import(vec![fill("F1", account, 0, Side::BUY, 100, 10)])
        .await
        .unwrap();

    let summary = open_store()
        .import(vec![fill("F2", account, 1, Side::SELL, 100, 12)])
        .await
        .unwrap();
    assert!(summary.is_complete());
    assert_eq!(summary.reports[&account].fills, 2);

    let set = FileTradeStore::new(dir.path(), false)
        .unwrap()
        .load_trades(account)
        .unwrap();
    assert_eq!(set.trades.len(), 1);
    let trade = &set.trades[0];
    assert_eq!(trade.direction, TradeDirection::LONG);
    assert_eq!(trade.status, TradeStatus::CLOSED);
    assert_eq!(trade.exit_price, Some(Decimal::from(12)));
    // 100 × (12 − 10) − 2 × 1.00
    assert_eq!(trade.realized_pnl, Some(Decimal::from(198)));
    assert_eq!(set.legs.len(), 2);
}

//! Matching engine core
//!
//! Entry points that turn an unordered batch of fills into trades, legs and
//! warnings. Everything here is pure: same fills in, same output out,
//! regardless of input order.

use std::thread;

use tracing::{debug, warn};
use types::errors::TradeError;
use types::fill::Fill;
use types::ids::TradeId;
use types::trade::{Trade, TradeLeg, TradeSet};

use crate::matching::{find_ambiguous, partition, sort_fills, Partition, PartitionFold};
use crate::warnings::MatchWarning;

/// Output of a matching pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub set: TradeSet,
    pub warnings: Vec<MatchWarning>,
}

impl MatchResult {
    pub fn trades(&self) -> &[Trade] {
        &self.set.trades
    }

    pub fn legs(&self) -> &[TradeLeg] {
        &self.set.legs
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.set.open_trades()
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.set.closed_trades()
    }

    pub fn legs_for(&self, trade_id: TradeId) -> impl Iterator<Item = &TradeLeg> {
        self.set.legs_for(trade_id)
    }

    /// Share conservation and status consistency across the whole result
    pub fn check_invariants(&self) -> Result<(), TradeError> {
        self.set.check_invariants()
    }

    pub fn into_parts(self) -> (TradeSet, Vec<MatchWarning>) {
        (self.set, self.warnings)
    }
}

/// Result of matching a single partition, ids still partition-local
#[derive(Debug, Clone, Default)]
pub struct PartitionOutcome {
    pub trades: Vec<Trade>,
    pub legs: Vec<TradeLeg>,
    pub warnings: Vec<MatchWarning>,
}

/// Match one (account, ticker) partition.
///
/// Malformed fills are skipped with a warning. A timestamp/id collision
/// among the valid fills drops the whole partition.
pub fn match_partition(partition: &Partition<'_>) -> PartitionOutcome {
    let mut warnings = Vec::new();
    let mut valid: Vec<&Fill> = Vec::with_capacity(partition.fills.len());

    for fill in partition.fills.iter().copied() {
        match fill.validate() {
            Ok(()) => valid.push(fill),
            Err(err) => {
                warn!(
                    fill_id = %fill.external_id,
                    account_id = %fill.account_id,
                    ticker = %fill.ticker,
                    error = %err,
                    "Skipping malformed fill"
                );
                warnings.push(MatchWarning::malformed(fill, err));
            }
        }
    }

    let ambiguous = find_ambiguous(&valid);
    if !ambiguous.is_empty() {
        warn!(
            account_id = %partition.key.0,
            ticker = %partition.key.1,
            collisions = ambiguous.len(),
            "Ambiguous fill ordering, partition skipped"
        );
        warnings.extend(ambiguous.into_iter().map(MatchWarning::ambiguous));
        return PartitionOutcome {
            warnings,
            ..Default::default()
        };
    }

    let (trades, legs) = valid
        .into_iter()
        .fold(PartitionFold::new(), PartitionFold::step)
        .finish();

    debug!(
        account_id = %partition.key.0,
        ticker = %partition.key.1,
        fills = partition.fills.len(),
        trades = trades.len(),
        legs = legs.len(),
        "Partition matched"
    );

    PartitionOutcome {
        trades,
        legs,
        warnings,
    }
}

/// Match all fills sequentially
pub fn match_fills(fills: &[Fill]) -> MatchResult {
    let partitions = partition(sort_fills(fills));
    let outcomes = partitions.iter().map(match_partition).collect();
    merge(outcomes)
}

/// Match all fills, spreading partitions across up to `workers` threads.
///
/// Output is identical to `match_fills`: partitions are independent and
/// results are merged back in partition order.
pub fn match_fills_parallel(fills: &[Fill], workers: usize) -> MatchResult {
    let partitions = partition(sort_fills(fills));
    if workers <= 1 || partitions.len() <= 1 {
        return merge(partitions.iter().map(match_partition).collect());
    }

    let chunk_size = partitions.len().div_ceil(workers);
    let outcomes: Vec<PartitionOutcome> = thread::scope(|scope| {
        let handles: Vec<_> = partitions
            .chunks(chunk_size)
            .map(|chunk| scope.spawn(move || chunk.iter().map(match_partition).collect::<Vec<_>>()))
            .collect();

        handles
            .into_iter()
            .flat_map(|handle| match handle.join() {
                Ok(outcomes) => outcomes,
                Err(panic) => std::panic::resume_unwind(panic),
            })
            .collect()
    });

    merge(outcomes)
}

/// Concatenate partition outcomes, assigning sequence-wide ids
fn merge(outcomes: Vec<PartitionOutcome>) -> MatchResult {
    let mut result = MatchResult::default();

    for outcome in outcomes {
        let trade_offset = result.set.trades.len() as u64;
        let leg_offset = result.set.legs.len() as u64;

        result.set.trades.extend(outcome.trades.into_iter().map(|mut t| {
            t.trade_id = t.trade_id.offset(trade_offset);
            t
        }));
        result.set.legs.extend(outcome.legs.into_iter().map(|mut l| {
            l.leg_id = l.leg_id.offset(leg_offset);
            l.trade_id = l.trade_id.offset(trade_offset);
            l
        }));
        result.warnings.extend(outcome.warnings);
    }

    result
}

/// Matching front end with a fixed worker count
#[derive(Debug, Clone, Copy)]
pub struct MatchingEngine {
    workers: usize,
}

impl MatchingEngine {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn run(&self, fills: &[Fill]) -> MatchResult {
        if self.workers == 1 {
            match_fills(fills)
        } else {
            match_fills_parallel(fills, self.workers)
        }
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(1)
    }
}

//! Derived trade and leg types
//!
//! Trades are round-trip positions rebuilt from fills by the matching
//! engine. They are never edited by hand: each matching pass produces a
//! complete `TradeSet` that replaces the previous one wholesale.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::TradeError;
use crate::fill::Side;
use crate::ids::{AccountId, ExternalFillId, LegId, Ticker, TradeId};
use crate::numeric::{weighted_average, Shares};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    /// Profit when price increases
    LONG,
    /// Profit when price decreases
    SHORT,
}

impl TradeDirection {
    /// Direction opened by a fill on `side`
    pub fn from_entry_side(side: Side) -> Self {
        match side {
            Side::BUY => TradeDirection::LONG,
            Side::SELL => TradeDirection::SHORT,
        }
    }

    /// Side that grows the position
    pub fn entry_side(&self) -> Side {
        match self {
            TradeDirection::LONG => Side::BUY,
            TradeDirection::SHORT => Side::SELL,
        }
    }

    /// Gross P&L of closing `shares` at `exit` against `entry`
    pub fn slice_pnl(&self, entry: Decimal, exit: Decimal, shares: Shares) -> Decimal {
        let shares = Decimal::from(shares);
        match self {
            // LONG: (exit - entry) × shares
            TradeDirection::LONG => (exit - entry) * shares,
            // SHORT: (entry - exit) × shares
            TradeDirection::SHORT => (entry - exit) * shares,
        }
    }
}

/// Trade lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    OPEN,
    /// Terminal: remaining shares reached zero
    CLOSED,
}

/// Role a fill played in a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LegType {
    /// First fill of the trade
    ENTRY,
    /// Grows the position in the trade's direction
    ADD,
    /// Partial reduction that leaves shares open
    TRIM,
    /// Reduction that brings remaining shares to zero
    EXIT,
}

impl LegType {
    /// ENTRY and ADD legs build the position
    pub fn is_entry_side(&self) -> bool {
        matches!(self, LegType::ENTRY | LegType::ADD)
    }
}

/// A contiguous, direction-consistent position in one ticker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: TradeId,
    pub account_id: AccountId,
    pub ticker: Ticker,
    pub direction: TradeDirection,
    pub status: TradeStatus,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    /// Weighted average over entry-side fills
    pub entry_price: Decimal,
    /// Weighted average over reductions, set once the trade closes
    pub exit_price: Option<Decimal>,
    /// Shares ever entered
    pub total_shares: Shares,
    pub remaining_shares: Shares,
    /// Σ TRIM/EXIT shares
    pub exit_shares: Shares,
    /// Running weighted average over TRIM/EXIT prices
    pub avg_exit_price: Decimal,
    /// Σ per-slice P&L before commission
    pub realized_gross: Decimal,
    /// Net of commission, set once the trade closes
    pub realized_pnl: Option<Decimal>,
    pub total_commission: Decimal,
}

impl Trade {
    /// Open a new trade from its ENTRY fill
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        trade_id: TradeId,
        account_id: AccountId,
        ticker: Ticker,
        direction: TradeDirection,
        entry_time: DateTime<Utc>,
        price: Decimal,
        shares: Shares,
        commission: Decimal,
    ) -> Self {
        Self {
            trade_id,
            account_id,
            ticker,
            direction,
            status: TradeStatus::OPEN,
            entry_time,
            exit_time: None,
            entry_price: price,
            exit_price: None,
            total_shares: shares,
            remaining_shares: shares,
            exit_shares: 0,
            avg_exit_price: Decimal::ZERO,
            realized_gross: Decimal::ZERO,
            realized_pnl: None,
            total_commission: commission,
        }
    }

    /// Grow the position, blending the entry price over the open shares
    pub fn add(&mut self, price: Decimal, shares: Shares, commission: Decimal) {
        self.entry_price = weighted_average(self.entry_price, self.remaining_shares, price, shares);
        self.total_shares += shares;
        self.remaining_shares += shares;
        self.total_commission += commission;
    }

    /// Reduce the position by up to `shares` at `price`.
    ///
    /// Realizes the slice against the entry price as it stands now and
    /// closes the trade when nothing remains. Returns the leg type and the
    /// number of shares actually closed.
    pub fn reduce(
        &mut self,
        at: DateTime<Utc>,
        price: Decimal,
        shares: Shares,
        commission: Decimal,
    ) -> (LegType, Shares) {
        let closed = shares.min(self.remaining_shares);

        self.realized_gross += self.direction.slice_pnl(self.entry_price, price, closed);
        self.avg_exit_price = weighted_average(self.avg_exit_price, self.exit_shares, price, closed);
        self.exit_shares += closed;
        self.remaining_shares -= closed;
        self.total_commission += commission;

        if self.remaining_shares == 0 {
            self.status = TradeStatus::CLOSED;
            self.exit_time = Some(at);
            self.exit_price = Some(self.avg_exit_price);
            self.realized_pnl = Some(self.realized_gross - self.total_commission);
            (LegType::EXIT, closed)
        } else {
            (LegType::TRIM, closed)
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.status, TradeStatus::CLOSED)
    }

    /// Signed open position: positive long, negative short
    pub fn signed_position(&self) -> i128 {
        let remaining = self.remaining_shares as i128;
        match self.direction {
            TradeDirection::LONG => remaining,
            TradeDirection::SHORT => -remaining,
        }
    }
}

/// Link between one fill and the trade it contributed to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeLeg {
    pub leg_id: LegId,
    pub trade_id: TradeId,
    pub fill_id: ExternalFillId,
    pub leg_type: LegType,
    pub shares: Shares,
    pub price: Decimal,
    /// Fill commission apportioned to this leg
    pub commission: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// Complete output of a matching pass, the unit handed to a trade store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSet {
    pub trades: Vec<Trade>,
    pub legs: Vec<TradeLeg>,
}

impl TradeSet {
    pub fn new(trades: Vec<Trade>, legs: Vec<TradeLeg>) -> Self {
        Self { trades, legs }
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty() && self.legs.is_empty()
    }

    pub fn trade(&self, trade_id: TradeId) -> Option<&Trade> {
        self.trades.iter().find(|t| t.trade_id == trade_id)
    }

    pub fn legs_for(&self, trade_id: TradeId) -> impl Iterator<Item = &TradeLeg> {
        self.legs.iter().filter(move |l| l.trade_id == trade_id)
    }

    pub fn open_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| !t.is_closed())
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_closed())
    }

    /// Restrict to one account, keeping the original order and ids
    pub fn for_account(&self, account_id: AccountId) -> TradeSet {
        let trades: Vec<Trade> = self
            .trades
            .iter()
            .filter(|t| t.account_id == account_id)
            .cloned()
            .collect();
        let legs = self
            .legs
            .iter()
            .filter(|l| trades.iter().any(|t| t.trade_id == l.trade_id))
            .cloned()
            .collect();
        TradeSet { trades, legs }
    }

    /// Verify share conservation and status consistency on every trade
    pub fn check_invariants(&self) -> Result<(), TradeError> {
        let mut sums: BTreeMap<TradeId, (Shares, Shares)> =
            self.trades.iter().map(|t| (t.trade_id, (0, 0))).collect();

        for leg in &self.legs {
            let entry = sums
                .get_mut(&leg.trade_id)
                .ok_or(TradeError::UnknownTrade { trade_id: leg.trade_id })?;
            if leg.leg_type.is_entry_side() {
                entry.0 += leg.shares;
            } else {
                entry.1 += leg.shares;
            }
        }

        for trade in &self.trades {
            let (entered, exited) = sums.get(&trade.trade_id).copied().unwrap_or((0, 0));
            if trade.total_shares != entered
                || trade.total_shares != exited + trade.remaining_shares
                || trade.exit_shares != exited
            {
                return Err(TradeError::ShareConservation {
                    trade_id: trade.trade_id,
                    total: trade.total_shares,
                    entered,
                    exited,
                    remaining: trade.remaining_shares,
                });
            }

            if trade.is_closed() != (trade.remaining_shares == 0) {
                return Err(TradeError::StatusMismatch {
                    trade_id: trade.trade_id,
                    status: format!("{:?}", trade.status),
                    remaining: trade.remaining_shares,
                });
            }

            let close_fields = [
                ("exit_time", trade.exit_time.is_some()),
                ("exit_price", trade.exit_price.is_some()),
                ("realized_pnl", trade.realized_pnl.is_some()),
            ];
            for (field, present) in close_fields {
                match (trade.is_closed(), present) {
                    (true, false) => {
                        return Err(TradeError::MissingCloseField { trade_id: trade.trade_id, field })
                    }
                    (false, true) => {
                        return Err(TradeError::PrematureCloseField { trade_id: trade.trade_id, field })
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 14, minute, 0).unwrap()
    }

    fn long_trade(price: i64, shares: Shares) -> Trade {
        Trade::open(
            TradeId::new(0),
            AccountId::new(),
            Ticker::new("AAPL"),
            TradeDirection::LONG,
            at(0),
            Decimal::from(price),
            shares,
            Decimal::ZERO,
        )
    }

    #[test]
    fn test_trade_open() {
        let trade = long_trade(10, 100);
        assert_eq!(trade.status, TradeStatus::OPEN);
        assert_eq!(trade.remaining_shares, 100);
        assert!(trade.exit_price.is_none());
        assert!(trade.realized_pnl.is_none());
        assert_eq!(trade.signed_position(), 100);
    }

    #[test]
    fn test_add_blends_entry_price() {
        let mut trade = long_trade(10, 100);
        trade.add(Decimal::from(12), 100, Decimal::ZERO);
        assert_eq!(trade.entry_price, Decimal::from(11));
        assert_eq!(trade.total_shares, 200);
    }

    #[test]
    fn test_trim_keeps_trade_open() {
        let mut trade = long_trade(10, 200);
        let (leg_type, closed) = trade.reduce(at(5), Decimal::from(15), 50, Decimal::ZERO);

        assert_eq!(leg_type, LegType::TRIM);
        assert_eq!(closed, 50);
        assert_eq!(trade.status, TradeStatus::OPEN);
        assert_eq!(trade.remaining_shares, 150);
        assert_eq!(trade.realized_gross, Decimal::from(250));
        assert_eq!(trade.avg_exit_price, Decimal::from(15));
        assert!(trade.realized_pnl.is_none());
        assert!(trade.exit_price.is_none());
        assert!(trade.exit_time.is_none());
    }

    #[test]
    fn test_exit_closes_trade_net_of_commission() {
        let mut trade = long_trade(10, 100);
        trade.total_commission = Decimal::ONE;
        let (leg_type, _) = trade.reduce(at(9), Decimal::from(12), 100, Decimal::ONE);

        assert_eq!(leg_type, LegType::EXIT);
        assert!(trade.is_closed());
        assert_eq!(trade.exit_time, Some(at(9)));
        assert_eq!(trade.exit_price, Some(Decimal::from(12)));
        assert_eq!(trade.realized_pnl, Some(Decimal::from(198)));
    }

    #[test]
    fn test_short_slice_pnl_inverted() {
        let pnl = TradeDirection::SHORT.slice_pnl(Decimal::from(20), Decimal::from(18), 50);
        assert_eq!(pnl, Decimal::from(100));
        assert_eq!(TradeDirection::from_entry_side(Side::SELL), TradeDirection::SHORT);
    }

    #[test]
    fn test_exit_price_weighted_over_reductions() {
        let mut trade = long_trade(10, 200);
        trade.reduce(at(1), Decimal::from(14), 100, Decimal::ZERO);
        assert!(trade.exit_price.is_none());
        trade.reduce(at(2), Decimal::from(16), 100, Decimal::ZERO);
        assert_eq!(trade.exit_price, Some(Decimal::from(15)));
        assert_eq!(trade.realized_pnl, Some(Decimal::from(1000)));
    }

    #[test]
    fn test_check_invariants_detects_unknown_trade() {
        let trade = long_trade(10, 100);
        let leg = TradeLeg {
            leg_id: LegId::new(0),
            trade_id: TradeId::new(9),
            fill_id: ExternalFillId::from("E1"),
            leg_type: LegType::ENTRY,
            shares: 100,
            price: Decimal::from(10),
            commission: Decimal::ZERO,
            executed_at: at(0),
        };
        let set = TradeSet::new(vec![trade], vec![leg]);
        assert_eq!(
            set.check_invariants(),
            Err(TradeError::UnknownTrade { trade_id: TradeId::new(9) })
        );
    }

    #[test]
    fn test_check_invariants_rejects_exit_price_while_open() {
        let mut trade = long_trade(10, 100);
        trade.exit_price = Some(Decimal::from(11));
        let leg = TradeLeg {
            leg_id: LegId::new(0),
            trade_id: TradeId::new(0),
            fill_id: ExternalFillId::from("E1"),
            leg_type: LegType::ENTRY,
            shares: 100,
            price: Decimal::from(10),
            commission: Decimal::ZERO,
            executed_at: at(0),
        };
        let set = TradeSet::new(vec![trade], vec![leg]);
        assert_eq!(
            set.check_invariants(),
            Err(TradeError::PrematureCloseField {
                trade_id: TradeId::new(0),
                field: "exit_price"
            })
        );
    }

    #[test]
    fn test_check_invariants_detects_missing_legs() {
        let set = TradeSet::new(vec![long_trade(10, 100)], vec![]);
        assert!(matches!(
            set.check_invariants(),
            Err(TradeError::ShareConservation { .. })
        ));
    }
}

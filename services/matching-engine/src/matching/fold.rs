//! Per-partition trade builder
//!
//! A partition's fills are reduced with `Iterator::fold` into a
//! `PartitionFold`. Each step consumes the accumulator and hands back the
//! next one; nothing is shared between partitions.
//!
//! Position rules, for the open trade's direction:
//! - no open trade: the fill opens one (ENTRY)
//! - same side as the trade: ADD, entry price re-blended
//! - opposite side: TRIM or EXIT for up to the remaining shares
//! - opposite side larger than the position: EXIT, then the surplus opens
//!   a trade in the other direction at the same fill price

use rust_decimal::Decimal;
use types::fill::Fill;
use types::ids::{LegId, TradeId};
use types::numeric::{pro_rata, Shares};
use types::trade::{LegType, Trade, TradeDirection, TradeLeg};

/// Accumulator for one partition. Ids are partition-local, starting at 0.
#[derive(Debug, Clone, Default)]
pub struct PartitionFold {
    open: Option<Trade>,
    done: Vec<Trade>,
    legs: Vec<TradeLeg>,
    opened: u64,
}

impl PartitionFold {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one validated fill
    pub fn step(mut self, fill: &Fill) -> Self {
        let shares = fill.shares();

        match self.open.take() {
            None => self.open_trade(fill, shares, fill.commission),
            Some(mut trade) if fill.side == trade.direction.entry_side() => {
                trade.add(fill.price, shares, fill.commission);
                self.push_leg(trade.trade_id, fill, LegType::ADD, shares, fill.commission);
                self.open = Some(trade);
            }
            Some(mut trade) => {
                let closing = shares.min(trade.remaining_shares);
                let surplus = shares - closing;
                // Flip fills split their commission by shares; the new
                // trade takes the exact remainder
                let close_commission = pro_rata(fill.commission, closing, shares);

                let (leg_type, closed) =
                    trade.reduce(fill.executed_at, fill.price, closing, close_commission);
                self.push_leg(trade.trade_id, fill, leg_type, closed, close_commission);

                if trade.is_closed() {
                    self.done.push(trade);
                } else {
                    self.open = Some(trade);
                }

                if surplus > 0 {
                    self.open_trade(fill, surplus, fill.commission - close_commission);
                }
            }
        }

        self
    }

    /// Signed shares currently held: positive long, negative short
    pub fn position(&self) -> i128 {
        self.open.as_ref().map_or(0, Trade::signed_position)
    }

    pub fn open_trade_ref(&self) -> Option<&Trade> {
        self.open.as_ref()
    }

    /// Trades in opening order, plus legs in fill order
    pub fn finish(mut self) -> (Vec<Trade>, Vec<TradeLeg>) {
        if let Some(trade) = self.open.take() {
            self.done.push(trade);
        }
        (self.done, self.legs)
    }

    fn open_trade(&mut self, fill: &Fill, shares: Shares, commission: Decimal) {
        let trade_id = TradeId::new(self.opened);
        self.opened += 1;

        let trade = Trade::open(
            trade_id,
            fill.account_id,
            fill.ticker.clone(),
            TradeDirection::from_entry_side(fill.side),
            fill.executed_at,
            fill.price,
            shares,
            commission,
        );
        self.push_leg(trade_id, fill, LegType::ENTRY, shares, commission);
        self.open = Some(trade);
    }

    fn push_leg(
        &mut self,
        trade_id: TradeId,
        fill: &Fill,
        leg_type: LegType,
        shares: Shares,
        commission: Decimal,
    ) {
        self.legs.push(TradeLeg {
            leg_id: LegId::new(self.legs.len() as u64),
            trade_id,
            fill_id: fill.external_id.clone(),
            leg_type,
            shares,
            price: fill.price,
            commission,
            executed_at: fill.executed_at,
        });
    }
}

//! Broker execution records
//!
//! A fill is one immutable broker confirmation. Fills are owned by the fill
//! store; the matching engine only ever reads them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::FillError;
use crate::ids::{AccountId, ExternalFillId, Ticker};
use crate::numeric::Shares;

/// Execution side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    BUY,
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }

    /// +1 for buys, -1 for sells
    pub fn sign(&self) -> i64 {
        match self {
            Side::BUY => 1,
            Side::SELL => -1,
        }
    }
}

/// Immutable execution record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub external_id: ExternalFillId,
    pub account_id: AccountId,
    pub ticker: Ticker,
    pub executed_at: DateTime<Utc>,
    pub side: Side,
    /// Signed so malformed broker rows survive parsing and reach validation
    pub quantity: i64,
    pub price: Decimal,
    #[serde(default)]
    pub commission: Decimal,
}

/// Partition key: fills in different partitions never interact
pub type PartitionKey = (AccountId, Ticker);

impl Fill {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        external_id: impl Into<ExternalFillId>,
        account_id: AccountId,
        ticker: Ticker,
        executed_at: DateTime<Utc>,
        side: Side,
        quantity: i64,
        price: Decimal,
        commission: Decimal,
    ) -> Self {
        Self {
            external_id: external_id.into(),
            account_id,
            ticker,
            executed_at,
            side,
            quantity,
            price,
            commission,
        }
    }

    /// Check the fill is usable for matching
    pub fn validate(&self) -> Result<(), FillError> {
        if self.quantity <= 0 {
            return Err(FillError::NonPositiveQuantity { quantity: self.quantity });
        }
        if self.price <= Decimal::ZERO {
            return Err(FillError::NonPositivePrice { price: self.price });
        }
        if self.commission < Decimal::ZERO {
            return Err(FillError::NegativeCommission { commission: self.commission });
        }
        Ok(())
    }

    /// Quantity as whole shares. Zero for malformed (non-positive) fills.
    pub fn shares(&self) -> Shares {
        u64::try_from(self.quantity).unwrap_or(0)
    }

    pub fn partition_key(&self) -> PartitionKey {
        (self.account_id, self.ticker.clone())
    }

    /// Total matching order: (account, ticker, executed_at, external_id)
    pub fn sort_key(&self) -> (&AccountId, &Ticker, &DateTime<Utc>, &ExternalFillId) {
        (&self.account_id, &self.ticker, &self.executed_at, &self.external_id)
    }

    /// Notional value (price × quantity)
    pub fn notional(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

//! Error types for the trading journal
//!
//! Comprehensive error taxonomy using thiserror

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ids::TradeId;

/// Top-level journal error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum JournalError {
    #[error("Fill error: {0}")]
    Fill(#[from] FillError),

    #[error("Trade error: {0}")]
    Trade(#[from] TradeError),
}

/// Reasons a fill is rejected before matching
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FillError {
    #[error("Non-positive quantity: {quantity}")]
    NonPositiveQuantity { quantity: i64 },

    #[error("Non-positive price: {price}")]
    NonPositivePrice { price: Decimal },

    #[error("Negative commission: {commission}")]
    NegativeCommission { commission: Decimal },
}

/// Invariant violations on derived trades
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("Share conservation violated on {trade_id}: total {total}, entered {entered}, exited {exited}, remaining {remaining}")]
    ShareConservation {
        trade_id: TradeId,
        total: u64,
        entered: u64,
        exited: u64,
        remaining: u64,
    },

    #[error("Status mismatch on {trade_id}: {status} with {remaining} shares remaining")]
    StatusMismatch {
        trade_id: TradeId,
        status: String,
        remaining: u64,
    },

    #[error("Leg references unknown trade {trade_id}")]
    UnknownTrade { trade_id: TradeId },

    #[error("Closed trade {trade_id} is missing {field}")]
    MissingCloseField { trade_id: TradeId, field: &'static str },

    #[error("Open trade {trade_id} already carries {field}")]
    PrematureCloseField { trade_id: TradeId, field: &'static str },
}

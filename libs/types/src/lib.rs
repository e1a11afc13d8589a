//! Types library for the trading journal
//!
//! This library provides the core type definitions shared by the matching
//! engine, the stores and the recompute orchestrator.
//!
//! # Version
//! v1.0.0
//!
//! # Modules
//! - `ids`: Identifiers (AccountId, Ticker, ExternalFillId, TradeId, LegId)
//! - `numeric`: Share counts and weighted-average helpers
//! - `fill`: Immutable broker executions
//! - `trade`: Derived trades, legs and trade sets
//! - `errors`: Error taxonomy

pub mod ids;
pub mod numeric;
pub mod fill;
pub mod trade;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::fill::*;
    pub use crate::trade::*;
    pub use crate::errors::*;
}

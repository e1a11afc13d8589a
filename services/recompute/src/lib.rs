//! Recompute Orchestrator
//!
//! Sits between the stores and the matching engine. New fills go into the
//! fill store, every affected account is rematched from all of its fills,
//! and the account's trade set is replaced in one step.
//!
//! # Modules
//! - `config`: timeouts and parallelism, with environment overrides
//! - `error`: `RecomputeError` and retry classification
//! - `recomputer`: per-account serialized recompute and the import pipeline
//! - `determinism`: double-match and idempotent-recompute checks

pub mod config;
pub mod error;
pub mod recomputer;
pub mod determinism;

pub use config::RecomputeConfig;
pub use determinism::{DeterminismVerifier, DivergenceReport};
pub use error::RecomputeError;
pub use recomputer::{ImportSummary, RecomputeReport, Recomputer};

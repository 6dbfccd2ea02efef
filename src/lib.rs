//! Autocat - a matching engine for AutoCare PCdb/VCdb catalogs
//!
//! Autocat ingests heterogeneous shop repair-order line items and vehicle
//! identifications and maps each to canonical AutoCare identifiers:
//! - Layered parts matching (exact, mapping table, interchange, fuzzy,
//!   token recall) with confidence scoring and ranked alternatives
//! - Layered vehicle matching (exact key, format variants, year
//!   tolerance, sub-model fallback, VIN year decode, fuzzy similarity)
//! - Typed failure taxonomy for unmatched inputs
//! - Batch execution with progress reporting and cancellation
//! - Per-shop knowledge-base aggregation and match-rate statistics

pub mod batch;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod knowledge;
pub mod matcher;
pub mod normalize;
pub mod stats;
pub mod types;

pub use engine::MatchingEngine;
pub use error::{Error, Result};

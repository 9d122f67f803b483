//! Event ingestion for the digichar auction reconciliation layer.
//!
//! This crate handles:
//! - Lenient normalization of raw ledger logs
//! - The session-wide, write-once event cache
//! - Per-auction activity summaries

pub mod activity;
pub mod cache;
pub mod normalizer;

pub use activity::{AuctionActivitySummary, BidderSummary};
pub use cache::{EventCache, EventLog};
pub use normalizer::{EventNormalizer, NormalizationStats};

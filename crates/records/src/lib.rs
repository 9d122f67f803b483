//! Auction record reconciliation for the digichar auction layer.
//!
//! This crate handles:
//! - The read book of resolved, absent and pending ledger reads
//! - Past-auction id windows with a per-pass cap
//! - Auction record building and the winner rule
//! - Per-user ledgers and statistics
//! - The reconciler engine driving reads through the fan-out pool

pub mod book;
pub mod builder;
pub mod cache;
pub mod engine;
pub mod user_ledger;
pub mod window;

pub use book::{Applied, BookStats, ReadBook};
pub use builder::{winner_index, AuctionRecordBuilder};
pub use cache::RecordCache;
pub use engine::{AuctionHistory, Reconciler};
pub use user_ledger::{UserHistory, UserLedgerAggregator};
pub use window::{past_ids, HistoryWindow};

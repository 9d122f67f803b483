//! Ledger access for the digichar reconciliation layer.
//!
//! This crate handles:
//! - Query descriptors for per-field ledger reads
//! - The read adapter trait and uniform query dispatch
//! - Bounded fan-out of reads across a worker pool
//! - The write boundary for bids, withdrawals and claims
//! - An in-memory ledger for tests and offline snapshots

pub mod fanout;
pub mod memory;
pub mod query;
pub mod reader;
pub mod writer;

pub use fanout::{FanOut, Resolution};
pub use memory::{AuctionSnapshot, LedgerSnapshot, MemoryLedger, PositionSnapshot};
pub use query::{LedgerQuery, LedgerValue};
pub use reader::{read, LedgerReader};
pub use writer::{submit, LedgerAction, LedgerWriter};

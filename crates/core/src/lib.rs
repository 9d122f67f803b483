//! Core types and configuration for the digichar auction reconciliation layer.
//!
//! This crate provides shared types used across all other crates:
//! - Auction, character and event types
//! - The `ReadState` tri-state for partially resolved ledger reads
//! - Configuration structures
//! - Common error types

pub mod config;
pub mod error;
pub mod read;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use read::ReadState;
pub use types::*;

//! Configuration structures for the reconciliation layer.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration for the reconciliation layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Auction id space configuration.
    pub auction: AuctionConfig,
    /// Bounded fan-out configuration.
    pub fan_out: FanOutConfig,
    /// Event log ingestion configuration.
    pub events: EventConfig,
    /// Pagination configuration.
    pub pagination: PaginationConfig,
    /// Leaderboard configuration.
    pub leaderboard: LeaderboardConfig,
}

impl Config {
    /// Parse a configuration from JSON. Missing sections take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Reject values that would make the reconciler misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.fan_out.max_auctions_per_pass == 0 {
            return Err(Error::config("fan_out.max_auctions_per_pass must be > 0"));
        }
        if self.fan_out.max_in_flight == 0 {
            return Err(Error::config("fan_out.max_in_flight must be > 0"));
        }
        if self.pagination.page_size == 0 {
            return Err(Error::config("pagination.page_size must be > 0"));
        }
        Ok(())
    }
}

/// Which auction id the ledger starts counting from.
///
/// Both conventions treat the auction at `current_id` as the open one; they
/// differ only in whether id 0 is a real auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionIdBase {
    /// Ids start at 1; past auctions are `1..current`.
    #[default]
    OneBased,
    /// Ids start at 0; past auctions are `0..current`.
    ZeroBased,
}

impl AuctionIdBase {
    /// First id that names a real auction.
    #[inline]
    pub fn first_id(self) -> u64 {
        match self {
            AuctionIdBase::OneBased => 1,
            AuctionIdBase::ZeroBased => 0,
        }
    }
}

/// Auction id space configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionConfig {
    /// Base index policy of the ledger's auction ids.
    pub id_base: AuctionIdBase,
}

impl Default for AuctionConfig {
    fn default() -> Self {
        Self {
            id_base: AuctionIdBase::OneBased,
        }
    }
}

/// Bounded fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FanOutConfig {
    /// Maximum auctions read in a single aggregation pass.
    pub max_auctions_per_pass: usize,
    /// Maximum ledger reads in flight at once.
    pub max_in_flight: usize,
}

impl Default for FanOutConfig {
    fn default() -> Self {
        Self {
            max_auctions_per_pass: 5,
            max_in_flight: 15,
        }
    }
}

/// Event log ingestion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Block to start reading logs from.
    pub from_block: u64,
    /// Ingest `TokensClaimed` logs to derive claim status.
    pub track_claims: bool,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            from_block: 0,
            track_claims: true,
        }
    }
}

/// Pagination configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    /// Items per page.
    pub page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

/// Leaderboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderboardConfig {
    /// Only rank winners whose token has been deployed.
    pub require_token_address: bool,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            require_token_address: true,
        }
    }
}

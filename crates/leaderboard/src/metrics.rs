//! Aggregate figures over auction history.

use chrono::{DateTime, Utc};
use digichar_core::{wei_to_eth, AuctionRecord, AuctionStatus, Wei, U256};
use serde::Serialize;

/// Summary of past auctions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoryMetrics {
    /// Closed auctions.
    pub completed_auctions: usize,
    /// Closed auctions with a winner.
    pub characters_created: usize,
    /// Sum of winning pool balances (wei).
    pub total_volume: Wei,
    /// `total_volume` in ETH.
    pub total_volume_eth: f64,
    /// Average winning pool balance in ETH.
    pub average_volume_eth: f64,
    /// Largest winning pool balance (wei).
    pub largest_pool: Wei,
}

impl HistoryMetrics {
    /// Compute metrics from records, judged closed relative to `now`.
    pub fn from_records(records: &[AuctionRecord], now: DateTime<Utc>) -> Self {
        let mut metrics = HistoryMetrics::default();

        for record in records {
            if record.status(now) != AuctionStatus::Closed {
                continue;
            }
            metrics.completed_auctions += 1;

            if let Some(winner) = record.winner() {
                metrics.characters_created += 1;
                metrics.total_volume = metrics.total_volume.saturating_add(winner.pool_balance);
                metrics.largest_pool = metrics.largest_pool.max(winner.pool_balance);
            }
        }

        metrics.total_volume_eth = wei_to_eth(metrics.total_volume);
        metrics.average_volume_eth = if metrics.characters_created > 0 {
            metrics.total_volume_eth / metrics.characters_created as f64
        } else {
            0.0
        };

        metrics
    }

    /// Fraction of completed auctions that produced a winner.
    pub fn winner_rate(&self) -> f64 {
        if self.completed_auctions > 0 {
            self.characters_created as f64 / self.completed_auctions as f64
        } else {
            0.0
        }
    }

    pub fn has_volume(&self) -> bool {
        self.total_volume > U256::ZERO
    }
}

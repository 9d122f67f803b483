//! Write-once cache of the normalized event log.
//!
//! The full log is fetched at most once per session. Concurrent callers of
//! [`EventCache::ingest`] share the same fetch; a failed fetch leaves the
//! cache empty so a later call can try again.

use crate::activity::AuctionActivitySummary;
use crate::normalizer::{EventNormalizer, NormalizationStats};
use digichar_core::config::EventConfig;
use digichar_core::{
    Address, AuctionId, BidEvent, ClaimEvent, EventKind, RawLog, Result, WithdrawEvent,
};
use digichar_ledger::LedgerReader;
use serde::Serialize;
use tokio::sync::OnceCell;
use tracing::{info, warn};

/// Normalized events of every kind, in ledger order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventLog {
    pub bids: Vec<BidEvent>,
    pub withdrawals: Vec<WithdrawEvent>,
    pub claims: Vec<ClaimEvent>,
    /// Whether claim events were fetched. When false, `has_claimed` always
    /// answers false.
    pub claims_tracked: bool,
    pub stats: NormalizationStats,
}

impl EventLog {
    /// Normalize raw logs. `claims` is `None` when claim events were not
    /// fetched.
    pub fn from_raw(bids: &[RawLog], withdrawals: &[RawLog], claims: Option<&[RawLog]>) -> Self {
        let mut normalizer = EventNormalizer::new();
        let bids = normalizer.bids(bids);
        let withdrawals = normalizer.withdrawals(withdrawals);
        let (claims, claims_tracked) = match claims {
            Some(logs) => (normalizer.claims(logs), true),
            None => (Vec::new(), false),
        };
        Self {
            bids,
            withdrawals,
            claims,
            claims_tracked,
            stats: normalizer.take_stats(),
        }
    }

    pub fn bids_for(&self, auction_id: AuctionId) -> impl Iterator<Item = &BidEvent> + '_ {
        self.bids.iter().filter(move |b| b.auction_id == auction_id)
    }

    pub fn withdrawals_for(
        &self,
        auction_id: AuctionId,
    ) -> impl Iterator<Item = &WithdrawEvent> + '_ {
        self.withdrawals
            .iter()
            .filter(move |w| w.auction_id == auction_id)
    }

    /// Whether `user` has a recorded claim for `auction_id`.
    pub fn has_claimed(&self, user: Address, auction_id: AuctionId) -> bool {
        self.claims
            .iter()
            .any(|c| c.user == user && c.auction_id == auction_id)
    }

    /// Activity summary of one auction.
    pub fn activity(&self, auction_id: AuctionId) -> AuctionActivitySummary {
        AuctionActivitySummary::from_events(
            auction_id,
            self.bids_for(auction_id),
            self.withdrawals_for(auction_id),
        )
    }

    /// Auction ids that appear in any bid, ascending.
    pub fn auction_ids(&self) -> Vec<AuctionId> {
        let mut ids: Vec<AuctionId> = self.bids.iter().map(|b| b.auction_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Session-wide, write-once holder of the [`EventLog`].
#[derive(Debug)]
pub struct EventCache {
    log: OnceCell<EventLog>,
    from_block: u64,
    track_claims: bool,
}

impl EventCache {
    pub fn new(config: &EventConfig) -> Self {
        Self {
            log: OnceCell::new(),
            from_block: config.from_block,
            track_claims: config.track_claims,
        }
    }

    /// The cached log, if an ingest has completed.
    pub fn get(&self) -> Option<&EventLog> {
        self.log.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.log.initialized()
    }

    /// Fetch and normalize the log, or return the cached one.
    pub async fn ingest<R: LedgerReader>(&self, reader: &R) -> Result<&EventLog> {
        self.log.get_or_try_init(|| self.fetch(reader)).await
    }

    async fn fetch<R: LedgerReader>(&self, reader: &R) -> Result<EventLog> {
        let (bids, withdrawals) = tokio::try_join!(
            reader.event_log(EventKind::BidPlaced, self.from_block),
            reader.event_log(EventKind::BidWithdrawn, self.from_block),
        )?;

        let claims = if self.track_claims {
            match reader
                .event_log(EventKind::TokensClaimed, self.from_block)
                .await
            {
                Ok(logs) => Some(logs),
                Err(err) => {
                    warn!(%err, "claim events unavailable, claim status will not be tracked");
                    None
                }
            }
        } else {
            None
        };

        let log = EventLog::from_raw(&bids, &withdrawals, claims.as_deref());
        if log.stats.logs_with_defaults > 0 {
            warn!(
                logs = log.stats.logs_with_defaults,
                fields = log.stats.defaulted_fields,
                "some event fields were missing and defaulted"
            );
        }
        info!(
            bids = log.bids.len(),
            withdrawals = log.withdrawals.len(),
            claims = log.claims.len(),
            claims_tracked = log.claims_tracked,
            "event log ingested"
        );
        Ok(log)
    }
}

//! Reconciliation engine.
//!
//! Owns the read book and drives reads through the fan-out pool. Every view it
//! hands out is derived from the book at call time, so views are always
//! consistent with the reads applied so far.

use crate::book::ReadBook;
use crate::cache::RecordCache;
use crate::user_ledger::{UserHistory, UserLedgerAggregator};
use crate::window::HistoryWindow;
use digichar_core::{Address, AuctionId, AuctionRecord, Config, ReadState, Result};
use digichar_ingestion::{AuctionActivitySummary, EventCache, EventLog};
use digichar_ledger::{FanOut, LedgerQuery, LedgerReader};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Records of one history window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuctionHistory {
    pub window: HistoryWindow,
    /// Built records, newest first.
    pub records: Vec<AuctionRecord>,
    /// Ids in the window whose record is missing or partial because reads
    /// are still pending.
    pub pending: Vec<AuctionId>,
}

impl AuctionHistory {
    pub fn is_loading(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Reconciler over a ledger reader.
pub struct Reconciler<R: LedgerReader> {
    reader: Arc<R>,
    config: Config,
    fan_out: FanOut,
    book: ReadBook,
    events: EventCache,
    records: RecordCache,
}

impl<R: LedgerReader> Reconciler<R> {
    /// Create a reconciler from configuration.
    pub fn new(reader: Arc<R>, config: Config) -> Self {
        Self {
            fan_out: FanOut::new(config.fan_out.max_in_flight),
            events: EventCache::new(&config.events),
            reader,
            config,
            book: ReadBook::new(),
            records: RecordCache::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn book(&self) -> &ReadBook {
        &self.book
    }

    pub fn identity(&self) -> Option<Address> {
        self.book.identity()
    }

    /// Dispatch a batch and apply each resolution as it lands.
    async fn run(&mut self, queries: Vec<LedgerQuery>) {
        if queries.is_empty() {
            return;
        }
        let generation = self.book.generation();
        let mut rx = self
            .fan_out
            .dispatch(Arc::clone(&self.reader), generation, queries);
        while let Some(resolution) = rx.recv().await {
            self.book.apply(resolution);
        }
    }

    /// Keep at most `max_auctions_per_pass` ids. The rest are not fetched.
    fn capped<'a>(&self, ids: &'a [AuctionId]) -> &'a [AuctionId] {
        let cap = self.config.fan_out.max_auctions_per_pass;
        if ids.len() > cap {
            debug!(requested = ids.len(), cap, "auction batch capped");
            &ids[..cap]
        } else {
            ids
        }
    }

    /// Read the id of the open auction.
    pub async fn refresh_current_id(&mut self) -> ReadState<AuctionId> {
        self.run(vec![LedgerQuery::CurrentAuctionId]).await;
        self.book.current_auction_id()
    }

    /// Switch the connected identity. Reads in flight for the previous
    /// identity are discarded when they land.
    pub fn set_identity(&mut self, identity: Option<Address>) -> bool {
        let changed = self.book.set_identity(identity);
        if changed {
            info!(?identity, "identity changed");
        }
        changed
    }

    /// Issue every record read for the capped ids in one batch. Returns the
    /// ids that were fetched.
    pub async fn load_auctions(&mut self, ids: &[AuctionId]) -> Vec<AuctionId> {
        let ids = self.capped(ids).to_vec();
        let queries = ids
            .iter()
            .flat_map(|&id| LedgerQuery::auction_reads(id))
            .collect();
        self.run(queries).await;
        ids
    }

    /// Issue the connected user's reads for the capped ids. Nothing is read
    /// without an identity.
    pub async fn load_user(&mut self, ids: &[AuctionId]) -> Vec<AuctionId> {
        let Some(user) = self.book.identity() else {
            return Vec::new();
        };
        let ids = self.capped(ids).to_vec();
        let queries = ids
            .iter()
            .flat_map(|&id| LedgerQuery::user_reads(user, id))
            .collect();
        self.run(queries).await;
        ids
    }

    /// Fetch the event log once per session.
    pub async fn ingest_events(&self) -> Result<&EventLog> {
        self.events.ingest(self.reader.as_ref()).await
    }

    /// Record of one auction.
    pub fn auction(&mut self, auction_id: AuctionId) -> ReadState<AuctionRecord> {
        self.records.get_or_build(auction_id, &self.book)
    }

    /// Record of the open auction.
    pub fn current_auction(&mut self) -> ReadState<AuctionRecord> {
        match self.book.current_auction_id() {
            ReadState::Resolved(id) => self.auction(id),
            ReadState::Absent => ReadState::Absent,
            ReadState::Pending => ReadState::Pending,
        }
    }

    /// Record of the auction before the open one.
    pub fn previous_auction(&mut self) -> ReadState<AuctionRecord> {
        let first = self.config.auction.id_base.first_id();
        match self.book.current_auction_id() {
            ReadState::Resolved(id) if id > first => self.auction(id - 1),
            ReadState::Pending => ReadState::Pending,
            _ => ReadState::Absent,
        }
    }

    /// History window `window_index` over the current id.
    pub fn window(&self, window_index: usize) -> ReadState<HistoryWindow> {
        self.book.current_auction_id().map(|current| {
            HistoryWindow::new(
                current,
                self.config.auction.id_base,
                self.config.fan_out.max_auctions_per_pass,
                window_index,
            )
        })
    }

    /// Records of a window from the reads applied so far.
    pub fn history(&mut self, window: &HistoryWindow) -> AuctionHistory {
        let mut records = Vec::with_capacity(window.ids.len());
        let mut pending = Vec::new();
        for &id in &window.ids {
            match self.auction(id) {
                ReadState::Resolved(record) => {
                    if record.is_loading() {
                        pending.push(id);
                    }
                    records.push(record);
                }
                ReadState::Pending => pending.push(id),
                ReadState::Absent => {}
            }
        }
        AuctionHistory {
            window: window.clone(),
            records,
            pending,
        }
    }

    /// Resolve the current id if needed, fetch one history window and build it.
    pub async fn sync_history(&mut self, window_index: usize) -> ReadState<AuctionHistory> {
        if self.book.current_auction_id().is_pending() {
            self.refresh_current_id().await;
        }
        let window = match self.window(window_index) {
            ReadState::Resolved(window) => window,
            ReadState::Pending => return ReadState::Pending,
            ReadState::Absent => return ReadState::Absent,
        };
        self.load_auctions(&window.ids).await;
        let history = self.history(&window);
        info!(
            window = window_index,
            records = history.records.len(),
            pending = history.pending.len(),
            has_more = window.has_more,
            "history window synced"
        );
        ReadState::Resolved(history)
    }

    /// User history over `ids` from the reads applied so far.
    pub fn user_history(&self, ids: &[AuctionId]) -> UserHistory {
        UserLedgerAggregator::aggregate(&self.book, self.capped(ids), self.events.get())
    }

    /// Fetch and derive the user's history over one window.
    pub async fn sync_user_history(&mut self, window_index: usize) -> ReadState<UserHistory> {
        if self.book.identity().is_none() {
            return ReadState::Resolved(UserHistory::disconnected());
        }
        if self.book.current_auction_id().is_pending() {
            self.refresh_current_id().await;
        }
        let window = match self.window(window_index) {
            ReadState::Resolved(window) => window,
            ReadState::Pending => return ReadState::Pending,
            ReadState::Absent => return ReadState::Absent,
        };
        self.load_user(&window.ids).await;
        ReadState::Resolved(self.user_history(&window.ids))
    }

    /// Activity summary of one auction; pending until events are ingested.
    pub fn activity(&self, auction_id: AuctionId) -> ReadState<AuctionActivitySummary> {
        match self.events.get() {
            Some(log) => ReadState::Resolved(log.activity(auction_id)),
            None => ReadState::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digichar_core::config::AuctionIdBase;
    use digichar_core::{AuctionStatus, CharacterIndex, EventKind, U256};
    use digichar_ledger::MemoryLedger;
    use std::collections::BTreeMap;

    fn reconciler(ledger: MemoryLedger) -> (Arc<MemoryLedger>, Reconciler<MemoryLedger>) {
        let ledger = Arc::new(ledger);
        let reconciler = Reconciler::new(Arc::clone(&ledger), Config::default());
        (ledger, reconciler)
    }

    fn eight_past_auctions() -> MemoryLedger {
        let mut snapshot = MemoryLedger::demo_snapshot();
        let template = snapshot.auctions[&1].clone();
        let mut auctions = BTreeMap::new();
        for id in 1..=9 {
            auctions.insert(id, template.clone());
        }
        snapshot.auctions = auctions;
        snapshot.current_auction_id = 9;
        MemoryLedger::new(snapshot)
    }

    #[tokio::test]
    async fn test_sync_history_demo() {
        let (_, mut reconciler) = reconciler(MemoryLedger::demo());
        let history = reconciler.sync_history(0).await.into_option().unwrap();

        let ids: Vec<AuctionId> = history.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
        assert!(!history.is_loading());
        assert!(!history.window.has_more);

        // 4/4/1: the first slot to reach the maximum wins.
        assert_eq!(history.records[0].winner_index, CharacterIndex::new(0));
        // No bids, no winner.
        assert_eq!(history.records[1].winner_index, None);
        assert_eq!(history.records[1].token_address, None);
        // 1/3/2
        assert_eq!(history.records[2].winner_index, CharacterIndex::new(1));
    }

    #[tokio::test]
    async fn test_history_capped_at_five() {
        let (ledger, mut reconciler) = reconciler(eight_past_auctions());
        let history = reconciler.sync_history(0).await.into_option().unwrap();

        assert_eq!(history.records.len(), 5);
        assert_eq!(history.window.ids, vec![8, 7, 6, 5, 4]);
        assert!(history.window.has_more);
        // Nothing beyond the cap was read.
        for id in 1..=3 {
            assert!(reconciler.book().end_time(id).is_pending());
        }
        assert!(ledger.peak_in_flight() <= reconciler.config().fan_out.max_in_flight);

        let older = reconciler.sync_history(1).await.into_option().unwrap();
        let ids: Vec<AuctionId> = older.records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn test_zero_based_ids_skip_missing_auction() {
        let ledger = Arc::new(MemoryLedger::demo());
        let mut config = Config::default();
        config.auction.id_base = AuctionIdBase::ZeroBased;
        let mut reconciler = Reconciler::new(ledger, config);

        let history = reconciler.sync_history(0).await.into_option().unwrap();
        assert_eq!(history.window.ids, vec![3, 2, 1, 0]);
        // Auction 0 does not exist on the ledger and is dropped.
        assert_eq!(history.records.len(), 3);
        assert!(history.pending.is_empty());
    }

    #[tokio::test]
    async fn test_current_and_previous() {
        let (_, mut reconciler) = reconciler(MemoryLedger::demo());
        assert!(reconciler.current_auction().is_pending());

        assert_eq!(reconciler.refresh_current_id().await, ReadState::Resolved(4));
        reconciler.load_auctions(&[4, 3]).await;

        let current = reconciler.current_auction().into_option().unwrap();
        assert_eq!(current.id, 4);
        assert_eq!(current.status(chrono::Utc::now()), AuctionStatus::Live);

        let previous = reconciler.previous_auction().into_option().unwrap();
        assert_eq!(previous.id, 3);
    }

    #[tokio::test]
    async fn test_transport_failure_stays_pending() {
        let ledger = MemoryLedger::demo();
        ledger.fail(LedgerQuery::AuctionEndTime { auction_id: 1 }).await;
        let (ledger, mut reconciler) = reconciler(ledger);

        reconciler.load_auctions(&[1]).await;
        assert!(reconciler.auction(1).is_pending());
        assert_eq!(reconciler.book().stats().failed, 1);

        ledger.heal(&LedgerQuery::AuctionEndTime { auction_id: 1 }).await;
        reconciler.load_auctions(&[1]).await;
        assert!(reconciler.auction(1).is_resolved());
    }

    #[tokio::test]
    async fn test_reload_with_failed_character_never_mixes_states() {
        let (ledger, mut reconciler) = reconciler(MemoryLedger::demo());
        reconciler.load_auctions(&[1]).await;
        let before = reconciler.auction(1).into_option().unwrap();
        assert_eq!(before.winner_index, CharacterIndex::new(1));

        let eth = |n: u64| U256::from(n) * U256::from(1_000_000_000_000_000_000u64);
        ledger
            .update(|snapshot| {
                if let Some(auction) = snapshot.auctions.get_mut(&1) {
                    auction.characters[0].pool_balance = eth(5);
                    auction.characters[1].pool_balance = eth(9);
                }
            })
            .await;
        let failing = LedgerQuery::Character {
            auction_id: 1,
            index: CharacterIndex::ALL[1],
        };
        ledger.fail(failing.clone()).await;

        reconciler.load_auctions(&[1]).await;
        let partial = reconciler.auction(1).into_option().unwrap();
        assert_eq!(partial.characters[0].as_ref().unwrap().pool_balance, eth(5));
        assert!(partial.characters[1].is_none());
        assert_eq!(partial.pending_slots, vec![CharacterIndex::ALL[1]]);
        assert_eq!(partial.winner_index, None);

        ledger.heal(&failing).await;
        reconciler.load_auctions(&[1]).await;
        let after = reconciler.auction(1).into_option().unwrap();
        assert_eq!(after.winner_index, CharacterIndex::new(1));
        assert_eq!(after.winner().unwrap().pool_balance, eth(9));
    }

    #[tokio::test]
    async fn test_held_character_gives_partial_record() {
        let ledger = MemoryLedger::demo();
        let held = LedgerQuery::Character {
            auction_id: 1,
            index: CharacterIndex::ALL[2],
        };
        ledger.hold(held.clone()).await;
        let (ledger, mut reconciler) = reconciler(ledger);

        reconciler.load_auctions(&[1]).await;
        let partial = reconciler.auction(1).into_option().unwrap();
        assert!(!partial.is_complete());
        assert_eq!(partial.winner_index, None);

        ledger.release(&held).await;
        reconciler.load_auctions(&[1]).await;
        let complete = reconciler.auction(1).into_option().unwrap();
        assert_eq!(complete.winner_index, CharacterIndex::new(1));
    }

    #[tokio::test]
    async fn test_user_history_for_demo_user() {
        let (_, mut reconciler) = reconciler(MemoryLedger::demo());
        reconciler.set_identity(Some(Address::repeat_byte(0x11)));
        reconciler.ingest_events().await.unwrap();

        let history = reconciler.sync_user_history(0).await.into_option().unwrap();
        let ids: Vec<AuctionId> = history.entries.iter().map(|e| e.auction_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert!(history.claims_known);
        assert_eq!(history.stats.total_claimable_tokens, U256::from(5_000_000_000_000_000_000u64));
        assert_eq!(history.stats.auctions_participated, 2);
    }

    #[tokio::test]
    async fn test_identity_change_drops_previous_user() {
        let (_, mut reconciler) = reconciler(MemoryLedger::demo());
        reconciler.set_identity(Some(Address::repeat_byte(0x11)));
        reconciler.load_user(&[3, 2, 1]).await;
        assert_eq!(reconciler.user_history(&[3, 2, 1]).entries.len(), 2);

        reconciler.set_identity(Some(Address::repeat_byte(0x22)));
        let history = reconciler.user_history(&[3, 2, 1]);
        assert!(history.entries.is_empty());
        assert_eq!(history.pending_auctions, vec![3, 2, 1]);

        reconciler.load_user(&[3, 2, 1]).await;
        let history = reconciler.user_history(&[3, 2, 1]);
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].auction_id, 1);
    }

    #[tokio::test]
    async fn test_disconnected_reads_nothing() {
        let (_, mut reconciler) = reconciler(MemoryLedger::demo());
        assert!(reconciler.load_user(&[1]).await.is_empty());
        let history = reconciler.sync_user_history(0).await.into_option().unwrap();
        assert!(!history.is_connected);
    }

    #[tokio::test]
    async fn test_activity_pending_until_ingest() {
        let (ledger, reconciler) = reconciler(MemoryLedger::demo());
        assert!(reconciler.activity(1).is_pending());

        reconciler.ingest_events().await.unwrap();
        reconciler.ingest_events().await.unwrap();
        let activity = reconciler.activity(1).into_option().unwrap();
        assert_eq!(activity.total_bids, 4);
        // Bids, withdrawals and claims fetched exactly once.
        assert_eq!(ledger.event_reads(), 3);
    }

    #[tokio::test]
    async fn test_event_failure_is_reported() {
        let ledger = MemoryLedger::demo();
        ledger.fail_events(EventKind::BidPlaced).await;
        let (_, reconciler) = reconciler(ledger);
        assert!(reconciler.ingest_events().await.is_err());
        assert!(reconciler.activity(1).is_pending());
    }
}

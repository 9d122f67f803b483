//! Command implementations.

use anyhow::{anyhow, bail, Context as _, Result};
use chrono::{DateTime, Utc};
use digichar_core::{
    wei_to_eth, Address, AuctionId, AuctionRecord, AuctionStatus, CharacterIndex, Config,
    ReadState, TxHash, U256,
};
use digichar_ingestion::{AuctionActivitySummary, BidderSummary};
use digichar_leaderboard::{
    build_leaderboard, leaderboard_volume, AuctionFilter, HistoryMetrics, LeaderboardEntry, Page,
    Paginator, WinnerFilter,
};
use digichar_ledger::{LedgerAction, MemoryLedger};
use digichar_records::{HistoryWindow, Reconciler};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Configuration and ledger shared by every command.
pub struct Context {
    config: Config,
    ledger: Arc<MemoryLedger>,
}

impl Context {
    pub fn open(config: Option<&Path>, snapshot: Option<&Path>) -> Result<Self> {
        let config = match config {
            Some(path) => Config::load(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => Config::default(),
        };
        let ledger = match snapshot {
            Some(path) => MemoryLedger::load(path)
                .with_context(|| format!("failed to load snapshot {}", path.display()))?,
            None => {
                info!("no snapshot given, using the demo ledger");
                MemoryLedger::demo()
            }
        };
        Ok(Self {
            config,
            ledger: Arc::new(ledger),
        })
    }

    fn reconciler(&self) -> Reconciler<MemoryLedger> {
        Reconciler::new(Arc::clone(&self.ledger), self.config.clone())
    }

    fn paginator(&self) -> Paginator {
        Paginator::new(self.config.pagination.page_size)
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Walk every history window and collect the built records, newest first.
async fn all_records(reconciler: &mut Reconciler<MemoryLedger>) -> Result<Vec<AuctionRecord>> {
    let mut records = Vec::new();
    let mut window_index = 0;
    loop {
        let history = match reconciler.sync_history(window_index).await {
            ReadState::Resolved(history) => history,
            ReadState::Pending => bail!("current auction id is still loading"),
            ReadState::Absent => bail!("ledger has no current auction"),
        };
        if history.is_loading() {
            warn!(pending = ?history.pending, "some auctions are still loading");
        }
        records.extend(history.records);
        match history.window.next_index() {
            Some(next) => window_index = next,
            None => break,
        }
    }
    Ok(records)
}

#[derive(Serialize)]
struct AuctionView {
    #[serde(flatten)]
    record: AuctionRecord,
    status: AuctionStatus,
    ended_at: Option<DateTime<Utc>>,
    total_pool_eth: f64,
}

impl AuctionView {
    fn new(record: AuctionRecord, now: DateTime<Utc>) -> Self {
        Self {
            status: record.status(now),
            ended_at: record.ended_at(),
            total_pool_eth: wei_to_eth(record.total_pool()),
            record,
        }
    }
}

pub async fn auction(ctx: Context, id: Option<AuctionId>) -> Result<()> {
    let mut reconciler = ctx.reconciler();
    let current = reconciler.refresh_current_id().await;
    let id = match (id, current) {
        (Some(id), _) => id,
        (None, ReadState::Resolved(current)) => current,
        (None, _) => bail!("current auction id is unavailable"),
    };

    reconciler.load_auctions(&[id]).await;
    match reconciler.auction(id) {
        ReadState::Resolved(record) => print_json(&AuctionView::new(record, Utc::now())),
        ReadState::Pending => bail!("auction {id} is still loading"),
        ReadState::Absent => bail!("auction {id} does not exist"),
    }
}

#[derive(Serialize)]
struct HistoryView {
    window: HistoryWindow,
    pending: Vec<AuctionId>,
    page: Page<AuctionRecord>,
}

pub async fn history(
    ctx: Context,
    window: usize,
    page: usize,
    search: Option<String>,
    winner: WinnerFilter,
) -> Result<()> {
    let mut reconciler = ctx.reconciler();
    let history = match reconciler.sync_history(window).await {
        ReadState::Resolved(history) => history,
        ReadState::Pending => bail!("current auction id is still loading"),
        ReadState::Absent => bail!("ledger has no current auction"),
    };

    let filtered = AuctionFilter::new(winner, search).apply(&history.records);
    print_json(&HistoryView {
        page: ctx.paginator().paginate(&filtered, page),
        window: history.window,
        pending: history.pending,
    })
}

pub async fn user(ctx: Context, user: Option<String>, window: usize) -> Result<()> {
    let user = match user {
        Some(raw) => Address::from_str(raw.trim())
            .map_err(|err| anyhow!("invalid address {raw}: {err}"))?,
        None => ctx.ledger.snapshot().await.caller,
    };

    let mut reconciler = ctx.reconciler();
    reconciler.set_identity(Some(user));
    if let Err(err) = reconciler.ingest_events().await {
        warn!(%err, "event log unavailable, claim status unknown");
    }

    match reconciler.sync_user_history(window).await {
        ReadState::Resolved(history) => print_json(&history),
        ReadState::Pending => bail!("current auction id is still loading"),
        ReadState::Absent => bail!("ledger has no current auction"),
    }
}

#[derive(Serialize)]
struct LeaderboardView {
    total_volume_eth: f64,
    page: Page<LeaderboardEntry>,
}

pub async fn leaderboard(ctx: Context, page: usize) -> Result<()> {
    let mut reconciler = ctx.reconciler();
    let records = all_records(&mut reconciler).await?;
    let entries = build_leaderboard(
        &records,
        ctx.config.leaderboard.require_token_address,
        Utc::now(),
    );

    print_json(&LeaderboardView {
        total_volume_eth: wei_to_eth(leaderboard_volume(&entries)),
        page: ctx.paginator().paginate(&entries, page),
    })
}

pub async fn metrics(ctx: Context) -> Result<()> {
    let mut reconciler = ctx.reconciler();
    let records = all_records(&mut reconciler).await?;
    print_json(&HistoryMetrics::from_records(&records, Utc::now()))
}

#[derive(Serialize)]
struct ActivityView {
    #[serde(flatten)]
    summary: AuctionActivitySummary,
    average_bid: U256,
    total_withdrawn: U256,
    top_bidders: Vec<BidderSummary>,
}

pub async fn activity(ctx: Context, id: AuctionId, top: usize) -> Result<()> {
    let reconciler = ctx.reconciler();
    let log = reconciler
        .ingest_events()
        .await
        .context("failed to read the event log")?;
    let summary = log.activity(id);

    print_json(&ActivityView {
        average_bid: summary.average_bid(),
        total_withdrawn: summary.total_withdrawn(),
        top_bidders: summary.top_bidders(top),
        summary,
    })
}

fn parse_index(index: u8) -> Result<CharacterIndex> {
    CharacterIndex::new(index).ok_or_else(|| anyhow!("character index must be 0, 1 or 2, got {index}"))
}

fn parse_wei(raw: &str) -> Result<U256> {
    U256::from_str(raw.trim()).map_err(|err| anyhow!("invalid amount {raw}: {err}"))
}

pub fn bid_action(index: u8, value: &str) -> Result<LedgerAction> {
    Ok(LedgerAction::Bid {
        index: parse_index(index)?,
        value: parse_wei(value)?,
    })
}

pub fn withdraw_action(auction_id: AuctionId, index: u8, amount: &str) -> Result<LedgerAction> {
    Ok(LedgerAction::Withdraw {
        auction_id,
        index: parse_index(index)?,
        amount: parse_wei(amount)?,
    })
}

pub fn claim_action(auction_id: AuctionId) -> LedgerAction {
    LedgerAction::Claim { auction_id }
}

#[derive(Serialize)]
struct SubmitView {
    action: LedgerAction,
    tx_hash: TxHash,
}

pub async fn submit(ctx: Context, action: LedgerAction, save: Option<PathBuf>) -> Result<()> {
    let tx_hash = digichar_ledger::submit(ctx.ledger.as_ref(), action.clone()).await?;

    if let Some(path) = save {
        let snapshot = ctx.ledger.snapshot().await;
        std::fs::write(&path, serde_json::to_string_pretty(&snapshot)?)
            .with_context(|| format!("failed to write snapshot {}", path.display()))?;
        info!(path = %path.display(), "snapshot saved");
    }

    print_json(&SubmitView { action, tx_hash })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bid_action_parses_hex_and_decimal() {
        let decimal = bid_action(1, "1000").unwrap();
        let hex = bid_action(1, "0x3e8").unwrap();
        assert_eq!(decimal, hex);
    }

    #[test]
    fn test_bad_index_rejected() {
        assert!(bid_action(3, "1").is_err());
        assert!(withdraw_action(1, 7, "1").is_err());
    }

    #[test]
    fn test_bad_amount_rejected() {
        assert!(bid_action(0, "one eth").is_err());
    }

    #[tokio::test]
    async fn test_all_records_walks_every_window() {
        let ctx = Context::open(None, None).unwrap();
        let mut reconciler = ctx.reconciler();
        let records = all_records(&mut reconciler).await.unwrap();
        let ids: Vec<AuctionId> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    fn demo_snapshot_context() -> Context {
        let ledger =
            MemoryLedger::from_json_str(include_str!("../../../demos/snapshot.json")).unwrap();
        Context {
            config: Config::default(),
            ledger: Arc::new(ledger),
        }
    }

    #[tokio::test]
    async fn test_demo_snapshot_leaderboard() {
        let ctx = demo_snapshot_context();
        let mut reconciler = ctx.reconciler();
        let records = all_records(&mut reconciler).await.unwrap();
        assert_eq!(records.len(), 6);

        let board = build_leaderboard(&records, true, Utc::now());
        let ids: Vec<AuctionId> = board.iter().map(|e| e.auction_id).collect();
        // 6 and 1 tie at 3 ETH and keep newest-first order.
        assert_eq!(ids, vec![5, 3, 6, 1, 4]);
    }

    #[tokio::test]
    async fn test_demo_snapshot_user_history() {
        let ctx = demo_snapshot_context();
        let mut reconciler = ctx.reconciler();
        reconciler.set_identity(Some(Address::repeat_byte(0x11)));
        let log = reconciler.ingest_events().await.unwrap();
        assert_eq!(log.bids.len(), 8);
        // One bid log carries no amount.
        assert_eq!(log.stats.logs_with_defaults, 1);

        let history = reconciler.sync_user_history(0).await.into_option().unwrap();
        let ids: Vec<AuctionId> = history.entries.iter().map(|e| e.auction_id).collect();
        assert_eq!(ids, vec![6, 5]);
        assert!(history.entries[0].has_claimed_tokens);
        assert!(!history.entries[1].has_claimed_tokens);
    }
}

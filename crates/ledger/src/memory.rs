//! In-memory auction ledger.
//!
//! Serves reads and writes from a `LedgerSnapshot`, which can be loaded from a
//! JSON file. Individual queries can be held pending or made to fail, and the
//! ledger records the peak number of reads it served concurrently.

use crate::query::LedgerQuery;
use crate::reader::LedgerReader;
use crate::writer::LedgerWriter;
use alloy_primitives::hex;
use chrono::Utc;
use digichar_core::{
    Address, AuctionId, Character, CharacterIndex, Error, EventKind, RawLog, ReadState, Result,
    TxHash, UnixSeconds, Wei, CHARACTER_SLOTS, U256,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Complete state of an in-memory ledger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Id of the open auction.
    pub current_auction_id: AuctionId,
    /// Auctions by id.
    #[serde(default)]
    pub auctions: BTreeMap<AuctionId, AuctionSnapshot>,
    /// Per-user balances.
    #[serde(default)]
    pub positions: Vec<PositionSnapshot>,
    /// Event log in emission order.
    #[serde(default)]
    pub logs: Vec<RawLog>,
    /// Last block produced.
    #[serde(default)]
    pub block_number: u64,
    /// Account that signs writes.
    #[serde(default)]
    pub caller: Address,
}

/// One auction held by the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionSnapshot {
    /// Characters in slot order.
    pub characters: Vec<Character>,
    /// End time (unix seconds, 0 when not started).
    pub end_time: UnixSeconds,
    /// Winner token, zero until deployed.
    #[serde(default)]
    pub token_address: Address,
}

/// A user's balances in one auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub user: Address,
    pub auction_id: AuctionId,
    /// Bid balance per character slot.
    #[serde(default)]
    pub bids: [Wei; CHARACTER_SLOTS],
    /// Tokens still claimable.
    #[serde(default)]
    pub unclaimed: Wei,
}

/// Ledger serving reads and writes from memory.
pub struct MemoryLedger {
    state: RwLock<LedgerSnapshot>,
    held: RwLock<HashSet<LedgerQuery>>,
    failing: RwLock<HashSet<LedgerQuery>>,
    failing_events: RwLock<HashSet<EventKind>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    event_reads: AtomicUsize,
}

impl MemoryLedger {
    /// Create a ledger from a snapshot.
    pub fn new(snapshot: LedgerSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            held: RwLock::new(HashSet::new()),
            failing: RwLock::new(HashSet::new()),
            failing_events: RwLock::new(HashSet::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            event_reads: AtomicUsize::new(0),
        }
    }

    /// Parse a JSON snapshot.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let snapshot: LedgerSnapshot = serde_json::from_str(json)?;
        if let Some((id, auction)) = snapshot
            .auctions
            .iter()
            .find(|(_, auction)| auction.characters.len() > CHARACTER_SLOTS)
        {
            return Err(Error::data(format!(
                "auction {id} has {} characters, at most {CHARACTER_SLOTS} allowed",
                auction.characters.len()
            )));
        }
        Ok(Self::new(snapshot))
    }

    /// Load a JSON snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().await.clone()
    }

    /// Mutate the state in place.
    pub async fn update(&self, f: impl FnOnce(&mut LedgerSnapshot)) {
        let mut state = self.state.write().await;
        f(&mut state);
    }

    /// Set the account that signs writes.
    pub async fn set_caller(&self, caller: Address) {
        self.state.write().await.caller = caller;
    }

    /// Keep answering `Pending` for a query until released.
    pub async fn hold(&self, query: LedgerQuery) {
        self.held.write().await.insert(query);
    }

    pub async fn release(&self, query: &LedgerQuery) {
        self.held.write().await.remove(query);
    }

    /// Fail a query with a transport error until healed.
    pub async fn fail(&self, query: LedgerQuery) {
        self.failing.write().await.insert(query);
    }

    pub async fn heal(&self, query: &LedgerQuery) {
        self.failing.write().await.remove(query);
    }

    /// Fail event log reads of one kind.
    pub async fn fail_events(&self, kind: EventKind) {
        self.failing_events.write().await.insert(kind);
    }

    pub async fn heal_events(&self, kind: EventKind) {
        self.failing_events.write().await.remove(&kind);
    }

    /// Highest number of reads served at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    /// Number of event log reads served.
    pub fn event_reads(&self) -> usize {
        self.event_reads.load(Ordering::SeqCst)
    }

    async fn answer<T>(
        &self,
        query: LedgerQuery,
        f: impl FnOnce(&LedgerSnapshot) -> ReadState<T> + Send,
    ) -> Result<ReadState<T>> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        // Let other reads start so concurrency is observable.
        tokio::task::yield_now().await;

        let outcome = if self.failing.read().await.contains(&query) {
            Err(Error::ledger(format!("{query} failed")))
        } else if self.held.read().await.contains(&query) {
            Ok(ReadState::Pending)
        } else {
            let state = self.state.read().await;
            Ok(f(&state))
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        debug!(%query, ok = outcome.is_ok(), "memory ledger read");
        outcome
    }

    /// A small ledger with three closed auctions and one open auction.
    pub fn demo() -> Self {
        Self::new(Self::demo_snapshot())
    }

    /// State behind [`MemoryLedger::demo`].
    ///
    /// Auction 1: pools 1/3/2 ETH, token deployed. Auction 2: no bids.
    /// Auction 3: pools 4/4/1 ETH, token deployed. Auction 4 is open.
    /// `0x1111…` bid on auctions 1 and 3 and can claim 5 tokens from 1.
    pub fn demo_snapshot() -> LedgerSnapshot {
        let eth = |n: u64| U256::from(n) * U256::from(1_000_000_000_000_000_000u64);
        let character = |name: &str, symbol: &str, pool: U256| Character {
            uri: format!("ipfs://{symbol}"),
            name: name.to_string(),
            symbol: symbol.to_string(),
            pool_balance: pool,
            is_winner: false,
        };
        let auction = |pools: [U256; 3], end_time: UnixSeconds, token: Address| AuctionSnapshot {
            characters: vec![
                character("Ember", "EMB", pools[0]),
                character("Tide", "TID", pools[1]),
                character("Gale", "GAL", pools[2]),
            ],
            end_time,
            token_address: token,
        };

        let alice = Address::repeat_byte(0x11);
        let bob = Address::repeat_byte(0x22);

        let mut auctions = BTreeMap::new();
        auctions.insert(1, auction([eth(1), eth(3), eth(2)], 1_700_000_000, Address::repeat_byte(0xa1)));
        auctions.insert(2, auction([U256::ZERO; 3], 1_700_086_400, Address::ZERO));
        auctions.insert(3, auction([eth(4), eth(4), eth(1)], 1_700_172_800, Address::repeat_byte(0xa3)));
        auctions.insert(4, auction([U256::ZERO; 3], 4_102_444_800, Address::ZERO));

        let positions = vec![
            PositionSnapshot {
                user: alice,
                auction_id: 1,
                bids: [U256::ZERO, eth(1), U256::ZERO],
                unclaimed: eth(5),
            },
            PositionSnapshot {
                user: alice,
                auction_id: 3,
                bids: [eth(2), U256::ZERO, U256::ZERO],
                unclaimed: U256::ZERO,
            },
            PositionSnapshot {
                user: bob,
                auction_id: 1,
                bids: [eth(1), eth(2), eth(2)],
                unclaimed: U256::ZERO,
            },
        ];

        let mut snapshot = LedgerSnapshot {
            current_auction_id: 4,
            auctions,
            positions,
            logs: Vec::new(),
            block_number: 100,
            caller: alice,
        };
        push_bid_log(&mut snapshot, alice, 1, 1, eth(1), 1_699_990_000);
        push_bid_log(&mut snapshot, bob, 1, 0, eth(1), 1_699_990_100);
        push_bid_log(&mut snapshot, bob, 1, 1, eth(2), 1_699_990_200);
        push_bid_log(&mut snapshot, bob, 1, 2, eth(2), 1_699_990_300);
        push_bid_log(&mut snapshot, alice, 3, 0, eth(2), 1_700_170_000);

        snapshot
    }
}

fn position_mut(
    state: &mut LedgerSnapshot,
    user: Address,
    auction_id: AuctionId,
) -> &mut PositionSnapshot {
    let found = state
        .positions
        .iter()
        .position(|p| p.user == user && p.auction_id == auction_id);
    let index = match found {
        Some(index) => index,
        None => {
            state.positions.push(PositionSnapshot {
                user,
                auction_id,
                bids: [U256::ZERO; CHARACTER_SLOTS],
                unclaimed: U256::ZERO,
            });
            state.positions.len() - 1
        }
    };
    &mut state.positions[index]
}

fn position(state: &LedgerSnapshot, user: Address, auction_id: AuctionId) -> Option<&PositionSnapshot> {
    state
        .positions
        .iter()
        .find(|p| p.user == user && p.auction_id == auction_id)
}

fn next_block(state: &mut LedgerSnapshot) -> (u64, TxHash) {
    state.block_number += 1;
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&state.block_number.to_be_bytes());
    (state.block_number, TxHash::from(bytes))
}

fn push_log(state: &mut LedgerSnapshot, kind: EventKind, args: Value, timestamp: UnixSeconds) -> TxHash {
    let (block, tx_hash) = next_block(state);
    let args = match args {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    state.logs.push(RawLog {
        event: kind.name().to_string(),
        args,
        block_number: Some(block),
        block_timestamp: Some(timestamp),
        transaction_hash: Some(hex::encode_prefixed(tx_hash)),
    });
    tx_hash
}

fn push_bid_log(
    state: &mut LedgerSnapshot,
    user: Address,
    auction_id: AuctionId,
    index: u8,
    amount: Wei,
    timestamp: UnixSeconds,
) -> TxHash {
    let args = json!({
        "_user": user.to_checksum(None),
        "_auctionId": auction_id.to_string(),
        "_characterId": index,
        "_amount": amount.to_string(),
    });
    push_log(state, EventKind::BidPlaced, args, timestamp)
}

fn now_seconds() -> UnixSeconds {
    u64::try_from(Utc::now().timestamp()).unwrap_or(0)
}

impl LedgerReader for MemoryLedger {
    async fn current_auction_id(&self) -> Result<ReadState<AuctionId>> {
        self.answer(LedgerQuery::CurrentAuctionId, |s| {
            ReadState::Resolved(s.current_auction_id)
        })
        .await
    }

    async fn auction_end_time(&self, auction_id: AuctionId) -> Result<ReadState<UnixSeconds>> {
        self.answer(LedgerQuery::AuctionEndTime { auction_id }, move |s| {
            s.auctions.get(&auction_id).map(|a| a.end_time).into()
        })
        .await
    }

    async fn token_address(&self, auction_id: AuctionId) -> Result<ReadState<Address>> {
        self.answer(LedgerQuery::TokenAddress { auction_id }, move |s| {
            s.auctions.get(&auction_id).map(|a| a.token_address).into()
        })
        .await
    }

    async fn character(
        &self,
        auction_id: AuctionId,
        index: CharacterIndex,
    ) -> Result<ReadState<Character>> {
        self.answer(LedgerQuery::Character { auction_id, index }, move |s| {
            s.auctions
                .get(&auction_id)
                .and_then(|a| a.characters.get(index.as_usize()))
                .cloned()
                .into()
        })
        .await
    }

    async fn user_bid_balance(
        &self,
        user: Address,
        auction_id: AuctionId,
        index: CharacterIndex,
    ) -> Result<ReadState<Wei>> {
        let query = LedgerQuery::UserBidBalance {
            user,
            auction_id,
            index,
        };
        self.answer(query, move |s| {
            if !s.auctions.contains_key(&auction_id) {
                return ReadState::Absent;
            }
            let balance = position(s, user, auction_id)
                .map(|p| p.bids[index.as_usize()])
                .unwrap_or(U256::ZERO);
            ReadState::Resolved(balance)
        })
        .await
    }

    async fn unclaimed_tokens(&self, user: Address, auction_id: AuctionId) -> Result<ReadState<Wei>> {
        self.answer(LedgerQuery::UnclaimedTokens { user, auction_id }, move |s| {
            if !s.auctions.contains_key(&auction_id) {
                return ReadState::Absent;
            }
            let unclaimed = position(s, user, auction_id)
                .map(|p| p.unclaimed)
                .unwrap_or(U256::ZERO);
            ReadState::Resolved(unclaimed)
        })
        .await
    }

    async fn event_log(&self, kind: EventKind, from_block: u64) -> Result<Vec<RawLog>> {
        self.event_reads.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.failing_events.read().await.contains(&kind) {
            return Err(Error::event(format!("{kind} log unavailable")));
        }
        let state = self.state.read().await;
        Ok(state
            .logs
            .iter()
            .filter(|log| log.event == kind.name())
            .filter(|log| log.block_number.unwrap_or(0) >= from_block)
            .cloned()
            .collect())
    }
}

impl LedgerWriter for MemoryLedger {
    async fn submit_bid(&self, index: CharacterIndex, value: Wei) -> Result<TxHash> {
        let mut state = self.state.write().await;
        let auction_id = state.current_auction_id;
        let caller = state.caller;
        let now = now_seconds();

        let auction = state
            .auctions
            .get_mut(&auction_id)
            .ok_or_else(|| Error::write(format!("auction {auction_id} does not exist")))?;
        if auction.end_time != 0 && now >= auction.end_time {
            return Err(Error::write(format!("auction {auction_id} has closed")));
        }
        let character = auction
            .characters
            .get_mut(index.as_usize())
            .ok_or_else(|| Error::write(format!("auction {auction_id} has no character {index}")))?;
        character.pool_balance = character.pool_balance.saturating_add(value);

        let position = position_mut(&mut state, caller, auction_id);
        position.bids[index.as_usize()] = position.bids[index.as_usize()].saturating_add(value);

        Ok(push_bid_log(&mut state, caller, auction_id, index.get(), value, now))
    }

    async fn submit_withdraw(
        &self,
        auction_id: AuctionId,
        index: CharacterIndex,
        amount: Wei,
    ) -> Result<TxHash> {
        let mut state = self.state.write().await;
        let caller = state.caller;

        let balance = position(&state, caller, auction_id)
            .map(|p| p.bids[index.as_usize()])
            .unwrap_or(U256::ZERO);
        if balance < amount {
            return Err(Error::write(format!(
                "insufficient bid balance on character {index} of auction {auction_id}"
            )));
        }

        position_mut(&mut state, caller, auction_id).bids[index.as_usize()] = balance - amount;
        if let Some(character) = state
            .auctions
            .get_mut(&auction_id)
            .and_then(|a| a.characters.get_mut(index.as_usize()))
        {
            character.pool_balance = character.pool_balance.saturating_sub(amount);
        }

        let args = json!({
            "user": caller.to_checksum(None),
            "_auctionId": auction_id.to_string(),
            "_withdrawAmount": amount.to_string(),
        });
        Ok(push_log(&mut state, EventKind::BidWithdrawn, args, now_seconds()))
    }

    async fn submit_claim(&self, auction_id: AuctionId) -> Result<TxHash> {
        let mut state = self.state.write().await;
        let caller = state.caller;

        let unclaimed = position(&state, caller, auction_id)
            .map(|p| p.unclaimed)
            .unwrap_or(U256::ZERO);
        if unclaimed.is_zero() {
            return Err(Error::write(format!("nothing to claim from auction {auction_id}")));
        }
        position_mut(&mut state, caller, auction_id).unclaimed = U256::ZERO;

        let args = json!({
            "_user": caller.to_checksum(None),
            "_auctionId": auction_id.to_string(),
            "_amount": unclaimed.to_string(),
        });
        Ok(push_log(&mut state, EventKind::TokensClaimed, args, now_seconds()))
    }
}

//! Core data types for the digichar reconciliation layer.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use alloy_primitives::{Address, B256, U256};

/// Auction identifier as assigned by the ledger.
pub type AuctionId = u64;

/// Timestamp in seconds since Unix epoch (UTC).
pub type UnixSeconds = u64;

/// Amount in wei.
pub type Wei = U256;

/// Transaction hash.
pub type TxHash = B256;

/// Number of character slots in every auction.
pub const CHARACTER_SLOTS: usize = 3;

/// Wei per ETH.
pub const WEI_PER_ETH: f64 = 1e18;

/// Convert a wei amount to ETH for display.
///
/// Precision is that of an `f64`; use the `U256` value for anything that
/// feeds back into comparisons.
pub fn wei_to_eth(amount: Wei) -> f64 {
    amount.to_string().parse::<f64>().unwrap_or(f64::MAX) / WEI_PER_ETH
}

/// Slot index of a character within an auction (0, 1 or 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct CharacterIndex(u8);

impl CharacterIndex {
    /// All slots in index order.
    pub const ALL: [CharacterIndex; CHARACTER_SLOTS] =
        [CharacterIndex(0), CharacterIndex(1), CharacterIndex(2)];

    /// Create an index, rejecting slots outside `0..3`.
    pub fn new(index: u8) -> Option<Self> {
        ((index as usize) < CHARACTER_SLOTS).then_some(CharacterIndex(index))
    }

    #[inline]
    pub fn get(self) -> u8 {
        self.0
    }

    #[inline]
    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl TryFrom<u8> for CharacterIndex {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        CharacterIndex::new(value).ok_or_else(|| format!("character index {value} out of range"))
    }
}

impl From<CharacterIndex> for u8 {
    fn from(index: CharacterIndex) -> Self {
        index.0
    }
}

impl fmt::Display for CharacterIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A character competing in an auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Character {
    /// Metadata URI (IPFS hash or URL).
    pub uri: String,
    /// Display name.
    pub name: String,
    /// Token symbol.
    pub symbol: String,
    /// Cumulative ETH bid on this character, net of withdrawals.
    pub pool_balance: Wei,
    /// Whether this character won its auction.
    pub is_winner: bool,
}

/// Lifecycle state of an auction relative to a wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    /// The ledger reports no end time.
    Inactive,
    /// Bidding is open.
    Live,
    /// The end time has passed.
    Closed,
}

/// One auction reconstructed from ledger reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    /// Auction id.
    pub id: AuctionId,
    /// Characters in slot order. `None` when the slot is unresolved: either
    /// still pending (listed in `pending_slots`) or absent on the ledger.
    pub characters: [Option<Character>; CHARACTER_SLOTS],
    /// Unresolved slots whose read has not settled yet. Slots that are `None`
    /// and not listed here are absent and stay empty.
    #[serde(default)]
    pub pending_slots: Vec<CharacterIndex>,
    /// End time (unix seconds).
    pub end_time: UnixSeconds,
    /// Winning slot, set only when every slot resolved and a strict non-zero
    /// maximum exists.
    pub winner_index: Option<CharacterIndex>,
    /// Winner token address, once deployed.
    pub token_address: Option<Address>,
}

impl AuctionRecord {
    /// Whether all character slots have resolved.
    pub fn is_complete(&self) -> bool {
        self.characters.iter().all(Option::is_some)
    }

    /// Whether some slot may still resolve.
    pub fn is_loading(&self) -> bool {
        !self.pending_slots.is_empty()
    }

    /// The winning character, if any.
    pub fn winner(&self) -> Option<&Character> {
        self.winner_index
            .and_then(|index| self.characters[index.as_usize()].as_ref())
    }

    /// Character at a slot, if resolved.
    pub fn character(&self, index: CharacterIndex) -> Option<&Character> {
        self.characters[index.as_usize()].as_ref()
    }

    /// Sum of all resolved pool balances.
    pub fn total_pool(&self) -> Wei {
        self.characters
            .iter()
            .flatten()
            .fold(U256::ZERO, |sum, c| sum.saturating_add(c.pool_balance))
    }

    /// End time as a UTC datetime.
    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.end_time).ok()?;
        Utc.timestamp_opt(secs, 0).single()
    }

    /// Status relative to `now`.
    pub fn status(&self, now: DateTime<Utc>) -> AuctionStatus {
        if self.end_time == 0 {
            return AuctionStatus::Inactive;
        }
        match self.ended_at() {
            Some(end) if now < end => AuctionStatus::Live,
            Some(_) => AuctionStatus::Closed,
            // Past the range chrono can represent; still running.
            None => AuctionStatus::Live,
        }
    }
}

/// Ledger event kinds the reconciliation layer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    BidPlaced,
    BidWithdrawn,
    TokensClaimed,
}

impl EventKind {
    /// Event name as emitted by the ledger.
    pub fn name(self) -> &'static str {
        match self {
            EventKind::BidPlaced => "BidPlaced",
            EventKind::BidWithdrawn => "BidWithdrawn",
            EventKind::TokensClaimed => "TokensClaimed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A raw log entry as returned by the ledger event interface.
///
/// Every field except the event name may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLog {
    /// Event name.
    pub event: String,
    /// Decoded event arguments keyed by parameter name.
    #[serde(default)]
    pub args: serde_json::Map<String, serde_json::Value>,
    /// Block number.
    #[serde(default)]
    pub block_number: Option<u64>,
    /// Block timestamp (unix seconds).
    #[serde(default)]
    pub block_timestamp: Option<UnixSeconds>,
    /// Transaction hash as a hex string.
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

/// A bid placed on a character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidEvent {
    pub bidder: Address,
    pub auction_id: AuctionId,
    pub character_index: CharacterIndex,
    pub amount: Wei,
    pub timestamp: UnixSeconds,
    pub block_number: u64,
    pub tx_hash: TxHash,
}

/// A bid withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawEvent {
    pub user: Address,
    pub auction_id: AuctionId,
    pub amount: Wei,
    pub timestamp: UnixSeconds,
    pub block_number: u64,
    pub tx_hash: TxHash,
}

/// A token claim on a closed auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimEvent {
    pub user: Address,
    pub auction_id: AuctionId,
    pub amount: Wei,
    pub timestamp: UnixSeconds,
    pub block_number: u64,
    pub tx_hash: TxHash,
}

/// A user's current balance on one character.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterBid {
    pub character_index: CharacterIndex,
    pub bid_amount: Wei,
}

/// A user's involvement in one auction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAuctionLedger {
    /// Auction id.
    pub auction_id: AuctionId,
    /// Nonzero bid balances in slot order.
    pub character_bids: Vec<CharacterBid>,
    /// Tokens the user can still claim.
    pub claimable_tokens: Wei,
    /// Whether a claim event exists for this user and auction.
    pub has_claimed_tokens: bool,
}

impl UserAuctionLedger {
    /// Sum of the user's bid balances in this auction.
    pub fn total_bid(&self) -> Wei {
        self.character_bids
            .iter()
            .fold(U256::ZERO, |sum, bid| sum.saturating_add(bid.bid_amount))
    }
}

/// Summary statistics over a user's auction ledgers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    /// Number of nonzero character positions across all auctions.
    pub total_bids: usize,
    /// Sum of all bid balances.
    pub total_bid_amount: Wei,
    /// Sum of all claimable tokens.
    pub total_claimable_tokens: Wei,
    /// Auctions with unclaimed tokens that have not been claimed yet.
    pub auctions_with_claimable_tokens: usize,
    /// Auctions the user took part in.
    pub auctions_participated: usize,
}

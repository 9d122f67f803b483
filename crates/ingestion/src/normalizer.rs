//! Lenient normalization of raw ledger logs into typed events.
//!
//! The ledger does not guarantee every argument is populated in every log.
//! A missing or unparsable field takes its neutral value (zero amount, zero
//! address, slot 0, timestamp 0) instead of failing the log; each coercion is
//! counted and logged at debug level.

use digichar_core::{
    Address, AuctionId, BidEvent, CharacterIndex, ClaimEvent, EventKind, RawLog, TxHash,
    WithdrawEvent, Wei, U256,
};
use serde::Serialize;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

const USER_KEYS: &[&str] = &["_user", "user"];
const AUCTION_KEYS: &[&str] = &["_auctionId", "auctionId"];
const CHARACTER_KEYS: &[&str] = &["_characterId", "characterId"];
const AMOUNT_KEYS: &[&str] = &["_amount", "amount"];
const WITHDRAW_AMOUNT_KEYS: &[&str] = &["_withdrawAmount", "withdrawAmount", "_amount"];

/// Statistics about normalization quality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizationStats {
    /// Logs seen.
    pub total_logs: u64,
    /// Bid events produced.
    pub bid_events: u64,
    /// Withdraw events produced.
    pub withdraw_events: u64,
    /// Claim events produced.
    pub claim_events: u64,
    /// Logs dropped because they named a different event.
    pub skipped_logs: u64,
    /// Logs where at least one field was defaulted.
    pub logs_with_defaults: u64,
    /// Individual fields defaulted.
    pub defaulted_fields: u64,
}

impl NormalizationStats {
    /// Fraction of logs that needed at least one default.
    pub fn defaulted_frac(&self) -> f64 {
        if self.total_logs > 0 {
            self.logs_with_defaults as f64 / self.total_logs as f64
        } else {
            0.0
        }
    }

    /// Reset statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Reads typed fields out of one log, counting the ones it had to default.
struct FieldReader<'a> {
    log: &'a RawLog,
    defaulted: u64,
}

impl<'a> FieldReader<'a> {
    fn new(log: &'a RawLog) -> Self {
        Self { log, defaulted: 0 }
    }

    fn lookup(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter()
            .filter_map(|key| self.log.args.get(*key))
            .find(|value| !value.is_null())
    }

    fn defaulted<T>(&mut self, field: &str, fallback: T) -> T {
        self.defaulted += 1;
        debug!(event = %self.log.event, field, "log field missing or malformed, defaulted");
        fallback
    }

    fn address(&mut self, keys: &[&str]) -> Address {
        let parsed = self
            .lookup(keys)
            .and_then(Value::as_str)
            .and_then(|s| Address::from_str(s.trim()).ok());
        match parsed {
            Some(address) => address,
            None => self.defaulted(keys[0], Address::ZERO),
        }
    }

    fn amount(&mut self, keys: &[&str]) -> Wei {
        match self.lookup(keys).and_then(parse_u256) {
            Some(amount) => amount,
            None => self.defaulted(keys[0], U256::ZERO),
        }
    }

    fn auction_id(&mut self) -> AuctionId {
        let parsed = self
            .lookup(AUCTION_KEYS)
            .and_then(parse_u256)
            .and_then(|id| u64::try_from(id).ok());
        match parsed {
            Some(id) => id,
            None => self.defaulted(AUCTION_KEYS[0], 0),
        }
    }

    fn character_index(&mut self) -> CharacterIndex {
        let parsed = self
            .lookup(CHARACTER_KEYS)
            .and_then(parse_u256)
            .and_then(|index| u8::try_from(index).ok())
            .and_then(CharacterIndex::new);
        match parsed {
            Some(index) => index,
            None => self.defaulted(CHARACTER_KEYS[0], CharacterIndex::ALL[0]),
        }
    }

    fn timestamp(&mut self) -> u64 {
        match self.log.block_timestamp {
            Some(ts) => ts,
            None => self.defaulted("blockTimestamp", 0),
        }
    }

    fn block_number(&mut self) -> u64 {
        match self.log.block_number {
            Some(block) => block,
            None => self.defaulted("blockNumber", 0),
        }
    }

    fn tx_hash(&mut self) -> TxHash {
        let parsed = self
            .log
            .transaction_hash
            .as_deref()
            .and_then(|s| TxHash::from_str(s.trim()).ok());
        match parsed {
            Some(hash) => hash,
            None => self.defaulted("transactionHash", TxHash::ZERO),
        }
    }
}

/// Parse a JSON number, decimal string or `0x` hex string.
fn parse_u256(value: &Value) -> Option<U256> {
    match value {
        // Integer digits are kept verbatim, so amounts above u64 survive.
        Value::Number(n) => U256::from_str(&n.to_string()).ok(),
        Value::String(s) => U256::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Converts raw logs into typed events.
#[derive(Debug, Default)]
pub struct EventNormalizer {
    stats: NormalizationStats,
}

impl EventNormalizer {
    /// Create a new normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, reader: &FieldReader<'_>) {
        self.stats.total_logs += 1;
        if reader.defaulted > 0 {
            self.stats.logs_with_defaults += 1;
            self.stats.defaulted_fields += reader.defaulted;
        }
    }

    /// Normalize a `BidPlaced` log.
    pub fn bid(&mut self, log: &RawLog) -> BidEvent {
        let mut fields = FieldReader::new(log);
        let event = BidEvent {
            bidder: fields.address(USER_KEYS),
            auction_id: fields.auction_id(),
            character_index: fields.character_index(),
            amount: fields.amount(AMOUNT_KEYS),
            timestamp: fields.timestamp(),
            block_number: fields.block_number(),
            tx_hash: fields.tx_hash(),
        };
        self.record(&fields);
        self.stats.bid_events += 1;
        event
    }

    /// Normalize a `BidWithdrawn` log.
    pub fn withdraw(&mut self, log: &RawLog) -> WithdrawEvent {
        let mut fields = FieldReader::new(log);
        let event = WithdrawEvent {
            user: fields.address(USER_KEYS),
            auction_id: fields.auction_id(),
            amount: fields.amount(WITHDRAW_AMOUNT_KEYS),
            timestamp: fields.timestamp(),
            block_number: fields.block_number(),
            tx_hash: fields.tx_hash(),
        };
        self.record(&fields);
        self.stats.withdraw_events += 1;
        event
    }

    /// Normalize a `TokensClaimed` log.
    pub fn claim(&mut self, log: &RawLog) -> ClaimEvent {
        let mut fields = FieldReader::new(log);
        let event = ClaimEvent {
            user: fields.address(USER_KEYS),
            auction_id: fields.auction_id(),
            amount: fields.amount(AMOUNT_KEYS),
            timestamp: fields.timestamp(),
            block_number: fields.block_number(),
            tx_hash: fields.tx_hash(),
        };
        self.record(&fields);
        self.stats.claim_events += 1;
        event
    }

    /// Whether a log belongs to the expected kind. Logs without a name are
    /// accepted; logs naming another event are counted and skipped.
    fn accepts(&mut self, kind: EventKind, log: &RawLog) -> bool {
        if log.event.is_empty() || log.event == kind.name() {
            return true;
        }
        self.stats.skipped_logs += 1;
        debug!(expected = %kind, found = %log.event, "skipping log of another event");
        false
    }

    /// Normalize a batch of `BidPlaced` logs, preserving order.
    pub fn bids(&mut self, logs: &[RawLog]) -> Vec<BidEvent> {
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if self.accepts(EventKind::BidPlaced, log) {
                events.push(self.bid(log));
            }
        }
        events
    }

    /// Normalize a batch of `BidWithdrawn` logs, preserving order.
    pub fn withdrawals(&mut self, logs: &[RawLog]) -> Vec<WithdrawEvent> {
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if self.accepts(EventKind::BidWithdrawn, log) {
                events.push(self.withdraw(log));
            }
        }
        events
    }

    /// Normalize a batch of `TokensClaimed` logs, preserving order.
    pub fn claims(&mut self, logs: &[RawLog]) -> Vec<ClaimEvent> {
        let mut events = Vec::with_capacity(logs.len());
        for log in logs {
            if self.accepts(EventKind::TokensClaimed, log) {
                events.push(self.claim(log));
            }
        }
        events
    }

    /// Get normalization statistics.
    pub fn stats(&self) -> &NormalizationStats {
        &self.stats
    }

    /// Take the statistics, leaving them reset.
    pub fn take_stats(&mut self) -> NormalizationStats {
        std::mem::take(&mut self.stats)
    }
}

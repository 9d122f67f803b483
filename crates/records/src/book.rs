//! Resolved state of every ledger read issued so far.
//!
//! The book is the single input of every derivation. Resolutions are applied
//! as they arrive; user-scoped resolutions dispatched under an older identity
//! generation are dropped so a previous user's balances never leak into the
//! current view.

use digichar_core::{
    Address, AuctionId, Character, CharacterIndex, ReadState, UnixSeconds, Wei,
};
use digichar_ledger::{LedgerQuery, LedgerValue, Resolution};
use serde::Serialize;
use std::collections::HashMap;
use tracing::{debug, warn};

/// What happened to one resolution handed to [`ReadBook::apply`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Stored in the book.
    Stored,
    /// Dropped: dispatched under a superseded identity.
    Stale,
    /// Transport failure; the read is reset to pending.
    Failed,
    /// The value did not have the shape the query returns.
    Mismatched,
}

/// Counters over applied resolutions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BookStats {
    pub stored: u64,
    pub stale: u64,
    pub failed: u64,
    pub mismatched: u64,
}

/// Store of read outcomes keyed by query.
#[derive(Debug, Default)]
pub struct ReadBook {
    entries: HashMap<LedgerQuery, ReadState<LedgerValue>>,
    identity: Option<Address>,
    generation: u64,
    revisions: HashMap<AuctionId, u64>,
    stats: BookStats,
}

impl ReadBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Connected identity, if any.
    #[inline]
    pub fn identity(&self) -> Option<Address> {
        self.identity
    }

    /// Generation user-scoped reads must be dispatched under to be accepted.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn stats(&self) -> &BookStats {
        &self.stats
    }

    /// Switch the connected identity.
    ///
    /// A change bumps the generation and forgets every user-scoped entry.
    /// Returns whether the identity changed.
    pub fn set_identity(&mut self, identity: Option<Address>) -> bool {
        if self.identity == identity {
            return false;
        }
        self.identity = identity;
        self.generation += 1;
        self.entries.retain(|query, _| !query.is_user_scoped());
        debug!(
            generation = self.generation,
            connected = identity.is_some(),
            "identity changed, user reads reset"
        );
        true
    }

    /// Apply one resolution from the fan-out pool.
    pub fn apply(&mut self, resolution: Resolution) -> Applied {
        let Resolution {
            generation,
            query,
            outcome,
        } = resolution;

        if query.is_user_scoped()
            && (generation != self.generation || query.user() != self.identity)
        {
            self.stats.stale += 1;
            debug!(%query, generation, current = self.generation, "discarding stale read");
            return Applied::Stale;
        }

        let state = match outcome {
            Ok(state) => state,
            Err(err) => {
                // Replaces any earlier answer so a reload never mixes states.
                self.stats.failed += 1;
                warn!(%query, %err, "ledger read failed, marking it pending");
                self.insert(query, ReadState::Pending);
                return Applied::Failed;
            }
        };

        if let ReadState::Resolved(value) = &state {
            if !value.matches(&query) {
                self.stats.mismatched += 1;
                warn!(%query, ?value, "ledger returned a value of the wrong shape");
                return Applied::Mismatched;
            }
        }

        self.insert(query, state);
        self.stats.stored += 1;
        Applied::Stored
    }

    /// Record an outcome directly.
    pub fn insert(&mut self, query: LedgerQuery, state: ReadState<LedgerValue>) {
        if let Some(auction_id) = query.auction_id() {
            *self.revisions.entry(auction_id).or_insert(0) += 1;
        }
        self.entries.insert(query, state);
    }

    /// Number of outcomes applied for an auction. Changes whenever any read
    /// scoped to the auction changes.
    pub fn revision(&self, auction_id: AuctionId) -> u64 {
        self.revisions.get(&auction_id).copied().unwrap_or(0)
    }

    /// Raw outcome of a query; `Pending` when never answered.
    pub fn get(&self, query: &LedgerQuery) -> ReadState<&LedgerValue> {
        self.entries
            .get(query)
            .map_or(ReadState::Pending, ReadState::as_ref)
    }

    fn typed<T>(
        &self,
        query: &LedgerQuery,
        extract: impl FnOnce(&LedgerValue) -> Option<T>,
    ) -> ReadState<T> {
        match self.get(query) {
            ReadState::Pending => ReadState::Pending,
            ReadState::Absent => ReadState::Absent,
            ReadState::Resolved(value) => extract(value).map_or(ReadState::Pending, ReadState::Resolved),
        }
    }

    pub fn current_auction_id(&self) -> ReadState<AuctionId> {
        self.typed(&LedgerQuery::CurrentAuctionId, |v| match v {
            LedgerValue::AuctionId(id) => Some(*id),
            _ => None,
        })
    }

    pub fn end_time(&self, auction_id: AuctionId) -> ReadState<UnixSeconds> {
        self.typed(&LedgerQuery::AuctionEndTime { auction_id }, |v| match v {
            LedgerValue::Timestamp(ts) => Some(*ts),
            _ => None,
        })
    }

    pub fn token_address(&self, auction_id: AuctionId) -> ReadState<Address> {
        self.typed(&LedgerQuery::TokenAddress { auction_id }, |v| match v {
            LedgerValue::Address(address) => Some(*address),
            _ => None,
        })
    }

    pub fn character(&self, auction_id: AuctionId, index: CharacterIndex) -> ReadState<Character> {
        self.typed(&LedgerQuery::Character { auction_id, index }, |v| match v {
            LedgerValue::Character(character) => Some(character.clone()),
            _ => None,
        })
    }

    pub fn bid_balance(
        &self,
        user: Address,
        auction_id: AuctionId,
        index: CharacterIndex,
    ) -> ReadState<Wei> {
        let query = LedgerQuery::UserBidBalance {
            user,
            auction_id,
            index,
        };
        self.typed(&query, amount)
    }

    pub fn unclaimed_tokens(&self, user: Address, auction_id: AuctionId) -> ReadState<Wei> {
        self.typed(&LedgerQuery::UnclaimedTokens { user, auction_id }, amount)
    }

    /// Whether every read needed for the auction's record has an outcome.
    pub fn is_auction_settled(&self, auction_id: AuctionId) -> bool {
        LedgerQuery::auction_reads(auction_id)
            .iter()
            .all(|query| self.get(query).is_settled())
    }
}

fn amount(value: &LedgerValue) -> Option<Wei> {
    match value {
        LedgerValue::Amount(amount) => Some(*amount),
        _ => None,
    }
}

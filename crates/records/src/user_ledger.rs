//! Per-user auction ledgers and summary statistics.
//!
//! Ledgers are rebuilt from the read book on every call. Nothing accumulates
//! between calls, so recomputing from the same reads yields the same history.

use crate::book::ReadBook;
use digichar_core::{
    Address, AuctionId, CharacterBid, CharacterIndex, ReadState, UserAuctionLedger, UserStats,
    U256,
};
use digichar_ingestion::EventLog;
use serde::Serialize;

/// A user's auction history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserHistory {
    /// Auctions the user took part in, in the order requested.
    pub entries: Vec<UserAuctionLedger>,
    /// Folded over `entries`.
    pub stats: UserStats,
    /// Auctions whose user reads have not all resolved.
    pub pending_auctions: Vec<AuctionId>,
    pub is_connected: bool,
    /// Whether `has_claimed_tokens` reflects claim events. When false the
    /// flag is always false.
    pub claims_known: bool,
}

impl UserHistory {
    /// History of a session with no identity.
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Whether some requested auction is still loading.
    pub fn is_loading(&self) -> bool {
        !self.pending_auctions.is_empty()
    }
}

/// Derives [`UserHistory`] from user-scoped reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct UserLedgerAggregator;

impl UserLedgerAggregator {
    /// Ledger of one auction.
    ///
    /// `Pending` while any of the four reads is pending. `Resolved(None)` when
    /// the user holds no bid and nothing to claim. Absent reads count as zero.
    pub fn ledger_for(
        book: &ReadBook,
        user: Address,
        auction_id: AuctionId,
        events: Option<&EventLog>,
    ) -> ReadState<Option<UserAuctionLedger>> {
        let mut character_bids = Vec::new();
        for index in CharacterIndex::ALL {
            let Some(bid_amount) = book.bid_balance(user, auction_id, index).settled_or(U256::ZERO)
            else {
                return ReadState::Pending;
            };
            if !bid_amount.is_zero() {
                character_bids.push(CharacterBid {
                    character_index: index,
                    bid_amount,
                });
            }
        }
        let Some(claimable_tokens) = book.unclaimed_tokens(user, auction_id).settled_or(U256::ZERO)
        else {
            return ReadState::Pending;
        };

        if character_bids.is_empty() && claimable_tokens.is_zero() {
            return ReadState::Resolved(None);
        }

        let has_claimed_tokens = events.map_or(false, |log| log.has_claimed(user, auction_id));
        ReadState::Resolved(Some(UserAuctionLedger {
            auction_id,
            character_bids,
            claimable_tokens,
            has_claimed_tokens,
        }))
    }

    /// History of the book's identity over `auction_ids`.
    pub fn aggregate(
        book: &ReadBook,
        auction_ids: &[AuctionId],
        events: Option<&EventLog>,
    ) -> UserHistory {
        let Some(user) = book.identity() else {
            return UserHistory::disconnected();
        };

        let mut entries = Vec::new();
        let mut pending_auctions = Vec::new();
        for &auction_id in auction_ids {
            match Self::ledger_for(book, user, auction_id, events) {
                ReadState::Resolved(Some(ledger)) => entries.push(ledger),
                ReadState::Pending => pending_auctions.push(auction_id),
                _ => {}
            }
        }

        UserHistory {
            stats: Self::stats(&entries),
            entries,
            pending_auctions,
            is_connected: true,
            claims_known: events.map_or(false, |log| log.claims_tracked),
        }
    }

    /// Fold statistics over included ledgers.
    pub fn stats(entries: &[UserAuctionLedger]) -> UserStats {
        entries.iter().fold(UserStats::default(), |mut stats, ledger| {
            stats.total_bids += ledger.character_bids.len();
            stats.total_bid_amount = stats.total_bid_amount.saturating_add(ledger.total_bid());
            stats.total_claimable_tokens = stats
                .total_claimable_tokens
                .saturating_add(ledger.claimable_tokens);
            if !ledger.claimable_tokens.is_zero() && !ledger.has_claimed_tokens {
                stats.auctions_with_claimable_tokens += 1;
            }
            stats.auctions_participated += 1;
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digichar_core::{RawLog, Wei};
    use digichar_ledger::{LedgerQuery, LedgerValue};
    use serde_json::json;

    fn alice() -> Address {
        Address::repeat_byte(0x11)
    }

    fn connected() -> ReadBook {
        let mut book = ReadBook::new();
        book.set_identity(Some(alice()));
        book
    }

    fn resolve_user(book: &mut ReadBook, auction_id: AuctionId, bids: [u64; 3], unclaimed: u64) {
        for (index, bid) in CharacterIndex::ALL.into_iter().zip(bids) {
            book.insert(
                LedgerQuery::UserBidBalance {
                    user: alice(),
                    auction_id,
                    index,
                },
                ReadState::Resolved(LedgerValue::Amount(U256::from(bid))),
            );
        }
        book.insert(
            LedgerQuery::UnclaimedTokens {
                user: alice(),
                auction_id,
            },
            ReadState::Resolved(LedgerValue::Amount(U256::from(unclaimed))),
        );
    }

    fn wei(n: u64) -> Wei {
        U256::from(n)
    }

    #[test]
    fn test_disconnected_history_is_empty() {
        let book = ReadBook::new();
        let history = UserLedgerAggregator::aggregate(&book, &[1, 2], None);
        assert!(!history.is_connected);
        assert!(history.entries.is_empty());
        assert_eq!(history.stats, UserStats::default());
    }

    #[test]
    fn test_uninvolved_auction_omitted() {
        let mut book = connected();
        resolve_user(&mut book, 1, [0, 0, 0], 0);
        resolve_user(&mut book, 2, [0, 3, 0], 0);

        let history = UserLedgerAggregator::aggregate(&book, &[2, 1], None);
        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].auction_id, 2);
        assert!(history.pending_auctions.is_empty());
    }

    #[test]
    fn test_claimable_only_included() {
        let mut book = connected();
        resolve_user(&mut book, 1, [0, 0, 0], 9);

        let history = UserLedgerAggregator::aggregate(&book, &[1], None);
        assert_eq!(history.entries.len(), 1);
        assert!(history.entries[0].character_bids.is_empty());
        assert_eq!(history.stats.auctions_with_claimable_tokens, 1);
    }

    #[test]
    fn test_pending_read_keeps_auction_pending() {
        let mut book = connected();
        resolve_user(&mut book, 1, [1, 0, 0], 0);
        book.insert(
            LedgerQuery::UserBidBalance {
                user: alice(),
                auction_id: 1,
                index: CharacterIndex::ALL[2],
            },
            ReadState::Pending,
        );

        let history = UserLedgerAggregator::aggregate(&book, &[1], None);
        assert!(history.entries.is_empty());
        assert_eq!(history.pending_auctions, vec![1]);
        assert!(history.is_loading());
    }

    #[test]
    fn test_absent_reads_count_as_zero() {
        let mut book = connected();
        for query in LedgerQuery::user_reads(alice(), 4) {
            book.insert(query, ReadState::Absent);
        }
        let history = UserLedgerAggregator::aggregate(&book, &[4], None);
        assert!(history.entries.is_empty());
        assert!(history.pending_auctions.is_empty());
    }

    #[test]
    fn test_stats_fold() {
        let mut book = connected();
        resolve_user(&mut book, 1, [1, 2, 0], 5);
        resolve_user(&mut book, 2, [0, 0, 4], 0);

        let history = UserLedgerAggregator::aggregate(&book, &[1, 2], None);
        let stats = &history.stats;
        assert_eq!(stats.total_bids, 3);
        assert_eq!(stats.total_bid_amount, wei(7));
        assert_eq!(stats.total_claimable_tokens, wei(5));
        assert_eq!(stats.auctions_with_claimable_tokens, 1);
        assert_eq!(stats.auctions_participated, 2);
    }

    #[test]
    fn test_recompute_is_idempotent() {
        let mut book = connected();
        resolve_user(&mut book, 1, [1, 2, 0], 5);

        let first = UserLedgerAggregator::aggregate(&book, &[1], None);
        let second = UserLedgerAggregator::aggregate(&book, &[1], None);
        assert_eq!(first, second);
        assert_eq!(second.stats.total_bid_amount, wei(3));
    }

    #[test]
    fn test_claim_events_drive_has_claimed() {
        let mut book = connected();
        resolve_user(&mut book, 1, [1, 0, 0], 5);

        let args = match json!({ "_user": alice().to_checksum(None), "_auctionId": 1, "_amount": "5" }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        };
        let claim = RawLog {
            event: "TokensClaimed".to_string(),
            args,
            ..RawLog::default()
        };
        let events = EventLog::from_raw(&[], &[], Some(&[claim]));

        let history = UserLedgerAggregator::aggregate(&book, &[1], Some(&events));
        assert!(history.claims_known);
        assert!(history.entries[0].has_claimed_tokens);
        // Claimed tokens no longer count as waiting to be claimed.
        assert_eq!(history.stats.auctions_with_claimable_tokens, 0);

        let unknown = UserLedgerAggregator::aggregate(&book, &[1], None);
        assert!(!unknown.claims_known);
        assert!(!unknown.entries[0].has_claimed_tokens);
    }
}

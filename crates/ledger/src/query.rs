//! Query descriptors and typed values for ledger reads.

use digichar_core::{Address, AuctionId, Character, CharacterIndex, UnixSeconds, Wei};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single bounded-arity read against the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerQuery {
    /// Id of the currently open auction.
    CurrentAuctionId,
    /// End time of an auction.
    AuctionEndTime { auction_id: AuctionId },
    /// Token deployed for an auction's winner.
    TokenAddress { auction_id: AuctionId },
    /// One character slot of an auction.
    Character {
        auction_id: AuctionId,
        index: CharacterIndex,
    },
    /// A user's bid balance on one character.
    UserBidBalance {
        user: Address,
        auction_id: AuctionId,
        index: CharacterIndex,
    },
    /// Tokens a user can still claim from an auction.
    UnclaimedTokens { user: Address, auction_id: AuctionId },
}

impl LedgerQuery {
    /// Auction the query is scoped to.
    pub fn auction_id(&self) -> Option<AuctionId> {
        match self {
            LedgerQuery::CurrentAuctionId => None,
            LedgerQuery::AuctionEndTime { auction_id }
            | LedgerQuery::TokenAddress { auction_id }
            | LedgerQuery::Character { auction_id, .. }
            | LedgerQuery::UserBidBalance { auction_id, .. }
            | LedgerQuery::UnclaimedTokens { auction_id, .. } => Some(*auction_id),
        }
    }

    /// User the query is scoped to.
    pub fn user(&self) -> Option<Address> {
        match self {
            LedgerQuery::UserBidBalance { user, .. } | LedgerQuery::UnclaimedTokens { user, .. } => {
                Some(*user)
            }
            _ => None,
        }
    }

    #[inline]
    pub fn is_user_scoped(&self) -> bool {
        self.user().is_some()
    }

    /// Ledger function backing the query.
    pub fn field_name(&self) -> &'static str {
        match self {
            LedgerQuery::CurrentAuctionId => "auctionId",
            LedgerQuery::AuctionEndTime { .. } => "getAuctionEndTime",
            LedgerQuery::TokenAddress { .. } => "getCharacterTokenAddress",
            LedgerQuery::Character { .. } => "getAuctionCharacterData",
            LedgerQuery::UserBidBalance { .. } => "getUserBidBalance",
            LedgerQuery::UnclaimedTokens { .. } => "checkUnclaimedTokens",
        }
    }

    /// Every per-auction read needed to build one record.
    pub fn auction_reads(auction_id: AuctionId) -> Vec<LedgerQuery> {
        let mut queries: Vec<LedgerQuery> = CharacterIndex::ALL
            .iter()
            .map(|&index| LedgerQuery::Character { auction_id, index })
            .collect();
        queries.push(LedgerQuery::AuctionEndTime { auction_id });
        queries.push(LedgerQuery::TokenAddress { auction_id });
        queries
    }

    /// Every user-scoped read needed for one auction's ledger.
    pub fn user_reads(user: Address, auction_id: AuctionId) -> Vec<LedgerQuery> {
        let mut queries: Vec<LedgerQuery> = CharacterIndex::ALL
            .iter()
            .map(|&index| LedgerQuery::UserBidBalance {
                user,
                auction_id,
                index,
            })
            .collect();
        queries.push(LedgerQuery::UnclaimedTokens { user, auction_id });
        queries
    }
}

impl fmt::Display for LedgerQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerQuery::CurrentAuctionId => write!(f, "auctionId()"),
            LedgerQuery::AuctionEndTime { auction_id } | LedgerQuery::TokenAddress { auction_id } => {
                write!(f, "{}({auction_id})", self.field_name())
            }
            LedgerQuery::Character { auction_id, index } => {
                write!(f, "{}({auction_id}, {index})", self.field_name())
            }
            LedgerQuery::UserBidBalance {
                user,
                auction_id,
                index,
            } => write!(f, "{}({user}, {auction_id}, {index})", self.field_name()),
            LedgerQuery::UnclaimedTokens { user, auction_id } => {
                write!(f, "{}({user}, {auction_id})", self.field_name())
            }
        }
    }
}

/// Typed value returned for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum LedgerValue {
    AuctionId(AuctionId),
    Timestamp(UnixSeconds),
    Address(Address),
    Character(Character),
    Amount(Wei),
}

impl LedgerValue {
    /// Whether this value has the shape the query returns.
    pub fn matches(&self, query: &LedgerQuery) -> bool {
        matches!(
            (query, self),
            (LedgerQuery::CurrentAuctionId, LedgerValue::AuctionId(_))
                | (LedgerQuery::AuctionEndTime { .. }, LedgerValue::Timestamp(_))
                | (LedgerQuery::TokenAddress { .. }, LedgerValue::Address(_))
                | (LedgerQuery::Character { .. }, LedgerValue::Character(_))
                | (LedgerQuery::UserBidBalance { .. }, LedgerValue::Amount(_))
                | (LedgerQuery::UnclaimedTokens { .. }, LedgerValue::Amount(_))
        )
    }
}

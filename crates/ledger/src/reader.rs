//! Read adapter over the external ledger.
//!
//! Each operation returns `Ok(ReadState)`: `Pending` when the ledger has not
//! produced the value yet, `Absent` when it refused the call (for example an
//! out-of-range auction id), `Resolved` otherwise. `Err` is reserved for
//! transport failures, which callers treat as still pending.

use crate::query::{LedgerQuery, LedgerValue};
use digichar_core::{
    Address, AuctionId, Character, CharacterIndex, EventKind, RawLog, ReadState, Result,
    UnixSeconds, Wei,
};
use std::future::Future;

/// Per-field read surface of the auction ledger.
pub trait LedgerReader: Send + Sync + 'static {
    /// Id of the currently open auction.
    fn current_auction_id(&self) -> impl Future<Output = Result<ReadState<AuctionId>>> + Send;

    /// End time of an auction.
    fn auction_end_time(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<ReadState<UnixSeconds>>> + Send;

    /// Token address of an auction's winner. The zero address means no
    /// token has been deployed.
    fn token_address(
        &self,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<ReadState<Address>>> + Send;

    /// One character slot.
    fn character(
        &self,
        auction_id: AuctionId,
        index: CharacterIndex,
    ) -> impl Future<Output = Result<ReadState<Character>>> + Send;

    /// A user's bid balance on one character.
    fn user_bid_balance(
        &self,
        user: Address,
        auction_id: AuctionId,
        index: CharacterIndex,
    ) -> impl Future<Output = Result<ReadState<Wei>>> + Send;

    /// Tokens a user can still claim from an auction.
    fn unclaimed_tokens(
        &self,
        user: Address,
        auction_id: AuctionId,
    ) -> impl Future<Output = Result<ReadState<Wei>>> + Send;

    /// Full log of one event kind from `from_block` onwards, in ledger order.
    fn event_log(
        &self,
        kind: EventKind,
        from_block: u64,
    ) -> impl Future<Output = Result<Vec<RawLog>>> + Send;
}

/// Issue any query through the matching per-field operation.
pub async fn read<R: LedgerReader>(
    reader: &R,
    query: &LedgerQuery,
) -> Result<ReadState<LedgerValue>> {
    let state = match *query {
        LedgerQuery::CurrentAuctionId => reader
            .current_auction_id()
            .await?
            .map(LedgerValue::AuctionId),
        LedgerQuery::AuctionEndTime { auction_id } => reader
            .auction_end_time(auction_id)
            .await?
            .map(LedgerValue::Timestamp),
        LedgerQuery::TokenAddress { auction_id } => reader
            .token_address(auction_id)
            .await?
            .map(LedgerValue::Address),
        LedgerQuery::Character { auction_id, index } => reader
            .character(auction_id, index)
            .await?
            .map(LedgerValue::Character),
        LedgerQuery::UserBidBalance {
            user,
            auction_id,
            index,
        } => reader
            .user_bid_balance(user, auction_id, index)
            .await?
            .map(LedgerValue::Amount),
        LedgerQuery::UnclaimedTokens { user, auction_id } => reader
            .unclaimed_tokens(user, auction_id)
            .await?
            .map(LedgerValue::Amount),
    };
    Ok(state)
}

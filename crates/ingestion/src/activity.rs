//! Per-auction activity summaries built from the event log.

use digichar_core::{Address, AuctionId, BidEvent, CharacterIndex, WithdrawEvent, Wei, U256};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Aggregate bidding figures for one bidder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BidderSummary {
    pub bidder: Address,
    pub bid_count: usize,
    pub total_amount: Wei,
}

/// Everything the event log says about one auction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuctionActivitySummary {
    pub auction_id: AuctionId,
    /// Bids in log order.
    pub bids: Vec<BidEvent>,
    /// Withdrawals in log order.
    pub withdrawals: Vec<WithdrawEvent>,
    /// Bids grouped by character, each group ordered by timestamp.
    pub bids_by_character: BTreeMap<CharacterIndex, Vec<BidEvent>>,
    /// Distinct bidder addresses.
    pub unique_bidders: BTreeSet<Address>,
    /// Number of bids.
    pub total_bids: usize,
    /// Sum of bid amounts.
    pub total_volume: Wei,
}

impl AuctionActivitySummary {
    /// Build a summary from events already filtered to `auction_id`.
    pub fn from_events<'a>(
        auction_id: AuctionId,
        bids: impl IntoIterator<Item = &'a BidEvent>,
        withdrawals: impl IntoIterator<Item = &'a WithdrawEvent>,
    ) -> Self {
        let bids: Vec<BidEvent> = bids.into_iter().cloned().collect();
        let withdrawals: Vec<WithdrawEvent> = withdrawals.into_iter().cloned().collect();

        let mut bids_by_character: BTreeMap<CharacterIndex, Vec<BidEvent>> = BTreeMap::new();
        let mut unique_bidders = BTreeSet::new();
        let mut total_volume = U256::ZERO;

        for bid in &bids {
            bids_by_character
                .entry(bid.character_index)
                .or_default()
                .push(bid.clone());
            unique_bidders.insert(bid.bidder);
            total_volume = total_volume.saturating_add(bid.amount);
        }
        for group in bids_by_character.values_mut() {
            group.sort_by_key(|bid| bid.timestamp);
        }

        Self {
            auction_id,
            total_bids: bids.len(),
            bids,
            withdrawals,
            bids_by_character,
            unique_bidders,
            total_volume,
        }
    }

    /// Mean bid amount, zero when there were no bids.
    pub fn average_bid(&self) -> Wei {
        if self.total_bids == 0 {
            return U256::ZERO;
        }
        self.total_volume / U256::from(self.total_bids)
    }

    /// Sum of withdrawn amounts.
    pub fn total_withdrawn(&self) -> Wei {
        self.withdrawals
            .iter()
            .fold(U256::ZERO, |acc, w| acc.saturating_add(w.amount))
    }

    /// Number of bids placed on one character.
    pub fn bids_on(&self, index: CharacterIndex) -> usize {
        self.bids_by_character.get(&index).map_or(0, Vec::len)
    }

    /// The `n` largest bidders by total amount. Ties keep first-bid order.
    pub fn top_bidders(&self, n: usize) -> Vec<BidderSummary> {
        let mut order: Vec<Address> = Vec::new();
        let mut totals: HashMap<Address, (usize, Wei)> = HashMap::new();

        for bid in &self.bids {
            let entry = totals.entry(bid.bidder).or_insert_with(|| {
                order.push(bid.bidder);
                (0, U256::ZERO)
            });
            entry.0 += 1;
            entry.1 = entry.1.saturating_add(bid.amount);
        }

        let mut summaries: Vec<BidderSummary> = order
            .into_iter()
            .filter_map(|bidder| {
                totals.get(&bidder).map(|&(bid_count, total_amount)| BidderSummary {
                    bidder,
                    bid_count,
                    total_amount,
                })
            })
            .collect();
        summaries.sort_by(|a, b| b.total_amount.cmp(&a.total_amount));
        summaries.truncate(n);
        summaries
    }
}

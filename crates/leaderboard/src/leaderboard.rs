//! Ranking of winning characters by final pool balance.

use chrono::{DateTime, Utc};
use digichar_core::{
    wei_to_eth, Address, AuctionId, AuctionRecord, AuctionStatus, CharacterIndex, Wei, U256,
};
use serde::Serialize;
use tracing::debug;

/// One winning character on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub auction_id: AuctionId,
    pub character_index: CharacterIndex,
    pub name: String,
    pub symbol: String,
    pub uri: String,
    /// Final pool balance (wei).
    pub pool_balance: Wei,
    pub token_address: Option<Address>,
}

impl LeaderboardEntry {
    pub fn pool_balance_eth(&self) -> f64 {
        wei_to_eth(self.pool_balance)
    }
}

/// Build the leaderboard from auction records.
///
/// Takes the winner of every closed, complete record (with a deployed token
/// when `require_token` is set) and orders them by pool balance, largest
/// first. Equal balances keep their input order.
pub fn build_leaderboard(
    records: &[AuctionRecord],
    require_token: bool,
    now: DateTime<Utc>,
) -> Vec<LeaderboardEntry> {
    let mut entries: Vec<LeaderboardEntry> = records
        .iter()
        .filter(|record| record.is_complete())
        .filter(|record| record.status(now) == AuctionStatus::Closed)
        .filter(|record| !require_token || record.token_address.is_some())
        .filter_map(|record| {
            let index = record.winner_index?;
            let winner = record.winner()?;
            Some(LeaderboardEntry {
                rank: 0,
                auction_id: record.id,
                character_index: index,
                name: winner.name.clone(),
                symbol: winner.symbol.clone(),
                uri: winner.uri.clone(),
                pool_balance: winner.pool_balance,
                token_address: record.token_address,
            })
        })
        .collect();

    entries.sort_by(|a, b| b.pool_balance.cmp(&a.pool_balance));
    for (position, entry) in entries.iter_mut().enumerate() {
        entry.rank = position + 1;
    }

    debug!(records = records.len(), entries = entries.len(), "leaderboard built");
    entries
}

/// Sum of pool balances on a leaderboard.
pub fn leaderboard_volume(entries: &[LeaderboardEntry]) -> Wei {
    entries
        .iter()
        .fold(U256::ZERO, |sum, entry| sum.saturating_add(entry.pool_balance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use digichar_core::Character;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(2_000, 0).unwrap()
    }

    fn character(name: &str, pool: u64, is_winner: bool) -> Character {
        Character {
            uri: format!("ipfs://{name}"),
            name: name.to_string(),
            symbol: name.to_uppercase(),
            pool_balance: U256::from(pool),
            is_winner,
        }
    }

    fn record(id: AuctionId, pools: [u64; 3], winner: Option<u8>, end_time: u64, token: bool) -> AuctionRecord {
        let winner_index = winner.and_then(CharacterIndex::new);
        let names = ["a", "b", "c"];
        let characters = [0usize, 1, 2].map(|slot| {
            Some(character(
                &format!("{}{id}", names[slot]),
                pools[slot],
                winner_index.map(|w| w.as_usize()) == Some(slot),
            ))
        });
        AuctionRecord {
            id,
            characters,
            pending_slots: Vec::new(),
            end_time,
            winner_index,
            token_address: token.then(|| Address::repeat_byte(id as u8)),
        }
    }

    #[test]
    fn test_ranked_by_pool_descending() {
        let records = vec![
            record(1, [1, 3, 2], Some(1), 1_000, true),
            record(2, [9, 0, 0], Some(0), 1_000, true),
            record(3, [0, 0, 5], Some(2), 1_000, true),
        ];
        let board = build_leaderboard(&records, true, now());

        let ids: Vec<AuctionId> = board.iter().map(|e| e.auction_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        let ranks: Vec<usize> = board.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
        assert_eq!(board[0].name, "a2");
        assert_eq!(leaderboard_volume(&board), U256::from(17u64));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let records = vec![
            record(5, [4, 0, 0], Some(0), 1_000, true),
            record(6, [0, 4, 0], Some(1), 1_000, true),
        ];
        let board = build_leaderboard(&records, true, now());
        assert_eq!(board[0].auction_id, 5);
        assert_eq!(board[1].auction_id, 6);
    }

    #[test]
    fn test_excluded_records() {
        let mut partial = record(4, [1, 1, 1], Some(0), 1_000, true);
        partial.characters[2] = None;
        let records = vec![
            // Still live.
            record(1, [1, 0, 0], Some(0), 5_000, true),
            // No winner.
            record(2, [0, 0, 0], None, 1_000, false),
            // No token yet.
            record(3, [2, 0, 0], Some(0), 1_000, false),
            partial,
        ];

        assert!(build_leaderboard(&records, true, now()).is_empty());

        let relaxed = build_leaderboard(&records, false, now());
        assert_eq!(relaxed.len(), 1);
        assert_eq!(relaxed[0].auction_id, 3);
        assert_eq!(relaxed[0].token_address, None);
    }
}

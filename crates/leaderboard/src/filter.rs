//! Filtering of auction records for history views.

use digichar_core::AuctionRecord;
use serde::{Deserialize, Serialize};

/// Winner status a record must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinnerFilter {
    #[default]
    All,
    /// Only records with a winner.
    WithWinner,
    /// Only records without a winner.
    NoWinner,
}

/// Record filter combining winner status and a text search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuctionFilter {
    pub winner: WinnerFilter,
    /// Case-insensitive substring matched against character names and
    /// symbols. Blank matches everything.
    pub search: Option<String>,
}

impl AuctionFilter {
    pub fn new(winner: WinnerFilter, search: Option<String>) -> Self {
        Self { winner, search }
    }

    pub fn matches(&self, record: &AuctionRecord) -> bool {
        let winner_ok = match self.winner {
            WinnerFilter::All => true,
            WinnerFilter::WithWinner => record.winner_index.is_some(),
            WinnerFilter::NoWinner => record.winner_index.is_none(),
        };
        winner_ok && self.matches_search(record)
    }

    fn matches_search(&self, record: &AuctionRecord) -> bool {
        let needle = match self.search.as_deref().map(str::trim) {
            Some(needle) if !needle.is_empty() => needle.to_lowercase(),
            _ => return true,
        };
        record.characters.iter().flatten().any(|character| {
            character.name.to_lowercase().contains(&needle)
                || character.symbol.to_lowercase().contains(&needle)
        })
    }

    /// Records passing the filter, in input order.
    pub fn apply(&self, records: &[AuctionRecord]) -> Vec<AuctionRecord> {
        records
            .iter()
            .filter(|record| self.matches(record))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digichar_core::{Character, CharacterIndex, U256};

    fn record(id: u64, names: [&str; 3], winner: Option<u8>) -> AuctionRecord {
        AuctionRecord {
            id,
            characters: names.map(|name| {
                Some(Character {
                    uri: String::new(),
                    name: name.to_string(),
                    symbol: name[..3].to_uppercase(),
                    pool_balance: U256::ZERO,
                    is_winner: false,
                })
            }),
            pending_slots: Vec::new(),
            end_time: 100,
            winner_index: winner.and_then(CharacterIndex::new),
            token_address: None,
        }
    }

    fn records() -> Vec<AuctionRecord> {
        vec![
            record(1, ["Ember", "Tide", "Gale"], Some(1)),
            record(2, ["Frost", "Stone", "Spark"], None),
            record(3, ["Ember", "Stone", "Moss"], Some(0)),
        ]
    }

    #[test]
    fn test_default_matches_all() {
        assert_eq!(AuctionFilter::default().apply(&records()).len(), 3);
    }

    #[test]
    fn test_winner_status() {
        let with = AuctionFilter::new(WinnerFilter::WithWinner, None).apply(&records());
        assert_eq!(with.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);

        let without = AuctionFilter::new(WinnerFilter::NoWinner, None).apply(&records());
        assert_eq!(without.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let filter = AuctionFilter::new(WinnerFilter::All, Some("  sTONE ".to_string()));
        let found = filter.apply(&records());
        assert_eq!(found.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2, 3]);

        // Symbols are searched too.
        let filter = AuctionFilter::new(WinnerFilter::All, Some("gal".to_string()));
        assert_eq!(filter.apply(&records()).len(), 1);
    }

    #[test]
    fn test_search_and_status_combine() {
        let filter = AuctionFilter::new(WinnerFilter::WithWinner, Some("stone".to_string()));
        let found = filter.apply(&records());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, 3);
    }

    #[test]
    fn test_blank_search_matches_all() {
        let filter = AuctionFilter::new(WinnerFilter::All, Some("   ".to_string()));
        assert_eq!(filter.apply(&records()).len(), 3);
    }
}

//! Auction record construction from resolved reads.
//!
//! A record is built from whatever subset of its five reads has resolved. The
//! winner is a pure function of the three pool balances and is only computed
//! once all three are known.

use crate::book::ReadBook;
use digichar_core::{
    Address, AuctionId, AuctionRecord, Character, CharacterIndex, ReadState, Wei,
    CHARACTER_SLOTS, U256,
};

/// Winning slot for a set of pool balances.
///
/// Scans slots in order keeping a running maximum that starts at zero and only
/// moves on a strictly greater balance, so the first slot to reach the maximum
/// wins and all-zero pools have no winner.
pub fn winner_index(balances: &[Wei; CHARACTER_SLOTS]) -> Option<CharacterIndex> {
    let mut best = U256::ZERO;
    let mut winner = None;
    for (index, balance) in CharacterIndex::ALL.iter().zip(balances) {
        if *balance > best {
            best = *balance;
            winner = Some(*index);
        }
    }
    winner
}

/// Builds [`AuctionRecord`]s from a [`ReadBook`].
#[derive(Debug, Clone, Copy, Default)]
pub struct AuctionRecordBuilder;

impl AuctionRecordBuilder {
    /// Build the record of one auction.
    ///
    /// - `Absent` when the end time is absent or every character is absent.
    /// - `Pending` until the end time and at least one character resolved.
    /// - Otherwise a record; unresolved slots are `None`, and those still
    ///   pending are listed in `pending_slots`. An absent slot is final.
    pub fn build(auction_id: AuctionId, book: &ReadBook) -> ReadState<AuctionRecord> {
        let end_time = book.end_time(auction_id);
        let slots: [ReadState<Character>; CHARACTER_SLOTS] =
            CharacterIndex::ALL.map(|index| book.character(auction_id, index));

        if end_time.is_absent() || slots.iter().all(ReadState::is_absent) {
            return ReadState::Absent;
        }
        let end_time = match end_time {
            ReadState::Resolved(end_time) if slots.iter().any(ReadState::is_resolved) => end_time,
            _ => return ReadState::Pending,
        };

        let pending_slots = CharacterIndex::ALL
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_pending())
            .map(|(index, _)| *index)
            .collect();
        let mut characters: [Option<Character>; CHARACTER_SLOTS] =
            slots.map(ReadState::into_option);

        let winner_index = match &characters {
            [Some(a), Some(b), Some(c)] => {
                winner_index(&[a.pool_balance, b.pool_balance, c.pool_balance])
            }
            _ => None,
        };
        for (index, slot) in CharacterIndex::ALL.iter().zip(characters.iter_mut()) {
            if let Some(character) = slot {
                character.is_winner = winner_index == Some(*index);
            }
        }

        let token_address = book
            .token_address(auction_id)
            .into_option()
            .filter(|address| *address != Address::ZERO);

        ReadState::Resolved(AuctionRecord {
            id: auction_id,
            characters,
            pending_slots,
            end_time,
            winner_index,
            token_address,
        })
    }

    /// Build every id that has a record, keeping the input order. Pending and
    /// absent ids are left out.
    pub fn build_many(ids: &[AuctionId], book: &ReadBook) -> Vec<AuctionRecord> {
        ids.iter()
            .filter_map(|&id| Self::build(id, book).into_option())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use digichar_ledger::{LedgerQuery, LedgerValue};

    fn character(name: &str, pool: u64) -> Character {
        Character {
            uri: format!("ipfs://{name}"),
            name: name.to_string(),
            symbol: name.to_uppercase(),
            pool_balance: U256::from(pool),
            // The ledger's flag is never trusted.
            is_winner: true,
        }
    }

    fn resolve_character(book: &mut ReadBook, auction_id: AuctionId, slot: u8, pool: u64) {
        let index = CharacterIndex::new(slot).unwrap();
        book.insert(
            LedgerQuery::Character { auction_id, index },
            ReadState::Resolved(LedgerValue::Character(character("c", pool))),
        );
    }

    fn resolve_end(book: &mut ReadBook, auction_id: AuctionId, end: u64) {
        book.insert(
            LedgerQuery::AuctionEndTime { auction_id },
            ReadState::Resolved(LedgerValue::Timestamp(end)),
        );
    }

    fn balances(values: [u64; 3]) -> [Wei; 3] {
        values.map(U256::from)
    }

    #[test]
    fn test_winner_first_to_reach_max() {
        assert_eq!(winner_index(&balances([2, 5, 5])), CharacterIndex::new(1));
        assert_eq!(winner_index(&balances([7, 7, 7])), CharacterIndex::new(0));
        assert_eq!(winner_index(&balances([0, 0, 1])), CharacterIndex::new(2));
    }

    #[test]
    fn test_all_zero_has_no_winner() {
        assert_eq!(winner_index(&balances([0, 0, 0])), None);
    }

    #[test]
    fn test_pending_until_end_time_and_a_character() {
        let mut book = ReadBook::new();
        assert!(AuctionRecordBuilder::build(1, &book).is_pending());

        resolve_character(&mut book, 1, 0, 3);
        assert!(AuctionRecordBuilder::build(1, &book).is_pending());

        resolve_end(&mut book, 1, 500);
        let record = AuctionRecordBuilder::build(1, &book).into_option().unwrap();
        assert!(!record.is_complete());
        assert_eq!(record.winner_index, None);
        assert!(!record.characters[0].as_ref().unwrap().is_winner);
        assert!(record.characters[1].is_none());
        assert_eq!(record.pending_slots, vec![CharacterIndex::ALL[1], CharacterIndex::ALL[2]]);
        assert!(record.is_loading());
    }

    #[test]
    fn test_absent_slot_is_final() {
        let mut book = ReadBook::new();
        resolve_end(&mut book, 4, 500);
        resolve_character(&mut book, 4, 0, 3);
        resolve_character(&mut book, 4, 1, 1);
        book.insert(
            LedgerQuery::Character {
                auction_id: 4,
                index: CharacterIndex::ALL[2],
            },
            ReadState::Absent,
        );

        let record = AuctionRecordBuilder::build(4, &book).into_option().unwrap();
        assert!(record.characters[2].is_none());
        assert!(record.pending_slots.is_empty());
        assert!(!record.is_loading());
        assert!(!record.is_complete());
        assert_eq!(record.winner_index, None);
    }

    #[test]
    fn test_complete_record_has_winner() {
        let mut book = ReadBook::new();
        resolve_end(&mut book, 2, 500);
        for (slot, pool) in [(0, 2), (1, 5), (2, 5)] {
            resolve_character(&mut book, 2, slot, pool);
        }
        book.insert(
            LedgerQuery::TokenAddress { auction_id: 2 },
            ReadState::Resolved(LedgerValue::Address(Address::repeat_byte(0xaa))),
        );

        let record = AuctionRecordBuilder::build(2, &book).into_option().unwrap();
        assert_eq!(record.winner_index, CharacterIndex::new(1));
        let flags: Vec<bool> = record.characters.iter().map(|c| c.as_ref().unwrap().is_winner).collect();
        assert_eq!(flags, vec![false, true, false]);
        assert_eq!(record.token_address, Some(Address::repeat_byte(0xaa)));
    }

    #[test]
    fn test_zero_token_address_is_none() {
        let mut book = ReadBook::new();
        resolve_end(&mut book, 2, 500);
        resolve_character(&mut book, 2, 0, 1);
        book.insert(
            LedgerQuery::TokenAddress { auction_id: 2 },
            ReadState::Resolved(LedgerValue::Address(Address::ZERO)),
        );
        let record = AuctionRecordBuilder::build(2, &book).into_option().unwrap();
        assert_eq!(record.token_address, None);
    }

    #[test]
    fn test_absent_end_time_or_characters() {
        let mut book = ReadBook::new();
        book.insert(LedgerQuery::AuctionEndTime { auction_id: 9 }, ReadState::Absent);
        assert!(AuctionRecordBuilder::build(9, &book).is_absent());

        for index in CharacterIndex::ALL {
            book.insert(LedgerQuery::Character { auction_id: 8, index }, ReadState::Absent);
        }
        resolve_end(&mut book, 8, 500);
        assert!(AuctionRecordBuilder::build(8, &book).is_absent());
    }

    #[test]
    fn test_build_is_idempotent() {
        let mut book = ReadBook::new();
        resolve_end(&mut book, 3, 500);
        for slot in 0..3 {
            resolve_character(&mut book, 3, slot, 4);
        }
        let first = AuctionRecordBuilder::build(3, &book);
        let second = AuctionRecordBuilder::build(3, &book);
        assert_eq!(first, second);
    }

    #[test]
    fn test_build_many_skips_unresolved() {
        let mut book = ReadBook::new();
        resolve_end(&mut book, 3, 500);
        resolve_character(&mut book, 3, 0, 4);
        resolve_end(&mut book, 1, 400);
        resolve_character(&mut book, 1, 2, 1);

        let records = AuctionRecordBuilder::build_many(&[3, 2, 1], &book);
        let ids: Vec<AuctionId> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
    }
}

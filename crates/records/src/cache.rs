//! Memo of built auction records.

use crate::book::ReadBook;
use crate::builder::AuctionRecordBuilder;
use digichar_core::{AuctionId, AuctionRecord, ReadState};
use std::collections::HashMap;
use tracing::trace;

/// Built records keyed by `(auction_id, revision)`.
///
/// An entry is reused while the book's revision for the auction is unchanged
/// and rebuilt as soon as any of the auction's reads moves.
#[derive(Debug, Default)]
pub struct RecordCache {
    entries: HashMap<AuctionId, (u64, ReadState<AuctionRecord>)>,
    hits: u64,
    misses: u64,
}

impl RecordCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The record of `auction_id`, built at most once per revision.
    pub fn get_or_build(&mut self, auction_id: AuctionId, book: &ReadBook) -> ReadState<AuctionRecord> {
        let revision = book.revision(auction_id);
        if let Some((cached_revision, record)) = self.entries.get(&auction_id) {
            if *cached_revision == revision {
                self.hits += 1;
                return record.clone();
            }
        }

        self.misses += 1;
        trace!(auction_id, revision, "building auction record");
        let record = AuctionRecordBuilder::build(auction_id, book);
        self.entries.insert(auction_id, (revision, record.clone()));
        record
    }

    /// Drop every memoised record.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Lookups answered from the memo.
    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Lookups that built a record.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}

//! Bounded fan-out of ledger reads.
//!
//! A batch of queries is spread over tokio tasks gated by a semaphore, so no
//! more than `max_in_flight` reads are outstanding at once. Results stream
//! back over a channel in completion order, tagged with the generation they
//! were dispatched under so the consumer can drop stale ones.

use crate::query::{LedgerQuery, LedgerValue};
use crate::reader::{read, LedgerReader};
use digichar_core::{ReadState, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, trace};

/// One completed read.
#[derive(Debug)]
pub struct Resolution {
    /// Generation the read was dispatched under.
    pub generation: u64,
    /// The query that was issued.
    pub query: LedgerQuery,
    /// What the ledger answered.
    pub outcome: Result<ReadState<LedgerValue>>,
}

/// Worker pool issuing reads with a concurrency cap.
#[derive(Debug, Clone)]
pub struct FanOut {
    max_in_flight: usize,
}

impl FanOut {
    /// Create a pool allowing `max_in_flight` concurrent reads (at least one).
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }

    #[inline]
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Dispatch a batch of queries.
    ///
    /// Must be called from within a tokio runtime. The returned receiver
    /// closes once every query has answered.
    pub fn dispatch<R: LedgerReader>(
        &self,
        reader: Arc<R>,
        generation: u64,
        queries: Vec<LedgerQuery>,
    ) -> mpsc::Receiver<Resolution> {
        let (tx, rx) = mpsc::channel(queries.len().max(1));
        let permits = Arc::new(Semaphore::new(self.max_in_flight));

        debug!(
            queries = queries.len(),
            max_in_flight = self.max_in_flight,
            generation,
            "dispatching ledger reads"
        );

        for query in queries {
            let reader = Arc::clone(&reader);
            let permits = Arc::clone(&permits);
            let tx = tx.clone();
            tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                trace!(%query, "read issued");
                let outcome = read(reader.as_ref(), &query).await;
                // The receiver may have been dropped by a caller that moved on.
                let _ = tx
                    .send(Resolution {
                        generation,
                        query,
                        outcome,
                    })
                    .await;
            });
        }

        rx
    }

    /// Dispatch a batch and wait for every resolution.
    pub async fn collect<R: LedgerReader>(
        &self,
        reader: Arc<R>,
        generation: u64,
        queries: Vec<LedgerQuery>,
    ) -> Vec<Resolution> {
        let expected = queries.len();
        let mut rx = self.dispatch(reader, generation, queries);
        let mut resolutions = Vec::with_capacity(expected);
        while let Some(resolution) = rx.recv().await {
            resolutions.push(resolution);
        }
        resolutions
    }
}

impl Default for FanOut {
    fn default() -> Self {
        Self::new(15)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;

    #[tokio::test]
    async fn test_collect_answers_every_query() {
        let ledger = Arc::new(MemoryLedger::demo());
        let fan_out = FanOut::new(2);

        let mut queries = LedgerQuery::auction_reads(1);
        queries.push(LedgerQuery::CurrentAuctionId);
        let resolutions = fan_out.collect(ledger, 3, queries).await;

        assert_eq!(resolutions.len(), 6);
        assert!(resolutions.iter().all(|r| r.generation == 3));
        let current = resolutions
            .iter()
            .find(|r| r.query == LedgerQuery::CurrentAuctionId)
            .unwrap();
        assert!(matches!(
            current.outcome,
            Ok(ReadState::Resolved(LedgerValue::AuctionId(_)))
        ));
    }

    #[tokio::test]
    async fn test_in_flight_never_exceeds_cap() {
        let ledger = Arc::new(MemoryLedger::demo());
        let fan_out = FanOut::new(3);

        let queries: Vec<LedgerQuery> = (1..=4).flat_map(LedgerQuery::auction_reads).collect();
        let resolutions = fan_out.collect(Arc::clone(&ledger), 0, queries).await;

        assert_eq!(resolutions.len(), 20);
        assert!(ledger.peak_in_flight() <= 3);
        assert!(ledger.peak_in_flight() >= 1);
    }

    #[test]
    fn test_zero_cap_clamped() {
        assert_eq!(FanOut::new(0).max_in_flight(), 1);
    }
}

//! Past-auction id sequences and capped history windows.

use digichar_core::config::AuctionIdBase;
use digichar_core::AuctionId;
use serde::Serialize;

/// Ids of every past auction, newest first. The open auction is excluded.
pub fn past_ids(current: AuctionId, base: AuctionIdBase) -> Vec<AuctionId> {
    (base.first_id()..current).rev().collect()
}

/// One capped slice of the past-auction sequence.
///
/// Window 0 holds the `cap` newest past auctions, window 1 the next `cap`,
/// and so on. Ids outside the window are never fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryWindow {
    /// Ids in the window, newest first.
    pub ids: Vec<AuctionId>,
    /// Position of this window in the sequence.
    pub window_index: usize,
    /// Maximum ids per window.
    pub cap: usize,
    /// Number of past auctions in total.
    pub total_past: u64,
    /// Whether older auctions exist beyond this window.
    pub has_more: bool,
}

impl HistoryWindow {
    pub fn new(current: AuctionId, base: AuctionIdBase, cap: usize, window_index: usize) -> Self {
        let cap = cap.max(1);
        let total_past = current.saturating_sub(base.first_id());
        let start = (window_index as u64).saturating_mul(cap as u64);
        let end = start.saturating_add(cap as u64).min(total_past);

        let ids = (start..end).map(|offset| current - 1 - offset).collect();

        Self {
            ids,
            window_index,
            cap,
            total_past,
            has_more: end < total_past,
        }
    }

    /// Number of windows needed to cover every past auction.
    pub fn window_count(&self) -> u64 {
        self.total_past.div_ceil(self.cap as u64)
    }

    /// Index of the next older window, if any.
    pub fn next_index(&self) -> Option<usize> {
        self.has_more.then(|| self.window_index + 1)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

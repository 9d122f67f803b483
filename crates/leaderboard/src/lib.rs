//! Leaderboard and history views for the digichar auction layer.
//!
//! This crate handles:
//! - Ranking winning characters by final pool balance
//! - Filtering records by winner status and character text
//! - Clamped pagination
//! - History metrics

pub mod filter;
pub mod leaderboard;
pub mod metrics;
pub mod pagination;

pub use filter::{AuctionFilter, WinnerFilter};
pub use leaderboard::{build_leaderboard, leaderboard_volume, LeaderboardEntry};
pub use metrics::HistoryMetrics;
pub use pagination::{Page, Paginator};

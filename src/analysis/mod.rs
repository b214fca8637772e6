//! Analysis modules.
//!
//! Merging aggregator output into datasets and turning datasets into
//! leaderboards.

pub mod leaderboard;
pub mod merge;

pub use leaderboard::{build_leaderboard, Leaderboard, LEADERBOARD_VERSION};
pub use merge::{merge, DatasetHeader, RepoResult};

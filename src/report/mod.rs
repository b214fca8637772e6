//! Leaderboard rendering: Markdown and a static HTML dashboard.

pub mod dashboard;
pub mod generator;

pub use dashboard::render_dashboard;
pub use generator::generate_markdown_report;

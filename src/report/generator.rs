//! Markdown leaderboard generation.
//!
//! This module renders a [`Leaderboard`] as a Markdown document with
//! contributor, repository and organization tables.

use crate::analysis::leaderboard::{Leaderboard, MetricTotals};
use crate::models::Metric;

/// Generate a complete Markdown leaderboard, `limit` rows per table.
pub fn generate_markdown_report(board: &Leaderboard, limit: usize) -> String {
    let mut output = String::new();

    output.push_str("# Contributor Leaderboard\n\n");
    output.push_str(&generate_metadata_section(board));
    output.push_str(&generate_contributors_section(board, limit));
    output.push_str(&generate_repositories_section(board, limit));
    output.push_str(&generate_organizations_section(board));
    output.push_str(&generate_incomplete_section(board));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(board: &Leaderboard) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!("- **Organizations:** {}\n", board.orgs.join(", ")));
    section.push_str(&format!(
        "- **Window:** {} to {}\n",
        board.window.since.format("%Y-%m-%d %H:%M UTC"),
        board.window.until.format("%Y-%m-%d %H:%M UTC")
    ));
    section.push_str(&format!("- **Mode:** {}\n", board.mode));
    section.push_str(&format!(
        "- **Fetched:** {}\n",
        board.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Contributors:** {}\n", board.contributors.len()));
    section.push_str(&format!("- **Repositories:** {}\n", board.repositories.len()));
    section.push('\n');

    section
}

fn header_row(first: &[&str], columns: &[Metric]) -> String {
    let mut names: Vec<&str> = first.to_vec();
    names.extend(columns.iter().map(|m| m.label()));
    names.push("Total");

    let mut row = format!("| {} |\n", names.join(" | "));
    let align: Vec<&str> = names
        .iter()
        .enumerate()
        .map(|(i, _)| if i < first.len() { ":---" } else { "---:" })
        .collect();
    row.push_str(&format!("|{}|\n", align.join("|")));
    row
}

fn metric_cells(totals: &MetricTotals, columns: &[Metric], total: u64) -> String {
    let mut cells: Vec<String> = columns.iter().map(|m| totals.get(*m).to_string()).collect();
    cells.push(format!("**{}**", total));
    cells.join(" | ")
}

fn generate_contributors_section(board: &Leaderboard, limit: usize) -> String {
    let mut section = String::new();
    section.push_str("## Contributors\n\n");

    if board.contributors.is_empty() {
        section.push_str("No contributions were recorded in this window.\n\n");
        return section;
    }

    section.push_str(&header_row(&["#", "Contributor", "Repos"], &board.columns));
    for (i, row) in board.contributors.iter().take(limit).enumerate() {
        let name = match &row.profile_url {
            Some(url) => format!("[{}]({})", row.login, url),
            None => row.login.clone(),
        };
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            i + 1,
            name,
            row.repositories,
            metric_cells(&row.totals, &board.columns, row.total_contributions)
        ));
    }
    if board.contributors.len() > limit {
        section.push_str(&format!(
            "\n*{} more contributors not shown.*\n",
            board.contributors.len() - limit
        ));
    }
    section.push('\n');
    section
}

fn generate_repositories_section(board: &Leaderboard, limit: usize) -> String {
    let mut section = String::new();
    section.push_str("## Repositories\n\n");

    if board.repositories.is_empty() {
        section.push_str("No repositories matched the selection.\n\n");
        return section;
    }

    section.push_str(&header_row(&["#", "Repository", "Contributors"], &board.columns));
    for (i, row) in board.repositories.iter().take(limit).enumerate() {
        let marker = if row.incomplete { " ⚠️" } else { "" };
        section.push_str(&format!(
            "| {} | [{}/{}]({}){} | {} | {} |\n",
            i + 1,
            row.org,
            row.name,
            row.pulse_url,
            marker,
            row.contributors,
            metric_cells(&row.totals, &board.columns, row.total_contributions)
        ));
    }
    section.push('\n');
    section
}

fn generate_organizations_section(board: &Leaderboard) -> String {
    if board.organizations.len() < 2 {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Organizations\n\n");
    section.push_str(&header_row(&["Organization", "Repos", "Contributors"], &board.columns));
    for row in &board.organizations {
        section.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            row.org,
            row.repositories,
            row.contributors,
            metric_cells(&row.totals, &board.columns, row.total_contributions)
        ));
    }
    section.push('\n');
    section
}

fn generate_incomplete_section(board: &Leaderboard) -> String {
    if board.incomplete.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Incomplete Repositories\n\n");
    section.push_str(
        "Degraded repositories count as zero; partial ones are missing one source:\n\n",
    );
    for entry in &board.incomplete {
        let kind = if entry.status.is_degraded() { "degraded" } else { "partial" };
        section.push_str(&format!(
            "- `{}/{}` ({}): {}\n",
            entry.org,
            entry.name,
            kind,
            entry.status.reason().unwrap_or_default()
        ));
    }
    section.push('\n');
    section
}

fn generate_footer() -> String {
    let mut footer = String::new();
    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Generated by ghcontrib {}*\n",
        env!("CARGO_PKG_VERSION")
    ));
    footer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::build_leaderboard;
    use crate::models::{
        ContributionRecord, Dataset, Mode, RepoStatus, RepositoryEntry, TimeWindow,
    };
    use chrono::{TimeZone, Utc};

    fn dataset(mode: Mode) -> Dataset {
        Dataset {
            schema_version: 1,
            generated_at: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
            orgs: vec!["acme".to_string()],
            window: TimeWindow::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            ),
            mode,
            repositories: vec![
                RepositoryEntry {
                    org: "acme".to_string(),
                    name: "core".to_string(),
                    status: RepoStatus::Complete,
                },
                RepositoryEntry {
                    org: "acme".to_string(),
                    name: "huge".to_string(),
                    status: RepoStatus::Degraded {
                        reason: "still computing".to_string(),
                    },
                },
            ],
            records: vec![
                ContributionRecord {
                    org: "acme".to_string(),
                    repo: "core".to_string(),
                    contributor: "alice".to_string(),
                    metric: Metric::Commits,
                    value: 3,
                },
                ContributionRecord {
                    org: "acme".to_string(),
                    repo: "core".to_string(),
                    contributor: "Unknown".to_string(),
                    metric: Metric::Commits,
                    value: 1,
                },
            ],
        }
    }

    #[test]
    fn test_header_row_with_borrowed_labels() {
        let label = String::from("Contributor");
        let row = header_row(&["#", label.as_str()], &[Metric::Commits]);
        assert_eq!(row, "| # | Contributor | Commits | Total |\n|:---|:---|---:|---:|\n");
    }

    #[test]
    fn test_quick_report_omits_pr_columns() {
        let md = generate_markdown_report(&build_leaderboard(&dataset(Mode::Quick)), 10);
        assert!(md.contains("# Contributor Leaderboard"));
        assert!(md.contains("| Lines Added |"));
        assert!(!md.contains("PRs Opened"));
        assert!(!md.contains("Comments"));
    }

    #[test]
    fn test_slow_report_has_all_columns() {
        let md = generate_markdown_report(&build_leaderboard(&dataset(Mode::Slow)), 10);
        assert!(md.contains("PRs Reviewed"));
        assert!(md.contains("Comments"));
    }

    #[test]
    fn test_links_and_incomplete_notes() {
        let md = generate_markdown_report(&build_leaderboard(&dataset(Mode::Quick)), 10);
        assert!(md.contains("[alice](https://github.com/alice)"));
        assert!(md.contains("| 2 | Unknown |"));
        assert!(md.contains("[acme/core](https://github.com/acme/core/pulse)"));
        assert!(md.contains("## Incomplete Repositories"));
        assert!(md.contains("- `acme/huge` (degraded): still computing"));
    }

    #[test]
    fn test_limit_truncates_tables() {
        let md = generate_markdown_report(&build_leaderboard(&dataset(Mode::Quick)), 1);
        assert!(md.contains("*1 more contributors not shown.*"));
        assert!(!md.contains("| 2 | Unknown |"));
    }
}

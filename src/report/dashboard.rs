//! Static HTML dashboard.
//!
//! Renders the leaderboard tables into one self-contained page. A few lines
//! of inline script add column sorting and a text filter; there are no
//! external assets.

use crate::analysis::leaderboard::{Leaderboard, MetricTotals};
use crate::models::Metric;

const STYLE: &str = r#"
body { font-family: system-ui, sans-serif; margin: 2rem; color: #1f2328; }
h1 { margin-bottom: 0.25rem; }
.meta { color: #59636e; margin-bottom: 1.5rem; }
table { border-collapse: collapse; margin-bottom: 2rem; width: 100%; }
th, td { border-bottom: 1px solid #d1d9e0; padding: 0.35rem 0.6rem; text-align: left; }
th { cursor: pointer; background: #f6f8fa; user-select: none; }
td.num, th.num { text-align: right; }
tr.incomplete td { color: #9a6700; }
input#filter { padding: 0.4rem; width: 20rem; margin-bottom: 1rem; }
"#;

const SCRIPT: &str = r#"
document.querySelectorAll("table.board th").forEach(function (th) {
  th.addEventListener("click", function () {
    var table = th.closest("table");
    var body = table.tBodies[0];
    var idx = Array.prototype.indexOf.call(th.parentNode.children, th);
    var desc = th.dataset.dir !== "desc";
    th.dataset.dir = desc ? "desc" : "asc";
    var rows = Array.prototype.slice.call(body.rows);
    rows.sort(function (a, b) {
      var x = a.cells[idx].dataset.v || a.cells[idx].textContent;
      var y = b.cells[idx].dataset.v || b.cells[idx].textContent;
      var nx = parseFloat(x), ny = parseFloat(y);
      var cmp = (!isNaN(nx) && !isNaN(ny)) ? nx - ny : x.localeCompare(y);
      return desc ? -cmp : cmp;
    });
    rows.forEach(function (r) { body.appendChild(r); });
  });
});
document.getElementById("filter").addEventListener("input", function (e) {
  var q = e.target.value.toLowerCase();
  document.querySelectorAll("table.board tbody tr").forEach(function (r) {
    r.style.display = r.textContent.toLowerCase().indexOf(q) === -1 ? "none" : "";
  });
});
"#;

/// Escape text for HTML element content and attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn link(text: &str, url: &str) -> String {
    format!(
        "<a href=\"{}\">{}</a>",
        escape_html(url),
        escape_html(text)
    )
}

fn header(first: &[&str], columns: &[Metric]) -> String {
    let mut html = String::from("<thead><tr>");
    for name in first {
        html.push_str(&format!("<th>{}</th>", escape_html(name)));
    }
    for metric in columns {
        html.push_str(&format!("<th class=\"num\">{}</th>", metric.label()));
    }
    html.push_str("<th class=\"num\">Total</th></tr></thead>");
    html
}

fn numbers(totals: &MetricTotals, columns: &[Metric], total: u64) -> String {
    let mut html = String::new();
    for metric in columns {
        html.push_str(&format!("<td class=\"num\">{}</td>", totals.get(*metric)));
    }
    html.push_str(&format!("<td class=\"num\"><strong>{}</strong></td>", total));
    html
}

fn contributors_table(board: &Leaderboard) -> String {
    let mut html = String::from("<h2>Contributors</h2>\n<table class=\"board\" id=\"contributors\">");
    html.push_str(&header(&["Contributor", "Repos"], &board.columns));
    html.push_str("<tbody>\n");
    for row in &board.contributors {
        let name = match &row.profile_url {
            Some(url) => link(&row.login, url),
            None => escape_html(&row.login),
        };
        html.push_str(&format!(
            "<tr><td data-v=\"{}\">{}</td><td class=\"num\">{}</td>{}</tr>\n",
            escape_html(&row.login),
            name,
            row.repositories,
            numbers(&row.totals, &board.columns, row.total_contributions)
        ));
    }
    html.push_str("</tbody></table>\n");
    html
}

fn repositories_table(board: &Leaderboard) -> String {
    let mut html = String::from("<h2>Repositories</h2>\n<table class=\"board\" id=\"repositories\">");
    html.push_str(&header(&["Repository", "Contributors"], &board.columns));
    html.push_str("<tbody>\n");
    for row in &board.repositories {
        let full = format!("{}/{}", row.org, row.name);
        let class = if row.incomplete { " class=\"incomplete\"" } else { "" };
        html.push_str(&format!(
            "<tr{}><td data-v=\"{}\">{}</td><td class=\"num\">{}</td>{}</tr>\n",
            class,
            escape_html(&full),
            link(&full, &row.pulse_url),
            row.contributors,
            numbers(&row.totals, &board.columns, row.total_contributions)
        ));
    }
    html.push_str("</tbody></table>\n");
    html
}

fn drill_down_table(board: &Leaderboard) -> String {
    let mut html =
        String::from("<h2>Contributor Details</h2>\n<table class=\"board\" id=\"details\">");
    html.push_str(&header(&["Contributor", "Repository", "Link"], &board.columns));
    html.push_str("<tbody>\n");
    for row in &board.contributor_repos {
        let full = format!("{}/{}", row.org, row.repo);
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td>{}</tr>\n",
            escape_html(&row.login),
            escape_html(&full),
            link("View PRs", &row.pulls_url),
            numbers(&row.totals, &board.columns, row.total_contributions)
        ));
    }
    html.push_str("</tbody></table>\n");
    html
}

/// Render the whole page.
pub fn render_dashboard(board: &Leaderboard) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>GitHub Contributors Dashboard</title>\n");
    html.push_str(&format!("<style>{}</style>\n</head>\n<body>\n", STYLE));
    html.push_str("<h1>GitHub Contributors Dashboard</h1>\n");
    html.push_str(&format!(
        "<p class=\"meta\">{} &middot; {} to {} &middot; {} mode &middot; fetched {}</p>\n",
        escape_html(&board.orgs.join(", ")),
        board.window.since.format("%Y-%m-%d"),
        board.window.until.format("%Y-%m-%d"),
        board.mode,
        board.generated_at.format("%Y-%m-%d %H:%M UTC")
    ));
    if !board.incomplete.is_empty() {
        html.push_str(&format!(
            "<p class=\"meta\">{} repositories could not be fully aggregated.</p>\n",
            board.incomplete.len()
        ));
    }
    html.push_str("<input id=\"filter\" type=\"search\" placeholder=\"Filter rows\">\n");
    html.push_str(&contributors_table(board));
    html.push_str(&repositories_table(board));
    html.push_str(&drill_down_table(board));
    html.push_str(&format!("<script>{}</script>\n</body>\n</html>\n", SCRIPT));
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::build_leaderboard;
    use crate::models::{ContributionRecord, Dataset, Mode, RepoStatus, RepositoryEntry, TimeWindow};
    use chrono::{TimeZone, Utc};

    fn board(mode: Mode, login: &str) -> Leaderboard {
        build_leaderboard(&Dataset {
            schema_version: 1,
            generated_at: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
            orgs: vec!["acme".to_string()],
            window: TimeWindow::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
            ),
            mode,
            repositories: vec![RepositoryEntry {
                org: "acme".to_string(),
                name: "core".to_string(),
                status: RepoStatus::Complete,
            }],
            records: vec![ContributionRecord {
                org: "acme".to_string(),
                repo: "core".to_string(),
                contributor: login.to_string(),
                metric: Metric::Commits,
                value: 2,
            }],
        })
    }

    #[test]
    fn test_page_contains_tables() {
        let html = render_dashboard(&board(Mode::Quick, "alice"));
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("id=\"contributors\""));
        assert!(html.contains("id=\"repositories\""));
        assert!(html.contains("<a href=\"https://github.com/alice\">alice</a>"));
        assert!(html.contains("https://github.com/acme/core/pulls?q=author:alice"));
        assert!(!html.contains("PRs Opened"));
    }

    #[test]
    fn test_slow_mode_shows_pr_columns() {
        let html = render_dashboard(&board(Mode::Slow, "alice"));
        assert!(html.contains("PRs Opened"));
    }

    #[test]
    fn test_logins_are_escaped() {
        let html = render_dashboard(&board(Mode::Quick, "<script>x</script>"));
        assert!(html.contains("&lt;script&gt;x&lt;/script&gt;"));
        assert!(!html.contains("<script>x</script>"));
    }
}

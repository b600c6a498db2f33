use std::io::Write;
use std::sync::Arc;

use chrono::Local;

use crate::config::{ApiConfig, ScrapeConfig};
use crate::loader::{load, ListView, LoaderOptions};
use crate::model::{CommitRow, ResultSink};
use crate::parse::parse_rows;
use crate::range::{DateRange, ZoneOffsets};
use crate::request::{Change, SwarmClient, SwarmSession};
use crate::view::SwarmPageView;
use crate::{info_time, Result};

const TABLE_HEADERS: [&str; 5] = ["Change", "User", "Description", "Committed(UTC)", "Committed(KST)"];
const DESCRIPTION_WIDTH: usize = 60;

/// Runs one scrape query on a background task and publishes its rows to `sink`.
/// Returns the number of rows published. On failure nothing is published and
/// the previous results stay cleared.
pub async fn run_scrape(config: ScrapeConfig, range: DateRange, sink: Arc<ResultSink>) -> Result<usize> {
    let worker = tokio::spawn(async move { scrape(&config, &range, &sink).await });
    worker.await?
}

async fn scrape(config: &ScrapeConfig, range: &DateRange, sink: &ResultSink) -> Result<usize> {
    let start_time = Local::now();
    let filter = range.query_window().filter();
    info_time!("KST {} to {}, Swarm range (UTC): {}", range.start(), range.end(), filter);

    let ticket = sink.begin().await;
    tracing::debug!(query = ticket.generation(), "result table cleared");
    let session = SwarmSession::open(&config.swarm_url, &config.credentials)?;
    let mut view = SwarmPageView::new(&session, filter);
    let rows = collect_commits(&mut view, &config.loader, &ZoneOffsets::default()).await?;

    let count = sink.publish(ticket, rows);
    info_time!(start_time, "Found {} commits.", count);
    Ok(count)
}

/// Loads the whole list from `view` and parses every commit row in it.
pub async fn collect_commits<V>(view: &mut V, opts: &LoaderOptions, zones: &ZoneOffsets) -> Result<Vec<CommitRow>>
where
    V: ListView + Send,
{
    let raw = load(view, opts).await?;
    let rows = parse_rows(&raw, zones);
    if rows.len() < raw.len() {
        tracing::debug!(skipped = raw.len() - rows.len(), "skipped rows without commit columns");
    }
    Ok(rows)
}

/// Batch flow: lists the changes in `range`, then fetches and prints each diff.
/// A change whose diff can't be fetched is printed without one.
pub async fn run_changes<W: Write>(config: &ApiConfig, range: &DateRange, max: usize, out: &mut W) -> Result<usize> {
    let start_time = Local::now();
    let client = SwarmClient::new(SwarmSession::open(&config.swarm_url, &config.credentials)?);
    let zones = ZoneOffsets::default();

    let changes = client.list_changes(&range.query_window(), max).await;
    for change in &changes {
        let diff = client.change_diff(change.id).await;
        out.write_all(format_change(change, diff.as_deref(), &zones).as_bytes())?;
    }
    out.flush()?;

    info_time!(start_time, "Printed {} changes.", changes.len());
    Ok(changes.len())
}

pub fn format_change(change: &Change, diff: Option<&str>, zones: &ZoneOffsets) -> String {
    let when = change
        .committed()
        .map(|utc| {
            let utc = utc.format("%Y-%m-%dT%H:%M:%S").to_string();
            let kst = zones.query_to_display(&utc);
            format!("{utc} UTC / {kst} KST")
        })
        .unwrap_or_else(|| "unknown time".to_string());

    let mut s = format!("Change {} by {} ({when})\n", change.id, change.user);
    for line in change.description.trim_end().lines() {
        s.push_str(&format!("    {line}\n"));
    }
    match diff {
        Some(diff) => {
            s.push_str(diff.trim_end());
            s.push('\n');
        }
        None => s.push_str("(no diff)\n"),
    }
    s.push('\n');
    s
}

/// Fixed-width rendering of the result table. Rows with links are marked `*`.
pub fn render_table(rows: &[CommitRow]) -> String {
    let cells: Vec<[String; 5]> = rows
        .iter()
        .map(|r| {
            let id = if r.has_link() {
                format!("{}*", r.id)
            } else {
                r.id.clone()
            };
            [
                id,
                r.author.clone(),
                truncate(&r.description, DESCRIPTION_WIDTH),
                r.committed_query.clone(),
                r.committed_display.clone(),
            ]
        })
        .collect();

    let mut widths = TABLE_HEADERS.map(|h| h.chars().count());
    for row in &cells {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |fields: [&str; 5]| -> String {
        let padded: Vec<String> = fields
            .iter()
            .zip(widths)
            .map(|(f, w)| format!("{f:<w$}"))
            .collect();
        format!("{}\n", padded.join(" | ").trim_end())
    };

    let mut out = line(TABLE_HEADERS);
    out.push_str(&format!("{}\n", "-".repeat(widths.iter().sum::<usize>() + 3 * 4)));
    for row in &cells {
        out.push_str(&line(row.each_ref().map(String::as_str)));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut t: String = s.chars().take(max.saturating_sub(3)).collect();
    t.push_str("...");
    t
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn commit(id: &str, links: &[&str]) -> CommitRow {
        CommitRow {
            id: id.into(),
            author: "alice".into(),
            description: "Fix build".into(),
            committed_query: "2025-03-20T07:18:00".into(),
            committed_display: "2025-03-20 PM 04:18".into(),
            links: links.iter().map(|l| l.to_string()).collect(),
        }
    }

    #[test]
    fn table_marks_linked_rows() {
        let table = render_table(&[commit("1204", &["http://s/changes/1204"]), commit("1203", &[])]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Change | User"));
        assert!(lines[2].starts_with("1204*  | alice"));
        assert!(lines[3].starts_with("1203   | alice"));
        assert!(lines[3].ends_with("2025-03-20 PM 04:18"));
    }

    #[test]
    fn long_descriptions_are_cut() {
        let cut = truncate(&"x".repeat(100), 10);
        assert_eq!(cut, "xxxxxxx...");
    }

    #[test]
    fn change_printout() {
        let change = Change {
            id: 12,
            user: "bob".into(),
            description: "line one\nline two\n".into(),
            time: Some(1742455080),
        };
        let zones = ZoneOffsets::default();
        assert_eq!(
            format_change(&change, Some("--- a\n+++ b\n"), &zones),
            "Change 12 by bob (2025-03-20T07:18:00 UTC / 2025-03-20 PM 04:18 KST)\n    line one\n    line two\n--- a\n+++ b\n\n"
        );
        assert!(format_change(&change, None, &zones).contains("(no diff)"));
    }
}

//! Scroll-until-stable loading of a lazily appended list.
//!
//! The list has no cursor and no total count. The only progress signal is the
//! key of the last row: after each scroll and settle delay we look at it again,
//! and once it has not moved for `stable_threshold` looks in a row we take what
//! is there as the full list. That is a heuristic, so `max_polls` caps the loop.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use crate::parse::RawRow;
use crate::{info_time, Result};

pub const DEFAULT_STABLE_THRESHOLD: usize = 5;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_POLLS: usize = 500;

/// A remote list view that appends rows when scrolled to its end.
pub trait ListView {
    /// Re-acquires the container and returns every row currently in it.
    fn rows(&mut self) -> impl Future<Output = Result<Vec<RawRow>>> + Send;

    /// Asks the view for more rows. New rows may take a while to show up.
    fn scroll_to_end(&mut self) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderOptions {
    pub stable_threshold: usize,
    pub settle_delay: Duration,
    /// Upper bound on container reads. `None` polls until stable, however long that takes.
    pub max_polls: Option<usize>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            stable_threshold: DEFAULT_STABLE_THRESHOLD,
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_polls: Some(DEFAULT_MAX_POLLS),
        }
    }
}

/// Lives for one [`load`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub previous_last: String,
    pub stable_count: usize,
}

impl ScrollState {
    /// Records the last row's key and returns how many looks in a row it has
    /// been unchanged.
    pub fn observe(&mut self, key: &str) -> usize {
        if key == self.previous_last {
            self.stable_count += 1;
        } else {
            self.stable_count = 0;
            self.previous_last = key.to_string();
        }
        self.stable_count
    }
}

/// Scrolls `view` until its last row stops changing and returns all rows,
/// deduplicated by first-column key in first-seen order.
pub async fn load<V>(view: &mut V, opts: &LoaderOptions) -> Result<Vec<RawRow>>
where
    V: ListView + Send,
{
    let mut state = ScrollState::default();
    let mut polls = 0usize;

    loop {
        let rows = view.rows().await?;
        polls += 1;
        if rows.is_empty() {
            info_time!("List is empty, nothing to load.");
            return Ok(rows);
        }

        // An unreadable last row still counts, as an empty key.
        let key = rows.last().and_then(RawRow::key).unwrap_or_default();
        if state.observe(key) >= opts.stable_threshold {
            info_time!("No new rows after {} scrolls, stopping at {} rows.", state.stable_count, rows.len());
            return Ok(dedup_rows(rows));
        }
        if opts.max_polls.is_some_and(|max| polls >= max) {
            tracing::warn!(polls, rows = rows.len(), "list never settled, stopping at poll cap");
            return Ok(dedup_rows(rows));
        }

        view.scroll_to_end().await?;
        tokio::time::sleep(opts.settle_delay).await;
    }
}

fn dedup_rows(rows: Vec<RawRow>) -> Vec<RawRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| match row.key() {
            Some(key) if !key.is_empty() => seen.insert(key.to_string()),
            _ => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parse::RawCell;
    use crate::Error;

    /// Serves `pages[n]` after `n` scrolls, sticking to the last page.
    struct ScriptedView {
        pages: Vec<Vec<RawRow>>,
        reads: usize,
        scrolls: usize,
        fail_on_read: Option<usize>,
    }

    impl ScriptedView {
        fn new(pages: Vec<Vec<RawRow>>) -> Self {
            Self {
                pages,
                reads: 0,
                scrolls: 0,
                fail_on_read: None,
            }
        }
    }

    impl ListView for ScriptedView {
        async fn rows(&mut self) -> Result<Vec<RawRow>> {
            self.reads += 1;
            if self.fail_on_read == Some(self.reads) {
                return Err(Error::ParseMissingSelector("#commits".into()));
            }
            let idx = self.scrolls.min(self.pages.len() - 1);
            Ok(self.pages[idx].clone())
        }

        async fn scroll_to_end(&mut self) -> Result<()> {
            self.scrolls += 1;
            Ok(())
        }
    }

    fn row(key: &str) -> RawRow {
        RawRow {
            cells: vec![RawCell::text(key), RawCell::text("u"), RawCell::text("d"), RawCell::text("t")],
            links: vec![],
        }
    }

    fn rows(range: std::ops::Range<usize>) -> Vec<RawRow> {
        range.map(|i| row(&i.to_string())).collect()
    }

    fn quick() -> LoaderOptions {
        LoaderOptions {
            settle_delay: Duration::ZERO,
            ..Default::default()
        }
    }

    fn keys(rows: &[RawRow]) -> Vec<&str> {
        rows.iter().filter_map(RawRow::key).collect()
    }

    #[tokio::test]
    async fn stops_after_five_unchanged_polls() {
        let mut view = ScriptedView::new(vec![rows(0..10)]);
        let loaded = load(&mut view, &quick()).await.unwrap();
        assert_eq!(loaded.len(), 10);
        assert_eq!(view.reads, 6);
        assert_eq!(view.scrolls, 5);
    }

    #[tokio::test]
    async fn empty_container_returns_immediately() {
        let mut view = ScriptedView::new(vec![vec![]]);
        let loaded = load(&mut view, &quick()).await.unwrap();
        assert!(loaded.is_empty());
        assert_eq!(view.reads, 1);
        assert_eq!(view.scrolls, 0);
    }

    #[tokio::test]
    async fn keeps_scrolling_while_rows_arrive() {
        let mut view = ScriptedView::new(vec![rows(0..3), rows(0..6), rows(0..6), rows(0..9)]);
        let loaded = load(&mut view, &quick()).await.unwrap();
        assert_eq!(keys(&loaded), keys(&rows(0..9)));
        // 4 scripted pages, then 5 unchanged looks at the last one.
        assert_eq!(view.scrolls, 3 + 5);
    }

    #[tokio::test]
    async fn unreadable_last_row_counts_as_empty_key() {
        let mut page = rows(0..2);
        page.push(RawRow::default());
        let mut view = ScriptedView::new(vec![page]);
        let loaded = load(&mut view, &quick()).await.unwrap();
        assert_eq!(loaded.len(), 3);
        // "" matches the initial key, so the count starts on the first look.
        assert_eq!(view.reads, 5);
    }

    #[tokio::test]
    async fn poll_cap_stops_a_list_that_never_settles() {
        let pages = (1..100).map(|n| rows(0..n)).collect();
        let mut view = ScriptedView::new(pages);
        let opts = LoaderOptions {
            max_polls: Some(20),
            ..quick()
        };
        let loaded = load(&mut view, &opts).await.unwrap();
        assert_eq!(view.reads, 20);
        assert_eq!(loaded.len(), 20);
    }

    #[tokio::test]
    async fn duplicates_are_dropped_in_order() {
        let mut page = rows(0..4);
        page.push(row("2"));
        page.push(row("4"));
        let mut view = ScriptedView::new(vec![page]);
        let loaded = load(&mut view, &quick()).await.unwrap();
        assert_eq!(keys(&loaded), ["0", "1", "2", "3", "4"]);
    }

    #[tokio::test]
    async fn read_errors_abort_the_load() {
        let mut view = ScriptedView::new(vec![rows(0..3)]);
        view.fail_on_read = Some(2);
        assert!(load(&mut view, &quick()).await.is_err());
    }

    #[test]
    fn scroll_state_resets_on_change() {
        let mut state = ScrollState::default();
        assert_eq!(state.observe("a"), 0);
        assert_eq!(state.observe("a"), 1);
        assert_eq!(state.observe("a"), 2);
        assert_eq!(state.observe("b"), 0);
        assert_eq!(state.previous_last, "b");
    }
}

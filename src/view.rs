use std::collections::HashSet;

use tokio::task::spawn_blocking;

use crate::loader::ListView;
use crate::parse::{extract_rows, RawRow};
use crate::request::SwarmSession;
use crate::Result;

const COMMITS_PATH: &str = "commits";

/// The Swarm commits list for one range filter.
///
/// Swarm serves the list in slices: the first one for the filter, every
/// further one via `after=<last change>`. Scrolling to the end fetches the
/// next slice and appends it, like the browser does.
pub struct SwarmPageView<'s> {
    session: &'s SwarmSession,
    range_filter: String,
    rows: Vec<RawRow>,
    keys: HashSet<String>,
    loaded: bool,
}

impl<'s> SwarmPageView<'s> {
    pub fn new(session: &'s SwarmSession, range_filter: impl Into<String>) -> Self {
        Self {
            session,
            range_filter: range_filter.into(),
            rows: Vec::new(),
            keys: HashSet::new(),
            loaded: false,
        }
    }

    async fn fetch_slice(&self, after: Option<&str>) -> Result<Vec<RawRow>> {
        let mut query = vec![("range", self.range_filter.as_str()), ("format", "partial")];
        if let Some(after) = after {
            query.push(("after", after));
        }
        let url = self.session.url(COMMITS_PATH, &query)?;
        let html = self.session.get_text(url).await?;

        // HTML parsing is CPU bound, keep it off the runtime threads.
        let base = self.session.base().clone();
        spawn_blocking(move || extract_rows(&html, Some(&base))).await?
    }

    /// Appends rows not seen before. Returns how many were new.
    fn append(&mut self, rows: Vec<RawRow>) -> usize {
        let before = self.rows.len();
        for row in rows {
            let fresh = match row.key() {
                Some(key) if !key.is_empty() => self.keys.insert(key.to_string()),
                _ => true,
            };
            if fresh {
                self.rows.push(row);
            }
        }
        self.rows.len() - before
    }

    fn last_key(&self) -> Option<String> {
        self.rows
            .iter()
            .rev()
            .filter_map(RawRow::key)
            .find(|k| !k.is_empty())
            .map(str::to_string)
    }
}

impl ListView for SwarmPageView<'_> {
    async fn rows(&mut self) -> Result<Vec<RawRow>> {
        if !self.loaded {
            let first = self.fetch_slice(None).await?;
            self.append(first);
            self.loaded = true;
        }
        Ok(self.rows.clone())
    }

    async fn scroll_to_end(&mut self) -> Result<()> {
        let Some(after) = self.last_key() else {
            return Ok(());
        };
        let slice = self.fetch_slice(Some(&after)).await?;
        let added = self.append(slice);
        tracing::debug!(after = %after, added, total = self.rows.len(), "scrolled commits list");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::parse::RawCell;

    fn row(key: &str) -> RawRow {
        RawRow {
            cells: vec![RawCell::text(key)],
            links: vec![],
        }
    }

    #[test]
    fn append_skips_rows_already_held() {
        let creds = Credentials {
            username: "u".into(),
            password: "p".into(),
        };
        let session = SwarmSession::open("http://swarm.example.com", &creds).unwrap();
        let mut view = SwarmPageView::new(&session, "@2025/03/20,@2025/03/21");

        assert_eq!(view.append(vec![row("30"), row("29")]), 2);
        assert_eq!(view.append(vec![row("29"), row("28"), RawRow::default()]), 2);
        assert_eq!(view.rows.len(), 4);
        assert_eq!(view.last_key().as_deref(), Some("28"));
    }
}

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::model::CommitRow;
use crate::range::ZoneOffsets;
use crate::{Error, Result};

/// One table cell as read from the page, whitespace already collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCell {
    pub text: String,
    /// Text of the first link inside the cell.
    pub link_text: Option<String>,
    /// `title` of a `span.timeago` inside the cell, the absolute timestamp.
    pub time_title: Option<String>,
}

impl RawCell {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One `<tr>` as read from the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRow {
    pub cells: Vec<RawCell>,
    /// Every link target found anywhere in the row, in document order.
    pub links: Vec<String>,
}

impl RawRow {
    /// First-column text, the key the list loader watches.
    pub fn key(&self) -> Option<&str> {
        self.cells.first().map(|c| c.text.as_str())
    }
}

struct RowSelectors {
    container: Selector,
    any_row: Selector,
    cell: Selector,
    link: Selector,
    time_ago: Selector,
}

impl RowSelectors {
    fn new() -> Result<Self> {
        Ok(Self {
            container: create_selector("#commits")?,
            any_row: create_selector("tr")?,
            cell: create_selector("td")?,
            link: create_selector("a")?,
            time_ago: create_selector("span.timeago")?,
        })
    }
}

/// Reads every row of the commits table out of `html`.
/// An existing but empty `#commits` container yields no rows. Only when the
/// page has no such container at all, which is what a partial (rows only)
/// response looks like, every `<tr>` is read.
/// Relative link targets are resolved against `base`.
pub fn extract_rows(html: &str, base: Option<&Url>) -> Result<Vec<RawRow>> {
    let selectors = RowSelectors::new()?;
    // A bare `<tr>` outside of a table is dropped by the HTML parser.
    let doc = if html.to_ascii_lowercase().contains("<table") {
        Html::parse_document(html)
    } else {
        Html::parse_document(&format!("<table>{html}</table>"))
    };

    let rows: Vec<ElementRef> = match doc.select(&selectors.container).next() {
        Some(container) => container.select(&selectors.any_row).collect(),
        None => doc.select(&selectors.any_row).collect(),
    };

    Ok(rows
        .into_iter()
        .map(|row| read_row(row, &selectors, base))
        .collect())
}

fn read_row(row: ElementRef, sel: &RowSelectors, base: Option<&Url>) -> RawRow {
    let cells = row
        .select(&sel.cell)
        .map(|td| RawCell {
            text: element_text(td),
            link_text: td.select(&sel.link).next().map(element_text),
            time_title: td
                .select(&sel.time_ago)
                .next()
                .and_then(|span| span.value().attr("title"))
                .map(|t| t.trim().to_string()),
        })
        .collect();

    let links = row
        .select(&sel.link)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| !href.trim().is_empty())
        .map(|href| resolve_link(href.trim(), base))
        .collect();

    RawRow { cells, links }
}

fn resolve_link(href: &str, base: Option<&Url>) -> String {
    match base.map(|b| b.join(href)) {
        Some(Ok(url)) => url.to_string(),
        _ => href.to_string(),
    }
}

/// Rendered text of an element, runs of whitespace collapsed like a browser would.
fn element_text(el: ElementRef) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

#[inline]
fn create_selector(sel_str: &str) -> Result<Selector> {
    Selector::parse(sel_str).map_err(|_| Error::ParseMissingSelector(sel_str.into()))
}

/// Turns a raw row into a [`CommitRow`]. Rows with fewer than four cells
/// (headers, spacers) are skipped, not errors.
pub fn parse_row(row: &RawRow, zones: &ZoneOffsets) -> Option<CommitRow> {
    let [id_cell, author, description, time_cell, ..] = row.cells.as_slice() else {
        return None;
    };
    let id = id_cell
        .link_text
        .clone()
        .unwrap_or_else(|| id_cell.text.clone());
    let committed_query = time_cell
        .time_title
        .clone()
        .unwrap_or_else(|| time_cell.text.clone());
    let committed_display = zones.query_to_display(&committed_query);

    Some(CommitRow {
        id,
        author: author.text.clone(),
        description: description.text.clone(),
        committed_query,
        committed_display,
        links: row.links.clone(),
    })
}

pub fn parse_rows(rows: &[RawRow], zones: &ZoneOffsets) -> Vec<CommitRow> {
    rows.iter().filter_map(|r| parse_row(r, zones)).collect()
}

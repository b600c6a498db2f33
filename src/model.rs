use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{watch, Mutex, MutexGuard};

/// One commit as shown in the result table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRow {
    pub id: String,
    pub author: String,
    pub description: String,
    /// Committed instant as Swarm reports it (UTC).
    pub committed_query: String,
    /// Same instant in KST, 12-hour clock. Blank when the source was unparsable.
    pub committed_display: String,
    pub links: Vec<String>,
}

impl CommitRow {
    /// Rows with links get distinct treatment in the table.
    pub fn has_link(&self) -> bool {
        !self.links.is_empty()
    }

    /// The link followed when the row is activated.
    pub fn first_link(&self) -> Option<&str> {
        self.links.first().map(String::as_str)
    }
}

/// What the display layer sees: rows of exactly one query, or nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Published {
    pub generation: u64,
    pub rows: Arc<Vec<CommitRow>>,
}

/// Handed out by [`ResultSink::begin`]. Holding it keeps other queries out;
/// dropping it without publishing leaves the table cleared.
#[derive(Debug)]
pub struct QueryTicket<'a> {
    generation: u64,
    _serial: MutexGuard<'a, ()>,
}

impl QueryTicket<'_> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The result table. Queries own it one at a time and hand their rows over in
/// a single assignment, so a reader never sees rows from two queries mixed.
#[derive(Debug)]
pub struct ResultSink {
    serial: Mutex<()>,
    generation: AtomicU64,
    tx: watch::Sender<Published>,
}

impl Default for ResultSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultSink {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Published::default());
        Self {
            serial: Mutex::new(()),
            generation: AtomicU64::new(0),
            tx,
        }
    }

    /// Waits for any running query to finish, then clears the table.
    pub async fn begin(&self) -> QueryTicket<'_> {
        let serial = self.serial.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.clear();
        QueryTicket {
            generation,
            _serial: serial,
        }
    }

    pub fn clear(&self) {
        self.tx.send_replace(Published::default());
    }

    /// Installs `rows` as the whole table for `ticket`'s query and lets the
    /// next query in.
    pub fn publish(&self, ticket: QueryTicket<'_>, rows: Vec<CommitRow>) -> usize {
        let count = rows.len();
        self.tx.send_replace(Published {
            generation: ticket.generation,
            rows: Arc::new(rows),
        });
        count
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn subscribe(&self) -> watch::Receiver<Published> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> Published {
        self.tx.borrow().clone()
    }

    /// First link of the row with identifier `id`, for row activation.
    pub fn link_for(&self, id: &str) -> Option<String> {
        self.tx
            .borrow()
            .rows
            .iter()
            .find(|r| r.id == id)
            .and_then(|r| r.first_link().map(str::to_string))
    }
}

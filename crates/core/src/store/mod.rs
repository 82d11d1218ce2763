//! Persistent store interface used by hydration, read-through and write-back.
//!
//! The store is owned by the registration application; this crate only reads
//! ticket families in bulk and appends to the entry log.

mod sqlite;

pub use sqlite::SqliteTicketRepository;

use thiserror::Error;

use crate::entry_log::{EntryLogFact, EntryLogFilter, EntryLogRecord};
use crate::ticket::{ConcertTicket, TeamTicket, TicketRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

/// Trait for the persistent ticket store.
pub trait TicketRepository: Send + Sync {
    /// Every team ticket, each member seeded with their latest entry-log state.
    fn list_team_tickets_with_latest_status(&self) -> Result<Vec<TeamTicket>, StoreError>;

    /// Every concert ticket, seeded with the guest's latest entry-log state.
    fn list_concert_tickets_with_latest_status(&self) -> Result<Vec<ConcertTicket>, StoreError>;

    /// Read a single ticket (either family) with its latest status.
    fn fetch_ticket(&self, code: &str) -> Result<Option<TicketRecord>, StoreError>;

    /// Append a fact to the entry log, returns the assigned row id.
    fn record_entry_log(&self, fact: &EntryLogFact) -> Result<i64, StoreError>;

    /// Query entry-log rows, newest first.
    fn query_entry_log(&self, filter: &EntryLogFilter) -> Result<Vec<EntryLogRecord>, StoreError>;

    /// Count entry-log rows matching the filter (ignores limit/offset).
    fn count_entry_log(&self, filter: &EntryLogFilter) -> Result<i64, StoreError>;
}

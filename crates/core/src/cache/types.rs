use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::codec::CodecError;
use crate::ticket::{EntryState, PersonView, TicketKind, TicketRecord};

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Ticket not found in cache: {0}")]
    NotFound(String),

    #[error("Cached ticket is corrupt: {0}")]
    Codec(#[from] CodecError),

    #[error("Timed out waiting for lock on ticket {0}")]
    LockTimeout(String),

    #[error("Duplicate ticket code in population: {0}")]
    DuplicateCode(String),

    #[error("Mutation changed ticket code from {from} to {to}")]
    KeyChanged { from: String, to: String },
}

/// One cached ticket: the encoded record plus its write metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub bytes: Vec<u8>,
    /// Bumped on every state-changing update; 0 after insert or hydration.
    pub version: u64,
    pub last_write: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            version: 0,
            last_write: Utc::now(),
        }
    }
}

/// Result of [`TicketCache::update_with`](super::TicketCache::update_with).
#[derive(Debug, Clone)]
pub struct Updated<T> {
    /// The record as stored after the update.
    pub record: TicketRecord,
    /// Whatever the mutator returned.
    pub output: T,
    /// Entry version after the update.
    pub version: u64,
    /// False when the mutator left the record untouched (nothing re-encoded).
    pub changed: bool,
}

/// Dashboard view of one cached ticket.
#[derive(Debug, Clone, Serialize)]
pub struct TicketSummary {
    pub code: String,
    pub kind: TicketKind,
    pub version: u64,
    pub last_write: DateTime<Utc>,
    pub people: Vec<PersonView>,
}

impl TicketSummary {
    /// True if any person on the ticket is in `state`.
    pub fn has_person_in(&self, state: EntryState) -> bool {
        self.people.iter().any(|p| p.state == state)
    }
}

/// What one cached ticket contributes to the population counters.
///
/// Kept next to the encoded bytes so counts and listing filters never decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tally {
    pub kind: TicketKind,
    pub states: Vec<EntryState>,
}

impl Tally {
    pub fn of(record: &TicketRecord) -> Self {
        Self {
            kind: record.kind(),
            states: record.people().into_iter().map(|p| p.state).collect(),
        }
    }

    /// True if the ticket passes both optional filters.
    pub fn matches(&self, kind: Option<TicketKind>, state: Option<EntryState>) -> bool {
        kind.map_or(true, |k| self.kind == k)
            && state.map_or(true, |s| self.states.contains(&s))
    }
}

/// Listing request over the cached population.
#[derive(Debug, Clone, Default)]
pub struct TicketQuery {
    pub kind: Option<TicketKind>,
    /// Only tickets with at least one person in this state.
    pub state: Option<EntryState>,
    pub offset: usize,
    pub limit: usize,
}

/// One page of a [`TicketQuery`], sorted by code.
#[derive(Debug, Clone, Default)]
pub struct TicketPage {
    pub tickets: Vec<TicketSummary>,
    /// Matching tickets across all pages.
    pub total: usize,
}

/// Aggregate counts over the cached population.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub tickets: usize,
    pub team_tickets: usize,
    pub concert_tickets: usize,
    pub people: usize,
    pub people_by_state: BTreeMap<EntryState, usize>,
}

impl CacheStats {
    /// All counts zero, with every entry state present.
    pub fn empty() -> Self {
        let mut stats = CacheStats::default();
        for state in EntryState::ALL {
            stats.people_by_state.insert(state, 0);
        }
        stats
    }

    pub fn add(&mut self, tally: &Tally) {
        self.tickets += 1;
        match tally.kind {
            TicketKind::Team => self.team_tickets += 1,
            TicketKind::Concert => self.concert_tickets += 1,
        }
        for state in &tally.states {
            self.people += 1;
            *self.people_by_state.entry(*state).or_insert(0) += 1;
        }
    }

    pub fn remove(&mut self, tally: &Tally) {
        self.tickets = self.tickets.saturating_sub(1);
        match tally.kind {
            TicketKind::Team => self.team_tickets = self.team_tickets.saturating_sub(1),
            TicketKind::Concert => self.concert_tickets = self.concert_tickets.saturating_sub(1),
        }
        for state in &tally.states {
            self.people = self.people.saturating_sub(1);
            if let Some(count) = self.people_by_state.get_mut(state) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

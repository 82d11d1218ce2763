//! Mock ticket repository for testing.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::entry_log::{EntryLogFact, EntryLogFilter, EntryLogRecord};
use crate::store::{StoreError, TicketRepository};
use crate::ticket::{ConcertTicket, TeamTicket, TicketKind, TicketRecord};

/// In-memory implementation of the TicketRepository trait.
///
/// Provides controllable behavior for testing:
/// - Seed tickets of either family
/// - Fail bulk listings, point reads or the next N entry-log writes
/// - Slow down bulk listings to observe parallel fetches
///
/// Written facts with a resolved state are folded back into the stored
/// tickets, so a later hydration sees the same "latest status" a real store
/// would report.
///
/// # Example
///
/// ```rust,ignore
/// use gatekeeper_core::testing::{MockTicketRepository, fixtures};
///
/// let repo = MockTicketRepository::with_tickets(vec![
///     fixtures::team_ticket("TEAM-1", &["m-1", "m-2"]),
///     fixtures::concert_ticket("CONCERT-1"),
/// ]);
/// repo.fail_next_writes(2);
/// ```
#[derive(Debug, Default)]
pub struct MockTicketRepository {
    tickets: Mutex<Vec<TicketRecord>>,
    facts: Mutex<Vec<EntryLogRecord>>,
    failing_writes: AtomicU32,
    fail_team_listing: AtomicBool,
    fail_concert_listing: AtomicBool,
    fail_fetches: AtomicBool,
    team_listing_delay: Mutex<Option<Duration>>,
    concert_listing_delay: Mutex<Option<Duration>>,
    listing_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl MockTicketRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding `tickets`.
    pub fn with_tickets(tickets: Vec<TicketRecord>) -> Self {
        let repo = Self::new();
        *repo.tickets.lock().unwrap() = tickets;
        repo
    }

    /// Add or replace a ticket (keyed by code).
    pub fn put_ticket(&self, record: TicketRecord) {
        let mut tickets = self.tickets.lock().unwrap();
        match tickets.iter_mut().find(|t| t.code() == record.code()) {
            Some(existing) => *existing = record,
            None => tickets.push(record),
        }
    }

    /// Remove a ticket, returning whether it existed.
    pub fn remove_ticket(&self, code: &str) -> bool {
        let mut tickets = self.tickets.lock().unwrap();
        let before = tickets.len();
        tickets.retain(|t| t.code() != code);
        tickets.len() != before
    }

    /// Make the next `n` entry-log writes fail.
    pub fn fail_next_writes(&self, n: u32) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Make team-ticket listings fail.
    pub fn set_team_listing_failure(&self, fail: bool) {
        self.fail_team_listing.store(fail, Ordering::SeqCst);
    }

    /// Make concert-ticket listings fail.
    pub fn set_concert_listing_failure(&self, fail: bool) {
        self.fail_concert_listing.store(fail, Ordering::SeqCst);
    }

    /// Make point reads fail.
    pub fn set_fetch_failure(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    /// Block bulk listings of `kind` for `delay` before answering.
    pub fn set_listing_delay(&self, kind: TicketKind, delay: Option<Duration>) {
        match kind {
            TicketKind::Team => *self.team_listing_delay.lock().unwrap() = delay,
            TicketKind::Concert => *self.concert_listing_delay.lock().unwrap() = delay,
        }
    }

    /// Facts written so far, in write order.
    pub fn written_facts(&self) -> Vec<EntryLogFact> {
        self.facts
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.fact.clone())
            .collect()
    }

    /// Number of bulk listings served (both families).
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Number of point reads served.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn before_listing(&self, kind: TicketKind) -> Result<(), StoreError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        let (delay, failing) = match kind {
            TicketKind::Team => (*self.team_listing_delay.lock().unwrap(), &self.fail_team_listing),
            TicketKind::Concert => (
                *self.concert_listing_delay.lock().unwrap(),
                &self.fail_concert_listing,
            ),
        };
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if failing.load(Ordering::SeqCst) {
            return Err(StoreError::Database(format!(
                "mock {} listing failure",
                kind.as_str()
            )));
        }
        Ok(())
    }

    fn apply_fact(&self, fact: &EntryLogFact) {
        let (Some(person_id), Some(state)) = (&fact.person_id, fact.state_after) else {
            return;
        };
        let mut tickets = self.tickets.lock().unwrap();
        let Some(record) = tickets.iter_mut().find(|t| t.code() == fact.ticket_code) else {
            return;
        };
        match record {
            TicketRecord::Team(team) => {
                if let Some(member) = team.member_mut(person_id) {
                    member.last_entry_state = state;
                }
            }
            TicketRecord::Concert(concert) => {
                if concert.guest_id == *person_id {
                    concert.last_entry_state = state;
                    concert.align_checkpoints(state);
                }
            }
        }
    }

    fn matches(filter: &EntryLogFilter, fact: &EntryLogFact) -> bool {
        filter
            .ticket_code
            .as_ref()
            .map_or(true, |c| *c == fact.ticket_code)
            && filter
                .person_id
                .as_ref()
                .map_or(true, |p| fact.person_id.as_ref() == Some(p))
            && filter
                .device_id
                .as_ref()
                .map_or(true, |d| *d == fact.device_id)
            && filter.outcome.map_or(true, |o| o == fact.outcome)
    }
}

impl TicketRepository for MockTicketRepository {
    fn list_team_tickets_with_latest_status(&self) -> Result<Vec<TeamTicket>, StoreError> {
        self.before_listing(TicketKind::Team)?;
        let tickets = self.tickets.lock().unwrap();
        Ok(tickets
            .iter()
            .filter_map(|t| match t {
                TicketRecord::Team(team) => Some(team.clone()),
                TicketRecord::Concert(_) => None,
            })
            .collect())
    }

    fn list_concert_tickets_with_latest_status(&self) -> Result<Vec<ConcertTicket>, StoreError> {
        self.before_listing(TicketKind::Concert)?;
        let tickets = self.tickets.lock().unwrap();
        Ok(tickets
            .iter()
            .filter_map(|t| match t {
                TicketRecord::Concert(concert) => Some(concert.clone()),
                TicketRecord::Team(_) => None,
            })
            .collect())
    }

    fn fetch_ticket(&self, code: &str) -> Result<Option<TicketRecord>, StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(StoreError::Database("mock fetch failure".to_string()));
        }
        let tickets = self.tickets.lock().unwrap();
        Ok(tickets.iter().find(|t| t.code() == code).cloned())
    }

    fn record_entry_log(&self, fact: &EntryLogFact) -> Result<i64, StoreError> {
        let failing = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(StoreError::Database("mock write failure".to_string()));
        }

        self.apply_fact(fact);

        let mut facts = self.facts.lock().unwrap();
        let id = facts.len() as i64 + 1;
        facts.push(EntryLogRecord {
            id,
            fact: fact.clone(),
        });
        Ok(id)
    }

    fn query_entry_log(&self, filter: &EntryLogFilter) -> Result<Vec<EntryLogRecord>, StoreError> {
        let facts = self.facts.lock().unwrap();
        Ok(facts
            .iter()
            .rev()
            .filter(|r| Self::matches(filter, &r.fact))
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn count_entry_log(&self, filter: &EntryLogFilter) -> Result<i64, StoreError> {
        let facts = self.facts.lock().unwrap();
        Ok(facts.iter().filter(|r| Self::matches(filter, &r.fact)).count() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;
    use crate::ticket::EntryState;

    #[test]
    fn test_fail_next_writes_counts_down() {
        let repo = MockTicketRepository::new();
        repo.fail_next_writes(1);
        assert!(repo.record_entry_log(&fixtures::gate_fact("T-1", 1)).is_err());
        assert!(repo.record_entry_log(&fixtures::gate_fact("T-1", 1)).is_ok());
    }

    #[test]
    fn test_written_state_is_visible_to_listing() {
        let repo = MockTicketRepository::with_tickets(vec![fixtures::team_ticket("T-1", &["m-1"])]);
        repo.record_entry_log(&fixtures::gate_fact("T-1", 1)).unwrap();

        let teams = repo.list_team_tickets_with_latest_status().unwrap();
        assert_eq!(teams[0].members[0].last_entry_state, EntryState::EnteredGate);
    }
}

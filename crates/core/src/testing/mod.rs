//! Testing utilities: an in-memory ticket repository and ticket fixtures.
//!
//! # Example
//!
//! ```rust,ignore
//! use gatekeeper_core::testing::{MockTicketRepository, fixtures};
//!
//! let repo = MockTicketRepository::with_tickets(vec![
//!     fixtures::team_ticket("TEAM-1", &["m-1", "m-2"]),
//! ]);
//! ```

mod mock_repository;

pub use mock_repository::MockTicketRepository;

use tokio::sync::mpsc;

use crate::entry_log::{EntryLogFact, WriteBackMessage};

/// Next fact on a raw entry-log queue, acknowledging flushes on the way.
pub async fn next_fact(rx: &mut mpsc::Receiver<WriteBackMessage>) -> Option<EntryLogFact> {
    while let Some(message) = rx.recv().await {
        match message {
            WriteBackMessage::Fact(fact) => return Some(fact),
            WriteBackMessage::Flush(ack) => {
                let _ = ack.send(());
            }
        }
    }
    None
}

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::entry::ScanOutcome;
    use crate::entry_log::{EntryAction, EntryLogFact};
    use crate::ticket::{
        ConcertRef, ConcertTicket, EntryState, EventRef, Member, PaymentStatus, TeamTicket,
        TicketRecord, Tier,
    };

    /// Paid team ticket for a gate-only event; every member starts `NotEntered`.
    pub fn team_ticket(code: &str, member_ids: &[&str]) -> TicketRecord {
        TicketRecord::Team(TeamTicket {
            code: code.to_string(),
            team_id: format!("team-{}", code),
            team_name: format!("Team {}", code),
            event: EventRef {
                name: "Regional Finals".to_string(),
                date_label: "Day 1".to_string(),
                has_arena_checkpoint: false,
            },
            payment_status: PaymentStatus::Paid,
            members: member_ids
                .iter()
                .map(|id| Member::new(*id, format!("Member {}", id)))
                .collect(),
        })
    }

    /// Same as [`team_ticket`], for an event with an arena checkpoint.
    pub fn team_ticket_with_arena(code: &str, member_ids: &[&str]) -> TicketRecord {
        let mut record = team_ticket(code, member_ids);
        if let TicketRecord::Team(team) = &mut record {
            team.event.has_arena_checkpoint = true;
        }
        record
    }

    /// Gold concert ticket whose guest id is `guest-<code>`.
    pub fn concert_ticket(code: &str) -> TicketRecord {
        concert_ticket_in(code, EntryState::NotEntered)
    }

    /// Concert ticket already progressed to `state`, flags aligned.
    pub fn concert_ticket_in(code: &str, state: EntryState) -> TicketRecord {
        let mut ticket = ConcertTicket {
            code: code.to_string(),
            guest_id: format!("guest-{}", code),
            guest_name: format!("Guest {}", code),
            tier: Tier::Gold,
            concert: ConcertRef {
                name: "Closing Night".to_string(),
                date_label: "Day 2".to_string(),
            },
            is_entered_arena: false,
            is_entered_main_gate: false,
            last_entry_state: state,
        };
        ticket.align_checkpoints(state);
        TicketRecord::Concert(ticket)
    }

    /// Accepted gate scan of member `m-1`, produced at cache `version`.
    pub fn gate_fact(code: &str, version: u64) -> EntryLogFact {
        EntryLogFact {
            ticket_code: code.to_string(),
            person_id: Some("m-1".to_string()),
            action: EntryAction::Gate,
            outcome: ScanOutcome::Accepted,
            state_after: Some(EntryState::EnteredGate),
            device_id: "gate-1".to_string(),
            cache_version: Some(version),
            timestamp: Utc::now(),
        }
    }
}

//! Core ticket data types.
//!
//! These records are what the cache stores (encoded) per ticket code. They are
//! serialized both with bincode (cache encoding) and JSON (HTTP), so every
//! field is always present: no `skip_serializing_if`, no internally tagged enums.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================================================
// Entry State
// ============================================================================

/// Entry state of a single person (team member or concert guest).
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryState {
    /// Has not passed any checkpoint yet.
    #[default]
    NotEntered,
    /// Passed the outer perimeter gate.
    EnteredGate,
    /// Passed the inner arena checkpoint.
    EnteredArena,
    /// Left the venue (terminal for the event).
    Exited,
}

impl EntryState {
    /// All states, in lifecycle order.
    pub const ALL: [EntryState; 4] = [
        EntryState::NotEntered,
        EntryState::EnteredGate,
        EntryState::EnteredArena,
        EntryState::Exited,
    ];

    /// Returns the wire/storage name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::NotEntered => "NOT_ENTERED",
            EntryState::EnteredGate => "ENTERED_GATE",
            EntryState::EnteredArena => "ENTERED_ARENA",
            EntryState::Exited => "EXITED",
        }
    }

    /// Returns true if the person is currently inside the venue.
    pub fn is_inside(&self) -> bool {
        matches!(self, EntryState::EnteredGate | EntryState::EnteredArena)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOT_ENTERED" => Ok(EntryState::NotEntered),
            "ENTERED_GATE" => Ok(EntryState::EnteredGate),
            "ENTERED_ARENA" => Ok(EntryState::EnteredArena),
            "EXITED" => Ok(EntryState::Exited),
            other => Err(format!("unknown entry state: {}", other)),
        }
    }
}

// ============================================================================
// Supporting Types
// ============================================================================

/// Payment status of a team registration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Paid => "PAID",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(PaymentStatus::Pending),
            "PAID" => Ok(PaymentStatus::Paid),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status: {}", other)),
        }
    }
}

/// Concert pass tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    Silver,
    Gold,
    Platinum,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Silver => "SILVER",
            Tier::Gold => "GOLD",
            Tier::Platinum => "PLATINUM",
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SILVER" => Ok(Tier::Silver),
            "GOLD" => Ok(Tier::Gold),
            "PLATINUM" => Ok(Tier::Platinum),
            other => Err(format!("unknown tier: {}", other)),
        }
    }
}

/// Event a team is registered for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventRef {
    pub name: String,
    /// Human-readable date, e.g. "Day 2".
    pub date_label: String,
    /// Whether the event has an inner arena checkpoint in addition to the gate.
    #[serde(default)]
    pub has_arena_checkpoint: bool,
}

/// Concert a guest holds a pass for.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcertRef {
    pub name: String,
    pub date_label: String,
}

/// A member of a team.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Member {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub last_entry_state: EntryState,
}

impl Member {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            last_entry_state: EntryState::NotEntered,
        }
    }
}

// ============================================================================
// Ticket Records
// ============================================================================

/// Ticket held by a team; every member is scanned individually.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamTicket {
    pub code: String,
    pub team_id: String,
    pub team_name: String,
    pub event: EventRef,
    pub payment_status: PaymentStatus,
    /// Members in registration order (leader first).
    pub members: Vec<Member>,
}

impl TeamTicket {
    pub fn member(&self, member_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.id == member_id)
    }

    pub fn member_mut(&mut self, member_id: &str) -> Option<&mut Member> {
        self.members.iter_mut().find(|m| m.id == member_id)
    }
}

/// Individual concert pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConcertTicket {
    pub code: String,
    pub guest_id: String,
    pub guest_name: String,
    pub tier: Tier,
    pub concert: ConcertRef,
    #[serde(default)]
    pub is_entered_arena: bool,
    #[serde(default)]
    pub is_entered_main_gate: bool,
    #[serde(default)]
    pub last_entry_state: EntryState,
}

impl ConcertTicket {
    /// Aligns the checkpoint flags with `state`.
    ///
    /// `Exited` keeps the flags as history; every other state fully determines them.
    pub fn align_checkpoints(&mut self, state: EntryState) {
        match state {
            EntryState::NotEntered => {
                self.is_entered_main_gate = false;
                self.is_entered_arena = false;
            }
            EntryState::EnteredGate => {
                self.is_entered_main_gate = true;
                self.is_entered_arena = false;
            }
            EntryState::EnteredArena => {
                self.is_entered_main_gate = true;
                self.is_entered_arena = true;
            }
            EntryState::Exited => {
                self.is_entered_main_gate = true;
            }
        }
    }
}

/// Kind of ticket, without its payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketKind {
    Team,
    Concert,
}

impl TicketKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketKind::Team => "TEAM",
            TicketKind::Concert => "CONCERT",
        }
    }
}

impl FromStr for TicketKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TEAM" => Ok(TicketKind::Team),
            "CONCERT" => Ok(TicketKind::Concert),
            other => Err(format!("unknown ticket kind: {}", other)),
        }
    }
}

/// A ticket as held by the cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TicketRecord {
    Team(TeamTicket),
    Concert(ConcertTicket),
}

impl TicketRecord {
    /// The ticket code (cache key).
    pub fn code(&self) -> &str {
        match self {
            TicketRecord::Team(team) => &team.code,
            TicketRecord::Concert(concert) => &concert.code,
        }
    }

    pub fn kind(&self) -> TicketKind {
        match self {
            TicketRecord::Team(_) => TicketKind::Team,
            TicketRecord::Concert(_) => TicketKind::Concert,
        }
    }

    /// Flattened view of every person on the ticket.
    pub fn people(&self) -> Vec<PersonView> {
        match self {
            TicketRecord::Team(team) => team
                .members
                .iter()
                .map(|m| PersonView {
                    person_id: m.id.clone(),
                    display_name: m.name.clone(),
                    state: m.last_entry_state,
                })
                .collect(),
            TicketRecord::Concert(concert) => vec![PersonView {
                person_id: concert.guest_id.clone(),
                display_name: concert.guest_name.clone(),
                state: concert.last_entry_state,
            }],
        }
    }
}

impl From<TeamTicket> for TicketRecord {
    fn from(ticket: TeamTicket) -> Self {
        TicketRecord::Team(ticket)
    }
}

impl From<ConcertTicket> for TicketRecord {
    fn from(ticket: ConcertTicket) -> Self {
        TicketRecord::Concert(ticket)
    }
}

// ============================================================================
// Read Views
// ============================================================================

/// One person on a ticket, as shown on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PersonView {
    pub person_id: String,
    pub display_name: String,
    pub state: EntryState,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concert() -> ConcertTicket {
        ConcertTicket {
            code: "C-1".to_string(),
            guest_id: "g-1".to_string(),
            guest_name: "Ada".to_string(),
            tier: Tier::Gold,
            concert: ConcertRef {
                name: "Closing Night".to_string(),
                date_label: "Day 3".to_string(),
            },
            is_entered_arena: false,
            is_entered_main_gate: false,
            last_entry_state: EntryState::NotEntered,
        }
    }

    #[test]
    fn test_entry_state_string_round_trip() {
        for state in EntryState::ALL {
            assert_eq!(state.as_str().parse::<EntryState>().unwrap(), state);
        }
        assert!("INSIDE".parse::<EntryState>().is_err());
    }

    #[test]
    fn test_entry_state_serializes_screaming_snake() {
        let json = serde_json::to_string(&EntryState::EnteredArena).unwrap();
        assert_eq!(json, "\"ENTERED_ARENA\"");
    }

    #[test]
    fn test_is_inside() {
        assert!(!EntryState::NotEntered.is_inside());
        assert!(EntryState::EnteredGate.is_inside());
        assert!(EntryState::EnteredArena.is_inside());
        assert!(!EntryState::Exited.is_inside());
    }

    #[test]
    fn test_align_checkpoints_reset() {
        let mut ticket = concert();
        ticket.is_entered_main_gate = true;
        ticket.is_entered_arena = true;
        ticket.align_checkpoints(EntryState::NotEntered);
        assert!(!ticket.is_entered_main_gate);
        assert!(!ticket.is_entered_arena);
    }

    #[test]
    fn test_align_checkpoints_exited_keeps_arena_history() {
        let mut ticket = concert();
        ticket.is_entered_arena = true;
        ticket.align_checkpoints(EntryState::Exited);
        assert!(ticket.is_entered_main_gate);
        assert!(ticket.is_entered_arena);
    }

    #[test]
    fn test_record_people_concert() {
        let record = TicketRecord::from(concert());
        let people = record.people();
        assert_eq!(people.len(), 1);
        assert_eq!(people[0].person_id, "g-1");
        assert_eq!(record.kind(), TicketKind::Concert);
        assert_eq!(record.code(), "C-1");
    }

    #[test]
    fn test_team_member_lookup() {
        let team = TeamTicket {
            code: "T-1".to_string(),
            team_id: "team-1".to_string(),
            team_name: "Robotics".to_string(),
            event: EventRef {
                name: "Hackathon".to_string(),
                date_label: "Day 1".to_string(),
                has_arena_checkpoint: false,
            },
            payment_status: PaymentStatus::Paid,
            members: vec![Member::new("m-1", "Lin"), Member::new("m-2", "Sam")],
        };
        assert_eq!(team.member("m-2").map(|m| m.name.as_str()), Some("Sam"));
        assert!(team.member("m-3").is_none());
    }

    #[test]
    fn test_ticket_kind_parse_case_insensitive() {
        assert_eq!("team".parse::<TicketKind>().unwrap(), TicketKind::Team);
        assert_eq!("CONCERT".parse::<TicketKind>().unwrap(), TicketKind::Concert);
        assert!("vip".parse::<TicketKind>().is_err());
    }
}

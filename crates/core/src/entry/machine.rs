//! Pure transition function for entry scans.

use serde::{Deserialize, Serialize};

use crate::ticket::EntryState;

/// Checkpoint a device scans at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanType {
    Gate,
    Arena,
    Exit,
}

impl ScanType {
    pub const ALL: [ScanType; 3] = [ScanType::Gate, ScanType::Arena, ScanType::Exit];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Gate => "GATE",
            ScanType::Arena => "ARENA",
            ScanType::Exit => "EXIT",
        }
    }
}

/// Result of a scan as reported to the gate device.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScanOutcome {
    Accepted,
    /// Already past this checkpoint.
    RejectedDuplicate,
    /// Checkpoint reached before the gate.
    RejectedOutOfOrder,
    /// Scan makes no sense for the current state (e.g. exit before entering).
    RejectedInvalid,
    UnknownTicket,
    UnknownMember,
    /// Ticket is locked by a concurrent scan; retry.
    Busy,
}

impl ScanOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanOutcome::Accepted => "ACCEPTED",
            ScanOutcome::RejectedDuplicate => "REJECTED_DUPLICATE",
            ScanOutcome::RejectedOutOfOrder => "REJECTED_OUT_OF_ORDER",
            ScanOutcome::RejectedInvalid => "REJECTED_INVALID",
            ScanOutcome::UnknownTicket => "UNKNOWN_TICKET",
            ScanOutcome::UnknownMember => "UNKNOWN_MEMBER",
            ScanOutcome::Busy => "BUSY",
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, ScanOutcome::Accepted)
    }
}

impl std::str::FromStr for ScanOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACCEPTED" => Ok(ScanOutcome::Accepted),
            "REJECTED_DUPLICATE" => Ok(ScanOutcome::RejectedDuplicate),
            "REJECTED_OUT_OF_ORDER" => Ok(ScanOutcome::RejectedOutOfOrder),
            "REJECTED_INVALID" => Ok(ScanOutcome::RejectedInvalid),
            "UNKNOWN_TICKET" => Ok(ScanOutcome::UnknownTicket),
            "UNKNOWN_MEMBER" => Ok(ScanOutcome::UnknownMember),
            "BUSY" => Ok(ScanOutcome::Busy),
            other => Err(format!("unknown scan outcome: {}", other)),
        }
    }
}

/// Checkpoints available for a ticket's event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoints {
    pub arena: bool,
}

impl Checkpoints {
    pub const GATE_ONLY: Checkpoints = Checkpoints { arena: false };
    pub const GATE_AND_ARENA: Checkpoints = Checkpoints { arena: true };
}

/// Applies a scan to a person's current state.
///
/// Total over every `(state, scan)` pair: rejections leave the state unchanged.
pub fn apply(current: EntryState, scan: ScanType) -> (EntryState, ScanOutcome) {
    use EntryState::*;

    match (scan, current) {
        (ScanType::Gate, NotEntered) => (EnteredGate, ScanOutcome::Accepted),
        (ScanType::Gate, _) => (current, ScanOutcome::RejectedDuplicate),

        (ScanType::Arena, EnteredGate) => (EnteredArena, ScanOutcome::Accepted),
        (ScanType::Arena, NotEntered) => (current, ScanOutcome::RejectedOutOfOrder),
        (ScanType::Arena, EnteredArena | Exited) => (current, ScanOutcome::RejectedDuplicate),

        (ScanType::Exit, EnteredGate | EnteredArena) => (Exited, ScanOutcome::Accepted),
        (ScanType::Exit, NotEntered | Exited) => (current, ScanOutcome::RejectedInvalid),
    }
}

/// Like [`apply`], but rejects arena scans on events without an arena checkpoint.
pub fn apply_with(
    checkpoints: Checkpoints,
    current: EntryState,
    scan: ScanType,
) -> (EntryState, ScanOutcome) {
    if scan == ScanType::Arena && !checkpoints.arena {
        return (current, ScanOutcome::RejectedInvalid);
    }
    apply(current, scan)
}

/// An administrative state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Override {
    pub from: EntryState,
    pub to: EntryState,
}

/// Sets the state to `target` regardless of the transition table.
pub fn override_state(current: EntryState, target: EntryState) -> Override {
    Override {
        from: current,
        to: target,
    }
}

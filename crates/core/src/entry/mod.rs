//! Entry state machine.
//!
//! [`apply`] is the pure per-person transition function. [`scan_record`] and
//! [`override_record`] dispatch it onto a [`TicketRecord`], resolving the person
//! being scanned and keeping concert checkpoint flags in step.

mod machine;

pub use machine::{
    apply, apply_with, override_state, Checkpoints, Override, ScanOutcome, ScanType,
};

use crate::ticket::{EntryState, TicketRecord};

/// A person on a ticket could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMember {
    pub member_id: Option<String>,
}

/// What a scan did to one person on a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonTransition {
    pub person_id: String,
    pub display_name: String,
    pub from: EntryState,
    pub to: EntryState,
    pub outcome: ScanOutcome,
}

/// Checkpoints available for a record's event.
pub fn checkpoints_for(record: &TicketRecord) -> Checkpoints {
    match record {
        TicketRecord::Team(team) => Checkpoints {
            arena: team.event.has_arena_checkpoint,
        },
        TicketRecord::Concert(_) => Checkpoints::GATE_AND_ARENA,
    }
}

/// Applies `scan` to the person identified on `record`.
///
/// Team tickets require `member_id`; concert tickets have a single guest and
/// ignore it.
pub fn scan_record(
    record: &mut TicketRecord,
    member_id: Option<&str>,
    scan: ScanType,
) -> Result<PersonTransition, UnknownMember> {
    let checkpoints = checkpoints_for(record);

    match record {
        TicketRecord::Team(team) => {
            let member = member_id
                .and_then(|id| team.member_mut(id))
                .ok_or_else(|| UnknownMember {
                    member_id: member_id.map(String::from),
                })?;

            let from = member.last_entry_state;
            let (to, outcome) = apply_with(checkpoints, from, scan);
            member.last_entry_state = to;

            Ok(PersonTransition {
                person_id: member.id.clone(),
                display_name: member.name.clone(),
                from,
                to,
                outcome,
            })
        }
        TicketRecord::Concert(concert) => {
            let from = concert.last_entry_state;
            let (to, outcome) = apply_with(checkpoints, from, scan);
            concert.last_entry_state = to;

            if outcome.is_accepted() {
                match scan {
                    ScanType::Gate => concert.is_entered_main_gate = true,
                    ScanType::Arena => concert.is_entered_arena = true,
                    ScanType::Exit => {}
                }
            }

            Ok(PersonTransition {
                person_id: concert.guest_id.clone(),
                display_name: concert.guest_name.clone(),
                from,
                to,
                outcome,
            })
        }
    }
}

/// Administrative override: sets a person's state unconditionally.
///
/// Never used for scans. The caller logs it as its own transition.
pub fn override_record(
    record: &mut TicketRecord,
    person_id: &str,
    target: EntryState,
) -> Result<PersonTransition, UnknownMember> {
    let unknown = || UnknownMember {
        member_id: Some(person_id.to_string()),
    };

    match record {
        TicketRecord::Team(team) => {
            let member = team.member_mut(person_id).ok_or_else(unknown)?;
            let change = override_state(member.last_entry_state, target);
            member.last_entry_state = change.to;

            Ok(PersonTransition {
                person_id: member.id.clone(),
                display_name: member.name.clone(),
                from: change.from,
                to: change.to,
                outcome: ScanOutcome::Accepted,
            })
        }
        TicketRecord::Concert(concert) => {
            if concert.guest_id != person_id {
                return Err(unknown());
            }
            let change = override_state(concert.last_entry_state, target);
            concert.last_entry_state = change.to;
            concert.align_checkpoints(change.to);

            Ok(PersonTransition {
                person_id: concert.guest_id.clone(),
                display_name: concert.guest_name.clone(),
                from: change.from,
                to: change.to,
                outcome: ScanOutcome::Accepted,
            })
        }
    }
}

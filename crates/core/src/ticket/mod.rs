//! Ticket records held by the gate-entry cache.

mod types;

pub use types::{
    ConcertRef, ConcertTicket, EntryState, EventRef, Member, PaymentStatus, PersonView,
    TeamTicket, TicketKind, TicketRecord, Tier,
};

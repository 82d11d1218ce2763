//! Entry log: durable trail of every scan decision and override.
//!
//! Scans queue facts through an [`EntryLogHandle`]; a single
//! [`EntryLogWriter`] task writes them to the [`TicketRepository`](crate::store::TicketRepository).

mod fact;
mod handle;
mod writer;

pub use fact::*;
pub use handle::*;
pub use writer::*;

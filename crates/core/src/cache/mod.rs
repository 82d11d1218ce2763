//! In-memory ticket cache.
//!
//! Holds the whole ticket population as compressed records keyed by ticket
//! code. Each key has its own lock so scans of unrelated tickets never wait on
//! each other; the map-level lock is only held long enough to find a slot.
//! Population counters are maintained on every write, so stats never decode.

mod store;
mod types;

pub use store::TicketCache;
pub use types::{
    CacheEntry, CacheError, CacheStats, Tally, TicketPage, TicketQuery, TicketSummary, Updated,
};

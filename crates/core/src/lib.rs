pub mod cache;
pub mod codec;
pub mod config;
pub mod entry;
pub mod entry_log;
pub mod hydrator;
pub mod metrics;
pub mod scan;
pub mod store;
pub mod testing;
pub mod ticket;

pub use cache::{CacheError, CacheStats, TicketCache, TicketPage, TicketQuery, TicketSummary};
pub use codec::{CodecError, TicketCodec};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use entry::{apply, ScanOutcome, ScanType};
pub use entry_log::{
    create_entry_log_system, EntryAction, EntryLogFact, EntryLogFilter, EntryLogHandle,
    EntryLogRecord, EntryLogWriter, WriteBackMessage, WriteBackStats,
};
pub use hydrator::{HydrationError, HydrationReport, Hydrator};
pub use scan::{OverrideRequest, OverrideResult, ScanCoordinator, ScanError, ScanRequest, ScanResult};
pub use store::{SqliteTicketRepository, StoreError, TicketRepository};
pub use ticket::{EntryState, TicketKind, TicketRecord};

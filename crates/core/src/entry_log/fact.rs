use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entry::{ScanOutcome, ScanType};
use crate::ticket::EntryState;

/// What produced an entry-log fact.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryAction {
    Gate,
    Arena,
    Exit,
    /// Administrative state override, never a device scan.
    Override,
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Gate => "GATE",
            EntryAction::Arena => "ARENA",
            EntryAction::Exit => "EXIT",
            EntryAction::Override => "OVERRIDE",
        }
    }
}

impl From<ScanType> for EntryAction {
    fn from(scan: ScanType) -> Self {
        match scan {
            ScanType::Gate => EntryAction::Gate,
            ScanType::Arena => EntryAction::Arena,
            ScanType::Exit => EntryAction::Exit,
        }
    }
}

impl std::str::FromStr for EntryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GATE" => Ok(EntryAction::Gate),
            "ARENA" => Ok(EntryAction::Arena),
            "EXIT" => Ok(EntryAction::Exit),
            "OVERRIDE" => Ok(EntryAction::Override),
            other => Err(format!("unknown entry action: {}", other)),
        }
    }
}

/// One scan decision (or override) to be persisted.
///
/// Rejected and unknown scans are logged too; `state_after` is `None` only
/// when no person could be resolved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryLogFact {
    pub ticket_code: String,
    pub person_id: Option<String>,
    pub action: EntryAction,
    pub outcome: ScanOutcome,
    pub state_after: Option<EntryState>,
    pub device_id: String,
    /// Cache entry version after a state change; `None` if nothing changed.
    pub cache_version: Option<u64>,
    pub timestamp: DateTime<Utc>,
}

/// A persisted fact with its row id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntryLogRecord {
    pub id: i64,
    #[serde(flatten)]
    pub fact: EntryLogFact,
}

/// Filter for querying the entry log
#[derive(Debug, Clone, Default)]
pub struct EntryLogFilter {
    pub ticket_code: Option<String>,
    pub person_id: Option<String>,
    pub device_id: Option<String>,
    pub outcome: Option<ScanOutcome>,
    pub limit: i64,
    pub offset: i64,
}

impl EntryLogFilter {
    pub fn new() -> Self {
        Self {
            limit: 100,
            offset: 0,
            ..Default::default()
        }
    }

    pub fn with_ticket_code(mut self, code: impl Into<String>) -> Self {
        self.ticket_code = Some(code.into());
        self
    }

    pub fn with_person_id(mut self, person_id: impl Into<String>) -> Self {
        self.person_id = Some(person_id.into());
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_outcome(mut self, outcome: ScanOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

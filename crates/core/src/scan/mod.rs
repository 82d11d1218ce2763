//! Scan coordination: the gate-device ingress path.
//!
//! A scan looks the ticket up in the [`TicketCache`], runs the entry state
//! machine inside the ticket's critical section, queues an entry-log fact and
//! returns. The persistent store is only touched to recover a corrupt entry.
//! A full resync holds new scans off until the new population is in place.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::cache::{CacheError, TicketCache, Updated};
use crate::entry::{
    override_record, scan_record, PersonTransition, ScanOutcome, ScanType, UnknownMember,
};
use crate::entry_log::{EntryAction, EntryLogFact, EntryLogHandle};
use crate::hydrator::{HydrationError, HydrationReport, Hydrator};
use crate::metrics::{CODEC_ERRORS, POINT_RESYNCS, SCANS_TOTAL, SCAN_DURATION};
use crate::store::TicketRepository;
use crate::ticket::{EntryState, TicketKind};

/// A scan as sent by a gate device.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanRequest {
    pub code: String,
    pub scan_type: ScanType,
    pub device_id: String,
    /// Required for team tickets, ignored for concert tickets.
    #[serde(default)]
    pub member_id: Option<String>,
}

/// What the gate device is told.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanResult {
    pub outcome: ScanOutcome,
    pub person_display_name: Option<String>,
    pub ticket_kind: Option<TicketKind>,
    /// The person's state after the scan, when a person was resolved.
    pub state: Option<EntryState>,
    pub scanned_at: DateTime<Utc>,
}

/// Administrative state change for one person on a ticket.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideRequest {
    pub code: String,
    pub person_id: String,
    pub state: EntryState,
    pub operator: String,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OverrideResult {
    pub code: String,
    pub person_id: String,
    pub display_name: String,
    pub previous_state: EntryState,
    pub state: EntryState,
    /// Cache entry version after the override.
    pub version: u64,
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    #[error("Person {person_id} is not on ticket {code}")]
    UnknownPerson { code: String, person_id: String },

    #[error("Ticket {0} is busy, retry")]
    Busy(String),

    #[error("Cache error: {0}")]
    Cache(CacheError),
}

/// Coordinates scans and overrides against the shared cache.
pub struct ScanCoordinator {
    cache: Arc<TicketCache>,
    repository: Arc<dyn TicketRepository>,
    entry_log: EntryLogHandle,
    /// Shared by scans and overrides, exclusive for a resync.
    admission: RwLock<()>,
}

impl ScanCoordinator {
    pub fn new(
        cache: Arc<TicketCache>,
        repository: Arc<dyn TicketRepository>,
        entry_log: EntryLogHandle,
    ) -> Self {
        Self {
            cache,
            repository,
            entry_log,
            admission: RwLock::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<TicketCache> {
        &self.cache
    }

    /// Process one scan.
    ///
    /// Never fails: rejections, unknown codes and lock contention are all
    /// reported through [`ScanResult::outcome`]. Every scan queues exactly one
    /// entry-log fact.
    pub async fn scan(&self, request: ScanRequest) -> ScanResult {
        let started = Instant::now();
        let scanned_at = Utc::now();

        let admitted =
            tokio::time::timeout(self.cache.lock_timeout(), self.admission.read()).await;
        let result = match admitted {
            Ok(_admitted) => self.process(&request, scanned_at).await,
            Err(_) => {
                tracing::warn!(code = %request.code, "Resync in progress, answering BUSY");
                self.record(&request, ScanOutcome::Busy, None, None, None, scanned_at);
                Self::bare_result(ScanOutcome::Busy, None, scanned_at)
            }
        };

        SCANS_TOTAL
            .with_label_values(&[result.outcome.as_str()])
            .inc();
        SCAN_DURATION.observe(started.elapsed().as_secs_f64());
        tracing::debug!(
            code = %request.code,
            scan_type = request.scan_type.as_str(),
            device_id = %request.device_id,
            outcome = result.outcome.as_str(),
            "Scan processed"
        );

        result
    }

    async fn process(&self, request: &ScanRequest, scanned_at: DateTime<Utc>) -> ScanResult {
        match self.attempt(request, scanned_at).await {
            Ok(result) => result,
            Err(CacheError::Codec(e)) => {
                CODEC_ERRORS.inc();
                tracing::warn!(
                    code = %request.code,
                    error = %e,
                    "Cached ticket failed to decode, resyncing from store"
                );
                self.recover(request, scanned_at).await
            }
            Err(e) => self.unresolved(request, scanned_at, e),
        }
    }

    /// Run the state machine once. `Err` only for codec and lock failures.
    async fn attempt(
        &self,
        request: &ScanRequest,
        scanned_at: DateTime<Utc>,
    ) -> Result<ScanResult, CacheError> {
        let member_id = request.member_id.as_deref();
        let scan_type = request.scan_type;

        let updated = match self
            .cache
            .update_with(&request.code, |record| {
                (record.kind(), scan_record(record, member_id, scan_type))
            })
            .await
        {
            Ok(updated) => updated,
            Err(CacheError::NotFound(_)) => {
                self.record(request, ScanOutcome::UnknownTicket, None, None, None, scanned_at);
                return Ok(Self::bare_result(ScanOutcome::UnknownTicket, None, scanned_at));
            }
            Err(e) => return Err(e),
        };

        let (kind, transition) = updated.output;
        match transition {
            Ok(transition) => {
                let version = updated.changed.then_some(updated.version);
                self.record(
                    request,
                    transition.outcome,
                    Some(transition.person_id),
                    Some(transition.to),
                    version,
                    scanned_at,
                );
                Ok(ScanResult {
                    outcome: transition.outcome,
                    person_display_name: Some(transition.display_name),
                    ticket_kind: Some(kind),
                    state: Some(transition.to),
                    scanned_at,
                })
            }
            Err(unknown) => {
                self.record(
                    request,
                    ScanOutcome::UnknownMember,
                    unknown.member_id,
                    None,
                    None,
                    scanned_at,
                );
                Ok(Self::bare_result(
                    ScanOutcome::UnknownMember,
                    Some(kind),
                    scanned_at,
                ))
            }
        }
    }

    /// Repair a corrupt ticket from the store and retry the scan once.
    async fn recover(&self, request: &ScanRequest, scanned_at: DateTime<Utc>) -> ScanResult {
        if let Err(reason) = self.resync_point(&request.code).await {
            tracing::error!(
                code = %request.code,
                reason = %reason,
                "Point resync failed, answering UNKNOWN_TICKET"
            );
            self.record(request, ScanOutcome::UnknownTicket, None, None, None, scanned_at);
            return Self::bare_result(ScanOutcome::UnknownTicket, None, scanned_at);
        }

        match self.attempt(request, scanned_at).await {
            Ok(result) => result,
            Err(e) => self.unresolved(request, scanned_at, e),
        }
    }

    /// Outcome for a scan that could not reach the state machine.
    fn unresolved(
        &self,
        request: &ScanRequest,
        scanned_at: DateTime<Utc>,
        error: CacheError,
    ) -> ScanResult {
        let outcome = match error {
            CacheError::LockTimeout(_) => {
                tracing::warn!(code = %request.code, "Ticket lock contended, answering BUSY");
                ScanOutcome::Busy
            }
            other => {
                tracing::error!(
                    code = %request.code,
                    error = %other,
                    "Scan failed after resync, answering UNKNOWN_TICKET"
                );
                ScanOutcome::UnknownTicket
            }
        };
        self.record(
            request,
            outcome,
            request.member_id.clone(),
            None,
            None,
            scanned_at,
        );
        Self::bare_result(outcome, None, scanned_at)
    }

    /// Repair one corrupt cache entry from the store's copy.
    ///
    /// The repair goes through the entry's own slot, so when several scans
    /// race here only the first overwrites and the rest retry against it.
    async fn resync_point(&self, code: &str) -> Result<(), String> {
        let repository = Arc::clone(&self.repository);
        let lookup = code.to_string();
        let fetched = tokio::task::spawn_blocking(move || repository.fetch_ticket(&lookup))
            .await
            .map_err(|e| format!("fetch task failed: {}", e))
            .and_then(|r| r.map_err(|e| e.to_string()));

        let record = match fetched {
            Ok(Some(record)) => record,
            Ok(None) => {
                POINT_RESYNCS.with_label_values(&["missing"]).inc();
                return Err("ticket not in store".to_string());
            }
            Err(e) => {
                POINT_RESYNCS.with_label_values(&["failed"]).inc();
                return Err(e);
            }
        };

        match self.cache.repair(record).await {
            Ok(true) => {
                POINT_RESYNCS.with_label_values(&["recovered"]).inc();
                tracing::info!(code, "Ticket resynced from store");
                Ok(())
            }
            Ok(false) => {
                tracing::debug!(code, "Ticket already repaired by a concurrent scan");
                Ok(())
            }
            Err(e) => {
                POINT_RESYNCS.with_label_values(&["failed"]).inc();
                Err(e.to_string())
            }
        }
    }

    /// Rebuild the whole cache from the store.
    ///
    /// Scans and overrides wait (up to the lock timeout, then `BUSY`) while
    /// this runs, so none is answered from a population that is about to be
    /// replaced. Pair with a hydrator built
    /// [`with_entry_log`](Hydrator::with_entry_log) so queued facts reach
    /// the store before it is read.
    pub async fn resync(&self, hydrator: &Hydrator) -> Result<HydrationReport, HydrationError> {
        let _exclusive = self.admission.write().await;
        hydrator.hydrate(&self.cache).await
    }

    /// Set a person's state unconditionally.
    ///
    /// Logged as an `OVERRIDE` fact from device `admin:<operator>`.
    pub async fn override_entry(
        &self,
        request: OverrideRequest,
    ) -> Result<OverrideResult, ScanError> {
        let _admitted = tokio::time::timeout(self.cache.lock_timeout(), self.admission.read())
            .await
            .map_err(|_| ScanError::Busy(request.code.clone()))?;

        let updated = match self.apply_override(&request).await {
            Err(CacheError::Codec(e)) => {
                CODEC_ERRORS.inc();
                tracing::warn!(code = %request.code, error = %e, "Cached ticket failed to decode");
                self.resync_point(&request.code)
                    .await
                    .map_err(|_| ScanError::TicketNotFound(request.code.clone()))?;
                self.apply_override(&request).await
            }
            other => other,
        };

        let updated = updated.map_err(|e| match e {
            CacheError::NotFound(code) => ScanError::TicketNotFound(code),
            CacheError::LockTimeout(code) => ScanError::Busy(code),
            other => ScanError::Cache(other),
        })?;

        let transition = updated.output.map_err(|_| ScanError::UnknownPerson {
            code: request.code.clone(),
            person_id: request.person_id.clone(),
        })?;

        self.entry_log.try_emit(EntryLogFact {
            ticket_code: request.code.clone(),
            person_id: Some(transition.person_id.clone()),
            action: EntryAction::Override,
            outcome: ScanOutcome::Accepted,
            state_after: Some(transition.to),
            device_id: format!("admin:{}", request.operator),
            cache_version: updated.changed.then_some(updated.version),
            timestamp: Utc::now(),
        });

        tracing::info!(
            code = %request.code,
            person_id = %transition.person_id,
            from = transition.from.as_str(),
            to = transition.to.as_str(),
            operator = %request.operator,
            reason = request.reason.as_deref().unwrap_or(""),
            "Entry state overridden"
        );

        Ok(OverrideResult {
            code: request.code,
            person_id: transition.person_id,
            display_name: transition.display_name,
            previous_state: transition.from,
            state: transition.to,
            version: updated.version,
        })
    }

    async fn apply_override(
        &self,
        request: &OverrideRequest,
    ) -> Result<Updated<Result<PersonTransition, UnknownMember>>, CacheError> {
        let person_id = request.person_id.as_str();
        let target = request.state;
        self.cache
            .update_with(&request.code, |record| {
                override_record(record, person_id, target)
            })
            .await
    }

    fn record(
        &self,
        request: &ScanRequest,
        outcome: ScanOutcome,
        person_id: Option<String>,
        state_after: Option<EntryState>,
        cache_version: Option<u64>,
        timestamp: DateTime<Utc>,
    ) {
        self.entry_log.try_emit(EntryLogFact {
            ticket_code: request.code.clone(),
            person_id,
            action: request.scan_type.into(),
            outcome,
            state_after,
            device_id: request.device_id.clone(),
            cache_version,
            timestamp,
        });
    }

    fn bare_result(
        outcome: ScanOutcome,
        ticket_kind: Option<TicketKind>,
        scanned_at: DateTime<Utc>,
    ) -> ScanResult {
        ScanResult {
            outcome,
            person_display_name: None,
            ticket_kind,
            state: None,
            scanned_at,
        }
    }
}

use std::sync::Arc;

use tokio::sync::mpsc;

use super::{EntryLogFact, EntryLogHandle, WriteBackMessage};
use crate::cache::TicketCache;
use crate::config::WriteBackConfig;
use crate::metrics::{WRITE_BACK_CONFLICTS, WRITE_BACK_DROPPED, WRITE_BACK_RETRIES};
use crate::store::TicketRepository;

/// Counters reported by the writer when its queue closes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBackStats {
    pub written: u64,
    pub retried: u64,
    pub dropped: u64,
    pub conflicts: u64,
}

/// Background task that drains entry-log facts into the persistent store.
///
/// A single writer consumes the queue, so facts reach the store in the order
/// they were queued. Failed writes are retried with exponential backoff; a
/// fact that exhausts its attempts is dropped with an error-level alert.
/// A flush request is acknowledged only after everything queued ahead of it.
pub struct EntryLogWriter {
    rx: mpsc::Receiver<WriteBackMessage>,
    repository: Arc<dyn TicketRepository>,
    policy: WriteBackConfig,
    cache: Option<Arc<TicketCache>>,
}

impl EntryLogWriter {
    pub fn new(
        rx: mpsc::Receiver<WriteBackMessage>,
        repository: Arc<dyn TicketRepository>,
        policy: WriteBackConfig,
    ) -> Self {
        Self {
            rx,
            repository,
            policy,
            cache: None,
        }
    }

    /// Compare each fact against the live cache before writing it.
    pub fn with_cache(mut self, cache: Arc<TicketCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run the writer, consuming facts until every handle is dropped
    ///
    /// This should be spawned as a background task.
    pub async fn run(mut self) -> WriteBackStats {
        tracing::info!(
            max_attempts = self.policy.max_attempts,
            "Entry-log writer started"
        );

        let mut stats = WriteBackStats::default();

        while let Some(message) = self.rx.recv().await {
            match message {
                WriteBackMessage::Fact(fact) => self.persist(fact, &mut stats).await,
                WriteBackMessage::Flush(ack) => {
                    // The requester may have given up waiting.
                    let _ = ack.send(());
                }
            }
        }

        tracing::info!(
            written = stats.written,
            retried = stats.retried,
            dropped = stats.dropped,
            "Entry-log writer shutting down"
        );
        stats
    }

    async fn persist(&self, fact: EntryLogFact, stats: &mut WriteBackStats) {
        if self.is_conflicting(&fact).await {
            stats.conflicts += 1;
            WRITE_BACK_CONFLICTS.inc();
            tracing::warn!(
                ticket_code = %fact.ticket_code,
                cache_version = ?fact.cache_version,
                "Entry-log fact is newer than the cached ticket, writing anyway"
            );
        }

        match self.write_with_retry(&fact, stats).await {
            Ok(id) => {
                stats.written += 1;
                tracing::debug!(id, ticket_code = %fact.ticket_code, "Entry-log fact written");
            }
            Err(e) => {
                stats.dropped += 1;
                WRITE_BACK_DROPPED.inc();
                tracing::error!(
                    ticket_code = %fact.ticket_code,
                    person_id = ?fact.person_id,
                    outcome = fact.outcome.as_str(),
                    attempts = self.policy.max_attempts,
                    error = %e,
                    "Entry-log fact dropped after exhausting retries"
                );
            }
        }
    }

    /// A fact conflicts when the cache no longer holds the version it was
    /// produced from, e.g. after a resync replaced the entry.
    async fn is_conflicting(&self, fact: &EntryLogFact) -> bool {
        let (Some(cache), Some(produced)) = (&self.cache, fact.cache_version) else {
            return false;
        };

        match cache.snapshot_version(&fact.ticket_code).await {
            Ok(Some(current)) => current < produced,
            Ok(None) => true,
            // A corrupt entry will be resynced on its next scan.
            Err(_) => false,
        }
    }

    async fn write_with_retry(
        &self,
        fact: &EntryLogFact,
        stats: &mut WriteBackStats,
    ) -> Result<i64, String> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            let repository = Arc::clone(&self.repository);
            let pending = fact.clone();
            let result =
                tokio::task::spawn_blocking(move || repository.record_entry_log(&pending)).await;

            match result {
                Ok(Ok(id)) => return Ok(id),
                Ok(Err(e)) => last_error = e.to_string(),
                Err(e) => last_error = format!("write task failed: {}", e),
            }

            if attempt < max_attempts {
                let delay = self.policy.backoff_for(attempt);
                stats.retried += 1;
                WRITE_BACK_RETRIES.inc();
                tracing::warn!(
                    ticket_code = %fact.ticket_code,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %last_error,
                    "Entry-log write failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error)
    }
}

/// Create a complete entry-log system
///
/// Returns:
/// - `EntryLogHandle` - for queueing facts (clone this to share across tasks)
/// - `EntryLogWriter` - spawn this as a background task with `tokio::spawn(writer.run())`
pub fn create_entry_log_system(
    repository: Arc<dyn TicketRepository>,
    policy: WriteBackConfig,
) -> (EntryLogHandle, EntryLogWriter) {
    let (tx, rx) = mpsc::channel(policy.buffer_size.max(1));
    let handle = EntryLogHandle::new(tx);
    let writer = EntryLogWriter::new(rx, repository, policy);
    (handle, writer)
}

//! Bulk load of the ticket population from the persistent store.
//!
//! Both ticket families are fetched concurrently on the blocking pool. The
//! cache is only touched once both succeed, and then in a single swap. Queued
//! entry-log facts are flushed first so the store already holds every
//! transition the cache has answered.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::cache::{CacheError, TicketCache};
use crate::entry_log::EntryLogHandle;
use crate::metrics::{HYDRATIONS_TOTAL, HYDRATION_DURATION};
use crate::store::{StoreError, TicketRepository};
use crate::ticket::TicketRecord;

#[derive(Debug, Error)]
pub enum HydrationError {
    #[error("Failed to load {family} tickets: {source}")]
    Store {
        family: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("Hydration task failed: {0}")]
    Join(String),

    #[error("Ticket code appears more than once: {0}")]
    DuplicateCode(String),

    #[error("Cache error: {0}")]
    Cache(CacheError),
}

/// Outcome of a successful hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HydrationReport {
    pub team_tickets: usize,
    pub concert_tickets: usize,
    /// Team members across all team tickets.
    pub members: usize,
    pub elapsed: Duration,
}

impl HydrationReport {
    pub fn total_tickets(&self) -> usize {
        self.team_tickets + self.concert_tickets
    }
}

/// Loads every ticket with its latest entry status into a [`TicketCache`].
pub struct Hydrator {
    repository: Arc<dyn TicketRepository>,
    entry_log: Option<EntryLogHandle>,
}

impl Hydrator {
    pub fn new(repository: Arc<dyn TicketRepository>) -> Self {
        Self {
            repository,
            entry_log: None,
        }
    }

    /// Flush this entry-log queue before every load.
    pub fn with_entry_log(mut self, entry_log: EntryLogHandle) -> Self {
        self.entry_log = Some(entry_log);
        self
    }

    /// Replace the cache population with the store's current contents.
    ///
    /// Fails fast if either family fails to load; the existing population is
    /// left untouched in that case.
    pub async fn hydrate(&self, cache: &TicketCache) -> Result<HydrationReport, HydrationError> {
        let started = Instant::now();
        let result = self.load_and_swap(cache, started).await;

        HYDRATION_DURATION.observe(started.elapsed().as_secs_f64());
        match &result {
            Ok(report) => {
                HYDRATIONS_TOTAL.with_label_values(&["success"]).inc();
                tracing::info!(
                    team_tickets = report.team_tickets,
                    concert_tickets = report.concert_tickets,
                    members = report.members,
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    "Cache hydrated"
                );
            }
            Err(e) => {
                HYDRATIONS_TOTAL.with_label_values(&["failed"]).inc();
                tracing::error!(error = %e, "Cache hydration failed");
            }
        }

        result
    }

    async fn load_and_swap(
        &self,
        cache: &TicketCache,
        started: Instant,
    ) -> Result<HydrationReport, HydrationError> {
        if let Some(entry_log) = &self.entry_log {
            if !entry_log.flush().await {
                tracing::warn!("Entry-log writer is gone, hydrating without a flush");
            }
        }

        let teams = fetch_family(Arc::clone(&self.repository), "team", |repo| {
            repo.list_team_tickets_with_latest_status()
        });
        let concerts = fetch_family(Arc::clone(&self.repository), "concert", |repo| {
            repo.list_concert_tickets_with_latest_status()
        });

        let (teams, concerts) = tokio::try_join!(teams, concerts)?;

        let team_tickets = teams.len();
        let concert_tickets = concerts.len();
        let members = teams.iter().map(|t| t.members.len()).sum();

        let records = teams
            .into_iter()
            .map(TicketRecord::Team)
            .chain(concerts.into_iter().map(TicketRecord::Concert));

        cache.replace_all(records).await.map_err(|e| match e {
            CacheError::DuplicateCode(code) => HydrationError::DuplicateCode(code),
            other => HydrationError::Cache(other),
        })?;

        Ok(HydrationReport {
            team_tickets,
            concert_tickets,
            members,
            elapsed: started.elapsed(),
        })
    }
}

async fn fetch_family<T, F>(
    repository: Arc<dyn TicketRepository>,
    family: &'static str,
    fetch: F,
) -> Result<Vec<T>, HydrationError>
where
    T: Send + 'static,
    F: FnOnce(&dyn TicketRepository) -> Result<Vec<T>, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || fetch(repository.as_ref()))
        .await
        .map_err(|e| HydrationError::Join(e.to_string()))?
        .map_err(|source| HydrationError::Store { family, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::TicketCodec;
    use crate::testing::{fixtures, MockTicketRepository};
    use crate::ticket::{EntryState, TicketKind};

    fn cache() -> TicketCache {
        TicketCache::new(TicketCodec::default(), Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_hydrate_loads_both_families() {
        let repo = Arc::new(MockTicketRepository::with_tickets(vec![
            fixtures::team_ticket("T-1", &["m-1", "m-2"]),
            fixtures::team_ticket("T-2", &["m-3"]),
            fixtures::concert_ticket("C-1"),
        ]));
        let cache = cache();

        let report = Hydrator::new(repo).hydrate(&cache).await.unwrap();

        assert_eq!(report.team_tickets, 2);
        assert_eq!(report.concert_tickets, 1);
        assert_eq!(report.members, 3);
        assert_eq!(report.total_tickets(), 3);
        assert_eq!(cache.len().await, 3);
        assert_eq!(cache.snapshot_version("T-1").await.unwrap(), Some(0));
    }

    #[tokio::test]
    async fn test_hydrate_keeps_latest_states() {
        let repo = Arc::new(MockTicketRepository::with_tickets(vec![
            fixtures::concert_ticket_in("C-1", EntryState::EnteredArena),
        ]));
        let cache = cache();

        Hydrator::new(repo).hydrate(&cache).await.unwrap();

        let Some(TicketRecord::Concert(concert)) = cache.get("C-1").await.unwrap() else {
            panic!("expected concert ticket");
        };
        assert_eq!(concert.last_entry_state, EntryState::EnteredArena);
        assert!(concert.is_entered_arena);
    }

    #[tokio::test]
    async fn test_failed_family_leaves_population_untouched() {
        let repo = Arc::new(MockTicketRepository::with_tickets(vec![
            fixtures::team_ticket("T-1", &["m-1"]),
        ]));
        let cache = cache();
        let hydrator = Hydrator::new(repo.clone());
        hydrator.hydrate(&cache).await.unwrap();

        repo.put_ticket(fixtures::team_ticket("T-2", &["m-2"]));
        repo.set_concert_listing_failure(true);

        let err = hydrator.hydrate(&cache).await.unwrap_err();
        assert!(matches!(err, HydrationError::Store { family: "concert", .. }));
        assert_eq!(cache.codes().await, vec!["T-1".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_does_not_wait_for_slow_family() {
        let repo = Arc::new(MockTicketRepository::new());
        repo.set_team_listing_failure(true);
        repo.set_listing_delay(TicketKind::Concert, Some(Duration::from_millis(800)));

        let started = Instant::now();
        let result = Hydrator::new(repo).hydrate(&cache()).await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(600));
    }

    #[tokio::test]
    async fn test_families_load_in_parallel() {
        let repo = Arc::new(MockTicketRepository::with_tickets(vec![
            fixtures::team_ticket("T-1", &["m-1"]),
            fixtures::concert_ticket("C-1"),
        ]));
        repo.set_listing_delay(TicketKind::Team, Some(Duration::from_millis(300)));
        repo.set_listing_delay(TicketKind::Concert, Some(Duration::from_millis(300)));

        let started = Instant::now();
        Hydrator::new(repo.clone()).hydrate(&cache()).await.unwrap();

        assert_eq!(repo.listing_calls(), 2);
        assert!(started.elapsed() < Duration::from_millis(550));
    }

    #[tokio::test]
    async fn test_pending_facts_reach_store_before_load() {
        let repo = Arc::new(MockTicketRepository::with_tickets(vec![
            fixtures::concert_ticket("C-1"),
        ]));
        repo.fail_next_writes(1);
        let policy = crate::config::WriteBackConfig {
            buffer_size: 8,
            max_attempts: 3,
            initial_backoff_ms: 200,
            max_backoff_ms: 200,
            backoff_multiplier: 1.0,
        };
        let (entry_log, writer) = crate::entry_log::create_entry_log_system(repo.clone(), policy);
        tokio::spawn(writer.run());

        let mut fact = fixtures::gate_fact("C-1", 1);
        fact.person_id = Some("guest-C-1".to_string());
        entry_log.emit(fact).await;

        let cache = cache();
        Hydrator::new(repo.clone())
            .with_entry_log(entry_log)
            .hydrate(&cache)
            .await
            .unwrap();

        let Some(TicketRecord::Concert(concert)) = cache.get("C-1").await.unwrap() else {
            panic!("expected concert ticket");
        };
        assert_eq!(concert.last_entry_state, EntryState::EnteredGate);
    }

    #[tokio::test]
    async fn test_duplicate_code_across_families() {
        let repo = Arc::new(MockTicketRepository::with_tickets(vec![
            fixtures::team_ticket("X-1", &["m-1"]),
            fixtures::concert_ticket("X-1"),
        ]));
        let cache = cache();

        let err = Hydrator::new(repo).hydrate(&cache).await.unwrap_err();
        assert!(matches!(err, HydrationError::DuplicateCode(code) if code == "X-1"));
        assert!(cache.is_empty().await);
    }
}

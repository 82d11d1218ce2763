use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gatekeeper_core::{
    Config, EntryLogHandle, Hydrator, SanitizedConfig, ScanCoordinator, TicketCache,
    TicketRepository,
};

/// Shared application state
pub struct AppState {
    config: Config,
    cache: Arc<TicketCache>,
    repository: Arc<dyn TicketRepository>,
    coordinator: ScanCoordinator,
    hydrator: Hydrator,
    /// Set once the first hydration succeeded; scans are refused before that.
    ready: AtomicBool,
}

impl AppState {
    pub fn new(
        config: Config,
        cache: Arc<TicketCache>,
        repository: Arc<dyn TicketRepository>,
        entry_log: EntryLogHandle,
    ) -> Self {
        let hydrator = Hydrator::new(Arc::clone(&repository)).with_entry_log(entry_log.clone());
        let coordinator =
            ScanCoordinator::new(Arc::clone(&cache), Arc::clone(&repository), entry_log);

        Self {
            config,
            cache,
            repository,
            coordinator,
            hydrator,
            ready: AtomicBool::new(false),
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn cache(&self) -> &TicketCache {
        self.cache.as_ref()
    }

    pub fn repository(&self) -> &dyn TicketRepository {
        self.repository.as_ref()
    }

    pub fn coordinator(&self) -> &ScanCoordinator {
        &self.coordinator
    }

    pub fn hydrator(&self) -> &Hydrator {
        &self.hydrator
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

//! Common test utilities for in-process router tests.
//!
//! The fixture wires the real router, cache, coordinator and entry-log writer
//! around a [`MockTicketRepository`], so tests can seed tickets and inject
//! store failures without a database.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use gatekeeper_core::config::WriteBackConfig;
use gatekeeper_core::testing::MockTicketRepository;
use gatekeeper_core::{create_entry_log_system, Config, EntryLogFact, TicketCache, TicketRecord};
use gatekeeper_server::api::create_router;
use gatekeeper_server::state::AppState;

/// Re-export fixtures for test convenience
pub use gatekeeper_core::testing::fixtures;

/// In-process server with a controllable repository.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    pub repository: Arc<MockTicketRepository>,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl TestFixture {
    /// Fixture seeded with `tickets` and already hydrated.
    pub async fn with_tickets(tickets: Vec<TicketRecord>) -> Self {
        let fixture = Self::unhydrated(tickets);
        fixture
            .state
            .hydrator()
            .hydrate(fixture.state.cache())
            .await
            .expect("hydration failed");
        fixture.state.mark_ready();
        fixture
    }

    /// Fixture whose cache has not been hydrated yet.
    pub fn unhydrated(tickets: Vec<TicketRecord>) -> Self {
        let config = Config::default();
        let repository = Arc::new(MockTicketRepository::with_tickets(tickets));
        let cache = Arc::new(TicketCache::from_config(&config.cache));

        let policy = WriteBackConfig {
            buffer_size: 256,
            max_attempts: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 2,
            backoff_multiplier: 2.0,
        };
        let (entry_log, writer) = create_entry_log_system(repository.clone(), policy);
        tokio::spawn(writer.with_cache(Arc::clone(&cache)).run());

        let state = Arc::new(AppState::new(config, cache, repository.clone(), entry_log));
        let router = create_router(Arc::clone(&state));

        Self {
            router,
            state,
            repository,
        }
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> TestResponse {
        self.post_raw(uri, body.to_string()).await
    }

    pub async fn post_raw(&self, uri: &str, body: String) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    /// Raw text body, for the metrics endpoint.
    pub async fn get_text(&self, uri: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, body }
    }

    /// Poll until the writer has persisted at least `count` facts.
    pub async fn wait_for_facts(&self, count: usize) -> Vec<EntryLogFact> {
        for _ in 0..100 {
            let facts = self.repository.written_facts();
            if facts.len() >= count {
                return facts;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "expected {} facts, got {}",
            count,
            self.repository.written_facts().len()
        );
    }
}

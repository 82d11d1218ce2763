use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::{admin, entry_log, handlers, middleware::metrics_middleware, scan, tickets};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Gate devices
        .route("/scan", post(scan::scan))
        // Dashboard (read-only) and insert-on-create
        .route("/tickets", get(tickets::list_tickets))
        .route("/tickets", post(tickets::insert_ticket))
        .route("/tickets/{code}", get(tickets::get_ticket))
        .route("/stats", get(tickets::get_stats))
        // Entry log
        .route("/entry-log", get(entry_log::query_entry_log))
        // Admin
        .route("/admin/resync", post(admin::resync))
        .route("/admin/override", post(admin::override_entry));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

//! Dashboard ticket API handlers.
//!
//! Reads go straight to the cache and never trigger transitions.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use gatekeeper_core::{
    CacheError, CacheStats, EntryState, TicketKind, TicketQuery, TicketRecord, TicketSummary,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Maximum allowed limit for ticket queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for ticket queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Query parameters for listing tickets
#[derive(Debug, Deserialize)]
pub struct ListTicketsParams {
    /// Filter by ticket kind (`team` or `concert`)
    pub kind: Option<String>,
    /// Only tickets with at least one person in this entry state
    pub state: Option<String>,
    /// Maximum number of tickets to return
    pub limit: Option<i64>,
    /// Pagination offset
    pub offset: Option<i64>,
}

/// Response for listing tickets
#[derive(Debug, Serialize)]
pub struct ListTicketsResponse {
    pub tickets: Vec<TicketSummary>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// One ticket with its cache version
#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub version: Option<u64>,
    pub ticket: TicketRecord,
}

/// Response for inserting a ticket
#[derive(Debug, Serialize)]
pub struct InsertTicketResponse {
    pub code: String,
    pub kind: TicketKind,
}

fn error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn cache_error(e: CacheError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        CacheError::NotFound(_) => StatusCode::NOT_FOUND,
        CacheError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error(status, e.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// List cached tickets with optional filters
pub async fn list_tickets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListTicketsParams>,
) -> Result<Json<ListTicketsResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let kind = match params.kind.as_deref().map(str::parse::<TicketKind>).transpose() {
        Ok(kind) => kind,
        Err(e) => return Err(error(StatusCode::BAD_REQUEST, e)),
    };
    let entry_state = match params
        .state
        .as_deref()
        .map(str::parse::<EntryState>)
        .transpose()
    {
        Ok(entry_state) => entry_state,
        Err(e) => return Err(error(StatusCode::BAD_REQUEST, e)),
    };

    let page = state
        .cache()
        .page(&TicketQuery {
            kind,
            state: entry_state,
            offset: offset as usize,
            limit: limit as usize,
        })
        .await;

    Ok(Json(ListTicketsResponse {
        tickets: page.tickets,
        total: page.total as i64,
        limit,
        offset,
    }))
}

/// Get one cached ticket by code
pub async fn get_ticket(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<TicketResponse>, impl IntoResponse> {
    let ticket = match state.cache().get(&code).await {
        Ok(Some(ticket)) => ticket,
        Ok(None) => {
            return Err(error(
                StatusCode::NOT_FOUND,
                format!("Ticket not found: {}", code),
            ))
        }
        Err(e) => return Err(cache_error(e)),
    };

    let version = state.cache().snapshot_version(&code).await.unwrap_or(None);

    Ok(Json(TicketResponse { version, ticket }))
}

/// Insert a newly registered ticket into the cache
///
/// Refuses codes that are already cached so a live entry state is never reset.
pub async fn insert_ticket(
    State(state): State<Arc<AppState>>,
    Json(record): Json<TicketRecord>,
) -> Result<(StatusCode, Json<InsertTicketResponse>), impl IntoResponse> {
    let code = record.code().to_string();
    if code.trim().is_empty() {
        return Err(error(StatusCode::BAD_REQUEST, "Ticket code cannot be empty"));
    }

    let kind = record.kind();
    match state.cache().insert_new(record).await {
        Ok(true) => {}
        Ok(false) => {
            return Err(error(
                StatusCode::CONFLICT,
                format!("Ticket already cached: {}", code),
            ))
        }
        Err(e) => return Err(cache_error(e)),
    }

    tracing::info!(code = %code, kind = kind.as_str(), "Ticket inserted on create");
    Ok((StatusCode::CREATED, Json(InsertTicketResponse { code, kind })))
}

/// Aggregate counts over the cached population
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<CacheStats> {
    Json(state.cache().stats())
}

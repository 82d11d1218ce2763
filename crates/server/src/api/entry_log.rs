use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use gatekeeper_core::{EntryLogFilter, EntryLogRecord, ScanOutcome};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Maximum allowed limit for entry-log queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for entry-log queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for entry-log endpoint
#[derive(Debug, Deserialize)]
pub struct EntryLogQueryParams {
    /// Filter by ticket code
    pub ticket_code: Option<String>,
    /// Filter by team member or guest id
    pub person_id: Option<String>,
    /// Filter by scanning device
    pub device_id: Option<String>,
    /// Filter by outcome (e.g. `REJECTED_DUPLICATE`)
    pub outcome: Option<String>,
    /// Maximum number of rows to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

/// Response for entry-log query endpoint
#[derive(Debug, Serialize)]
pub struct EntryLogQueryResponse {
    /// Matching rows, newest first
    pub entries: Vec<EntryLogRecord>,
    /// Total number of matching rows
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query the persisted entry log (dispute resolution)
pub async fn query_entry_log(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EntryLogQueryParams>,
) -> Result<Json<EntryLogQueryResponse>, impl IntoResponse> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    // Build base filter (shared between query and count)
    let mut base_filter = EntryLogFilter::new();

    if let Some(ref code) = params.ticket_code {
        base_filter = base_filter.with_ticket_code(code);
    }

    if let Some(ref person_id) = params.person_id {
        base_filter = base_filter.with_person_id(person_id);
    }

    if let Some(ref device_id) = params.device_id {
        base_filter = base_filter.with_device_id(device_id);
    }

    if let Some(ref outcome) = params.outcome {
        match outcome.parse::<ScanOutcome>() {
            Ok(outcome) => base_filter = base_filter.with_outcome(outcome),
            Err(e) => {
                return Err((StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e })));
            }
        }
    }

    let query_filter = base_filter.clone().with_limit(limit).with_offset(offset);

    let entries = match state.repository().query_entry_log(&query_filter) {
        Ok(entries) => entries,
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to query entry log: {}", e),
                }),
            ));
        }
    };

    let total = match state.repository().count_entry_log(&base_filter) {
        Ok(count) => count,
        Err(e) => {
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Failed to count entry log: {}", e),
                }),
            ));
        }
    };

    Ok(Json(EntryLogQueryResponse {
        entries,
        total,
        limit,
        offset,
    }))
}

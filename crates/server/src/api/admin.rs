//! Administrative endpoints: full resync and entry-state override.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use gatekeeper_core::{OverrideRequest, OverrideResult, ScanError};
use serde::Serialize;
use std::sync::Arc;

use super::handlers::ErrorResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ResyncResponse {
    pub team_tickets: usize,
    pub concert_tickets: usize,
    pub members: usize,
    pub elapsed_ms: u64,
}

/// Re-run hydration and swap the population.
///
/// Queued entry-log facts are flushed first and scans are held off while the
/// store is read. On failure the current population keeps serving.
pub async fn resync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResyncResponse>, impl IntoResponse> {
    match state.coordinator().resync(state.hydrator()).await {
        Ok(report) => {
            state.mark_ready();
            Ok(Json(ResyncResponse {
                team_tickets: report.team_tickets,
                concert_tickets: report.concert_tickets,
                members: report.members,
                elapsed_ms: report.elapsed.as_millis() as u64,
            }))
        }
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: format!("Resync failed: {}", e),
            }),
        )),
    }
}

/// Set one person's entry state, bypassing the scan rules.
pub async fn override_entry(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OverrideRequest>,
) -> Result<Json<OverrideResult>, impl IntoResponse> {
    if request.operator.trim().is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "operator is required".to_string(),
            }),
        ));
    }

    match state.coordinator().override_entry(request).await {
        Ok(result) => Ok(Json(result)),
        Err(e) => {
            let status = match e {
                ScanError::TicketNotFound(_) => StatusCode::NOT_FOUND,
                ScanError::UnknownPerson { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ScanError::Busy(_) => StatusCode::SERVICE_UNAVAILABLE,
                ScanError::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}

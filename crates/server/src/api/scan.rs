//! Gate-scan ingress.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use gatekeeper_core::{ScanRequest, ScanResult};
use std::sync::Arc;

use super::handlers::ErrorResponse;
use crate::state::AppState;

/// Process one scan from a gate device.
///
/// Always 200 once the cache is hydrated; the decision is in `outcome`.
pub async fn scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanResult>, impl IntoResponse> {
    if !state.is_ready() {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "Ticket cache is not hydrated yet".to_string(),
            }),
        ));
    }

    Ok(Json(state.coordinator().scan(request).await))
}

//! Track endpoints: single-envelope and batch ingestion.

use axum::{extract::State, Json};
use serde_json::Value;

use super::{AppState, HttpError};
use crate::ingest::TrackSummary;

/// Handle `POST /v2/track` — one telemetry envelope.
pub async fn handle_track(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<TrackSummary>, HttpError> {
    let summary = state.ingestor.track_one(&body)?;
    Ok(Json(summary))
}

/// Handle `POST /v2.1/track` — a batch of envelopes, or a single object as
/// a lenient one-item fallback.
pub async fn handle_track_batch(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<TrackSummary>, HttpError> {
    let summary = state.ingestor.track_batch(&body)?;
    Ok(Json(summary))
}

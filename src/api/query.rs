//! Query and delete endpoints over the store.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use super::{AppState, HttpError};
use crate::store::DeleteCriteria;
use crate::types::{ItemId, TelemetryItem};

/// Default page size for `GET /api/query`.
pub const DEFAULT_TOP: usize = 100;

/// Query string for `GET /api/query`.
#[derive(Debug, Deserialize)]
pub struct QueryParams {
    /// Maximum items to return (default 100).
    pub top: Option<usize>,
    /// Items to skip (default 0).
    pub skip: Option<usize>,
    /// Reserved for structured filtering; currently inert.
    pub filter: Option<String>,
}

/// Response body for `GET /api/query`.
#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub value: Vec<TelemetryItem>,
}

/// Handle `GET /api/query` — recent items, time-descending.
pub async fn handle_query(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<Json<QueryResponse>, HttpError> {
    if let Some(filter) = &params.filter {
        tracing::debug!(%filter, "filter parameter accepted but not applied");
    }

    let top = params.top.unwrap_or(DEFAULT_TOP);
    let skip = params.skip.unwrap_or(0);

    let value = state.store.query_recent(top, skip)?;
    Ok(Json(QueryResponse { value }))
}

/// Confirmation body for delete endpoints.
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<u64>,
}

/// Handle `DELETE /api/purge` — unconditional delete-all.
pub async fn handle_purge(
    State(state): State<AppState>,
) -> Result<Json<DeleteResponse>, HttpError> {
    let removed = state.store.delete_all()?;
    tracing::info!(removed, "telemetry purged");

    Ok(Json(DeleteResponse {
        message: "Telemetry purged".to_string(),
        changes: None,
    }))
}

/// Query string for `DELETE /api/telemetry`.
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    /// Comma-separated list of item ids.
    pub ids: Option<String>,
    /// Inclusive lower time bound (ISO-8601).
    pub start: Option<String>,
    /// Inclusive upper time bound (ISO-8601).
    pub end: Option<String>,
}

/// Handle `DELETE /api/telemetry` — criteria-matched delete.
///
/// At least one of `ids`/`start`/`end` is required; the store rejects an
/// empty conjunction so a full wipe can only happen through the purge
/// endpoint.
pub async fn handle_delete(
    State(state): State<AppState>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<DeleteResponse>, HttpError> {
    let criteria = DeleteCriteria {
        ids: params.ids.map(|ids| {
            ids.split(',')
                .filter(|s| !s.is_empty())
                .map(ItemId::from)
                .collect()
        }),
        start: params.start,
        end: params.end,
    };

    let changes = state.store.delete_matching(&criteria)?;
    tracing::info!(changes, "targeted telemetry delete");

    Ok(Json(DeleteResponse {
        message: "Telemetry deleted".to_string(),
        changes: Some(changes),
    }))
}

//! HTTP surface: ingestion, query/delete, and the live stream.

pub mod ingestion;
pub mod live;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::DEFAULT_MAX_BODY_BYTES;
use crate::error::TelemetryError;
use crate::ingest::Ingestor;
use crate::store::TelemetryStore;
use crate::subscriptions::BroadcastHub;

/// Shared state for HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<TelemetryStore>,
    pub hub: Arc<BroadcastHub>,
}

impl AppState {
    /// Wire up the pipeline: the ingestor gets explicit references to the
    /// store and the hub.
    pub fn new(store: Arc<TelemetryStore>, hub: Arc<BroadcastHub>) -> Self {
        let ingestor = Arc::new(Ingestor::new(store.clone(), hub.clone()));
        Self {
            ingestor,
            store,
            hub,
        }
    }
}

/// Create the service router with the default body size limit.
pub fn router(state: AppState) -> Router {
    router_with_limit(state, DEFAULT_MAX_BODY_BYTES)
}

/// Create the service router with a custom body size limit.
///
/// Every API route is a distinct literal path and the live-stream/status
/// route sits at `/` alone, so precedence between them is structural — no
/// route can shadow another through registration order.
pub fn router_with_limit(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/v2/track", post(ingestion::handle_track))
        .route("/v2.1/track", post(ingestion::handle_track_batch))
        .route("/api/query", get(query::handle_query))
        .route("/api/purge", delete(query::handle_purge))
        .route("/api/telemetry", delete(query::handle_delete))
        .route("/", get(live::handle_root))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(state)
}

/// HTTP error response wrapper.
pub struct HttpError(pub TelemetryError);

impl From<TelemetryError> for HttpError {
    fn from(err: TelemetryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TelemetryError::InvalidBody(_) | TelemetryError::MissingCriteria => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

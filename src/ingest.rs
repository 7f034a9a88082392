//! Ingestion pipeline: validate, classify, persist, then broadcast.

use crate::error::{Result, TelemetryError};
use crate::store::TelemetryStore;
use crate::subscriptions::BroadcastHub;
use crate::types::{ItemId, TelemetryEnvelope, TelemetryItem};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Accounting for one track request.
///
/// Under accept-all semantics received and accepted are equal, and the
/// per-item `errors` list is reserved but never populated.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub items_received: usize,
    pub items_accepted: usize,
    pub errors: Vec<TrackError>,
}

impl TrackSummary {
    fn accepted(count: usize) -> Self {
        Self {
            items_received: count,
            items_accepted: count,
            errors: Vec::new(),
        }
    }
}

/// Per-item error slot in the track response. Reserved by the wire format.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackError {
    pub index: usize,
    pub message: String,
}

/// The ingestion endpoint core.
///
/// Holds explicit references to the store and the hub; ordering is the one
/// cross-component guarantee: an item is published only after its write has
/// been acknowledged as durable.
pub struct Ingestor {
    store: Arc<TelemetryStore>,
    hub: Arc<BroadcastHub>,
}

impl Ingestor {
    pub fn new(store: Arc<TelemetryStore>, hub: Arc<BroadcastHub>) -> Self {
        Self { store, hub }
    }

    /// Ingest a single envelope.
    ///
    /// Non-object payloads are rejected; store failures propagate to the
    /// caller.
    pub fn track_one(&self, body: &Value) -> Result<TrackSummary> {
        self.ingest_envelope(body)?;
        Ok(TrackSummary::accepted(1))
    }

    /// Ingest a batch of envelopes.
    ///
    /// A single object is accepted as a one-item batch. The whole request is
    /// rejected when the body is neither array nor object, or when any
    /// member is not an object — validation happens before any member is
    /// processed. Past validation, members are independent: a write failure
    /// on one is logged and does not prevent attempts on the others, and
    /// the response counts stay equal (per-item failures are not reported).
    pub fn track_batch(&self, body: &Value) -> Result<TrackSummary> {
        let envelopes: Vec<&Value> = match body {
            Value::Array(items) => items.iter().collect(),
            Value::Object(_) => vec![body],
            _ => {
                return Err(TelemetryError::InvalidBody(
                    "batch payload must be an array or object".to_string(),
                ))
            }
        };

        if let Some(position) = envelopes.iter().position(|v| !v.is_object()) {
            return Err(TelemetryError::InvalidBody(format!(
                "batch member {} is not a JSON object",
                position
            )));
        }

        let count = envelopes.len();
        for envelope in envelopes {
            if let Err(e) = self.ingest_envelope(envelope) {
                tracing::warn!(error = %e, "failed to ingest batch member");
            }
        }

        Ok(TrackSummary::accepted(count))
    }

    /// Process one envelope: assign an id, derive the classification, write
    /// durably, then publish the exact item to live subscribers.
    fn ingest_envelope(&self, body: &Value) -> Result<TelemetryItem> {
        let envelope = TelemetryEnvelope::from_value(body)?;
        let item = envelope.into_item(ItemId::generate());

        self.store.insert(&item)?;

        // Publish strictly after the insert is acknowledged: a live
        // subscriber must never see an item a concurrent query could miss.
        self.hub.publish(&item);

        tracing::debug!(id = %item.id, item_type = %item.item_type, "item ingested");
        Ok(item)
    }
}

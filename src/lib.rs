//! # Beacon
//!
//! A local telemetry-ingestion endpoint: accepts Application Insights-style
//! envelopes over HTTP, persists them in an append-only record log, serves
//! paginated queries and bulk/targeted deletes, and pushes every accepted
//! item to connected live subscribers.
//!
//! ## Core Concepts
//!
//! - **Items**: Immutable telemetry records classified by a derived
//!   `itemType`
//! - **Store**: Append-only log with time and type indices, rebuilt on open
//! - **Hub**: Best-effort fan-out of accepted items to open channels
//! - **Ingestor**: Validate, classify, persist, then broadcast — in that
//!   order
//!
//! ## Example
//!
//! ```ignore
//! use beacon::{api, BroadcastHub, StoreConfig, TelemetryStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(TelemetryStore::open_or_create(StoreConfig {
//!     path: "./telemetry-store".into(),
//!     ..Default::default()
//! })?);
//! let hub = Arc::new(BroadcastHub::new());
//!
//! let app = api::router(api::AppState::new(store, hub));
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod records;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::ServiceConfig;
pub use error::{Result, TelemetryError};
pub use ingest::{Ingestor, TrackSummary};
pub use records::{LogEntry, TelemetryIndex, TelemetryLog};
pub use store::{DeleteCriteria, StoreConfig, StoreStats, TelemetryStore};
pub use subscriptions::{BroadcastHub, SubscriberHandle, SubscriberId};
pub use types::*;

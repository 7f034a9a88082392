//! Durable record keeping: the append-only log and its lookup structures.

pub mod index;
pub mod log;

pub use index::{IndexEntry, TelemetryIndex};
pub use log::{LogEntry, LogIterator, TelemetryLog};

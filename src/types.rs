//! Core types for the telemetry service.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Classification applied to items whose envelope carries no `baseType`.
pub const UNKNOWN_ITEM_TYPE: &str = "unknown";

/// Unique identifier for a telemetry item.
///
/// Assigned at ingestion, never reused. UUIDv4 on the wire and in the store.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl ItemId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        ItemId(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId(s.to_string())
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The envelope's `data` section: a discriminated `{baseType, baseData}`
/// payload classified into the known telemetry kinds, with an opaque
/// fallback for everything else.
///
/// Each variant holds the *complete* original `data` value so that
/// arbitrarily shaped payloads survive a store round-trip byte-for-byte;
/// the variant itself only records the classification. Beyond extracting
/// `baseType`, the payload is pass-through.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum TelemetryData {
    Event(Value),
    Request(Value),
    Dependency(Value),
    Exception(Value),
    Trace(Value),
    Metric(Value),
    /// Unrecognized or absent `baseType`; the raw value as submitted.
    Other(Value),
}

impl TelemetryData {
    /// The raw `data` value exactly as it was submitted.
    pub fn as_value(&self) -> &Value {
        match self {
            TelemetryData::Event(v)
            | TelemetryData::Request(v)
            | TelemetryData::Dependency(v)
            | TelemetryData::Exception(v)
            | TelemetryData::Trace(v)
            | TelemetryData::Metric(v)
            | TelemetryData::Other(v) => v,
        }
    }

    /// The envelope's type discriminator, if present.
    pub fn base_type(&self) -> Option<&str> {
        self.as_value().get("baseType").and_then(Value::as_str)
    }

    /// The type-specific payload, if present.
    pub fn base_data(&self) -> Option<&Value> {
        self.as_value().get("baseData")
    }

    /// Derive the simplified classification label: `baseType` with a
    /// trailing `Data` suffix removed, or `"unknown"` when absent.
    pub fn item_type(&self) -> String {
        match self.base_type() {
            Some(base) => base.strip_suffix("Data").unwrap_or(base).to_string(),
            None => UNKNOWN_ITEM_TYPE.to_string(),
        }
    }
}

impl From<Value> for TelemetryData {
    fn from(value: Value) -> Self {
        let base_type = value.get("baseType").and_then(Value::as_str);
        match base_type {
            Some("EventData") => TelemetryData::Event(value),
            Some("RequestData") => TelemetryData::Request(value),
            Some("RemoteDependencyData") => TelemetryData::Dependency(value),
            Some("ExceptionData") => TelemetryData::Exception(value),
            Some("MessageData") => TelemetryData::Trace(value),
            Some("MetricData") => TelemetryData::Metric(value),
            _ => TelemetryData::Other(value),
        }
    }
}

impl From<TelemetryData> for Value {
    fn from(data: TelemetryData) -> Self {
        match data {
            TelemetryData::Event(v)
            | TelemetryData::Request(v)
            | TelemetryData::Dependency(v)
            | TelemetryData::Exception(v)
            | TelemetryData::Trace(v)
            | TelemetryData::Metric(v)
            | TelemetryData::Other(v) => v,
        }
    }
}

/// An inbound telemetry envelope (before an id is assigned).
///
/// Field extraction is lenient: only the outer shape is validated, missing
/// or mistyped string fields default to empty, and `tags`/`data` are carried
/// through as submitted.
#[derive(Clone, Debug)]
pub struct TelemetryEnvelope {
    pub time: String,
    pub i_key: String,
    pub name: String,
    pub tags: Value,
    pub data: Value,
}

impl TelemetryEnvelope {
    /// Parse an envelope from a JSON value.
    ///
    /// Rejects non-object payloads; everything else is accepted.
    pub fn from_value(value: &Value) -> crate::error::Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            crate::error::TelemetryError::InvalidBody(
                "telemetry envelope must be a JSON object".to_string(),
            )
        })?;

        let str_field = |key: &str| -> String {
            obj.get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Ok(Self {
            time: str_field("time"),
            i_key: str_field("iKey"),
            name: str_field("name"),
            tags: obj.get("tags").cloned().unwrap_or(Value::Null),
            data: obj.get("data").cloned().unwrap_or(Value::Null),
        })
    }

    /// Build the stored item: classify `data` and stamp the derived
    /// `itemType` alongside the assigned id.
    pub fn into_item(self, id: ItemId) -> TelemetryItem {
        let data = TelemetryData::from(self.data);
        let item_type = data.item_type();

        TelemetryItem {
            id,
            time: self.time,
            i_key: self.i_key,
            name: self.name,
            tags: self.tags,
            data,
            item_type,
        }
    }
}

/// A fully-formed telemetry item as persisted and served back.
///
/// Immutable once written; the only lifecycle transitions are insert and
/// delete.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelemetryItem {
    pub id: ItemId,

    /// Event timestamp, client-supplied ISO-8601. Compared lexicographically.
    pub time: String,

    /// Instrumentation key of the emitting application.
    #[serde(rename = "iKey")]
    pub i_key: String,

    /// Free-form event name.
    pub name: String,

    /// Open-ended tag mapping, pass-through.
    pub tags: Value,

    pub data: TelemetryData,

    /// Derived classification, computed once at ingestion.
    #[serde(rename = "itemType")]
    pub item_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_type_strips_data_suffix() {
        let data = TelemetryData::from(json!({"baseType": "EventData", "baseData": {}}));
        assert_eq!(data.item_type(), "Event");
        assert!(matches!(data, TelemetryData::Event(_)));

        let data = TelemetryData::from(json!({"baseType": "RemoteDependencyData"}));
        assert_eq!(data.item_type(), "RemoteDependency");
        assert!(matches!(data, TelemetryData::Dependency(_)));
    }

    #[test]
    fn test_item_type_unknown_when_base_type_absent() {
        let data = TelemetryData::from(json!({"baseData": {"name": "x"}}));
        assert_eq!(data.item_type(), UNKNOWN_ITEM_TYPE);
        assert!(matches!(data, TelemetryData::Other(_)));

        let data = TelemetryData::from(Value::Null);
        assert_eq!(data.item_type(), UNKNOWN_ITEM_TYPE);
    }

    #[test]
    fn test_unrecognized_base_type_still_classified() {
        // A baseType outside the known set falls back to Other but keeps
        // the suffix-stripping rule for the label.
        let data = TelemetryData::from(json!({"baseType": "PageViewData"}));
        assert!(matches!(data, TelemetryData::Other(_)));
        assert_eq!(data.item_type(), "PageView");
    }

    #[test]
    fn test_data_roundtrip_preserves_extra_fields() {
        let raw = json!({"baseType": "EventData", "baseData": {"name": "x"}, "ver": 2});
        let data = TelemetryData::from(raw.clone());
        let back: Value = serde_json::to_value(&data).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_envelope_rejects_non_object() {
        assert!(TelemetryEnvelope::from_value(&json!([1, 2])).is_err());
        assert!(TelemetryEnvelope::from_value(&json!("hello")).is_err());
        assert!(TelemetryEnvelope::from_value(&Value::Null).is_err());
    }

    #[test]
    fn test_envelope_lenient_fields() {
        // Missing and mistyped fields default rather than reject.
        let envelope = TelemetryEnvelope::from_value(&json!({"time": 42})).unwrap();
        assert_eq!(envelope.time, "");
        assert_eq!(envelope.name, "");
        assert_eq!(envelope.tags, Value::Null);
    }

    #[test]
    fn test_into_item_stamps_classification() {
        let envelope = TelemetryEnvelope::from_value(&json!({
            "time": "2024-01-01T00:00:00Z",
            "iKey": "k1",
            "name": "evt",
            "tags": {"a": "1"},
            "data": {"baseType": "EventData", "baseData": {"name": "x"}}
        }))
        .unwrap();

        let item = envelope.into_item(ItemId::from("id-1"));
        assert_eq!(item.item_type, "Event");
        assert_eq!(item.i_key, "k1");
        assert_eq!(item.tags["a"], "1");
    }

    #[test]
    fn test_item_serializes_wire_names() {
        let item = TelemetryEnvelope::from_value(&json!({"iKey": "k"}))
            .unwrap()
            .into_item(ItemId::from("id-1"));

        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["iKey"], "k");
        assert_eq!(value["itemType"], UNKNOWN_ITEM_TYPE);
        assert_eq!(value["id"], "id-1");
    }

    #[test]
    fn test_item_roundtrip_nested_values() {
        let envelope = TelemetryEnvelope::from_value(&json!({
            "tags": {"outer": {"inner": [1, {"deep": true}]}},
            "data": {"baseType": "MetricData", "baseData": {"metrics": [{"name": "m", "value": 1.5}]}}
        }))
        .unwrap();

        let item = envelope.into_item(ItemId::generate());
        let encoded = serde_json::to_string(&item).unwrap();
        let decoded: TelemetryItem = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded.tags, item.tags);
        assert_eq!(decoded.data.as_value(), item.data.as_value());
        assert_eq!(decoded.item_type, "Metric");
    }
}

//! Broadcast hub fanning accepted items out to live subscribers.

use crate::types::TelemetryItem;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::types::{SubscriberId, SubscriberHandle};

/// Default per-subscriber buffer (messages).
const DEFAULT_BUFFER_SIZE: usize = 256;

/// Internal subscriber state.
struct Subscriber {
    sender: mpsc::Sender<Arc<str>>,
}

impl Subscriber {
    /// Outcome of a send attempt.
    fn try_send(&self, message: Arc<str>) -> SendOutcome {
        match self.sender.try_send(message) {
            Ok(()) => SendOutcome::Sent,
            Err(mpsc::error::TrySendError::Full(_)) => SendOutcome::Lagging,
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }
}

enum SendOutcome {
    Sent,
    Lagging,
    Closed,
}

/// Manages the set of currently open live-subscriber channels and fans out
/// accepted items.
///
/// Delivery is at-most-once per subscriber, best-effort: a channel found
/// closed at send time is skipped and unregistered, a full channel (slow
/// subscriber) causes the subscriber to be dropped, and nothing is buffered
/// or replayed beyond the channel itself. Constructed once and passed by
/// reference into the ingestion endpoint.
pub struct BroadcastHub {
    /// Open channels by subscriber id.
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    /// Counter for generating subscriber ids.
    next_id: AtomicU64,
    /// Per-subscriber channel capacity.
    buffer_size: usize,
}

impl BroadcastHub {
    /// Create a hub with the default buffer size.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a hub with a custom per-subscriber buffer size.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Register a new subscriber channel.
    pub fn subscribe(&self) -> SubscriberHandle {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (sender, receiver) = mpsc::channel(self.buffer_size);

        self.subscribers.write().insert(id, Subscriber { sender });
        tracing::debug!(subscriber = %id, "live subscriber connected");

        SubscriberHandle { id, receiver }
    }

    /// Remove a subscriber. Called by the connection glue on teardown; also
    /// happens lazily when a publish finds the channel closed.
    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.write().remove(&id).is_some() {
            tracing::debug!(subscriber = %id, "live subscriber disconnected");
        }
    }

    /// Number of currently open channels.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Push one accepted item to every currently open channel.
    ///
    /// Serializes once and enumerates a snapshot of the channel set at call
    /// time; channels opened mid-publish are not considered. Delivery
    /// failures never surface to the caller.
    pub fn publish(&self, item: &TelemetryItem) {
        let message: Arc<str> = match serde_json::to_string(item) {
            Ok(encoded) => encoded.into(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode item for broadcast");
                return;
            }
        };

        let mut to_remove = Vec::new();

        {
            let subs = self.subscribers.read();
            for (id, sub) in subs.iter() {
                match sub.try_send(message.clone()) {
                    SendOutcome::Sent => {}
                    SendOutcome::Lagging => {
                        tracing::debug!(subscriber = %id, "dropping lagging subscriber");
                        to_remove.push(*id);
                    }
                    SendOutcome::Closed => to_remove.push(*id),
                }
            }
        }

        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for id in to_remove {
                subs.remove(&id);
            }
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ItemId, TelemetryEnvelope};
    use serde_json::json;

    fn make_item(name: &str) -> TelemetryItem {
        TelemetryEnvelope::from_value(&json!({
            "time": "2024-01-01T00:00:00Z",
            "iKey": "k1",
            "name": name,
            "data": {"baseType": "EventData", "baseData": {}}
        }))
        .unwrap()
        .into_item(ItemId::generate())
    }

    #[tokio::test]
    async fn test_subscribe_publish_receive() {
        let hub = BroadcastHub::new();
        let mut handle = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        hub.publish(&make_item("evt"));

        let message = handle.recv().await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&message).unwrap();
        assert_eq!(value["name"], "evt");
        assert_eq!(value["itemType"], "Event");
    }

    #[tokio::test]
    async fn test_publish_preserves_acceptance_order() {
        let hub = BroadcastHub::new();
        let mut handle = hub.subscribe();

        for name in ["one", "two", "three"] {
            hub.publish(&make_item(name));
        }

        for expected in ["one", "two", "three"] {
            let message = handle.recv().await.unwrap();
            let value: serde_json::Value = serde_json::from_str(&message).unwrap();
            assert_eq!(value["name"], expected);
        }
    }

    #[tokio::test]
    async fn test_closed_channel_skipped_and_removed() {
        let hub = BroadcastHub::new();
        let handle = hub.subscribe();
        let mut open = hub.subscribe();
        drop(handle);

        hub.publish(&make_item("evt"));

        // The closed channel was unregistered, the open one still delivered.
        assert_eq!(hub.subscriber_count(), 1);
        assert!(open.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_slow_subscriber_dropped() {
        let hub = BroadcastHub::with_buffer_size(2);
        let mut handle = hub.subscribe();

        for i in 0..5 {
            hub.publish(&make_item(&format!("evt-{}", i)));
        }

        assert_eq!(hub.subscriber_count(), 0);

        // Buffered messages drain, then the channel reports closure.
        assert!(handle.recv().await.is_some());
        assert!(handle.recv().await.is_some());
        assert!(handle.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let hub = BroadcastHub::new();
        let mut handle = hub.subscribe();

        hub.unsubscribe(handle.id);
        assert_eq!(hub.subscriber_count(), 0);

        hub.publish(&make_item("evt"));
        assert!(handle.recv().await.is_none());
    }
}

//! Subscriber-facing types for the live broadcast hub.

use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Unique identifier for a live subscriber.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(pub u64);

impl fmt::Debug for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriberId({})", self.0)
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a live subscription.
///
/// Messages are pre-serialized items, shared across all subscribers of a
/// given publish. Dropping the handle closes the channel; the hub notices
/// on its next publish and removes the registration.
pub struct SubscriberHandle {
    pub id: SubscriberId,
    pub receiver: mpsc::Receiver<Arc<str>>,
}

impl SubscriberHandle {
    /// Receive the next broadcast message. Returns `None` once the hub has
    /// dropped this subscriber.
    pub async fn recv(&mut self) -> Option<Arc<str>> {
        self.receiver.recv().await
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Result<Arc<str>, mpsc::error::TryRecvError> {
        self.receiver.try_recv()
    }
}

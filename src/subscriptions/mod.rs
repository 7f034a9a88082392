//! Live broadcast: subscriber registry and fan-out of accepted items.

pub mod manager;
pub mod types;

pub use manager::BroadcastHub;
pub use types::{SubscriberHandle, SubscriberId};

//! Message channel between producers and consumers
//!
//! A channel carries opaque byte payloads keyed by topic name. Producers hold
//! a [`Publisher`], consumers a [`Subscriber`]. Concrete transports are picked
//! at runtime from [`ChannelConfig::kind`] through the [`ChannelFactory`].

pub mod config;
pub mod error;
pub mod factory;
pub mod memory;
pub mod zeromq;

use std::time::Duration;

use async_trait::async_trait;

pub use config::ChannelConfig;
pub use error::ChannelError;
pub use factory::ChannelFactory;
pub use memory::{MemoryChannel, MemorySubscriber};
pub use zeromq::{ZmqPublisher, ZmqSubscriber};

pub type RawMessage = Vec<u8>;

/// Messages returned by one poll, grouped by topic. A [`MemorySubscriber`]
/// keeps its subscription order, other subscribers the order topics arrived in.
pub type PolledBatch = Vec<(String, Vec<RawMessage>)>;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: RawMessage) -> Result<(), ChannelError>;
}

#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Wait up to `timeout` for messages. An empty batch means nothing arrived.
    async fn poll(&self, timeout: Duration) -> Result<PolledBatch, ChannelError>;
}

/// Append `payload` to the group for `topic`, creating it at the end if absent
pub(crate) fn push_message(batch: &mut PolledBatch, topic: String, payload: RawMessage) {
    match batch.iter_mut().find(|(name, _)| *name == topic) {
        Some((_, messages)) => messages.push(payload),
        None => batch.push((topic, vec![payload])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_message_groups_by_topic_in_first_seen_order() {
        let mut batch = PolledBatch::new();
        push_message(&mut batch, "b".into(), b"1".to_vec());
        push_message(&mut batch, "a".into(), b"2".to_vec());
        push_message(&mut batch, "b".into(), b"3".to_vec());

        assert_eq!(
            batch,
            vec![
                ("b".to_string(), vec![b"1".to_vec(), b"3".to_vec()]),
                ("a".to_string(), vec![b"2".to_vec()]),
            ]
        );
    }
}

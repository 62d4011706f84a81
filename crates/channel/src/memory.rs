use std::pin::pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use tracing::warn;

use crate::{ChannelError, PolledBatch, Publisher, RawMessage, Subscriber, push_message};

/// Messages kept per topic before the oldest are dropped
pub const DEFAULT_TOPIC_CAPACITY: usize = 10_000;

static SHARED: OnceLock<MemoryChannel> = OnceLock::new();

/// In-process channel. Every clone shares the same queues.
///
/// Used by tests and by single-process deployments where the producer and
/// consumer run side by side. Polling the channel itself drains every topic;
/// [`MemoryChannel::subscribe`] gives a subscriber limited to a topic list.
#[derive(Clone)]
pub struct MemoryChannel {
    inner: Arc<Inner>,
}

struct Inner {
    queues: Mutex<PolledBatch>,
    notify: Notify,
    capacity: usize,
}

/// Subscriber end of a [`MemoryChannel`] that only sees its own topics
#[derive(Clone)]
pub struct MemorySubscriber {
    channel: MemoryChannel,
    topics: Vec<String>,
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel holding at most `capacity` unpolled messages per topic
    pub fn with_capacity(capacity: usize) -> Self {
        let inner = Inner { queues: Mutex::default(), notify: Notify::new(), capacity: capacity.max(1) };
        Self { inner: Arc::new(inner) }
    }

    /// Process-wide instance handed out by the `memory` channel kind
    pub fn shared() -> Self {
        SHARED.get_or_init(MemoryChannel::new).clone()
    }

    /// Subscriber draining only `topics`, in that order
    pub fn subscribe<T: Into<String>>(&self, topics: impl IntoIterator<Item = T>) -> MemorySubscriber {
        MemorySubscriber { channel: self.clone(), topics: topics.into_iter().map(Into::into).collect() }
    }

    /// Number of messages waiting to be polled
    pub fn pending(&self) -> usize {
        self.inner
            .queues
            .lock()
            .map(|queues| queues.iter().map(|(_, messages)| messages.len()).sum())
            .unwrap_or_default()
    }

    fn drain(&self, topics: Option<&[String]>) -> Result<PolledBatch, ChannelError> {
        let mut queues = self.inner.queues.lock().map_err(|_| ChannelError::Poisoned)?;
        let Some(topics) = topics else {
            return Ok(std::mem::take(&mut *queues));
        };

        let mut batch = PolledBatch::new();
        for topic in topics {
            if let Some(position) = queues.iter().position(|(name, _)| name == topic) {
                batch.push(queues.remove(position));
            }
        }
        Ok(batch)
    }

    async fn wait(&self, topics: Option<&[String]>, timeout: Duration) -> Result<PolledBatch, ChannelError> {
        // A timeout past the end of the clock just waits for a publish
        let deadline = Instant::now().checked_add(timeout);

        loop {
            // Registered before draining so a publish in between still wakes us
            let mut notified = pin!(self.inner.notify.notified());
            notified.as_mut().enable();

            let batch = self.drain(topics)?;
            if !batch.is_empty() {
                return Ok(batch);
            }

            match deadline {
                Some(deadline) => {
                    if timeout_at(deadline, notified).await.is_err() {
                        return self.drain(topics);
                    }
                }
                None => notified.await,
            }
        }
    }
}

#[async_trait]
impl Publisher for MemoryChannel {
    async fn publish(&self, topic: &str, payload: RawMessage) -> Result<(), ChannelError> {
        {
            let mut queues = self.inner.queues.lock().map_err(|_| ChannelError::Poisoned)?;
            push_message(&mut queues, topic.to_string(), payload);

            if let Some((_, messages)) = queues.iter_mut().find(|(name, _)| name == topic) {
                if messages.len() > self.inner.capacity {
                    let excess = messages.len() - self.inner.capacity;
                    messages.drain(..excess);
                    warn!(topic, dropped = excess, "Memory channel full, dropped oldest messages");
                }
            }
        }
        self.inner.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl Subscriber for MemoryChannel {
    async fn poll(&self, timeout: Duration) -> Result<PolledBatch, ChannelError> {
        self.wait(None, timeout).await
    }
}

#[async_trait]
impl Subscriber for MemorySubscriber {
    async fn poll(&self, timeout: Duration) -> Result<PolledBatch, ChannelError> {
        self.channel.wait(Some(&self.topics), timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_poll_returns_published_messages_grouped_by_topic() {
        let channel = MemoryChannel::new();
        channel.publish("first", b"a".to_vec()).await.unwrap();
        channel.publish("second", b"b".to_vec()).await.unwrap();
        channel.publish("first", b"c".to_vec()).await.unwrap();
        assert_eq!(channel.pending(), 3);

        let batch = channel.poll(Duration::from_millis(5)).await.unwrap();
        assert_eq!(
            batch,
            vec![
                ("first".to_string(), vec![b"a".to_vec(), b"c".to_vec()]),
                ("second".to_string(), vec![b"b".to_vec()]),
            ]
        );
        assert_eq!(channel.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_times_out_empty() {
        let channel = MemoryChannel::new();

        let batch = channel.poll(Duration::from_secs(1)).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_poll_wakes_on_publish() {
        let channel = MemoryChannel::new();
        let publisher = channel.clone();

        let handle = tokio::spawn(async move { channel.poll(Duration::from_secs(10)).await });
        tokio::task::yield_now().await;
        publisher.publish("topic", b"payload".to_vec()).await.unwrap();

        let batch = handle.await.unwrap().unwrap();
        assert_eq!(batch, vec![("topic".to_string(), vec![b"payload".to_vec()])]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscriber_sees_only_its_topics_in_subscription_order() {
        let channel = MemoryChannel::new();
        let subscriber = channel.subscribe(["second", "first"]);

        channel.publish("first", b"a".to_vec()).await.unwrap();
        channel.publish("unsubscribed-topic", b"x".to_vec()).await.unwrap();
        channel.publish("second", b"b".to_vec()).await.unwrap();

        let batch = subscriber.poll(Duration::from_millis(5)).await.unwrap();
        assert_eq!(
            batch,
            vec![("second".to_string(), vec![b"b".to_vec()]), ("first".to_string(), vec![b"a".to_vec()])]
        );

        assert!(subscriber.poll(Duration::from_millis(5)).await.unwrap().is_empty());
        assert_eq!(channel.pending(), 1);
    }

    #[tokio::test]
    async fn test_subscriber_wakes_on_subscribed_publish() {
        let channel = MemoryChannel::new();
        let subscriber = channel.subscribe(["topic"]);

        let handle = tokio::spawn(async move { subscriber.poll(Duration::from_secs(10)).await });
        tokio::task::yield_now().await;
        channel.publish("topic", b"payload".to_vec()).await.unwrap();

        let batch = handle.await.unwrap().unwrap();
        assert_eq!(batch, vec![("topic".to_string(), vec![b"payload".to_vec()])]);
    }

    #[tokio::test]
    async fn test_full_topic_drops_oldest() {
        let channel = MemoryChannel::with_capacity(2);
        for payload in [b"1", b"2", b"3"] {
            channel.publish("topic", payload.to_vec()).await.unwrap();
        }

        let batch = channel.poll(Duration::from_millis(5)).await.unwrap();
        assert_eq!(batch, vec![("topic".to_string(), vec![b"2".to_vec(), b"3".to_vec()])]);
    }

    #[test]
    fn test_shared_instance_is_process_wide() {
        let a = MemoryChannel::shared();
        let b = MemoryChannel::shared();
        assert!(Arc::ptr_eq(&a.inner, &b.inner));
    }
}

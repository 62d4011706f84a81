use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::{ChannelConfig, ChannelError, MemoryChannel, Publisher, Subscriber, ZmqPublisher, ZmqSubscriber};

type PublisherCtor = fn(&ChannelConfig) -> Result<Arc<dyn Publisher>, ChannelError>;
type SubscriberCtor = fn(&ChannelConfig) -> Result<Arc<dyn Subscriber>, ChannelError>;

/// Maps a channel kind name to the constructors of its two ends
pub struct ChannelFactory {
    publishers: HashMap<&'static str, PublisherCtor>,
    subscribers: HashMap<&'static str, SubscriberCtor>,
}

fn memory_publisher(_: &ChannelConfig) -> Result<Arc<dyn Publisher>, ChannelError> {
    Ok(Arc::new(MemoryChannel::shared()))
}

fn memory_subscriber(config: &ChannelConfig) -> Result<Arc<dyn Subscriber>, ChannelError> {
    Ok(Arc::new(MemoryChannel::shared().subscribe(config.topics.iter().cloned())))
}

fn zmq_publisher(config: &ChannelConfig) -> Result<Arc<dyn Publisher>, ChannelError> {
    Ok(Arc::new(ZmqPublisher::bind(&config.endpoint)?))
}

fn zmq_subscriber(config: &ChannelConfig) -> Result<Arc<dyn Subscriber>, ChannelError> {
    Ok(Arc::new(ZmqSubscriber::connect(&config.endpoint, &config.topics)?))
}

impl Default for ChannelFactory {
    fn default() -> Self {
        let mut factory = Self { publishers: HashMap::new(), subscribers: HashMap::new() };
        factory.register("memory", memory_publisher, memory_subscriber);
        factory.register("zmq", zmq_publisher, zmq_subscriber);
        factory
    }
}

impl ChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, kind: &'static str, publisher: PublisherCtor, subscriber: SubscriberCtor) {
        self.publishers.insert(kind, publisher);
        self.subscribers.insert(kind, subscriber);
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.publishers.keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    pub fn publisher(&self, config: &ChannelConfig) -> Result<Arc<dyn Publisher>, ChannelError> {
        let ctor = self
            .publishers
            .get(config.kind.as_str())
            .ok_or_else(|| ChannelError::UnknownKind(config.kind.clone()))?;
        debug!("Creating publisher for {}", config);
        ctor(config)
    }

    pub fn subscriber(&self, config: &ChannelConfig) -> Result<Arc<dyn Subscriber>, ChannelError> {
        let ctor = self
            .subscribers
            .get(config.kind.as_str())
            .ok_or_else(|| ChannelError::UnknownKind(config.kind.clone()))?;
        debug!("Creating subscriber for {}", config);
        ctor(config)
    }
}

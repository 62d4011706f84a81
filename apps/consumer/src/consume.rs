use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use channel::{RawMessage, Subscriber};
use futures::Stream;
use futures::stream;
use schema_registry::{Event, Schema, SchemaRegistry, wire};
use tokio::time::Instant;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerSettings {
    /// Pause after each poll's topics were handled
    pub sleep_interval: Duration,
    /// Longest a single poll waits for messages
    pub poll_timeout: Duration,
    /// Stop polling once this much time has passed since `run` was called.
    /// `None` runs forever.
    pub timeout: Option<Duration>,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self { sleep_interval: Duration::from_secs(2), poll_timeout: Duration::from_millis(1000), timeout: None }
    }
}

/// Polls the channel and validates every message against its topic's schema
pub struct EventConsumer {
    subscriber: Arc<dyn Subscriber>,
    registry: Arc<SchemaRegistry>,
    settings: ConsumerSettings,
}

struct LoopState {
    pending: VecDeque<(String, Vec<RawMessage>)>,
    polled: bool,
    deadline: Option<Instant>,
}

impl EventConsumer {
    pub fn new(subscriber: Arc<dyn Subscriber>, registry: Arc<SchemaRegistry>, settings: ConsumerSettings) -> Self {
        Self { subscriber, registry, settings }
    }

    pub fn settings(&self) -> &ConsumerSettings {
        &self.settings
    }

    /// Validate each message on its own, dropping the ones that fail
    pub fn parse_messages(schema: &dyn Schema, topic: &str, messages: Vec<RawMessage>) -> Vec<Event> {
        messages
            .into_iter()
            .filter_map(|message| match wire::from_wire(&message).and_then(|raw| schema.validate(raw)) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(topic, schema = schema.name(), "Validation error for message: {}", e);
                    None
                }
            })
            .collect()
    }

    /// Batches of validated events, one per topic per poll
    ///
    /// Polls run one at a time. Topics come out in the order the poll returned
    /// them, a topic without a schema is skipped whole, and a batch may be
    /// empty when none of its messages validated. After the topics of a poll
    /// are handled the stream sleeps for the configured interval; it ends at
    /// the first check after the deadline.
    pub fn run(&self) -> impl Stream<Item = (String, Vec<Event>)> + '_ {
        let state = LoopState {
            pending: VecDeque::new(),
            polled: false,
            deadline: self.settings.timeout.map(|timeout| Instant::now() + timeout),
        };

        stream::unfold(state, move |mut state| async move {
            loop {
                while let Some((topic, messages)) = state.pending.pop_front() {
                    let schema = match self.registry.lookup(&topic) {
                        Ok(schema) => schema,
                        Err(e) => {
                            error!(topic = %topic, dropped = messages.len(), "Schema not found: {}", e);
                            continue;
                        }
                    };

                    let events = Self::parse_messages(schema.as_ref(), &topic, messages);
                    return Some(((topic, events), state));
                }

                if state.polled {
                    tokio::time::sleep(self.settings.sleep_interval).await;
                    state.polled = false;
                }

                if state.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                    debug!("Consumer deadline reached");
                    return None;
                }

                match self.subscriber.poll(self.settings.poll_timeout).await {
                    Ok(batch) => state.pending = batch.into(),
                    Err(e) => error!("Poll failed: {}", e),
                }
                state.polled = true;
            }
        })
    }
}

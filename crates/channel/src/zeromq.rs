//! ZeroMQ PUB/SUB transport
//!
//! Each message is a two-frame multipart: `[topic, payload]`. The publisher
//! binds the endpoint and subscribers connect to it. `zmq::Socket` is not
//! `Sync`, so sockets sit behind a mutex and every call runs on the blocking
//! pool.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::{ChannelError, PolledBatch, Publisher, RawMessage, Subscriber, push_message};

pub struct ZmqPublisher {
    socket: Arc<Mutex<zmq::Socket>>,
    _context: zmq::Context,
}

impl ZmqPublisher {
    pub fn bind(endpoint: &str) -> Result<Self, ChannelError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::PUB)?;
        socket.bind(endpoint)?;
        info!("Publishing events on {}", endpoint);

        Ok(Self { socket: Arc::new(Mutex::new(socket)), _context: context })
    }
}

#[async_trait]
impl Publisher for ZmqPublisher {
    async fn publish(&self, topic: &str, payload: RawMessage) -> Result<(), ChannelError> {
        let socket = Arc::clone(&self.socket);
        let frames = [topic.as_bytes().to_vec(), payload];

        tokio::task::spawn_blocking(move || {
            let socket = socket.lock().map_err(|_| ChannelError::Poisoned)?;
            socket.send_multipart(frames, 0)?;
            Ok(())
        })
        .await?
    }
}

pub struct ZmqSubscriber {
    socket: Arc<Mutex<zmq::Socket>>,
    topics: Arc<Vec<String>>,
    _context: zmq::Context,
}

impl ZmqSubscriber {
    /// Connect to `endpoint` and subscribe to `topics`, or to everything when
    /// `topics` is empty
    pub fn connect(endpoint: &str, topics: &[String]) -> Result<Self, ChannelError> {
        let context = zmq::Context::new();
        let socket = context.socket(zmq::SUB)?;
        socket.connect(endpoint)?;

        if topics.is_empty() {
            socket.set_subscribe(b"")?;
        }
        for topic in topics {
            socket.set_subscribe(topic.as_bytes())?;
        }
        info!("Subscribed to {:?} on {}", topics, endpoint);

        Ok(Self {
            socket: Arc::new(Mutex::new(socket)),
            topics: Arc::new(topics.to_vec()),
            _context: context,
        })
    }
}

#[async_trait]
impl Subscriber for ZmqSubscriber {
    async fn poll(&self, timeout: Duration) -> Result<PolledBatch, ChannelError> {
        let socket = Arc::clone(&self.socket);
        let topics = Arc::clone(&self.topics);
        let timeout_ms = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);

        tokio::task::spawn_blocking(move || {
            let socket = socket.lock().map_err(|_| ChannelError::Poisoned)?;
            let mut batch = PolledBatch::new();

            let ready = zmq::poll(&mut [socket.as_poll_item(zmq::POLLIN)], timeout_ms)?;
            if ready == 0 {
                return Ok(batch);
            }

            loop {
                let frames = match socket.recv_multipart(zmq::DONTWAIT) {
                    Ok(frames) => frames,
                    Err(zmq::Error::EAGAIN) => break,
                    Err(e) => return Err(e.into()),
                };

                match split_frames(frames) {
                    // SUB filters by prefix, keep exact topic matches only
                    Ok((topic, _)) if !topics.is_empty() && !topics.contains(&topic) => {
                        debug!("Ignoring message for unsubscribed topic {}", topic);
                    }
                    Ok((topic, payload)) => push_message(&mut batch, topic, payload),
                    Err(e) => warn!("Dropping message: {}", e),
                }
            }

            Ok(batch)
        })
        .await?
    }
}

fn split_frames(frames: Vec<Vec<u8>>) -> Result<(String, RawMessage), ChannelError> {
    let [topic, payload]: [Vec<u8>; 2] = frames
        .try_into()
        .map_err(|frames: Vec<Vec<u8>>| ChannelError::MalformedFrame(format!("expected 2 frames, got {}", frames.len())))?;

    let topic = String::from_utf8(topic)
        .map_err(|_| ChannelError::MalformedFrame("topic frame is not UTF-8".to_string()))?;

    Ok((topic, payload))
}

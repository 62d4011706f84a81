use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("zeromq error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("malformed frame on channel: {0}")]
    MalformedFrame(String),

    #[error("unknown channel kind `{0}`")]
    UnknownKind(String),

    #[error("channel worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("channel lock poisoned")]
    Poisoned,
}

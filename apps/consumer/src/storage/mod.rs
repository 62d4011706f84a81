/// Storage sink for validated monitoring events
///
/// `write_many` is one atomic call from the caller's point of view: either
/// the whole batch is stored or an error is returned.
pub mod memory;
pub mod migrations;
pub mod repository;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool::managed::{BuildError, PoolError};
use schema_registry::{MonitoredEvent, ValidationError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub use memory::MemoryEventStorage;
pub use repository::LibsqlEventStorage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] PoolError<libsql::Error>),

    #[error("failed to build connection pool: {0}")]
    Build(#[from] BuildError),

    #[error("failed to encode event: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored event is invalid: {0}")]
    Corrupt(#[from] ValidationError),
}

#[async_trait]
pub trait EventStorage: Send + Sync {
    async fn write_many(&self, events: Vec<MonitoredEvent>) -> Result<(), StorageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Libsql,
    Memory,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageKind::Libsql => write!(f, "libsql"),
            StorageKind::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub kind: StorageKind,
    /// Database file, ignored by the memory kind
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { kind: StorageKind::default(), path: "events.db".into() }
    }
}

/// Build the storage selected by `config.kind`
pub async fn open_storage(config: &StorageConfig) -> Result<Arc<dyn EventStorage>, StorageError> {
    match config.kind {
        StorageKind::Libsql => {
            info!("Storing events in {}", config.path.display());
            Ok(Arc::new(LibsqlEventStorage::open(&config.path).await?))
        }
        StorageKind::Memory => {
            info!("Storing events in memory");
            Ok(Arc::new(MemoryEventStorage::new()))
        }
    }
}

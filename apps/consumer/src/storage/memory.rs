use std::sync::Arc;

use async_trait::async_trait;
use schema_registry::MonitoredEvent;
use tokio::sync::Mutex;
use tracing::info;

use super::{EventStorage, StorageError};

/// Keeps every `write_many` call in memory
#[derive(Clone, Default)]
pub struct MemoryEventStorage {
    writes: Arc<Mutex<Vec<Vec<MonitoredEvent>>>>,
}

impl MemoryEventStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches in the order they were written
    pub async fn writes(&self) -> Vec<Vec<MonitoredEvent>> {
        self.writes.lock().await.clone()
    }

    pub async fn events(&self) -> Vec<MonitoredEvent> {
        self.writes.lock().await.iter().flatten().cloned().collect()
    }
}

#[async_trait]
impl EventStorage for MemoryEventStorage {
    async fn write_many(&self, events: Vec<MonitoredEvent>) -> Result<(), StorageError> {
        info!("Writing {} events to memory storage", events.len());
        self.writes.lock().await.push(events);
        Ok(())
    }
}

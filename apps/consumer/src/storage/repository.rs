use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use deadpool::managed::PoolConfig;
use libsql::{Connection, params};
use schema_registry::{HttpUrl, MonitoredEvent, RuleMeta, wire};
use tracing::{debug, error};

use super::migrations::run_migrations;
use super::{EventStorage, StorageError};
use crate::pool::{LibsqlConnection, LibsqlManager, LibsqlPool};

/// libsql-backed event storage
pub struct LibsqlEventStorage {
    pool: LibsqlPool,
}

impl LibsqlEventStorage {
    /// Open (or create) the database at `path` and migrate it
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let database = libsql::Builder::new_local(path.as_ref()).build().await?;
        let pool = LibsqlPool::builder(LibsqlManager::new(database))
            .config(PoolConfig::default())
            .build()?;

        let storage = Self::new_from_pool(pool);
        run_migrations(&*storage.get_conn().await?).await?;
        Ok(storage)
    }

    /// Wrap an existing pool. The schema must already be migrated.
    pub fn new_from_pool(pool: LibsqlPool) -> Self {
        Self { pool }
    }

    async fn get_conn(&self) -> Result<LibsqlConnection, StorageError> {
        Ok(self.pool.get().await?)
    }

    /// Events for `rule_name`, newest first
    pub async fn recent_events(&self, rule_name: &str, limit: usize) -> Result<Vec<MonitoredEvent>, StorageError> {
        let conn = self.get_conn().await?;
        let mut stmt = conn
            .prepare(
                "SELECT url, rule_name, timestamp, latency, http_status, success, regex_match, meta \
                 FROM events WHERE rule_name = ? ORDER BY timestamp DESC, id DESC LIMIT ?",
            )
            .await?;

        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = stmt.query(params![rule_name, limit]).await?;
        let mut events = Vec::new();

        while let Some(row) = rows.next().await? {
            let url: String = row.get(0)?;
            let timestamp: String = row.get(2)?;
            let meta: String = row.get(7)?;

            events.push(MonitoredEvent {
                url: HttpUrl::parse(&url)?,
                rule_name: row.get(1)?,
                timestamp: wire::timestamp::parse(&timestamp)?,
                latency: row.get(3)?,
                http_status: row.get::<Option<i64>>(4)?.and_then(|status| u16::try_from(status).ok()),
                success: row.get::<Option<i64>>(5)?.map(|v| v != 0),
                regex_match: row.get::<Option<i64>>(6)?.map(|v| v != 0),
                meta: serde_json::from_str::<RuleMeta>(&meta)?,
            });
        }

        Ok(events)
    }

    pub async fn count_events(&self) -> Result<u64, StorageError> {
        let conn = self.get_conn().await?;
        let mut rows = conn.query("SELECT COUNT(*) FROM events", ()).await?;

        match rows.next().await? {
            Some(row) => Ok(row.get::<u64>(0)?),
            None => Ok(0),
        }
    }
}

async fn insert_event(conn: &Connection, event: &MonitoredEvent, created_at: &str) -> Result<(), StorageError> {
    conn.execute(
        "INSERT INTO events (created_at, timestamp, latency, url, rule_name, http_status, success, regex_match, meta) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            created_at,
            wire::timestamp::format(&event.timestamp),
            event.latency,
            event.url.as_str(),
            event.rule_name.as_str(),
            event.http_status.map(i64::from),
            event.success.map(i64::from),
            event.regex_match.map(i64::from),
            serde_json::to_string(&event.meta)?
        ],
    )
    .await?;
    Ok(())
}

/// Undo a failed batch. The insert error is what the caller sees, even when
/// the rollback fails too.
async fn roll_back(rollback: impl Future<Output = Result<(), libsql::Error>>, cause: StorageError) -> StorageError {
    if let Err(e) = rollback.await {
        error!("Rollback failed: {}", e);
    }
    cause
}

#[async_trait]
impl EventStorage for LibsqlEventStorage {
    async fn write_many(&self, events: Vec<MonitoredEvent>) -> Result<(), StorageError> {
        let conn = self.get_conn().await?;
        let created_at = wire::timestamp::format(&Utc::now());
        let tx = conn.transaction().await?;

        for event in &events {
            if let Err(e) = insert_event(&tx, event, &created_at).await {
                error!(rule = %event.rule_name, "Failed to insert event, rolling back batch: {}", e);
                return Err(roll_back(tx.rollback(), e).await);
            }
        }

        tx.commit().await?;
        debug!("Stored {} events", events.len());
        Ok(())
    }
}

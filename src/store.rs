//! Durable queue store.
//!
//! [`QueueStore`] is the engine-agnostic contract the sync manager drains.
//! [`SqliteStore`] backs it with an embedded SQLite database; every mutating
//! call has been committed by the time its future resolves.

use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::db;
use crate::error::QueueError;
use crate::models::{EntryUpdate, HttpMethod, QueueCounts, QueueEntry, QueueStatus};

#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Persist a new pending entry with zero retries.
    async fn enqueue(
        &self,
        action: &str,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&str>,
    ) -> Result<QueueEntry, QueueError>;

    /// Oldest pending entry, or `None`. Never returns processing or failed entries.
    async fn dequeue_oldest_pending(&self) -> Result<Option<QueueEntry>, QueueError>;

    async fn get(&self, id: &str) -> Result<Option<QueueEntry>, QueueError>;

    /// Fails with [`QueueError::EntryNotFound`] when `id` does not exist.
    async fn update_entry(&self, id: &str, update: EntryUpdate) -> Result<(), QueueError>;

    /// Idempotent.
    async fn remove_entry(&self, id: &str) -> Result<(), QueueError>;

    async fn list_by_status(&self, status: QueueStatus) -> Result<Vec<QueueEntry>, QueueError>;

    async fn count_by_status(&self) -> Result<QueueCounts, QueueError>;

    async fn clear(&self) -> Result<(), QueueError>;

    /// Return entries stuck in `processing` to `pending`. Only safe while no drain is running.
    async fn recover_interrupted(&self) -> Result<u64, QueueError>;

    /// Re-enqueue every failed entry as a fresh pending entry.
    async fn requeue_failed(&self) -> Result<u64, QueueError>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `url` and apply migrations.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, QueueError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl QueueStore for SqliteStore {
    async fn enqueue(
        &self,
        action: &str,
        endpoint: &str,
        method: HttpMethod,
        body: Option<&str>,
    ) -> Result<QueueEntry, QueueError> {
        let entry = db::queue::enqueue(&self.pool, action, endpoint, method, body).await?;
        tracing::debug!("Enqueued {} ({} {} {})", entry.id, entry.action, entry.method, entry.endpoint);
        Ok(entry)
    }

    async fn dequeue_oldest_pending(&self) -> Result<Option<QueueEntry>, QueueError> {
        Ok(db::queue::oldest_pending(&self.pool).await?)
    }

    async fn get(&self, id: &str) -> Result<Option<QueueEntry>, QueueError> {
        Ok(db::queue::find_by_id(&self.pool, id).await?)
    }

    async fn update_entry(&self, id: &str, update: EntryUpdate) -> Result<(), QueueError> {
        if db::queue::update(&self.pool, id, update).await? {
            Ok(())
        } else {
            Err(QueueError::EntryNotFound(id.to_string()))
        }
    }

    async fn remove_entry(&self, id: &str) -> Result<(), QueueError> {
        Ok(db::queue::remove(&self.pool, id).await?)
    }

    async fn list_by_status(&self, status: QueueStatus) -> Result<Vec<QueueEntry>, QueueError> {
        Ok(db::queue::list_by_status(&self.pool, status).await?)
    }

    async fn count_by_status(&self) -> Result<QueueCounts, QueueError> {
        Ok(db::queue::count_by_status(&self.pool).await?)
    }

    async fn clear(&self) -> Result<(), QueueError> {
        Ok(db::queue::clear(&self.pool).await?)
    }

    async fn recover_interrupted(&self) -> Result<u64, QueueError> {
        let recovered = db::queue::reset_processing(&self.pool).await?;
        if recovered > 0 {
            tracing::warn!("Recovered {recovered} queue entries left in processing");
        }
        Ok(recovered)
    }

    async fn requeue_failed(&self) -> Result<u64, QueueError> {
        let requeued = db::queue::requeue_failed(&self.pool).await?;
        if requeued > 0 {
            tracing::info!("Requeued {requeued} failed queue entries");
        }
        Ok(requeued)
    }
}

/// Queue an API call for later delivery, serializing `body` as JSON.
pub async fn queue_api_call<T: Serialize + ?Sized>(
    store: &dyn QueueStore,
    action: &str,
    endpoint: &str,
    method: HttpMethod,
    body: Option<&T>,
) -> Result<QueueEntry, QueueError> {
    let body = body.map(serde_json::to_string).transpose()?;
    store.enqueue(action, endpoint, method, body.as_deref()).await
}

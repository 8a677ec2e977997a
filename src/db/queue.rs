use chrono::{SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{EntryUpdate, HttpMethod, QueueCounts, QueueEntry, QueueStatus};

/// Fixed-width RFC 3339 so that text order matches time order.
fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub async fn enqueue(
    pool: &SqlitePool,
    action: &str,
    endpoint: &str,
    method: HttpMethod,
    body: Option<&str>,
) -> Result<QueueEntry, sqlx::Error> {
    sqlx::query_as::<_, QueueEntry>(
        "INSERT INTO sync_queue (id, action, endpoint, method, body, created_at, retries, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'pending') RETURNING *",
    )
    .bind(Uuid::now_v7().to_string())
    .bind(action)
    .bind(endpoint)
    .bind(method)
    .bind(body)
    .bind(timestamp_now())
    .fetch_one(pool)
    .await
}

/// Oldest pending entry by creation time, insertion order breaking ties.
pub async fn oldest_pending(pool: &SqlitePool) -> Result<Option<QueueEntry>, sqlx::Error> {
    sqlx::query_as::<_, QueueEntry>(
        "SELECT * FROM sync_queue
         WHERE status = 'pending'
         ORDER BY created_at ASC, rowid ASC
         LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<QueueEntry>, sqlx::Error> {
    sqlx::query_as::<_, QueueEntry>("SELECT * FROM sync_queue WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// Merge the given fields into an entry. Returns false when no row matched.
///
/// `retries` only ever moves forward.
pub async fn update(
    pool: &SqlitePool,
    id: &str,
    update: EntryUpdate,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE sync_queue
         SET status = COALESCE(?2, status),
             retries = MAX(retries, COALESCE(?3, retries))
         WHERE id = ?1",
    )
    .bind(id)
    .bind(update.status)
    .bind(update.retries)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn remove(pool: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_by_status(
    pool: &SqlitePool,
    status: QueueStatus,
) -> Result<Vec<QueueEntry>, sqlx::Error> {
    sqlx::query_as::<_, QueueEntry>(
        "SELECT * FROM sync_queue WHERE status = ?1 ORDER BY created_at ASC, rowid ASC",
    )
    .bind(status)
    .fetch_all(pool)
    .await
}

pub async fn count_by_status(pool: &SqlitePool) -> Result<QueueCounts, sqlx::Error> {
    let (pending, failed): (i64, i64) = sqlx::query_as(
        "SELECT
             COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0),
             COALESCE(SUM(CASE WHEN status = 'failed' THEN 1 ELSE 0 END), 0)
         FROM sync_queue",
    )
    .fetch_one(pool)
    .await?;

    Ok(QueueCounts {
        pending: pending.max(0) as u64,
        failed: failed.max(0) as u64,
    })
}

pub async fn clear(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sync_queue").execute(pool).await?;
    Ok(())
}

/// Put entries left in `processing` by an interrupted drain back to `pending`.
pub async fn reset_processing(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("UPDATE sync_queue SET status = 'pending' WHERE status = 'processing'")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Replace every failed entry with a fresh pending copy (new id, new timestamp, zero retries).
pub async fn requeue_failed(pool: &SqlitePool) -> Result<u64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let failed = sqlx::query_as::<_, QueueEntry>(
        "SELECT * FROM sync_queue WHERE status = 'failed' ORDER BY created_at ASC, rowid ASC",
    )
    .fetch_all(&mut *tx)
    .await?;

    for entry in &failed {
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(&entry.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO sync_queue (id, action, endpoint, method, body, created_at, retries, status)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 'pending')",
        )
        .bind(Uuid::now_v7().to_string())
        .bind(&entry.action)
        .bind(&entry.endpoint)
        .bind(entry.method)
        .bind(entry.body.as_deref())
        .bind(timestamp_now())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(failed.len() as u64)
}

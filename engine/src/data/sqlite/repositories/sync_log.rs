//! Sync audit log repository for SQLite operations
//!
//! Append-only. There is deliberately no update or delete: a retry appends a
//! new row under the same idempotency key, and reconciliation reads history.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::{SyncAttemptRow, SyncOutcome};

const ATTEMPT_COLUMNS: &str = "id, lead_id, destination, idempotency_key, attempt, outcome, http_status, request_snapshot, response_snapshot, created_at";

/// Append one dispatch attempt record
pub async fn append_attempt(
    pool: &SqlitePool,
    record: &SyncAttemptRow,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO sync_attempts (id, lead_id, destination, idempotency_key, attempt, outcome,
                                   http_status, request_snapshot, response_snapshot, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&record.id)
    .bind(&record.lead_id)
    .bind(&record.destination)
    .bind(&record.idempotency_key)
    .bind(record.attempt)
    .bind(&record.outcome)
    .bind(record.http_status)
    .bind(&record.request_snapshot)
    .bind(&record.response_snapshot)
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Earliest successful attempt for an idempotency key, if any.
///
/// The single read path the dispatcher depends on for deduplication.
pub async fn find_prior_success(
    pool: &SqlitePool,
    idempotency_key: &str,
) -> Result<Option<SyncAttemptRow>, SqliteError> {
    let row = sqlx::query_as::<_, SyncAttemptRow>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM sync_attempts WHERE idempotency_key = ? AND outcome = ? ORDER BY created_at ASC LIMIT 1"
    ))
    .bind(idempotency_key)
    .bind(SyncOutcome::Success.as_str())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Full attempt history for a (lead, destination) pair, oldest first
pub async fn attempt_history(
    pool: &SqlitePool,
    lead_id: &str,
    destination: &str,
) -> Result<Vec<SyncAttemptRow>, SqliteError> {
    let rows = sqlx::query_as::<_, SyncAttemptRow>(&format!(
        "SELECT {ATTEMPT_COLUMNS} FROM sync_attempts WHERE lead_id = ? AND destination = ? ORDER BY created_at ASC, attempt ASC"
    ))
    .bind(lead_id)
    .bind(destination)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

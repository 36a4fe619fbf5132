//! Touchpoint repository for SQLite operations
//!
//! Touchpoints are immutable once written: there is no update path, and the
//! only delete is retention cleanup. The UNIQUE (lead_id, ordinal) constraint
//! is the database-side backstop for ordinal monotonicity.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::TouchpointRow;

const TOUCHPOINT_COLUMNS: &str =
    "id, session_id, lead_id, ordinal, channel, campaign, occurred_at, params, created_at";

/// Insert a touchpoint
pub async fn insert_touchpoint(
    pool: &SqlitePool,
    touchpoint: &TouchpointRow,
) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO touchpoints (id, session_id, lead_id, ordinal, channel, campaign,
                                 occurred_at, params, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&touchpoint.id)
    .bind(&touchpoint.session_id)
    .bind(&touchpoint.lead_id)
    .bind(touchpoint.ordinal)
    .bind(&touchpoint.channel)
    .bind(&touchpoint.campaign)
    .bind(touchpoint.occurred_at)
    .bind(&touchpoint.params)
    .bind(touchpoint.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Next free ordinal for a lead (0 for the first touchpoint)
pub async fn next_ordinal(pool: &SqlitePool, lead_id: &str) -> Result<i64, SqliteError> {
    let (next,): (i64,) = sqlx::query_as(
        "SELECT COALESCE(MAX(ordinal), -1) + 1 FROM touchpoints WHERE lead_id = ?",
    )
    .bind(lead_id)
    .fetch_one(pool)
    .await?;

    Ok(next)
}

/// All touchpoints for a lead across all sessions, in (occurred_at, ordinal) order
pub async fn list_touchpoints_for_lead(
    pool: &SqlitePool,
    lead_id: &str,
) -> Result<Vec<TouchpointRow>, SqliteError> {
    let rows = sqlx::query_as::<_, TouchpointRow>(&format!(
        "SELECT {TOUCHPOINT_COLUMNS} FROM touchpoints WHERE lead_id = ? ORDER BY occurred_at ASC, ordinal ASC"
    ))
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Fetch touchpoints by IDs (batch operation)
pub async fn batch_fetch_touchpoints(
    pool: &SqlitePool,
    ids: &[String],
) -> Result<Vec<TouchpointRow>, SqliteError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }

    let placeholders: String = ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
    let query = format!(
        "SELECT {TOUCHPOINT_COLUMNS} FROM touchpoints WHERE id IN ({placeholders}) ORDER BY occurred_at ASC, ordinal ASC"
    );

    let mut query_builder = sqlx::query_as::<_, TouchpointRow>(&query);
    for id in ids {
        query_builder = query_builder.bind(id);
    }

    let rows = query_builder.fetch_all(pool).await?;
    Ok(rows)
}

/// Delete touchpoints older than a cutoff (retention cleanup)
pub async fn delete_touchpoints_before(
    pool: &SqlitePool,
    lead_id: &str,
    cutoff: i64,
) -> Result<u64, SqliteError> {
    let result = sqlx::query("DELETE FROM touchpoints WHERE lead_id = ? AND occurred_at < ?")
        .bind(lead_id)
        .bind(cutoff)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{seed_lead, setup_test_pool};

    async fn seed_session(pool: &SqlitePool, id: &str, lead_id: &str) {
        sqlx::query(
            "INSERT INTO sessions (id, lead_id, first_touch_at, last_touch_at, created_at, updated_at) VALUES (?, ?, 0, 0, 0, 0)",
        )
        .bind(id)
        .bind(lead_id)
        .execute(pool)
        .await
        .unwrap();
    }

    fn make_touchpoint(id: &str, lead_id: &str, ordinal: i64, occurred_at: i64) -> TouchpointRow {
        TouchpointRow {
            id: id.to_string(),
            session_id: "sess-1".to_string(),
            lead_id: lead_id.to_string(),
            ordinal,
            channel: "organic".to_string(),
            campaign: None,
            occurred_at,
            params: None,
            created_at: occurred_at,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list_ordered() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        seed_session(&pool, "sess-1", "lead-1").await;

        // Insert out of chronological order
        insert_touchpoint(&pool, &make_touchpoint("tp-b", "lead-1", 1, 2000)).await.unwrap();
        insert_touchpoint(&pool, &make_touchpoint("tp-a", "lead-1", 0, 1000)).await.unwrap();

        let rows = list_touchpoints_for_lead(&pool, "lead-1").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "tp-a");
        assert_eq!(rows[1].id, "tp-b");
    }

    #[tokio::test]
    async fn test_ordinal_breaks_timestamp_ties() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        seed_session(&pool, "sess-1", "lead-1").await;

        insert_touchpoint(&pool, &make_touchpoint("tp-1", "lead-1", 1, 1000)).await.unwrap();
        insert_touchpoint(&pool, &make_touchpoint("tp-0", "lead-1", 0, 1000)).await.unwrap();

        let rows = list_touchpoints_for_lead(&pool, "lead-1").await.unwrap();
        assert_eq!(rows[0].ordinal, 0);
        assert_eq!(rows[1].ordinal, 1);
    }

    #[tokio::test]
    async fn test_next_ordinal() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        seed_session(&pool, "sess-1", "lead-1").await;

        assert_eq!(next_ordinal(&pool, "lead-1").await.unwrap(), 0);
        insert_touchpoint(&pool, &make_touchpoint("tp-0", "lead-1", 0, 1000)).await.unwrap();
        assert_eq!(next_ordinal(&pool, "lead-1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_ordinal_rejected() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        seed_session(&pool, "sess-1", "lead-1").await;

        insert_touchpoint(&pool, &make_touchpoint("tp-0", "lead-1", 0, 1000)).await.unwrap();
        let err = insert_touchpoint(&pool, &make_touchpoint("tp-dup", "lead-1", 0, 2000)).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn test_batch_fetch() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        seed_session(&pool, "sess-1", "lead-1").await;

        insert_touchpoint(&pool, &make_touchpoint("tp-0", "lead-1", 0, 1000)).await.unwrap();
        insert_touchpoint(&pool, &make_touchpoint("tp-1", "lead-1", 1, 2000)).await.unwrap();
        insert_touchpoint(&pool, &make_touchpoint("tp-2", "lead-1", 2, 3000)).await.unwrap();

        let rows = batch_fetch_touchpoints(&pool, &["tp-0".to_string(), "tp-2".to_string()])
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "tp-0");
        assert_eq!(rows[1].id, "tp-2");

        let empty = batch_fetch_touchpoints(&pool, &[]).await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_delete_touchpoints_before() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        seed_session(&pool, "sess-1", "lead-1").await;

        insert_touchpoint(&pool, &make_touchpoint("tp-0", "lead-1", 0, 1000)).await.unwrap();
        insert_touchpoint(&pool, &make_touchpoint("tp-1", "lead-1", 1, 9000)).await.unwrap();

        let deleted = delete_touchpoints_before(&pool, "lead-1", 5000).await.unwrap();
        assert_eq!(deleted, 1);
        let rows = list_touchpoints_for_lead(&pool, "lead-1").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, "tp-1");
    }
}

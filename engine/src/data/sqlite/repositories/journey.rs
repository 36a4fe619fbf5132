//! Journey repository for SQLite operations
//!
//! Journeys are materialized snapshots: a recomputation inserts a new row
//! with a later `assembled_at`, superseding (not overwriting) prior rows.

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::JourneyRow;

const JOURNEY_COLUMNS: &str = "id, lead_id, model, touchpoint_count, credits, assembled_at";

/// Persist a materialized journey snapshot
pub async fn save_journey(pool: &SqlitePool, journey: &JourneyRow) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO journeys (id, lead_id, model, touchpoint_count, credits, assembled_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&journey.id)
    .bind(&journey.lead_id)
    .bind(&journey.model)
    .bind(journey.touchpoint_count)
    .bind(&journey.credits)
    .bind(journey.assembled_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent journey snapshot for a lead, if any
pub async fn latest_journey(
    pool: &SqlitePool,
    lead_id: &str,
) -> Result<Option<JourneyRow>, SqliteError> {
    let row = sqlx::query_as::<_, JourneyRow>(&format!(
        "SELECT {JOURNEY_COLUMNS} FROM journeys WHERE lead_id = ? ORDER BY assembled_at DESC, id DESC LIMIT 1"
    ))
    .bind(lead_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Delete superseded snapshots, keeping the most recent (retention cleanup)
pub async fn prune_superseded_journeys(
    pool: &SqlitePool,
    lead_id: &str,
) -> Result<u64, SqliteError> {
    let result = sqlx::query(
        r#"
        DELETE FROM journeys
        WHERE lead_id = ?
          AND id NOT IN (
            SELECT id FROM journeys WHERE lead_id = ? ORDER BY assembled_at DESC, id DESC LIMIT 1
          )
        "#,
    )
    .bind(lead_id)
    .bind(lead_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::test_support::{seed_lead, setup_test_pool};

    fn make_journey(id: &str, lead_id: &str, assembled_at: i64) -> JourneyRow {
        JourneyRow {
            id: id.to_string(),
            lead_id: lead_id.to_string(),
            model: "linear".to_string(),
            touchpoint_count: 3,
            credits: "[]".to_string(),
            assembled_at,
        }
    }

    #[tokio::test]
    async fn test_save_and_latest() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;

        save_journey(&pool, &make_journey("j-1", "lead-1", 1000)).await.unwrap();
        save_journey(&pool, &make_journey("j-2", "lead-1", 2000)).await.unwrap();

        let latest = latest_journey(&pool, "lead-1").await.unwrap().unwrap();
        assert_eq!(latest.id, "j-2");
    }

    #[tokio::test]
    async fn test_latest_none_for_unknown_lead() {
        let pool = setup_test_pool().await;
        assert!(latest_journey(&pool, "nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_prune_superseded() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;

        save_journey(&pool, &make_journey("j-1", "lead-1", 1000)).await.unwrap();
        save_journey(&pool, &make_journey("j-2", "lead-1", 2000)).await.unwrap();
        save_journey(&pool, &make_journey("j-3", "lead-1", 3000)).await.unwrap();

        let pruned = prune_superseded_journeys(&pool, "lead-1").await.unwrap();
        assert_eq!(pruned, 2);

        let latest = latest_journey(&pool, "lead-1").await.unwrap().unwrap();
        assert_eq!(latest.id, "j-3");
    }
}

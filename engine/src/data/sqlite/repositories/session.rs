//! Session repository for SQLite operations

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::SessionRow;

const SESSION_COLUMNS: &str = "id, lead_id, first_touch_at, last_touch_at, attribution_model, source, medium, campaign, created_at, updated_at";

/// Create a session
pub async fn create_session(pool: &SqlitePool, session: &SessionRow) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, lead_id, first_touch_at, last_touch_at, attribution_model,
                              source, medium, campaign, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(&session.lead_id)
    .bind(session.first_touch_at)
    .bind(session.last_touch_at)
    .bind(&session.attribution_model)
    .bind(&session.source)
    .bind(&session.medium)
    .bind(&session.campaign)
    .bind(session.created_at)
    .bind(session.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a session by its opaque key
pub async fn get_session(pool: &SqlitePool, id: &str) -> Result<Option<SessionRow>, SqliteError> {
    let row = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// List sessions for a lead, oldest first
pub async fn list_sessions_for_lead(
    pool: &SqlitePool,
    lead_id: &str,
) -> Result<Vec<SessionRow>, SqliteError> {
    let rows = sqlx::query_as::<_, SessionRow>(&format!(
        "SELECT {SESSION_COLUMNS} FROM sessions WHERE lead_id = ? ORDER BY first_touch_at ASC"
    ))
    .bind(lead_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Extend a session's last-touch timestamp.
///
/// Only moves forward: an out-of-order (backfilled) event never shrinks the
/// session window.
pub async fn touch_session(
    pool: &SqlitePool,
    id: &str,
    touched_at: i64,
) -> Result<bool, SqliteError> {
    let now = chrono::Utc::now().timestamp_millis();
    let result = sqlx::query(
        r#"
        UPDATE sessions
        SET last_touch_at = MAX(last_touch_at, ?),
            first_touch_at = MIN(first_touch_at, ?),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(touched_at)
    .bind(touched_at)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Record which attribution model summarized this session
pub async fn set_session_model(
    pool: &SqlitePool,
    id: &str,
    model: &str,
) -> Result<bool, SqliteError> {
    let now = chrono::Utc::now().timestamp_millis();
    let result =
        sqlx::query("UPDATE sessions SET attribution_model = ?, updated_at = ? WHERE id = ?")
            .bind(model)
            .bind(now)
            .bind(id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete sessions older than a cutoff (retention cleanup)
pub async fn delete_sessions_before(
    pool: &SqlitePool,
    lead_id: &str,
    cutoff: i64,
) -> Result<u64, SqliteError> {
    let result = sqlx::query("DELETE FROM sessions WHERE lead_id = ? AND last_touch_at < ?")
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

    fn make_session(id: &str, lead_id: &str, at: i64) -> SessionRow {
        SessionRow {
            id: id.to_string(),
            lead_id: lead_id.to_string(),
            first_touch_at: at,
            last_touch_at: at,
            attribution_model: None,
            source: Some("google".to_string()),
            medium: Some("cpc".to_string()),
            campaign: Some("spring-sale".to_string()),
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_session() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;

        create_session(&pool, &make_session("sess-1", "lead-1", 1000)).await.unwrap();

        let session = get_session(&pool, "sess-1").await.unwrap().unwrap();
        assert_eq!(session.lead_id, "lead-1");
        assert_eq!(session.source.as_deref(), Some("google"));
        assert_eq!(session.first_touch_at, 1000);
    }

    #[tokio::test]
    async fn test_touch_session_extends_window() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        create_session(&pool, &make_session("sess-1", "lead-1", 1000)).await.unwrap();

        touch_session(&pool, "sess-1", 5000).await.unwrap();
        let session = get_session(&pool, "sess-1").await.unwrap().unwrap();
        assert_eq!(session.last_touch_at, 5000);
        assert_eq!(session.first_touch_at, 1000);

        // Backfilled event earlier than first touch widens the start
        touch_session(&pool, "sess-1", 500).await.unwrap();
        let session = get_session(&pool, "sess-1").await.unwrap().unwrap();
        assert_eq!(session.first_touch_at, 500);
        assert_eq!(session.last_touch_at, 5000);
    }

    #[tokio::test]
    async fn test_list_sessions_for_lead_ordered() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        create_session(&pool, &make_session("sess-b", "lead-1", 2000)).await.unwrap();
        create_session(&pool, &make_session("sess-a", "lead-1", 1000)).await.unwrap();

        let sessions = list_sessions_for_lead(&pool, "lead-1").await.unwrap();
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].id, "sess-a");
        assert_eq!(sessions[1].id, "sess-b");
    }

    #[tokio::test]
    async fn test_set_session_model() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        create_session(&pool, &make_session("sess-1", "lead-1", 1000)).await.unwrap();

        set_session_model(&pool, "sess-1", "linear").await.unwrap();
        let session = get_session(&pool, "sess-1").await.unwrap().unwrap();
        assert_eq!(session.attribution_model.as_deref(), Some("linear"));
    }

    #[tokio::test]
    async fn test_delete_sessions_before() {
        let pool = setup_test_pool().await;
        seed_lead(&pool, "lead-1").await;
        create_session(&pool, &make_session("sess-old", "lead-1", 1000)).await.unwrap();
        create_session(&pool, &make_session("sess-new", "lead-1", 9000)).await.unwrap();

        let deleted = delete_sessions_before(&pool, "lead-1", 5000).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(get_session(&pool, "sess-old").await.unwrap().is_none());
        assert!(get_session(&pool, "sess-new").await.unwrap().is_some());
    }
}

//! Lead repository for SQLite operations

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::LeadRow;

/// Create a lead
pub async fn create_lead(pool: &SqlitePool, lead: &LeadRow) -> Result<(), SqliteError> {
    sqlx::query(
        r#"
        INSERT INTO leads (id, email, external_ref, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&lead.id)
    .bind(&lead.email)
    .bind(&lead.external_ref)
    .bind(lead.created_at)
    .bind(lead.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get a lead by ID
pub async fn get_lead(pool: &SqlitePool, id: &str) -> Result<Option<LeadRow>, SqliteError> {
    let row = sqlx::query_as::<_, LeadRow>(
        "SELECT id, email, external_ref, created_at, updated_at FROM leads WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Update a lead's contact fields
pub async fn update_lead(
    pool: &SqlitePool,
    id: &str,
    email: Option<&str>,
    external_ref: Option<&str>,
) -> Result<bool, SqliteError> {
    let now = chrono::Utc::now().timestamp_millis();
    let result = sqlx::query(
        "UPDATE leads SET email = ?, external_ref = ?, updated_at = ? WHERE id = ?",
    )
    .bind(email)
    .bind(external_ref)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a lead (retention cleanup). Cascades to sessions, touchpoints, journeys.
pub async fn delete_lead(pool: &SqlitePool, id: &str) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM leads WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

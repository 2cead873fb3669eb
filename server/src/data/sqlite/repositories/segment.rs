//! Segment repository for SQLite operations
//!
//! Stores rule groups verbatim; validation happens in the segment service.

use sqlx::SqlitePool;

use crate::data::filters::dates::to_sql_datetime;
use crate::data::sqlite::SqliteError;
use crate::data::types::{SegmentRow, SegmentUpdate};

const SEGMENT_COLUMNS: &str =
    r#""id", "name", "description", "order", "ruleGroup", "createdAt", "updatedAt""#;

fn now() -> String {
    to_sql_datetime(&chrono::Utc::now())
}

/// Create a new segment with a generated CUID2 ID
pub async fn create_segment(
    pool: &SqlitePool,
    name: &str,
    description: &str,
    order: i64,
    rule_group: &str,
) -> Result<SegmentRow, SqliteError> {
    let id = cuid2::create_id();
    let now = now();

    sqlx::query(
        r#"INSERT INTO segments ("id", "name", "description", "order", "ruleGroup", "createdAt", "updatedAt") VALUES (?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&id)
    .bind(name)
    .bind(description)
    .bind(order)
    .bind(rule_group)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    Ok(SegmentRow {
        id,
        name: name.to_string(),
        description: description.to_string(),
        order,
        rule_group: rule_group.to_string(),
        created_at: now.clone(),
        updated_at: now,
    })
}

/// Get a segment by ID
pub async fn get_segment(pool: &SqlitePool, id: &str) -> Result<Option<SegmentRow>, SqliteError> {
    let row = sqlx::query_as::<_, SegmentRow>(&format!(
        r#"SELECT {} FROM segments WHERE "id" = ?"#,
        SEGMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// List all segments in display order
pub async fn list_segments(pool: &SqlitePool) -> Result<Vec<SegmentRow>, SqliteError> {
    let rows = sqlx::query_as::<_, SegmentRow>(&format!(
        r#"SELECT {} FROM segments ORDER BY "order" ASC, "name" ASC"#,
        SEGMENT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Apply `update` to a segment, returning the new row or `None` if absent
pub async fn update_segment(
    pool: &SqlitePool,
    id: &str,
    update: &SegmentUpdate,
) -> Result<Option<SegmentRow>, SqliteError> {
    let result = sqlx::query(
        r#"UPDATE segments SET
            "name" = COALESCE(?, "name"),
            "description" = COALESCE(?, "description"),
            "order" = COALESCE(?, "order"),
            "ruleGroup" = COALESCE(?, "ruleGroup"),
            "updatedAt" = ?
        WHERE "id" = ?"#,
    )
    .bind(update.name.as_deref())
    .bind(update.description.as_deref())
    .bind(update.order)
    .bind(update.rule_group.as_deref())
    .bind(now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_segment(pool, id).await
}

/// Delete a segment, returning whether it existed
pub async fn delete_segment(pool: &SqlitePool, id: &str) -> Result<bool, SqliteError> {
    let result = sqlx::query(r#"DELETE FROM segments WHERE "id" = ?"#)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

//! Callout repository for SQLite operations

use sqlx::SqlitePool;

use crate::data::sqlite::SqliteError;
use crate::data::types::CalloutFormRow;

/// Get the form definition of a callout
pub async fn get_callout_form(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<CalloutFormRow>, SqliteError> {
    let row = sqlx::query_as::<_, CalloutFormRow>(
        r#"SELECT "id", "hidden", "formSchema" FROM callouts WHERE "id" = ?"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

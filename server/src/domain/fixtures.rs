//! Row fixtures for domain tests

use sqlx::SqlitePool;

use crate::data::SqliteService;

pub type Db = SqliteService;

pub async fn db() -> Db {
    SqliteService::memory().await.unwrap()
}

pub async fn contact(pool: &SqlitePool, id: &str, email: &str, joined: &str) {
    sqlx::query(r#"INSERT INTO contacts ("id", "email", "joined") VALUES (?, ?, ?)"#)
        .bind(id)
        .bind(email)
        .bind(joined)
        .execute(pool)
        .await
        .unwrap();
}

pub async fn set_contact_column(pool: &SqlitePool, id: &str, column: &str, value: &str) {
    sqlx::query(&format!(
        r#"UPDATE contacts SET "{}" = ? WHERE "id" = ?"#,
        column
    ))
    .bind(value)
    .bind(id)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn membership(pool: &SqlitePool, contact_id: &str, added: &str, expires: Option<&str>) {
    sqlx::query(
        r#"INSERT INTO contact_roles ("contactId", "type", "dateAdded", "dateExpires") VALUES (?, 'member', ?, ?)"#,
    )
    .bind(contact_id)
    .bind(added)
    .bind(expires)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn callout(
    pool: &SqlitePool,
    id: &str,
    starts: Option<&str>,
    expires: Option<&str>,
    hidden: bool,
    form_schema: &str,
) {
    sqlx::query(
        r#"INSERT INTO callouts ("id", "title", "starts", "expires", "hidden", "formSchema") VALUES (?, ?, ?, ?, ?, ?)"#,
    )
    .bind(id)
    .bind(format!("Callout {}", id))
    .bind(starts)
    .bind(expires)
    .bind(hidden)
    .bind(form_schema)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn response(pool: &SqlitePool, id: &str, callout_id: &str, contact_id: &str, answers: &str) {
    sqlx::query(
        r#"INSERT INTO callout_responses ("id", "calloutId", "contactId", "answers", "createdAt") VALUES (?, ?, ?, ?, '2024-05-01 10:00:00')"#,
    )
    .bind(id)
    .bind(callout_id)
    .bind(contact_id)
    .bind(answers)
    .execute(pool)
    .await
    .unwrap();
}

pub async fn payment(pool: &SqlitePool, id: &str, contact_id: &str, amount: f64, status: &str) {
    sqlx::query(
        r#"INSERT INTO payments ("id", "contactId", "chargeDate", "amount", "status") VALUES (?, ?, '2024-04-01 00:00:00', ?, ?)"#,
    )
    .bind(id)
    .bind(contact_id)
    .bind(amount)
    .bind(status)
    .execute(pool)
    .await
    .unwrap();
}

/// Form with one slide holding a select and a checkbox
pub const SURVEY_FORM: &str = r#"{
    "slides": [{
        "id": "s1",
        "components": [
            {"key": "colour", "type": "select", "values": [{"value": "red"}, {"value": "blue"}]},
            {"key": "agree", "type": "checkbox"},
            {"key": "intro", "type": "content"}
        ]
    }]
}"#;

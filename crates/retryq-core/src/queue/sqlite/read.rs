//! Request read operations: list and get.

use anyhow::{Context, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::SqliteQueue;
use crate::request::{Request, RequestId};

pub(super) fn row_to_request(row: &SqliteRow) -> Result<Request> {
    let id: i64 = row.get("id");
    let data_json: String = row.get("data_json");
    let retry_count: i64 = row.get("retry_count");
    let data = serde_json::from_str(&data_json)
        .with_context(|| format!("parse data_json of request {}", id))?;
    Ok(Request {
        id,
        command: row.get("command"),
        data,
        retry_count: u32::try_from(retry_count).unwrap_or(u32::MAX),
        created_at: row.get("created_at"),
    })
}

impl SqliteQueue {
    /// List all queued requests, oldest first.
    pub(crate) async fn list_requests(&self) -> Result<Vec<Request>> {
        let rows = sqlx::query(
            r#"
            SELECT id, command, data_json, retry_count, created_at
            FROM requests
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_request).collect()
    }

    pub(crate) async fn get_request(&self, id: RequestId) -> Result<Option<Request>> {
        let row = sqlx::query(
            r#"
            SELECT id, command, data_json, retry_count, created_at
            FROM requests
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_request).transpose()
    }
}

//! Request write operations: insert, claims, retry accounting, delete.

use anyhow::Result;
use sqlx::Row;
use std::time::Duration;

use super::db::SqliteQueue;
use super::read::row_to_request;
use crate::queue::FailureRecord;
use crate::request::{NewRequest, Request, RequestId};
use crate::unix_timestamp;

impl SqliteQueue {
    pub(crate) async fn insert_request(&self, request: &NewRequest) -> Result<RequestId> {
        let now = unix_timestamp();
        let data_json = serde_json::to_string(&request.data)?;

        let row_id = sqlx::query(
            r#"
            INSERT INTO requests (command, data_json, retry_count, created_at, updated_at)
            VALUES (?1, ?2, 0, ?3, ?4)
            "#,
        )
        .bind(&request.command)
        .bind(data_json)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(row_id)
    }

    /// Mark a row as claimed, unless a claim younger than `lease` is already
    /// on it. The check and the mark happen in one transaction, so a second
    /// connection to the same file sees the row as taken.
    pub(crate) async fn claim_request(
        &self,
        id: RequestId,
        lease: Duration,
    ) -> Result<Option<Request>> {
        let now = unix_timestamp();
        let lease_secs = i64::try_from(lease.as_secs()).unwrap_or(i64::MAX);
        let stale_at = now.saturating_sub(lease_secs);
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            UPDATE requests
            SET claimed_at = ?1
            WHERE id = ?2
              AND (claimed_at IS NULL OR claimed_at <= ?3)
            RETURNING id, command, data_json, retry_count, created_at
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(stale_at)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        row.as_ref().map(row_to_request).transpose()
    }

    /// Single-statement increment that also releases any claim; returns the
    /// new count or None for a missing id.
    pub(crate) async fn bump_retry_count(&self, id: RequestId) -> Result<Option<u32>> {
        let now = unix_timestamp();
        let row = sqlx::query(
            r#"
            UPDATE requests
            SET retry_count = retry_count + 1,
                updated_at = ?1,
                claimed_at = NULL
            WHERE id = ?2
            RETURNING retry_count
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| {
            let n: i64 = r.get("retry_count");
            u32::try_from(n).unwrap_or(u32::MAX)
        }))
    }

    /// Increment, compare and possibly delete inside one transaction so a
    /// concurrent writer never sees the row between the two steps.
    pub(crate) async fn bump_or_evict(
        &self,
        id: RequestId,
        max_retries: u32,
    ) -> Result<Option<FailureRecord>> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            UPDATE requests
            SET retry_count = retry_count + 1,
                updated_at = ?1,
                claimed_at = NULL
            WHERE id = ?2
            RETURNING retry_count
            "#,
        )
        .bind(now)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let n: i64 = row.get("retry_count");
        let retry_count = u32::try_from(n).unwrap_or(u32::MAX);
        let evicted = retry_count >= max_retries;
        if evicted {
            sqlx::query(
                r#"
                DELETE FROM requests
                WHERE id = ?1
                "#,
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(Some(FailureRecord {
            retry_count,
            evicted,
        }))
    }

    /// Delete a request row. Deleting a missing id affects nothing.
    pub(crate) async fn delete_request(&self, id: RequestId) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM requests
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub(crate) async fn delete_all(&self) -> Result<u64> {
        let r = sqlx::query("DELETE FROM requests")
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }
}

//! SQLite-backed request queue (via sqlx).
//!
//! Queued requests, their parameters and retry counts live in one table so
//! they survive process restarts.

mod db;
mod read;
mod write;


pub use db::SqliteQueue;

use anyhow::Result;
use std::time::Duration;

use super::{FailureRecord, RequestQueue};
use crate::request::{NewRequest, Request, RequestId};

impl RequestQueue for SqliteQueue {
    async fn enqueue(&self, request: NewRequest) -> Result<RequestId> {
        self.insert_request(&request).await
    }

    async fn get(&self, id: RequestId) -> Result<Option<Request>> {
        self.get_request(id).await
    }

    async fn list_pending(&self) -> Result<Vec<Request>> {
        self.list_requests().await
    }

    async fn claim(&self, id: RequestId, lease: Duration) -> Result<Option<Request>> {
        self.claim_request(id, lease).await
    }

    async fn increment_retries(&self, id: RequestId) -> Result<Option<u32>> {
        self.bump_retry_count(id).await
    }

    async fn remove(&self, id: RequestId) -> Result<()> {
        self.delete_request(id).await
    }

    async fn clear(&self) -> Result<u64> {
        self.delete_all().await
    }

    async fn record_failure(&self, id: RequestId, max_retries: u32) -> Result<Option<FailureRecord>> {
        self.bump_or_evict(id, max_retries).await
    }
}

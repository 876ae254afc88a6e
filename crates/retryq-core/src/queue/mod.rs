//! Durable request queue.
//!
//! [`RequestQueue`] is the contract the retry engine and the dispatcher work
//! against. [`SqliteQueue`] persists requests across restarts;
//! [`MemoryQueue`] keeps them in process and doubles as the test fake.
//!
//! Increment and remove must be atomic per identity, and both tolerate ids
//! that are already gone. A dispatcher claims each request just before sending
//! it, so two dispatchers sharing one store (or two processes on one database
//! file) never attempt the same request at once. Recording a failure releases
//! the claim, removal drops it with the row, and a claim left behind by a
//! crashed process expires after its lease.

mod memory;
mod sqlite;

pub use memory::MemoryQueue;
pub use sqlite::SqliteQueue;

use anyhow::Result;
use std::future::Future;
use std::time::Duration;

use crate::request::{NewRequest, Request, RequestId};

/// Result of recording one failed attempt against a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    /// Retry count after the increment.
    pub retry_count: u32,
    /// True if the count reached the maximum and the request was removed.
    pub evicted: bool,
}

pub trait RequestQueue: Send + Sync {
    /// Persist a new request with `retry_count = 0` and return its id.
    fn enqueue(&self, request: NewRequest) -> impl Future<Output = Result<RequestId>> + Send;

    /// Fetch one request, if still queued.
    fn get(&self, id: RequestId) -> impl Future<Output = Result<Option<Request>>> + Send;

    /// All queued requests, oldest first.
    fn list_pending(&self) -> impl Future<Output = Result<Vec<Request>>> + Send;

    /// Claim one queued request for an attempt and return its current state.
    /// Returns `None` if the id is gone or another claim on it is younger than
    /// `lease`.
    fn claim(
        &self,
        id: RequestId,
        lease: Duration,
    ) -> impl Future<Output = Result<Option<Request>>> + Send;

    /// Add one to the retry count and release any claim. Returns the new
    /// count, or `None` if the id is not queued (nothing is changed in that case).
    fn increment_retries(&self, id: RequestId)
        -> impl Future<Output = Result<Option<u32>>> + Send;

    /// Remove a request. Removing a missing id is a no-op.
    fn remove(&self, id: RequestId) -> impl Future<Output = Result<()>> + Send;

    /// Drop every queued request; returns how many were removed.
    fn clear(&self) -> impl Future<Output = Result<u64>> + Send;

    /// Increment, compare against `max_retries`, and remove on exhaustion.
    /// A surviving request's claim is released.
    ///
    /// The default composes `increment_retries` and `remove`; stores that can
    /// do better should run all three as one step per identity.
    fn record_failure(
        &self,
        id: RequestId,
        max_retries: u32,
    ) -> impl Future<Output = Result<Option<FailureRecord>>> + Send {
        async move {
            let Some(retry_count) = self.increment_retries(id).await? else {
                return Ok(None);
            };
            let evicted = retry_count >= max_retries;
            if evicted {
                self.remove(id).await?;
            }
            Ok(Some(FailureRecord {
                retry_count,
                evicted,
            }))
        }
    }
}

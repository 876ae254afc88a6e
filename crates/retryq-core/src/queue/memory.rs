//! In-memory queue. Not durable; used by tests and short-lived tools.

use anyhow::Result;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{FailureRecord, RequestQueue};
use crate::request::{NewRequest, Request, RequestId};

#[derive(Debug, Default)]
struct State {
    last_id: RequestId,
    rows: BTreeMap<RequestId, Request>,
    claims: HashMap<RequestId, Instant>,
}

/// Queue backed by a `BTreeMap` behind one `std::sync::Mutex`, so every
/// operation is atomic with respect to every identity. The lock is never
/// held across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request as-is (keeps its id and retry count). Used to seed a
    /// queue from a snapshot.
    pub fn insert(&self, request: Request) {
        let mut state = self.lock();
        state.last_id = state.last_id.max(request.id);
        state.rows.insert(request.id, request);
    }

    pub fn len(&self) -> usize {
        self.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().rows.is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RequestQueue for MemoryQueue {
    async fn enqueue(&self, request: NewRequest) -> Result<RequestId> {
        let mut state = self.lock();
        state.last_id += 1;
        let id = state.last_id;
        state.rows.insert(
            id,
            Request {
                id,
                command: request.command,
                data: request.data,
                retry_count: 0,
                created_at: crate::unix_timestamp(),
            },
        );
        Ok(id)
    }

    async fn get(&self, id: RequestId) -> Result<Option<Request>> {
        Ok(self.lock().rows.get(&id).cloned())
    }

    async fn list_pending(&self) -> Result<Vec<Request>> {
        Ok(self.lock().rows.values().cloned().collect())
    }

    async fn claim(&self, id: RequestId, lease: Duration) -> Result<Option<Request>> {
        let now = Instant::now();
        let mut state = self.lock();
        let Some(row) = state.rows.get(&id).cloned() else {
            return Ok(None);
        };
        if let Some(at) = state.claims.get(&id) {
            if now.duration_since(*at) < lease {
                return Ok(None);
            }
        }
        state.claims.insert(id, now);
        Ok(Some(row))
    }

    async fn increment_retries(&self, id: RequestId) -> Result<Option<u32>> {
        let mut state = self.lock();
        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(None);
        };
        row.retry_count = row.retry_count.saturating_add(1);
        let retry_count = row.retry_count;
        state.claims.remove(&id);
        Ok(Some(retry_count))
    }

    async fn remove(&self, id: RequestId) -> Result<()> {
        let mut state = self.lock();
        state.rows.remove(&id);
        state.claims.remove(&id);
        Ok(())
    }

    async fn clear(&self) -> Result<u64> {
        let mut state = self.lock();
        let n = state.rows.len() as u64;
        state.rows.clear();
        state.claims.clear();
        Ok(n)
    }

    async fn record_failure(&self, id: RequestId, max_retries: u32) -> Result<Option<FailureRecord>> {
        let mut state = self.lock();
        let Some(row) = state.rows.get_mut(&id) else {
            return Ok(None);
        };
        row.retry_count = row.retry_count.saturating_add(1);
        let retry_count = row.retry_count;
        let evicted = retry_count >= max_retries;
        if evicted {
            state.rows.remove(&id);
        }
        state.claims.remove(&id);
        Ok(Some(FailureRecord {
            retry_count,
            evicted,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn enqueue_list_remove() {
        let q = MemoryQueue::new();
        let a = q.enqueue(NewRequest::new("AddComment", json!({"text": "hi"}))).await.unwrap();
        let b = q.enqueue(NewRequest::new("OpenReport", json!({}))).await.unwrap();
        assert!(a < b);

        let pending = q.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].command, "AddComment");
        assert_eq!(pending[0].retry_count, 0);

        q.remove(a).await.unwrap();
        let pending = q.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);
    }

    #[tokio::test]
    async fn remove_twice_and_increment_missing_are_noops() {
        let q = MemoryQueue::new();
        let a = q.enqueue(NewRequest::new("A", json!(null))).await.unwrap();
        let b = q.enqueue(NewRequest::new("B", json!(null))).await.unwrap();
        q.increment_retries(b).await.unwrap();

        q.remove(a).await.unwrap();
        q.remove(a).await.unwrap();
        assert_eq!(q.increment_retries(a).await.unwrap(), None);
        assert_eq!(q.increment_retries(999).await.unwrap(), None);

        let other = q.get(b).await.unwrap().unwrap();
        assert_eq!(other.retry_count, 1);
        assert_eq!(q.len(), 1);
    }

    #[tokio::test]
    async fn record_failure_evicts_at_max() {
        let q = MemoryQueue::new();
        let id = q.enqueue(NewRequest::new("A", json!(null))).await.unwrap();
        for expected in 1..3 {
            let rec = q.record_failure(id, 3).await.unwrap().unwrap();
            assert_eq!(rec.retry_count, expected);
            assert!(!rec.evicted);
        }
        let rec = q.record_failure(id, 3).await.unwrap().unwrap();
        assert_eq!(rec, FailureRecord { retry_count: 3, evicted: true });
        assert!(q.is_empty());
        assert_eq!(q.record_failure(id, 3).await.unwrap(), None);
    }

    #[tokio::test]
    async fn claims_are_exclusive_until_released_or_expired() {
        let q = MemoryQueue::new();
        let a = q.enqueue(NewRequest::new("A", json!(null))).await.unwrap();
        let b = q.enqueue(NewRequest::new("B", json!(null))).await.unwrap();
        let lease = Duration::from_secs(300);

        assert_eq!(q.claim(a, lease).await.unwrap().unwrap().id, a);
        assert!(q.claim(a, lease).await.unwrap().is_none());
        assert!(q.claim(b, lease).await.unwrap().is_some());

        // A recorded failure releases the claim and the next one sees the new count.
        q.record_failure(a, 10).await.unwrap();
        let again = q.claim(a, lease).await.unwrap().unwrap();
        assert_eq!(again.retry_count, 1);

        // A zero lease treats every claim as stale.
        assert!(q.claim(b, Duration::ZERO).await.unwrap().is_some());

        q.remove(b).await.unwrap();
        assert!(q.claim(b, Duration::ZERO).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_keeps_id_and_count() {
        let q = MemoryQueue::new();
        q.insert(Request {
            id: 41,
            command: "A".into(),
            data: json!(null),
            retry_count: 9,
            created_at: 0,
        });
        let next = q.enqueue(NewRequest::new("B", json!(null))).await.unwrap();
        assert_eq!(next, 42);
        assert_eq!(q.get(41).await.unwrap().unwrap().retry_count, 9);
    }
}

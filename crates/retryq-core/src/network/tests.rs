//! Dispatcher tests with a scripted in-process transport.

use serde_json::json;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::*;
use crate::queue::{MemoryQueue, RequestQueue};
use crate::request::{Request, RequestId, Response};
use crate::retry::{RetryPolicy, TransportError};

/// Replies from a per-command script; commands without a script succeed.
#[derive(Default)]
struct ScriptedTransport {
    script: Mutex<HashMap<String, VecDeque<Result<Response, TransportError>>>>,
    always_fail: Mutex<HashSet<String>>,
    calls: Mutex<Vec<RequestId>>,
    in_flight: Mutex<HashSet<RequestId>>,
    overlapped: Mutex<bool>,
}

impl ScriptedTransport {
    fn push(&self, command: &str, outcome: Result<Response, TransportError>) {
        self.script
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(outcome);
    }

    fn fail_always(&self, command: &str) {
        self.always_fail.lock().unwrap().insert(command.to_string());
    }

    fn calls(&self) -> Vec<RequestId> {
        self.calls.lock().unwrap().clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        self.calls.lock().unwrap().push(request.id);
        if !self.in_flight.lock().unwrap().insert(request.id) {
            *self.overlapped.lock().unwrap() = true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.in_flight.lock().unwrap().remove(&request.id);

        if self.always_fail.lock().unwrap().contains(&request.command) {
            return Err(TransportError::Http(503));
        }
        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(&request.command)
            .and_then(VecDeque::pop_front);
        next.unwrap_or_else(|| Ok(Response::success(json!({"command": request.command}))))
    }
}

fn policy(max: u32) -> RetryPolicy {
    RetryPolicy {
        max_request_retries: max,
        base_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(1),
    }
}

fn network(max: u32) -> (Network<MemoryQueue, ScriptedTransport>, Arc<MemoryQueue>, Arc<ScriptedTransport>) {
    let queue = Arc::new(MemoryQueue::new());
    let transport = Arc::new(ScriptedTransport::default());
    let net = Network::new(Arc::clone(&queue), Arc::clone(&transport), policy(max));
    (net, queue, transport)
}

#[tokio::test]
async fn interactive_success_resolves_with_server_response() {
    let (net, queue, transport) = network(10);
    transport.push("OpenReport", Ok(Response::success(json!({"reportID": 9}))));

    let resp = net.make_request("OpenReport", json!({"reportID": 9})).wait().await;
    assert!(!resp.is_offline());
    assert_eq!(resp.payload["reportID"], 9);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn interactive_failure_resolves_offline_without_queueing() {
    let (net, queue, transport) = network(10);
    transport.push("OpenReport", Err(TransportError::Timeout));

    let resp = net.make_request("OpenReport", json!({})).wait().await;
    assert!(resp.is_offline());
    assert!(queue.is_empty());
    assert_eq!(transport.calls().len(), 1);
}

#[tokio::test]
async fn successful_flush_removes_delivered_requests() {
    let (net, queue, _transport) = network(10);
    net.persist("AddComment", json!({"text": "a"})).await.unwrap();
    net.persist("AddComment", json!({"text": "b"})).await.unwrap();

    let s = net.flush().await.unwrap();
    assert_eq!(s.attempted, 2);
    assert_eq!(s.delivered, 2);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn failed_flush_keeps_request_and_counts_retry() {
    let (net, queue, transport) = network(10);
    let id = net.persist("AddComment", json!({})).await.unwrap();
    transport.push("AddComment", Err(TransportError::Connection("offline".into())));

    let s = net.flush().await.unwrap();
    assert_eq!(s.retrying, 1);
    assert_eq!(queue.get(id).await.unwrap().unwrap().retry_count, 1);

    // Next pass succeeds and the dispatcher removes it.
    let s = net.flush().await.unwrap();
    assert_eq!(s.delivered, 1);
    assert!(queue.is_empty());
}

#[tokio::test(start_paused = true)]
async fn drain_gives_up_after_max_retries() {
    let (net, queue, transport) = network(3);
    transport.fail_always("AddComment");
    let id = net.persist("AddComment", json!({})).await.unwrap();

    let s = net.drain(10).await.unwrap();
    assert_eq!(s.passes, 4);
    assert_eq!(s.abandoned, 1);
    assert_eq!(s.delivered, 0);
    assert_eq!(s.remaining, 0);
    assert!(queue.get(id).await.unwrap().is_none());
    // Three failed attempts, then an empty pass.
    assert_eq!(transport.calls().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn drain_stops_at_pass_limit() {
    let (net, queue, transport) = network(10);
    transport.fail_always("AddComment");
    let id = net.persist("AddComment", json!({})).await.unwrap();

    let s = net.drain(2).await.unwrap();
    assert_eq!(s.passes, 2);
    assert_eq!(s.remaining, 1);
    assert_eq!(queue.get(id).await.unwrap().unwrap().retry_count, 2);
}

#[tokio::test(start_paused = true)]
async fn drain_delivers_after_transient_failures() {
    let (net, queue, transport) = network(10);
    transport.push("AddComment", Err(TransportError::Http(503)));
    transport.push("AddComment", Err(TransportError::Timeout));
    net.persist("AddComment", json!({})).await.unwrap();

    let s = net.drain(10).await.unwrap();
    assert_eq!(s.delivered, 1);
    assert_eq!(s.abandoned, 0);
    assert_eq!(s.remaining, 0);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn concurrent_pass_attempts_each_identity_once() {
    let (net, _queue, transport) = network(10);
    let net = net.drain_concurrency(4);
    for cmd in ["A", "B", "C", "D", "E", "F"] {
        net.persist(cmd, json!({})).await.unwrap();
        transport.fail_always(cmd);
    }

    let (a, b) = tokio::join!(net.flush(), net.flush());
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.retrying + b.retrying, 12);

    let calls = transport.calls();
    assert_eq!(calls.len(), 12);
    assert!(!*transport.overlapped.lock().unwrap(), "same identity attempted twice at once");
}

#[tokio::test]
async fn abandoned_then_late_flush_is_untracked_noop() {
    let (net, queue, transport) = network(1);
    transport.fail_always("A");
    let id = net.persist("A", json!({})).await.unwrap();

    let s = net.flush().await.unwrap();
    assert_eq!(s.abandoned, 1);
    assert!(queue.get(id).await.unwrap().is_none());

    let s = net.flush().await.unwrap();
    assert_eq!(s, FlushSummary::default());
}

#[tokio::test]
async fn two_networks_on_one_queue_attempt_each_request_once() {
    let queue = Arc::new(MemoryQueue::new());
    let transport = Arc::new(ScriptedTransport::default());
    let a = Network::new(Arc::clone(&queue), Arc::clone(&transport), policy(10)).drain_concurrency(4);
    let b = Network::new(Arc::clone(&queue), Arc::clone(&transport), policy(10)).drain_concurrency(4);
    let mut ids = Vec::new();
    for cmd in ["A", "B", "C"] {
        ids.push(a.persist(cmd, json!({})).await.unwrap());
        transport.fail_always(cmd);
    }

    let (sa, sb) = tokio::join!(a.flush(), b.flush());
    let (sa, sb) = (sa.unwrap(), sb.unwrap());
    assert_eq!(sa.attempted + sb.attempted, 3);
    assert_eq!(sa.skipped + sb.skipped, 3);

    assert_eq!(transport.calls().len(), 3);
    assert!(!*transport.overlapped.lock().unwrap(), "same identity attempted twice at once");
    for id in ids {
        assert_eq!(queue.get(id).await.unwrap().unwrap().retry_count, 1);
    }
}

#[tokio::test]
async fn flush_skips_claimed_request_until_lease_expires() {
    let (net, queue, transport) = network(10);
    let id = net.persist("AddComment", json!({})).await.unwrap();
    // Left behind by a dispatcher that went away mid-attempt.
    queue.claim(id, Duration::from_secs(300)).await.unwrap();

    let s = net.flush().await.unwrap();
    assert_eq!(s.skipped, 1);
    assert_eq!(s.attempted, 0);
    assert!(transport.calls().is_empty());

    let net = net.claim_lease(Duration::ZERO);
    let s = net.flush().await.unwrap();
    assert_eq!(s.delivered, 1);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn flush_forgets_requests_removed_outside_the_engine() {
    let (net, queue, transport) = network(10);
    transport.fail_always("AddComment");
    let id = net.persist("AddComment", json!({})).await.unwrap();
    net.flush().await.unwrap();
    assert_eq!(net.engine().tracked(), 1);

    queue.remove(id).await.unwrap();
    let s = net.flush().await.unwrap();
    assert_eq!(s, FlushSummary::default());
    assert_eq!(net.engine().tracked(), 0);
}

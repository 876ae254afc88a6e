//! Interactive dispatch and the sequential drain of the durable queue.

use anyhow::Result;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinSet;

use super::transport::Transport;
use crate::queue::RequestQueue;
use crate::request::{channel, NewRequest, Origin, Request, RequestId, ResponseHandle};
use crate::retry::{Disposition, QueueFault, RetryEngine, RetryPolicy};

/// Counts from one pass over the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub retrying: usize,
    pub abandoned: usize,
    /// Gone from the queue before their failure was recorded.
    pub untracked: usize,
    /// Claimed by another dispatcher (or removed) before this pass got to them.
    pub skipped: usize,
}

/// Totals over a whole drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub passes: u32,
    pub delivered: usize,
    pub abandoned: usize,
    /// Requests still queued when the drain stopped.
    pub remaining: usize,
}

/// How long a claim taken by a pass keeps other dispatchers away.
pub const DEFAULT_CLAIM_LEASE: Duration = Duration::from_secs(300);

enum Delivery {
    Skipped,
    Delivered,
    Failed(Disposition),
}

/// Dispatcher tying a queue, a transport and the retry engine together.
pub struct Network<Q, T> {
    engine: Arc<RetryEngine<Q>>,
    transport: Arc<T>,
    drain_concurrency: usize,
    claim_lease: Duration,
    // Held for a whole pass so two passes on one Network never interleave.
    // Claims in the queue keep other Networks and processes out.
    pass_lock: tokio::sync::Mutex<()>,
}

impl<Q, T> Network<Q, T>
where
    Q: RequestQueue + 'static,
    T: Transport,
{
    pub fn new(queue: Arc<Q>, transport: Arc<T>, policy: RetryPolicy) -> Self {
        Self::with_engine(RetryEngine::new(queue, policy), transport)
    }

    pub fn with_engine(engine: RetryEngine<Q>, transport: Arc<T>) -> Self {
        Self {
            engine: Arc::new(engine),
            transport,
            drain_concurrency: 1,
            claim_lease: DEFAULT_CLAIM_LEASE,
            pass_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Build an engine that reports storage faults on `faults`.
    pub fn with_fault_channel(
        queue: Arc<Q>,
        transport: Arc<T>,
        policy: RetryPolicy,
        faults: UnboundedSender<QueueFault>,
    ) -> Self {
        Self::with_engine(RetryEngine::new(queue, policy).with_fault_channel(faults), transport)
    }

    /// Attempt up to `n` distinct queued requests at once.
    pub fn drain_concurrency(mut self, n: usize) -> Self {
        self.drain_concurrency = n.max(1);
        self
    }

    /// How long a claim on a request being attempted stays valid. Must be
    /// longer than one attempt can take, or a slow attempt may be repeated
    /// by another dispatcher.
    pub fn claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn engine(&self) -> &RetryEngine<Q> {
        &self.engine
    }

    pub fn queue(&self) -> &Arc<Q> {
        self.engine.queue()
    }

    /// Send a request on behalf of a waiting caller.
    ///
    /// The returned handle yields exactly one response: the server's on
    /// success, the offline sentinel on any failure. Nothing is persisted.
    /// Must be called from within a Tokio runtime.
    pub fn make_request(&self, command: &str, data: serde_json::Value) -> ResponseHandle {
        let (resolver, handle) = channel();
        let request = Request::interactive(command, data);
        let engine = Arc::clone(&self.engine);
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let outcome = transport.send(&request).await;
            let origin = Origin::Interactive(resolver.clone());
            engine.handle(&outcome, &request, &origin).await;
            if let Ok(response) = outcome {
                if resolver.resolve(response).is_err() {
                    tracing::debug!(request_id = request.id, "response arrived after resolution");
                }
            }
        });
        handle
    }

    /// Queue a request for delivery by a later drain. Nobody waits on it.
    pub async fn persist(&self, command: &str, data: serde_json::Value) -> Result<RequestId> {
        let id = self.queue().enqueue(NewRequest::new(command, data)).await?;
        tracing::debug!(request_id = id, command, "request persisted");
        Ok(id)
    }

    /// One pass over the queue: every request pending at the start is
    /// attempted at most once, and only if this pass wins its claim.
    pub async fn flush(&self) -> Result<FlushSummary> {
        let _pass = self.pass_lock.lock().await;
        let pending = self.queue().list_pending().await?;
        let ids: HashSet<RequestId> = pending.iter().map(|r| r.id).collect();
        self.engine.retain_tracked(&ids);
        let mut summary = FlushSummary::default();

        let mut join_set = JoinSet::new();
        let mut pending = pending.into_iter();
        loop {
            while join_set.len() < self.drain_concurrency {
                let Some(request) = pending.next() else {
                    break;
                };
                let engine = Arc::clone(&self.engine);
                let transport = Arc::clone(&self.transport);
                let lease = self.claim_lease;
                join_set.spawn(async move {
                    deliver_queued(&engine, transport.as_ref(), request.id, lease).await
                });
            }

            let Some(res) = join_set.join_next().await else {
                break;
            };
            let delivery = res.map_err(|e| anyhow::anyhow!("delivery task join: {}", e))?;
            if !matches!(delivery, Delivery::Skipped) {
                summary.attempted += 1;
            }
            match delivery {
                Delivery::Skipped => summary.skipped += 1,
                Delivery::Delivered => summary.delivered += 1,
                Delivery::Failed(Disposition::Abandoned { .. }) => summary.abandoned += 1,
                Delivery::Failed(Disposition::Untracked) => summary.untracked += 1,
                Delivery::Failed(_) => summary.retrying += 1,
            }
        }

        Ok(summary)
    }

    /// Run passes until the queue is empty or `max_passes` is reached,
    /// backing off between passes that left failures behind.
    pub async fn drain(&self, max_passes: u32) -> Result<DrainSummary> {
        let mut total = DrainSummary::default();
        for pass in 1..=max_passes.max(1) {
            let flush = self.flush().await?;
            total.passes = pass;
            total.delivered += flush.delivered;
            total.abandoned += flush.abandoned;
            tracing::debug!(
                pass,
                attempted = flush.attempted,
                delivered = flush.delivered,
                retrying = flush.retrying,
                abandoned = flush.abandoned,
                "drain pass finished"
            );
            if flush.attempted == 0 {
                break;
            }
            if flush.retrying > 0 && pass < max_passes {
                tokio::time::sleep(self.engine.policy().backoff(pass)).await;
            }
        }
        total.remaining = self.queue().list_pending().await?.len();
        if total.delivered > 0 || total.abandoned > 0 {
            tracing::info!(
                delivered = total.delivered,
                abandoned = total.abandoned,
                remaining = total.remaining,
                "queue drained"
            );
        }
        Ok(total)
    }
}

async fn deliver_queued<Q: RequestQueue, T: Transport>(
    engine: &RetryEngine<Q>,
    transport: &T,
    id: RequestId,
    lease: Duration,
) -> Delivery {
    let request = match engine.queue().claim(id, lease).await {
        Ok(Some(request)) => request,
        Ok(None) => {
            tracing::debug!(request_id = id, "request claimed elsewhere or gone, skipping");
            return Delivery::Skipped;
        }
        Err(e) => {
            tracing::error!(request_id = id, "could not claim queued request: {:#}", e);
            return Delivery::Skipped;
        }
    };

    let outcome = transport.send(&request).await;
    if outcome.is_ok() {
        // Success removal belongs to the dispatcher, not the retry engine.
        if let Err(e) = engine.queue().remove(request.id).await {
            tracing::error!(
                request_id = request.id,
                "could not remove delivered request: {:#}",
                e
            );
        }
        engine.forget(request.id);
        return Delivery::Delivered;
    }
    Delivery::Failed(engine.handle(&outcome, &request, &Origin::Queued).await)
}

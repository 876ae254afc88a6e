//! The retry policy engine.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;

use super::error::TransportError;
use super::fault::{QueueFault, QueueOp};
use super::policy::RetryPolicy;
use crate::queue::{FailureRecord, RequestQueue};
use crate::request::{Origin, Request, RequestId, ResolveError, Response};

/// What the engine did with one outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Success; nothing touched.
    Passed,
    /// Queued request failed and stays queued with this count.
    Retrying { retry_count: u32 },
    /// Queued request reached the maximum and was removed.
    Abandoned { retry_count: u32 },
    /// Queued request was no longer in the queue.
    Untracked,
    /// Interactive caller received the offline sentinel.
    ResolvedOffline,
    /// Interactive caller had already been resolved elsewhere.
    AlreadyResolved,
}

/// Classifies outcomes and applies the retry/eviction policy.
///
/// Never returns an error: storage failures go to the fault channel and to
/// the log, and the decision falls back to the in-process retry count.
pub struct RetryEngine<Q> {
    queue: Arc<Q>,
    policy: RetryPolicy,
    faults: Option<UnboundedSender<QueueFault>>,
    // Last count seen per identity. Authoritative when the store can't be updated.
    shadow: Mutex<HashMap<RequestId, u32>>,
}

impl<Q: RequestQueue> RetryEngine<Q> {
    pub fn new(queue: Arc<Q>, policy: RetryPolicy) -> Self {
        Self {
            queue,
            policy,
            faults: None,
            shadow: Mutex::new(HashMap::new()),
        }
    }

    /// Report queue storage failures on `faults` in addition to the log.
    pub fn with_fault_channel(mut self, faults: UnboundedSender<QueueFault>) -> Self {
        self.faults = Some(faults);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn queue(&self) -> &Arc<Q> {
        &self.queue
    }

    /// Drop in-process bookkeeping for a request that left the queue by
    /// succeeding.
    pub fn forget(&self, id: RequestId) {
        self.shadow_lock().remove(&id);
    }

    /// Keep in-process bookkeeping only for identities still in `pending`.
    /// Requests removed behind the engine's back (another process, `clear`)
    /// are dropped here.
    pub fn retain_tracked(&self, pending: &HashSet<RequestId>) {
        self.shadow_lock().retain(|id, _| pending.contains(id));
    }

    /// Number of identities with an in-process retry count.
    pub fn tracked(&self) -> usize {
        self.shadow_lock().len()
    }

    /// Handle the outcome of one attempt.
    pub async fn handle(
        &self,
        outcome: &Result<Response, TransportError>,
        request: &Request,
        origin: &Origin,
    ) -> Disposition {
        let Err(error) = outcome else {
            return Disposition::Passed;
        };
        match origin {
            Origin::Queued => self.handle_queued_failure(request, error).await,
            Origin::Interactive(resolver) => {
                if request.is_log_command() {
                    tracing::debug!(
                        request_id = request.id,
                        error = %error,
                        "there was an error in the Log command, unable to log to server"
                    );
                } else {
                    tracing::warn!(
                        request_id = request.id,
                        command = %request.command,
                        kind = ?error.kind(),
                        error = %error,
                        "handled error when making request"
                    );
                }
                match resolver.resolve(Response::offline()) {
                    Ok(()) => Disposition::ResolvedOffline,
                    Err(ResolveError::AlreadyResolved) => {
                        tracing::debug!(request_id = request.id, "request already resolved");
                        Disposition::AlreadyResolved
                    }
                }
            }
        }
    }

    async fn handle_queued_failure(&self, request: &Request, error: &TransportError) -> Disposition {
        let max = self.policy.max_request_retries;
        let prior = self.shadow_lock().get(&request.id).copied();

        let (retry_count, evicted) = match self.queue.record_failure(request.id, max).await {
            Ok(None) => {
                self.forget(request.id);
                tracing::debug!(
                    request_id = request.id,
                    command = %request.command,
                    "failed request no longer queued"
                );
                return Disposition::Untracked;
            }
            Ok(Some(FailureRecord {
                retry_count,
                evicted,
            })) => {
                // A count kept while the store was failing wins over the store's.
                let effective = prior.map_or(retry_count, |p| retry_count.max(p + 1));
                (effective, evicted)
            }
            Err(e) => {
                self.fault(QueueOp::Increment, request.id, &e);
                let base = prior.unwrap_or(request.retry_count);
                (base.saturating_add(1), false)
            }
        };

        tracing::info!(
            request_id = request.id,
            command = %request.command,
            retry_count,
            error = %error,
            "persisted request failed"
        );

        if !self.policy.is_exhausted(retry_count) {
            self.shadow_lock().insert(request.id, retry_count);
            return Disposition::Retrying { retry_count };
        }

        tracing::info!(
            request_id = request.id,
            command = %request.command,
            retry_count,
            error = %error,
            "request failed too many times, removing from storage"
        );
        if !evicted {
            if let Err(e) = self.queue.remove(request.id).await {
                self.fault(QueueOp::Remove, request.id, &e);
            }
        }
        self.forget(request.id);
        Disposition::Abandoned { retry_count }
    }

    fn fault(&self, op: QueueOp, request_id: RequestId, error: &anyhow::Error) {
        let fault = QueueFault {
            op,
            request_id,
            message: format!("{:#}", error),
        };
        tracing::error!(request_id, op = ?op, "request queue update failed: {:#}", error);
        if let Some(tx) = &self.faults {
            let _ = tx.send(fault);
        }
    }

    fn shadow_lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, u32>> {
        self.shadow.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

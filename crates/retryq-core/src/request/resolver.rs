//! One-shot resolution slot for interactive requests.
//!
//! The caller keeps the [`ResponseHandle`]; the dispatcher and the retry
//! engine share clones of the [`Resolver`]. Whoever resolves first wins, and
//! every later attempt is rejected with [`ResolveError::AlreadyResolved`].

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::oneshot;

use super::response::Response;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("request was already resolved")]
    AlreadyResolved,
}

/// Create a connected resolver/handle pair.
pub fn channel() -> (Resolver, ResponseHandle) {
    let (tx, rx) = oneshot::channel();
    (
        Resolver {
            slot: Arc::new(Mutex::new(Some(tx))),
        },
        ResponseHandle { rx },
    )
}

/// Sending half. Cheap to clone; all clones share one slot.
#[derive(Debug, Clone)]
pub struct Resolver {
    slot: Arc<Mutex<Option<oneshot::Sender<Response>>>>,
}

impl Resolver {
    /// Deliver the response. Succeeds at most once across all clones.
    ///
    /// A caller that already dropped its handle still counts as resolved.
    pub fn resolve(&self, response: Response) -> Result<(), ResolveError> {
        let sender = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(ResolveError::AlreadyResolved)?;
        if sender.send(response).is_err() {
            tracing::debug!("caller dropped its response handle before resolution");
        }
        Ok(())
    }

    pub fn is_resolved(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Receiving half, held by the interactive caller.
#[derive(Debug)]
pub struct ResponseHandle {
    rx: oneshot::Receiver<Response>,
}

impl ResponseHandle {
    /// Wait for the single response. If every resolver is dropped without
    /// resolving, the caller gets the offline sentinel instead of hanging.
    pub async fn wait(self) -> Response {
        self.rx.await.unwrap_or_else(|_| Response::offline())
    }

    /// Non-blocking check, mainly for tests.
    pub fn try_take(&mut self) -> Option<Response> {
        self.rx.try_recv().ok()
    }
}

//! Types shared by the queue, the retry engine and the dispatcher.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, Ordering};

use super::resolver::Resolver;

/// Request identifier. Positive ids are assigned by the queue; interactive
/// requests use negative ids so they can never match a persisted row.
pub type RequestId = i64;

/// Command name of the remote logging operation. Failures of this command are
/// only traced locally so a dead logging transport cannot report about itself.
pub const LOG_COMMAND: &str = "Log";

static NEXT_INTERACTIVE_ID: AtomicI64 = AtomicI64::new(-1);

/// Allocate a process-local id for an interactive request.
pub fn next_interactive_id() -> RequestId {
    NEXT_INTERACTIVE_ID.fetch_sub(1, Ordering::Relaxed)
}

/// A network command as stored in the queue or built for an interactive call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    /// Operation name, e.g. `OpenReport`.
    pub command: String,
    /// Command parameters, sent as the request body.
    #[serde(default)]
    pub data: serde_json::Value,
    /// Failed attempts recorded so far. Never decreases while queued.
    pub retry_count: u32,
    /// Unix seconds at creation.
    pub created_at: i64,
}

impl Request {
    /// Build an interactive request that will never be persisted.
    pub fn interactive(command: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: next_interactive_id(),
            command: command.into(),
            data,
            retry_count: 0,
            created_at: crate::unix_timestamp(),
        }
    }

    pub fn is_log_command(&self) -> bool {
        self.command == LOG_COMMAND
    }
}

/// Input to [`RequestQueue::enqueue`](crate::queue::RequestQueue::enqueue).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRequest {
    pub command: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl NewRequest {
    pub fn new(command: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            command: command.into(),
            data,
        }
    }
}

/// Where a request came from, which decides how its failures are handled.
#[derive(Debug, Clone)]
pub enum Origin {
    /// Issued by a caller that is waiting on the paired
    /// [`ResponseHandle`](super::ResponseHandle).
    Interactive(Resolver),
    /// Read back from the durable queue; nobody is waiting.
    Queued,
}

impl Origin {
    pub fn is_from_queue(&self) -> bool {
        matches!(self, Origin::Queued)
    }
}

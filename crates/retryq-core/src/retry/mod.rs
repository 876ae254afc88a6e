//! Retry accounting for queued requests and offline fallback for interactive ones.
//!
//! The [`RetryEngine`] observes the outcome of every dispatched request and
//! decides whether to leave it alone, bump its retry count, drop it from the
//! queue for good, or hand an interactive caller the offline sentinel.
//! [`RetryPolicy`] carries the bound and the backoff used between drain passes.

mod engine;
mod error;
mod fault;
mod policy;

pub use engine::{Disposition, RetryEngine};
pub use error::{classify_http_status, TransportError};
pub use fault::{QueueFault, QueueOp};
pub use policy::{ErrorKind, RetryPolicy};

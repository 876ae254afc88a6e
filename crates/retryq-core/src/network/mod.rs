//! Request dispatch.
//!
//! [`Network`] sends requests through a [`Transport`] and routes every
//! outcome through the [`RetryEngine`](crate::retry::RetryEngine):
//! - interactive requests resolve their caller exactly once, with the real
//!   response or the offline sentinel;
//! - queued requests are removed on success and retried by later drain
//!   passes until the retry bound drops them. Each attempt first claims its
//!   request in the queue, so dispatchers sharing a store never overlap.

mod dispatch;
mod http;
mod transport;

#[cfg(test)]
mod tests;

pub use dispatch::{DrainSummary, FlushSummary, Network, DEFAULT_CLAIM_LEASE};
pub use http::HttpTransport;
pub use transport::Transport;

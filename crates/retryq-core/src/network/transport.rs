use std::future::Future;

use crate::request::{Request, Response};
use crate::retry::TransportError;

/// Performs one network attempt for a request. Implementations must not
/// retry on their own; every failure is reported back as an error so the
/// retry engine can account for it.
pub trait Transport: Send + Sync + 'static {
    fn send(&self, request: &Request) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

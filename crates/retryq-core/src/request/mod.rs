//! Request data model.
//!
//! A [`Request`] is the immutable description of one network command. Where it
//! came from is carried separately as an [`Origin`]: queued requests live in a
//! [`RequestQueue`](crate::queue::RequestQueue) and have no waiting caller,
//! interactive requests carry a one-shot [`Resolver`] for their single caller.

mod resolver;
mod response;
mod types;

pub use resolver::{channel, ResolveError, Resolver, ResponseHandle};
pub use response::{Response, JSON_CODE_OFFLINE, JSON_CODE_SUCCESS};
pub use types::{next_interactive_id, NewRequest, Origin, Request, RequestId, LOG_COMMAND};

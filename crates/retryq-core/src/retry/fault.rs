//! Storage faults raised while updating retry accounting.

use crate::request::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueOp {
    Increment,
    Remove,
}

/// A queue operation the engine could not complete. The retry decision was
/// still made (from the in-process count); the store may now lag behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFault {
    pub op: QueueOp,
    pub request_id: RequestId,
    pub message: String,
}

impl std::fmt::Display for QueueFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?} failed for request {}: {}",
            self.op, self.request_id, self.message
        )
    }
}

//! Transport failure type and its classification.

use super::policy::ErrorKind;

/// Why a network attempt did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connect or transfer timed out.
    #[error("request timed out")]
    Timeout,
    /// Could not reach the server (DNS, refused, reset, ...).
    #[error("connection failed: {0}")]
    Connection(String),
    /// Server answered with a non-2xx status.
    #[error("HTTP {0}")]
    Http(u16),
    /// 2xx status but the body was not usable.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TransportError::Timeout => ErrorKind::Timeout,
            TransportError::Connection(_) => ErrorKind::Connection,
            TransportError::Http(code) => classify_http_status(*code),
            TransportError::InvalidResponse(_) | TransportError::Other(_) => ErrorKind::Other,
        }
    }
}

/// Classify an HTTP status code.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code),
        _ => ErrorKind::Other,
    }
}

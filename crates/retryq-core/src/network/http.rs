//! HTTP transport over libcurl.
//!
//! Each request is POSTed as JSON to `<endpoint>/<command>`. libcurl is
//! blocking, so transfers run on the blocking pool.

use anyhow::{Context, Result};
use std::time::Duration;
use url::Url;

use super::transport::Transport;
use crate::config::RetryqConfig;
use crate::request::{Request, Response};
use crate::retry::TransportError;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    base: Url,
    timeout: Duration,
    connect_timeout: Duration,
}

impl HttpTransport {
    pub fn new(endpoint: &str, timeout: Duration, connect_timeout: Duration) -> Result<Self> {
        let base = Url::parse(endpoint).with_context(|| format!("invalid endpoint: {}", endpoint))?;
        if !matches!(base.scheme(), "http" | "https") {
            anyhow::bail!("endpoint must be http or https: {}", endpoint);
        }
        Ok(Self {
            base,
            timeout,
            connect_timeout,
        })
    }

    /// Build from config; `endpoint` overrides `cfg.endpoint` when given.
    pub fn from_config(cfg: &RetryqConfig, endpoint: Option<&str>) -> Result<Self> {
        let endpoint = endpoint
            .or(cfg.endpoint.as_deref())
            .context("no endpoint configured (set `endpoint` in config.toml or pass --endpoint)")?;
        Self::new(
            endpoint,
            Duration::from_secs(cfg.request_timeout_secs),
            Duration::from_secs(cfg.connect_timeout_secs),
        )
    }

    /// The endpoint with `command` appended as one percent-encoded path
    /// segment. A command can never change the host or climb out of the
    /// endpoint path.
    pub fn url_for(&self, command: &str) -> Result<Url, TransportError> {
        if matches!(command, "" | "." | "..") {
            return Err(TransportError::Other(format!("bad command name {:?}", command)));
        }
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Other(format!("endpoint cannot take a path: {}", self.base)))?
            .pop_if_empty()
            .push(command);
        Ok(url)
    }
}

impl Transport for HttpTransport {
    async fn send(&self, request: &Request) -> Result<Response, TransportError> {
        let url = self.url_for(&request.command)?;
        let body = serde_json::to_vec(&request.data)
            .map_err(|e| TransportError::Other(format!("encode request body: {}", e)))?;
        let (timeout, connect_timeout) = (self.timeout, self.connect_timeout);

        let (code, bytes) = tokio::task::spawn_blocking(move || {
            post_json(url.as_str(), &body, timeout, connect_timeout)
        })
        .await
        .map_err(|e| TransportError::Other(format!("transfer task join: {}", e)))?
        .map_err(|e| classify_curl_error(&e))?;

        if !(200..300).contains(&code) {
            return Err(TransportError::Http(u16::try_from(code).unwrap_or(u16::MAX)));
        }
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Response::success(serde_json::Value::Null));
        }
        let json: serde_json::Value = serde_json::from_slice(&bytes)
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(Response::from_body(json))
    }
}

/// POST `body` and return (status, response body).
/// Runs in the current thread; call from `spawn_blocking` if used from async code.
fn post_json(
    url: &str,
    body: &[u8],
    timeout: Duration,
    connect_timeout: Duration,
) -> Result<(u32, Vec<u8>), curl::Error> {
    let mut out = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.post(true)?;
    easy.post_fields_copy(body)?;
    easy.follow_location(true)?;
    easy.connect_timeout(connect_timeout)?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    list.append("Content-Type: application/json")?;
    list.append("Accept: application/json")?;
    // No 100-continue round trip for small JSON bodies.
    list.append("Expect:")?;
    easy.http_headers(list)?;

    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            out.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    Ok((code, out))
}

/// Classify a curl error for diagnostics and retry accounting.
fn classify_curl_error(e: &curl::Error) -> TransportError {
    if e.is_operation_timedout() {
        return TransportError::Timeout;
    }
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_couldnt_resolve_proxy()
        || e.is_read_error()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return TransportError::Connection(e.to_string());
    }
    TransportError::Other(e.to_string())
}

//! Minimal HTTP/1.1 JSON API server for integration tests.
//!
//! Answers each POST with the next scripted status (200 once the script is
//! used up) and records the request path and body.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

#[derive(Debug, Clone)]
pub struct Hit {
    pub path: String,
    pub body: String,
}

pub struct ApiServer {
    /// Base URL, e.g. "http://127.0.0.1:12345/api/".
    pub url: String,
    statuses: Arc<Mutex<VecDeque<u16>>>,
    hits: Arc<Mutex<Vec<Hit>>>,
}

impl ApiServer {
    pub fn hits(&self) -> Vec<Hit> {
        self.hits.lock().unwrap().clone()
    }

    pub fn script(&self, statuses: &[u16]) {
        self.statuses.lock().unwrap().extend(statuses.iter().copied());
    }
}

/// Starts a server in a background thread. The server runs until the process exits.
pub fn start() -> ApiServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let statuses = Arc::new(Mutex::new(VecDeque::new()));
    let hits = Arc::new(Mutex::new(Vec::new()));
    {
        let statuses = Arc::clone(&statuses);
        let hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let status = statuses.lock().unwrap().pop_front().unwrap_or(200);
                handle(stream, status, &hits);
            }
        });
    }
    ApiServer {
        url: format!("http://127.0.0.1:{}/api/", port),
        statuses,
        hits,
    }
}

fn handle(mut stream: std::net::TcpStream, status: u16, hits: &Mutex<Vec<Hit>>) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));

    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        let n = match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        data.extend_from_slice(&buf[..n]);
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
    };
    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|l| l.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + content_length {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    let path = head
        .lines()
        .next()
        .and_then(|l| l.split_whitespace().nth(1))
        .unwrap_or("")
        .to_string();
    let end = data.len().min(header_end + content_length);
    let body = String::from_utf8_lossy(&data[header_end..end]).to_string();
    hits.lock().unwrap().push(Hit { path, body });

    let reply = if status == 200 {
        r#"{"jsonCode":200,"ok":true}"#
    } else {
        r#"{"error":"unavailable"}"#
    };
    let response = format!(
        "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reply.len(),
        reply
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

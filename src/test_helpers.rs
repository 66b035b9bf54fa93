//! Shared test utilities for the unsplash-fill test suite.
//!
//! Provides a scripted [`MockTransport`], a virtual-time [`FakeClock`],
//! response builders, and a helper that lays out a small site on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let transport = MockTransport::with_responses(vec![
//!     Ok(json_response(200, &search_body(&[("abc", "https://images.example/abc")]))),
//! ]);
//! let mut client = test_client(&["key"], transport);
//! let photos = client.search_photos("lake", 1).unwrap();
//! assert_eq!(client.transport().requests().len(), 1);
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tempfile::TempDir;

use crate::client::{
    Clock, ClientOptions, HttpRequest, HttpResponse, ResilientClient, Transport, TransportError,
};
use crate::credentials::CredentialPool;

// =========================================================================
// Transport and clock doubles
// =========================================================================

/// Transport that replays scripted results and records every request.
/// Uses Mutex (not RefCell) so it stays Sync like the real agent.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn with_responses(responses: Vec<Result<HttpResponse, TransportError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, response: Result<HttpResponse, TransportError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }
}

impl Transport for MockTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {}", request.url))
    }
}

/// Virtual clock: `sleep` records the duration and advances time instantly.
pub struct FakeClock {
    now: Mutex<Instant>,
    sleeps: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.now.lock().unwrap() += duration;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        self.advance(duration);
    }
}

/// Client over a mock transport, keys used in the given order.
pub fn test_client(
    keys: &[&str],
    transport: MockTransport,
) -> ResilientClient<MockTransport, FakeClock> {
    let pool = CredentialPool::starting_at(keys.iter().copied(), 0).unwrap();
    ResilientClient::with_parts(pool, ClientOptions::default(), transport, FakeClock::new())
}

// =========================================================================
// Response builders
// =========================================================================

/// Response with an empty body and the given status line.
pub fn status_response(status: u16, status_text: &str) -> HttpResponse {
    HttpResponse {
        status,
        status_text: status_text.to_string(),
        headers: Vec::new(),
        body: String::new(),
    }
}

/// Response with a body (JSON or otherwise).
pub fn json_response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        status,
        status_text: String::new(),
        headers: vec![("content-type".into(), "application/json".into())],
        body: body.to_string(),
    }
}

/// Search endpoint body with one result per `(id, regular_url)`.
pub fn search_body(photos: &[(&str, &str)]) -> String {
    let results: Vec<serde_json::Value> = photos
        .iter()
        .map(|(id, url)| {
            serde_json::json!({
                "id": id,
                "urls": { "regular": url, "small": format!("{url}?w=400") },
                "links": {
                    "download_location": format!("https://api.unsplash.com/photos/{id}/download")
                }
            })
        })
        .collect();
    serde_json::json!({ "total": results.len(), "total_pages": 1, "results": results })
        .to_string()
}

/// Successful search answer followed by a successful tracking answer,
/// the pair a single hotlinked image costs.
pub fn hotlink_responses(id: &str, url: &str) -> Vec<Result<HttpResponse, TransportError>> {
    vec![
        Ok(json_response(200, &search_body(&[(id, url)]))),
        Ok(json_response(200, "{}")),
    ]
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `(relative_path, content)` files into a fresh temp directory.
pub fn site_with(files: &[(&str, &str)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for (relative, content) in files {
        write_file(tmp.path(), relative, content);
    }
    tmp
}

pub fn write_file(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

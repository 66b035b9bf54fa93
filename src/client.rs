//! Rate-limited, retrying, caching client for the Unsplash API.
//!
//! # Request pipeline
//!
//! Every outbound request (search or download tracking) goes through one
//! loop carrying `(retry_count, key_switch_count)`:
//!
//! ```text
//! pace ─▶ send ─▶ classify
//!                  ├─ quota limited ─▶ untried key left? ─ yes ─▶ rotate, send again
//!                  │                                     └ no ──▶ backoff (Retry-After or 2^n s), reset keys
//!                  ├─ 401/403 without quota signal ─▶ Auth error (never retried)
//!                  ├─ 5xx ─────────────▶ backoff 2^n s, same key (until max_retries)
//!                  ├─ reset/timeout/dns ▶ backoff 2^n s, same key (until max_retries)
//!                  └─ anything else ───▶ returned to the caller
//! ```
//!
//! "Quota limited" means HTTP 429, or a 401/403 that either carries
//! `X-Ratelimit-Remaining: 0` or whose error messages mention a rate limit
//! or quota. Unsplash answers an exhausted demo key with 403
//! `Rate Limit Exceeded`, which must not be mistaken for a bad key.
//!
//! # Pacing
//!
//! Consecutive requests are spaced at least `request_delay` apart. Waits
//! (pacing and backoff) are real sleeps through the [`Clock`] seam; there is
//! no overall timeout, `max_retries` bounds the total wait.
//!
//! # Caching
//!
//! Successful searches are cached in memory by `(query, count)` for the
//! lifetime of the client. A site with twenty "mountain" placeholders costs
//! one API call.
//!
//! # Concurrency
//!
//! The client is `&mut self` throughout and meant for one sequential caller.
//! Firing requests in parallel would only make a per-key rate limit run out
//! faster. Wrap it in a `Mutex` if it must be shared.

use crate::credentials::CredentialPool;
use log::{debug, info, warn};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::time::{Duration, Instant};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.unsplash.com";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_MAX_RETRIES: u32 = 3;

const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RETRY_AFTER_HEADER: &str = "retry-after";
const QUOTA_MESSAGE_MARKERS: &[&str] = &["rate limit", "quota", "limit exceeded"];

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Unsplash rejected the access key ({status}): {message}")]
    Auth { status: u16, message: String },
    #[error("Unsplash API quota/rate limit reached for all available keys, try again later")]
    QuotaExceeded,
    #[error("Unsplash server error after retries: {status} {message}")]
    TransientServer { status: u16, message: String },
    #[error("Network error after retries ({kind}): {message}")]
    TransientNetwork {
        kind: NetworkErrorKind,
        message: String,
    },
    #[error("Unsplash API error: {status} {message}")]
    PermanentRequest { status: u16, message: String },
    #[error("Request failed: {0}")]
    Transport(String),
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}

// ============================================================================
// Transport seam
// ============================================================================

/// A single authenticated GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    /// Full `Authorization` header value.
    pub authorization: String,
}

/// Any HTTP response, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: String,
    /// Header names are stored lowercase.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Connection-level failure categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    ConnectionReset,
    TimedOut,
    HostNotFound,
    Other,
}

impl NetworkErrorKind {
    /// Whether a failure of this kind is worth retrying.
    pub fn is_transient(self) -> bool {
        !matches!(self, NetworkErrorKind::Other)
    }

    fn from_io(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => NetworkErrorKind::ConnectionReset,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => NetworkErrorKind::TimedOut,
            _ => Self::from_message(&error.to_string()),
        }
    }

    fn from_message(message: &str) -> Self {
        let lowered = message.to_ascii_lowercase();
        if lowered.contains("timed out") || lowered.contains("timeout") {
            NetworkErrorKind::TimedOut
        } else if lowered.contains("connection reset") {
            NetworkErrorKind::ConnectionReset
        } else {
            NetworkErrorKind::Other
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NetworkErrorKind::ConnectionReset => "connection reset",
            NetworkErrorKind::TimedOut => "timed out",
            NetworkErrorKind::HostNotFound => "host not found",
            NetworkErrorKind::Other => "connection failed",
        };
        f.write_str(label)
    }
}

/// A request that produced no HTTP response at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: NetworkErrorKind,
    pub message: String,
}

/// Sends requests. Non-2xx statuses are responses, not errors.
pub trait Transport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport on a blocking `ureq` agent.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .timeout_read(Duration::from_secs(20))
            .timeout_write(Duration::from_secs(20))
            .build();
        Self { agent }
    }

    fn into_response(response: ureq::Response) -> Result<HttpResponse, TransportError> {
        let status = response.status();
        let status_text = response.status_text().to_string();
        let headers = response
            .headers_names()
            .into_iter()
            .filter_map(|name| {
                let value = response.header(&name)?.to_string();
                Some((name.to_ascii_lowercase(), value))
            })
            .collect();
        let body = response.into_string().map_err(|error| TransportError {
            kind: NetworkErrorKind::from_io(&error),
            message: format!("failed to read response: {error}"),
        })?;
        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body,
        })
    }

    fn classify_transport(transport: &ureq::Transport) -> NetworkErrorKind {
        match transport.kind() {
            ureq::ErrorKind::Dns => NetworkErrorKind::HostNotFound,
            ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Io => {
                let io_error = std::error::Error::source(transport)
                    .and_then(|source| source.downcast_ref::<io::Error>());
                match io_error {
                    Some(error) => NetworkErrorKind::from_io(error),
                    None => NetworkErrorKind::from_message(&transport.to_string()),
                }
            }
            _ => NetworkErrorKind::Other,
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let result = self
            .agent
            .get(&request.url)
            .set("Authorization", &request.authorization)
            .set("Accept-Version", "v1")
            .call();
        match result {
            Ok(response) | Err(ureq::Error::Status(_, response)) => Self::into_response(response),
            Err(ureq::Error::Transport(transport)) => Err(TransportError {
                kind: Self::classify_transport(&transport),
                message: transport.to_string(),
            }),
        }
    }
}

// ============================================================================
// Clock seam
// ============================================================================

/// Time source and sleeper for pacing and backoff.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock time and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ============================================================================
// API types
// ============================================================================

/// A photo record from a search result. Only hotlink data is kept.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Photo {
    pub id: String,
    /// Size name (`raw`, `full`, `regular`, `small`, `thumb`, ...) to URL.
    pub urls: BTreeMap<String, String>,
    pub links: PhotoLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PhotoLinks {
    pub download_location: String,
}

impl Photo {
    /// URL of the `regular` size (1080px wide), the one that gets hotlinked.
    pub fn regular_url(&self) -> Option<&str> {
        self.urls.get("regular").map(String::as_str)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    results: Vec<Photo>,
}

#[derive(Deserialize, Default)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Tunables for a [`ResilientClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    pub base_url: String,
    /// Minimum spacing between consecutive requests.
    pub request_delay: Duration,
    /// Bound on backoff rounds per request.
    pub max_retries: u32,
    /// Orientation filter sent with every search.
    pub orientation: String,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_delay: DEFAULT_REQUEST_DELAY,
            max_retries: DEFAULT_MAX_RETRIES,
            orientation: "landscape".to_string(),
        }
    }
}

/// Counters for one client's lifetime.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ClientStats {
    pub requests: u32,
    pub cache_hits: u32,
    pub rotations: u32,
    pub backoffs: u32,
}

impl fmt::Display for ClientStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} request(s), {} cache hit(s)",
            self.requests, self.cache_hits
        )?;
        if self.rotations > 0 || self.backoffs > 0 {
            write!(
                f,
                ", {} key switch(es), {} backoff wait(s)",
                self.rotations, self.backoffs
            )?;
        }
        Ok(())
    }
}

/// How a response should be handled by the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseClass {
    QuotaLimited,
    AuthFailure,
    ServerError,
    Final,
}

/// Unsplash client owning its key pool, pacing clock and search cache.
pub struct ResilientClient<T: Transport = UreqTransport, C: Clock = SystemClock> {
    pool: CredentialPool,
    transport: T,
    clock: C,
    options: ClientOptions,
    last_request: Option<Instant>,
    cache: HashMap<(String, u32), Vec<Photo>>,
    stats: ClientStats,
}

impl ResilientClient {
    /// Client with the real HTTP transport and wall clock.
    pub fn new(pool: CredentialPool, options: ClientOptions) -> Self {
        Self::with_parts(pool, options, UreqTransport::new(), SystemClock)
    }
}

impl<T: Transport, C: Clock> ResilientClient<T, C> {
    pub fn with_parts(pool: CredentialPool, options: ClientOptions, transport: T, clock: C) -> Self {
        info!("Using {} Unsplash access key(s)", pool.len());
        Self {
            pool,
            transport,
            clock,
            options,
            last_request: None,
            cache: HashMap::new(),
            stats: ClientStats::default(),
        }
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Search photos for `query`, returning at most `count` results.
    ///
    /// Served from the cache when the same `(query, count)` has succeeded
    /// before; otherwise one request through the retry pipeline.
    pub fn search_photos(&mut self, query: &str, count: u32) -> Result<Vec<Photo>, ClientError> {
        let key = (query.to_string(), count);
        if let Some(cached) = self.cache.get(&key) {
            self.stats.cache_hits += 1;
            debug!("Cache hit for \"{query}\" ({count})");
            return Ok(cached.clone());
        }

        let url = format!(
            "{}/search/photos?query={}&per_page={}&orientation={}",
            self.options.base_url.trim_end_matches('/'),
            urlencoding::encode(query),
            count,
            urlencoding::encode(&self.options.orientation),
        );
        let response = self.execute(&url)?;

        if !response.is_success() {
            let message = response_message(&response);
            return Err(if response.status >= 500 {
                ClientError::TransientServer {
                    status: response.status,
                    message,
                }
            } else {
                ClientError::PermanentRequest {
                    status: response.status,
                    message,
                }
            });
        }

        let parsed: SearchResponse = serde_json::from_str(&response.body)?;
        self.cache.insert(key, parsed.results.clone());
        Ok(parsed.results)
    }

    /// Tell Unsplash a photo was used, as its API guidelines require.
    ///
    /// Best effort: failures are logged and swallowed.
    pub fn track_download(&mut self, download_location: &str) {
        match self.execute(download_location) {
            Ok(response) if !response.is_success() => debug!(
                "Download tracking returned {} for {download_location}",
                response.status
            ),
            Ok(_) => {}
            Err(error) => warn!("Failed to track download: {error}"),
        }
    }

    /// Drop every cached search result.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Number of cached `(query, count)` entries.
    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    /// Run one request through pacing, key rotation and backoff.
    fn execute(&mut self, url: &str) -> Result<HttpResponse, ClientError> {
        let max_retries = self.options.max_retries;
        let mut retry_count: u32 = 0;
        let mut key_switch_count: usize = 0;

        loop {
            self.pace();
            let request = HttpRequest {
                url: url.to_string(),
                authorization: format!("Client-ID {}", self.pool.current().as_str()),
            };
            self.stats.requests += 1;

            let response = match self.transport.get(&request) {
                Ok(response) => response,
                Err(error) if error.kind.is_transient() => {
                    if retry_count >= max_retries {
                        return Err(ClientError::TransientNetwork {
                            kind: error.kind,
                            message: error.message,
                        });
                    }
                    let wait = backoff_delay(retry_count);
                    info!(
                        "Network error ({}). Retrying in {}s ({}/{max_retries})...",
                        error.kind,
                        wait.as_secs(),
                        retry_count + 1
                    );
                    self.wait(wait);
                    retry_count += 1;
                    continue;
                }
                Err(error) => return Err(ClientError::Transport(error.to_string())),
            };

            match classify(&response) {
                ResponseClass::QuotaLimited => {
                    if key_switch_count + 1 < self.pool.len() {
                        self.pool.rotate("quota/rate limit");
                        self.stats.rotations += 1;
                        key_switch_count += 1;
                        continue;
                    }
                    if retry_count >= max_retries {
                        return Err(ClientError::QuotaExceeded);
                    }
                    let wait = retry_after(&response).unwrap_or_else(|| backoff_delay(retry_count));
                    info!(
                        "All keys limited. Waiting {}s before retry {}/{max_retries}...",
                        wait.as_secs(),
                        retry_count + 1
                    );
                    self.wait(wait);
                    retry_count += 1;
                    key_switch_count = 0;
                }
                ResponseClass::AuthFailure => {
                    return Err(ClientError::Auth {
                        status: response.status,
                        message: response_message(&response),
                    });
                }
                ResponseClass::ServerError if retry_count < max_retries => {
                    let wait = backoff_delay(retry_count);
                    info!(
                        "Server error {}. Retrying in {}s...",
                        response.status,
                        wait.as_secs()
                    );
                    self.wait(wait);
                    retry_count += 1;
                }
                ResponseClass::ServerError | ResponseClass::Final => return Ok(response),
            }
        }
    }

    /// Sleep until `request_delay` has passed since the previous request.
    fn pace(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = self.clock.now().saturating_duration_since(last);
            if elapsed < self.options.request_delay {
                self.clock.sleep(self.options.request_delay - elapsed);
            }
        }
        self.last_request = Some(self.clock.now());
    }

    fn wait(&mut self, duration: Duration) {
        self.stats.backoffs += 1;
        self.clock.sleep(duration);
    }
}

/// Exponential backoff: 2s, 4s, 8s, ...
fn backoff_delay(retry_count: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(retry_count.saturating_add(1)))
}

/// `Retry-After` in whole seconds, if present and numeric.
fn retry_after(response: &HttpResponse) -> Option<Duration> {
    response
        .header(RETRY_AFTER_HEADER)?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn classify(response: &HttpResponse) -> ResponseClass {
    match response.status {
        429 => ResponseClass::QuotaLimited,
        401 | 403 if is_quota_signal(response) => ResponseClass::QuotaLimited,
        401 | 403 => ResponseClass::AuthFailure,
        500.. => ResponseClass::ServerError,
        _ => ResponseClass::Final,
    }
}

fn is_quota_signal(response: &HttpResponse) -> bool {
    if response.header(RATE_LIMIT_REMAINING_HEADER).map(str::trim) == Some("0") {
        return true;
    }
    let messages = error_messages(&response.body).join(" ").to_lowercase();
    QUOTA_MESSAGE_MARKERS
        .iter()
        .any(|marker| messages.contains(marker))
}

/// `error` and `errors[]` from an Unsplash error body; plain-text bodies
/// (Unsplash sends `Rate Limit Exceeded` as text) count as one message.
fn error_messages(body: &str) -> Vec<String> {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) => payload.error.into_iter().chain(payload.errors).collect(),
        Err(_) if !body.trim().is_empty() && !body.trim_start().starts_with('{') => {
            vec![body.trim().to_string()]
        }
        Err(_) => Vec::new(),
    }
}

fn response_message(response: &HttpResponse) -> String {
    let messages = error_messages(&response.body);
    if messages.is_empty() {
        response.status_text.clone()
    } else {
        messages.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{
        FakeClock, MockTransport, json_response, search_body, status_response,
    };

    fn pool(keys: &[&str]) -> CredentialPool {
        CredentialPool::starting_at(keys.iter().copied(), 0).unwrap()
    }

    fn client(
        keys: &[&str],
        transport: MockTransport,
    ) -> ResilientClient<MockTransport, FakeClock> {
        ResilientClient::with_parts(
            pool(keys),
            ClientOptions::default(),
            transport,
            FakeClock::new(),
        )
    }

    fn quota_403() -> HttpResponse {
        let mut response = status_response(403, "Rate Limit Exceeded");
        response.headers.push(("x-ratelimit-remaining".into(), "0".into()));
        response
    }

    // =========================================================================
    // Classification
    // =========================================================================

    #[test]
    fn classify_429_is_quota() {
        assert_eq!(classify(&status_response(429, "")), ResponseClass::QuotaLimited);
    }

    #[test]
    fn classify_403_with_zero_remaining_is_quota() {
        assert_eq!(classify(&quota_403()), ResponseClass::QuotaLimited);
    }

    #[test]
    fn classify_403_with_quota_message_is_quota() {
        let response = json_response(403, r#"{"errors":["Rate Limit Exceeded"]}"#);
        assert_eq!(classify(&response), ResponseClass::QuotaLimited);
        let response = json_response(401, r#"{"error":"Monthly QUOTA used up"}"#);
        assert_eq!(classify(&response), ResponseClass::QuotaLimited);
    }

    #[test]
    fn classify_plain_text_rate_limit_body_is_quota() {
        let response = json_response(403, "Rate Limit Exceeded");
        assert_eq!(classify(&response), ResponseClass::QuotaLimited);
    }

    #[test]
    fn classify_401_without_signal_is_auth() {
        let response = json_response(401, r#"{"errors":["OAuth error: The access token is invalid"]}"#);
        assert_eq!(classify(&response), ResponseClass::AuthFailure);
        let mut response = status_response(403, "Forbidden");
        response.headers.push(("X-Ratelimit-Remaining".into(), "12".into()));
        assert_eq!(classify(&response), ResponseClass::AuthFailure);
    }

    #[test]
    fn classify_server_and_other() {
        assert_eq!(classify(&status_response(503, "")), ResponseClass::ServerError);
        assert_eq!(classify(&status_response(404, "")), ResponseClass::Final);
        assert_eq!(classify(&json_response(200, "{}")), ResponseClass::Final);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let mut response = status_response(200, "OK");
        response.headers.push(("Retry-After".into(), "7".into()));
        assert_eq!(response.header("retry-after"), Some("7"));
        assert_eq!(retry_after(&response), Some(Duration::from_secs(7)));
    }

    #[test]
    fn backoff_schedule() {
        assert_eq!(backoff_delay(0), Duration::from_secs(2));
        assert_eq!(backoff_delay(1), Duration::from_secs(4));
        assert_eq!(backoff_delay(2), Duration::from_secs(8));
    }

    // =========================================================================
    // search_photos
    // =========================================================================

    #[test]
    fn search_parses_results_and_sends_credential() {
        let transport = MockTransport::with_responses(vec![Ok(json_response(
            200,
            &search_body(&[("abc", "https://images.example/abc")]),
        ))]);
        let mut client = client(&["key-one"], transport);

        let photos = client.search_photos("mountain lake", 1).unwrap();
        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].id, "abc");
        assert_eq!(photos[0].regular_url(), Some("https://images.example/abc"));
        assert_eq!(
            photos[0].links.download_location,
            "https://api.unsplash.com/photos/abc/download"
        );

        let requests = client.transport().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].authorization, "Client-ID key-one");
        assert_eq!(
            requests[0].url,
            "https://api.unsplash.com/search/photos?query=mountain%20lake&per_page=1&orientation=landscape"
        );
    }

    #[test]
    fn identical_searches_hit_network_once() {
        let transport = MockTransport::with_responses(vec![Ok(json_response(
            200,
            &search_body(&[("abc", "https://images.example/abc")]),
        ))]);
        let mut client = client(&["k"], transport);

        let first = client.search_photos("forest", 1).unwrap();
        let second = client.search_photos("forest", 1).unwrap();
        assert_eq!(first, second);
        assert_eq!(client.transport().requests().len(), 1);
        assert_eq!(client.stats().cache_hits, 1);
    }

    #[test]
    fn cache_key_includes_count() {
        let body = search_body(&[("abc", "https://images.example/abc")]);
        let transport = MockTransport::with_responses(vec![
            Ok(json_response(200, &body)),
            Ok(json_response(200, &body)),
        ]);
        let mut client = client(&["k"], transport);
        client.search_photos("forest", 1).unwrap();
        client.search_photos("forest", 3).unwrap();
        assert_eq!(client.transport().requests().len(), 2);
        assert_eq!(client.cached_queries(), 2);
    }

    #[test]
    fn clear_cache_forces_new_request() {
        let body = search_body(&[("abc", "https://images.example/abc")]);
        let transport = MockTransport::with_responses(vec![
            Ok(json_response(200, &body)),
            Ok(json_response(200, &body)),
        ]);
        let mut client = client(&["k"], transport);
        client.search_photos("forest", 1).unwrap();
        client.clear_cache();
        assert_eq!(client.cached_queries(), 0);
        client.search_photos("forest", 1).unwrap();
        assert_eq!(client.transport().requests().len(), 2);
    }

    #[test]
    fn failed_search_is_not_cached() {
        let transport = MockTransport::with_responses(vec![
            Ok(status_response(404, "Not Found")),
            Ok(json_response(200, &search_body(&[]))),
        ]);
        let mut client = client(&["k"], transport);
        let err = client.search_photos("forest", 1).unwrap_err();
        assert!(matches!(err, ClientError::PermanentRequest { status: 404, .. }));
        assert!(client.search_photos("forest", 1).unwrap().is_empty());
        assert_eq!(client.transport().requests().len(), 2);
    }

    #[test]
    fn malformed_body_is_decode_error() {
        let transport = MockTransport::with_responses(vec![Ok(json_response(200, "{\"oops\":1}"))]);
        let mut client = client(&["k"], transport);
        assert!(matches!(
            client.search_photos("x", 1),
            Err(ClientError::Decode(_))
        ));
    }

    // =========================================================================
    // Pacing
    // =========================================================================

    #[test]
    fn consecutive_requests_are_paced() {
        let body = search_body(&[]);
        let transport = MockTransport::with_responses(vec![
            Ok(json_response(200, &body)),
            Ok(json_response(200, &body)),
        ]);
        let mut client = client(&["k"], transport);
        client.search_photos("a", 1).unwrap();
        client.search_photos("b", 1).unwrap();
        // First request goes straight out; the second waits the full delay
        // because the fake clock does not advance on its own
        assert_eq!(client.clock().sleeps(), vec![DEFAULT_REQUEST_DELAY]);
        assert_eq!(client.stats().backoffs, 0);
    }

    #[test]
    fn no_pacing_wait_when_enough_time_passed() {
        let body = search_body(&[]);
        let transport = MockTransport::with_responses(vec![
            Ok(json_response(200, &body)),
            Ok(json_response(200, &body)),
        ]);
        let mut client = client(&["k"], transport);
        client.search_photos("a", 1).unwrap();
        client.clock().advance(Duration::from_secs(1));
        client.search_photos("b", 1).unwrap();
        assert!(client.clock().sleeps().is_empty());
    }

    // =========================================================================
    // Quota handling and rotation
    // =========================================================================

    #[test]
    fn every_key_is_tried_before_backoff() {
        let transport = MockTransport::with_responses(vec![
            Ok(quota_403()),
            Ok(status_response(429, "Too Many Requests")),
            Ok(quota_403()),
            Ok(json_response(200, &search_body(&[]))),
        ]);
        let mut client = client(&["a", "b", "c"], transport);
        client.search_photos("q", 1).unwrap();

        let keys: Vec<String> = client
            .transport()
            .requests()
            .iter()
            .map(|r| r.authorization.clone())
            .collect();
        assert_eq!(
            keys,
            vec!["Client-ID a", "Client-ID b", "Client-ID c", "Client-ID c"]
        );
        assert_eq!(client.stats().rotations, 2);
        assert_eq!(client.stats().backoffs, 1);
        // Pacing waits between the first three sends, then one 2s backoff
        let sleeps = client.clock().sleeps();
        assert!(sleeps.contains(&Duration::from_secs(2)));
        let backoff_at = sleeps.iter().position(|d| *d == Duration::from_secs(2)).unwrap();
        assert_eq!(backoff_at, 2);
    }

    #[test]
    fn single_key_goes_straight_to_backoff() {
        let transport = MockTransport::with_responses(vec![
            Ok(status_response(429, "Too Many Requests")),
            Ok(json_response(200, &search_body(&[]))),
        ]);
        let mut client = client(&["only"], transport);
        client.search_photos("q", 1).unwrap();
        assert_eq!(client.stats().rotations, 0);
        assert_eq!(client.stats().backoffs, 1);
        assert_eq!(client.clock().sleeps()[0], Duration::from_secs(2));
    }

    #[test]
    fn retry_after_header_overrides_backoff() {
        let mut limited = status_response(429, "Too Many Requests");
        limited.headers.push(("retry-after".into(), "30".into()));
        let transport = MockTransport::with_responses(vec![
            Ok(limited),
            Ok(json_response(200, &search_body(&[]))),
        ]);
        let mut client = client(&["only"], transport);
        client.search_photos("q", 1).unwrap();
        assert_eq!(client.clock().sleeps()[0], Duration::from_secs(30));
    }

    #[test]
    fn quota_exhausted_after_max_retries() {
        // 2 keys, 3 retries: (1 + 1 rotation) sends per round, 4 rounds
        let responses = (0..8).map(|_| Ok(status_response(429, "Too Many Requests"))).collect();
        let mut client = client(&["a", "b"], MockTransport::with_responses(responses));
        let err = client.search_photos("q", 1).unwrap_err();
        assert!(matches!(err, ClientError::QuotaExceeded));
        assert_eq!(client.transport().requests().len(), 8);
        assert_eq!(client.stats().backoffs, 3);
        assert_eq!(client.stats().rotations, 4);
        let backoffs: Vec<Duration> = client
            .clock()
            .sleeps()
            .into_iter()
            .filter(|d| *d >= Duration::from_secs(1))
            .collect();
        assert_eq!(
            backoffs,
            vec![
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(8)
            ]
        );
    }

    #[test]
    fn auth_error_is_never_retried_or_rotated() {
        let transport = MockTransport::with_responses(vec![Ok(json_response(
            401,
            r#"{"errors":["OAuth error: The access token is invalid"]}"#,
        ))]);
        let mut client = client(&["a", "b", "c"], transport);
        let err = client.search_photos("q", 1).unwrap_err();
        match err {
            ClientError::Auth { status, message } => {
                assert_eq!(status, 401);
                assert!(message.contains("access token is invalid"));
            }
            other => panic!("expected auth error, got {other:?}"),
        }
        assert_eq!(client.transport().requests().len(), 1);
        assert_eq!(client.stats().rotations, 0);
        assert_eq!(client.pool().position(), 0);
    }

    // =========================================================================
    // Server and network errors
    // =========================================================================

    #[test]
    fn server_error_retries_with_same_key() {
        let transport = MockTransport::with_responses(vec![
            Ok(status_response(502, "Bad Gateway")),
            Ok(status_response(503, "Service Unavailable")),
            Ok(json_response(200, &search_body(&[("p", "https://images.example/p")]))),
        ]);
        let mut client = client(&["a", "b"], transport);
        let photos = client.search_photos("q", 1).unwrap();
        assert_eq!(photos.len(), 1);
        assert!(
            client
                .transport()
                .requests()
                .iter()
                .all(|r| r.authorization == "Client-ID a")
        );
        assert_eq!(client.stats().backoffs, 2);
    }

    #[test]
    fn server_error_surfaces_after_exhaustion() {
        let responses = (0..4).map(|_| Ok(status_response(500, "Internal Server Error"))).collect();
        let mut client = client(&["a"], MockTransport::with_responses(responses));
        let err = client.search_photos("q", 1).unwrap_err();
        assert!(matches!(err, ClientError::TransientServer { status: 500, .. }));
        assert_eq!(client.transport().requests().len(), 4);
    }

    #[test]
    fn transient_network_error_is_retried() {
        let transport = MockTransport::with_responses(vec![
            Err(TransportError {
                kind: NetworkErrorKind::ConnectionReset,
                message: "connection reset by peer".into(),
            }),
            Ok(json_response(200, &search_body(&[]))),
        ]);
        let mut client = client(&["a"], transport);
        assert!(client.search_photos("q", 1).unwrap().is_empty());
        assert_eq!(client.transport().requests().len(), 2);
    }

    #[test]
    fn transient_network_error_surfaces_after_exhaustion() {
        let responses = (0..4)
            .map(|_| {
                Err(TransportError {
                    kind: NetworkErrorKind::HostNotFound,
                    message: "dns lookup failed".into(),
                })
            })
            .collect();
        let mut client = client(&["a"], MockTransport::with_responses(responses));
        let err = client.search_photos("q", 1).unwrap_err();
        assert!(matches!(
            err,
            ClientError::TransientNetwork {
                kind: NetworkErrorKind::HostNotFound,
                ..
            }
        ));
    }

    #[test]
    fn other_network_error_is_not_retried() {
        let transport = MockTransport::with_responses(vec![Err(TransportError {
            kind: NetworkErrorKind::Other,
            message: "invalid certificate".into(),
        })]);
        let mut client = client(&["a"], transport);
        assert!(matches!(
            client.search_photos("q", 1),
            Err(ClientError::Transport(_))
        ));
        assert_eq!(client.transport().requests().len(), 1);
    }

    // =========================================================================
    // track_download
    // =========================================================================

    #[test]
    fn track_download_uses_given_uri() {
        let transport = MockTransport::with_responses(vec![Ok(json_response(200, "{}"))]);
        let mut client = client(&["a"], transport);
        client.track_download("https://api.unsplash.com/photos/abc/download");
        assert_eq!(
            client.transport().requests()[0].url,
            "https://api.unsplash.com/photos/abc/download"
        );
    }

    #[test]
    fn track_download_swallows_errors() {
        let transport = MockTransport::with_responses(vec![Ok(json_response(
            401,
            r#"{"errors":["invalid"]}"#,
        ))]);
        let mut client = client(&["a"], transport);
        client.track_download("https://api.unsplash.com/photos/abc/download");
        assert_eq!(client.transport().requests().len(), 1);
    }

    // =========================================================================
    // Stats display
    // =========================================================================

    #[test]
    fn stats_display() {
        let mut stats = ClientStats {
            requests: 4,
            cache_hits: 2,
            ..Default::default()
        };
        assert_eq!(stats.to_string(), "4 request(s), 2 cache hit(s)");
        stats.rotations = 1;
        stats.backoffs = 2;
        assert_eq!(
            stats.to_string(),
            "4 request(s), 2 cache hit(s), 1 key switch(es), 2 backoff wait(s)"
        );
    }
}

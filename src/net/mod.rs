//! Network utilities for HTTP requests, decoding, and content parsing.
//!
//! This module provides the networking infrastructure for Torrex, including:
//!
//! - **Fetch Configuration**: Proxy, user agent, headers and [`TimeoutPolicy`]
//! - **Sessions**: One HTTP client per logical operation, torn down with it
//! - **Failure Classification**: [`FetchError`] separates timeouts, client
//!   errors and unknown failures, and marks which ones are retryable
//! - **Content Parsing**: HTML helpers and the encoding resolver
//!
//! A fetch never retries on its own. Retry policy belongs to the caller.
//!
//! # Examples
//!
//! ```rust,no_run
//! use torrex::net::{FetchConfig, HttpClient, TimeoutPolicy};
//!
//! # async fn example() -> torrex::Result<()> {
//! let client = HttpClient::new("bitsearch", FetchConfig::default())
//!     .with_header("Referer", "https://bitsearch.to/");
//!
//! let session = client.session()?;
//! let page = session
//!     .get_text("https://bitsearch.to/search?q=ubuntu", TimeoutPolicy::default(), None)
//!     .await?;
//! println!("{} chars, lossy: {}", page.text.len(), page.lossy);
//! # Ok(())
//! # }
//! ```

use bytes::Bytes;
use encoding_rs::Encoding;
use figment::{
    Figment,
    providers::{Env, Serialized},
};
use parking_lot::Mutex;
use reqwest::{
    Client, Proxy,
    header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

pub mod encoding;
pub mod html;

use encoding::{Decoded, EncodingResolver};

/// Browser user agent sent by default; several sites reject library agents.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Independent bounds for one request: whole request, connection
/// establishment, and socket-read stalls.
///
/// Connect and read bounds are fixed when a [`Session`] is built. The total
/// bound is applied per request, so a session can mix list fetches and shorter
/// detail fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutPolicy {
    pub total_ms: u64,
    pub connect_ms: u64,
    pub read_ms: u64,
}

impl TimeoutPolicy {
    pub const fn from_secs(total: u64, connect: u64, read: u64) -> Self {
        Self {
            total_ms: total * 1000,
            connect_ms: connect * 1000,
            read_ms: read * 1000,
        }
    }

    /// Policy for per-item detail fetches: 10s overall so a fan-out stays bounded.
    pub const fn detail() -> Self {
        Self::from_secs(10, 10, 10)
    }

    pub fn total(&self) -> Duration {
        Duration::from_millis(self.total_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn read(&self) -> Duration {
        Duration::from_millis(self.read_ms)
    }
}

impl Default for TimeoutPolicy {
    /// Total 30s, connect 10s, read 20s.
    fn default() -> Self {
        Self::from_secs(30, 10, 20)
    }
}

/// Transport settings shared by every request an adapter makes.
///
/// Build it explicitly, or load it with [`FetchConfig::from_env`]. Adapters
/// never look at the process environment themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Optional forward proxy applied to every scheme.
    pub proxy: Option<String>,
    pub user_agent: String,
    /// Extra headers, kept sorted so requests are reproducible.
    pub headers: BTreeMap<String, String>,
    pub timeouts: TimeoutPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        );
        headers.insert("Accept-Language".to_string(), "en-US,en;q=0.9".to_string());

        Self {
            proxy: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            headers,
            timeouts: TimeoutPolicy::default(),
        }
    }
}

impl FetchConfig {
    /// Loads the configuration from defaults and the process environment.
    ///
    /// Layers, later ones winning:
    /// 1. [`FetchConfig::default`]
    /// 2. `TORREX_*` variables, nested with `__`
    ///    (e.g. `TORREX_TIMEOUTS__TOTAL_MS=15000`, `TORREX_USER_AGENT=...`)
    /// 3. `HTTP_PROXY`, mapped onto [`proxy`](FetchConfig::proxy)
    ///
    /// A blank proxy value means no proxy. Without a configured proxy,
    /// sessions connect directly and ignore the proxy variables reqwest
    /// would otherwise read on its own.
    ///
    /// # Errors
    ///
    /// [`Error::Config`](crate::Error::Config) when a variable has the wrong type.
    pub fn from_env() -> crate::Result<Self> {
        let mut config: Self = Self::figment().extract()?;
        config.proxy = config.proxy.filter(|proxy| !proxy.trim().is_empty());
        Ok(config)
    }

    /// The figment behind [`from_env`](FetchConfig::from_env), for callers
    /// that want to merge their own providers on top.
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(FetchConfig::default()))
            .merge(Env::prefixed("TORREX_").split("__"))
            .merge(Env::raw().only(&["HTTP_PROXY"]).map(|_| "proxy".into()))
    }
}

/// Classified failure of a single fetch.
///
/// Every variant keeps the URL so log lines and errors can be traced back to
/// the request that produced them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The total, connect or read bound elapsed.
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Connection, request or HTTP status failure. `status` is `None` when no
    /// response was received.
    #[error("client error fetching {url}: {reason}")]
    Client {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("unknown error fetching {url}: {reason}")]
    Unknown { url: String, reason: String },
}

impl FetchError {
    /// Maps a reqwest error onto the three failure classes.
    pub fn classify(url: &str, err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else if err.is_connect() || err.is_request() || err.is_redirect() || err.is_status() {
            FetchError::Client {
                url: url.to_string(),
                status: err.status().map(|s| s.as_u16()),
                reason: err.to_string(),
            }
        } else {
            FetchError::Unknown {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchError::Timeout { url }
            | FetchError::Client { url, .. }
            | FetchError::Unknown { url, .. } => url,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, FetchError::Timeout { .. })
    }

    /// Timeouts, connection failures, 429 and 5xx responses are worth
    /// retrying; other statuses and unknown failures are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } => true,
            FetchError::Client { status: None, .. } => true,
            FetchError::Client {
                status: Some(code), ..
            } => *code == 429 || (500..600).contains(code),
            FetchError::Unknown { .. } => false,
        }
    }
}

/// Fixed minimum delay between consecutive requests of one session.
///
/// Used by diagnostic callers that issue several sequential requests. A zero
/// delay never sleeps.
#[derive(Debug)]
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            last_request: Mutex::new(None),
            delay,
        }
    }

    /// Waits if less than the configured delay has passed since the last
    /// request, then records this request.
    pub async fn wait(&self) {
        if self.delay.is_zero() {
            return;
        }

        let wait_duration = {
            let last = self.last_request.lock();
            (*last).and_then(|at| self.delay.checked_sub(at.elapsed()))
        };

        if let Some(duration) = wait_duration {
            tokio::time::sleep(duration).await;
        }

        *self.last_request.lock() = Some(Instant::now());
    }
}

/// A successful response body with the metadata needed to decode it.
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status: u16,
    /// `charset` parameter of the `Content-Type` header, if any.
    pub charset: Option<String>,
    pub body: Bytes,
}

/// Per-source HTTP settings that produce call-scoped [`Session`]s.
///
/// `HttpClient` holds no connection pool of its own. Each logical operation
/// calls [`session`](HttpClient::session), uses the session for its list and
/// detail fetches, and drops it when done, so concurrent queries never share
/// transport state.
#[derive(Clone, Debug)]
pub struct HttpClient {
    source_id: String,
    config: FetchConfig,
    headers: HeaderMap,
    request_delay: Duration,
}

impl HttpClient {
    pub fn new(source_id: impl Into<String>, config: FetchConfig) -> Self {
        let mut client = Self {
            source_id: source_id.into(),
            config: config.clone(),
            headers: HeaderMap::new(),
            request_delay: Duration::ZERO,
        };
        for (name, value) in &config.headers {
            client = client.with_header(name, value);
        }
        client
    }

    /// Adds a header to all requests made by sessions of this client.
    ///
    /// Invalid header names or values are ignored.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (name.parse::<HeaderName>(), value.parse::<HeaderValue>()) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Sets a fixed delay between consecutive requests of one session.
    pub fn with_request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    /// Builds a fresh session for one logical operation.
    ///
    /// # Errors
    ///
    /// [`Error::Network`](crate::Error::Network) if the proxy URL is invalid or
    /// the client cannot be built.
    pub fn session(&self) -> crate::Result<Session> {
        let timeouts = self.config.timeouts;
        let mut builder = Client::builder()
            .user_agent(self.config.user_agent.clone())
            .default_headers(self.headers.clone())
            .timeout(timeouts.total())
            .connect_timeout(timeouts.connect())
            .read_timeout(timeouts.read())
            .gzip(true)
            .brotli(true);

        builder = match &self.config.proxy {
            Some(proxy) => builder.proxy(Proxy::all(proxy.as_str())?),
            None => builder.no_proxy(),
        };

        Ok(Session {
            source_id: self.source_id.clone(),
            client: builder.build()?,
            rate_limiter: RateLimiter::new(self.request_delay),
            default_timeouts: timeouts,
        })
    }
}

/// One HTTP client context, alive for the duration of one adapter call.
#[derive(Debug)]
pub struct Session {
    source_id: String,
    client: Client,
    rate_limiter: RateLimiter,
    default_timeouts: TimeoutPolicy,
}

impl Session {
    pub fn default_timeouts(&self) -> TimeoutPolicy {
        self.default_timeouts
    }

    /// Performs one GET request and returns the raw body.
    ///
    /// Non-success statuses are reported as [`FetchError::Client`]. Every
    /// attempt is logged with its outcome and byte count.
    pub async fn get(&self, url: &str, policy: TimeoutPolicy) -> Result<Fetched, FetchError> {
        self.rate_limiter.wait().await;
        debug!(source = %self.source_id, url = %url, "Fetching");

        let response = match self.client.get(url).timeout(policy.total()).send().await {
            Ok(response) => response,
            Err(e) => {
                let err = FetchError::classify(url, &e);
                warn!(source = %self.source_id, url = %url, error = %err, "Fetch failed");
                return Err(err);
            }
        };

        let status = response.status();
        let charset = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_param);

        if !status.is_success() {
            warn!(
                source = %self.source_id,
                url = %url,
                status = status.as_u16(),
                bytes = 0,
                "Fetch returned error status"
            );
            return Err(FetchError::Client {
                url: url.to_string(),
                status: Some(status.as_u16()),
                reason: format!("HTTP {}", status),
            });
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let err = FetchError::classify(url, &e);
                warn!(source = %self.source_id, url = %url, error = %err, "Reading body failed");
                return Err(err);
            }
        };

        debug!(
            source = %self.source_id,
            url = %url,
            status = status.as_u16(),
            bytes = body.len(),
            "Fetched"
        );

        Ok(Fetched {
            url: url.to_string(),
            status: status.as_u16(),
            charset,
            body,
        })
    }

    /// Performs a GET request and decodes the body to text.
    ///
    /// `encoding` is a site override tried before anything the response
    /// declares. Decoding itself never fails; see [`EncodingResolver::decode`].
    pub async fn get_text(
        &self,
        url: &str,
        policy: TimeoutPolicy,
        encoding: Option<&'static Encoding>,
    ) -> Result<Decoded, FetchError> {
        let fetched = self.get(url, policy).await?;
        let declared = encoding.or_else(|| {
            fetched
                .charset
                .as_deref()
                .and_then(|label| Encoding::for_label(label.as_bytes()))
        });

        let decoded = EncodingResolver::default().decode(&fetched.body, declared);
        if decoded.lossy {
            warn!(
                source = %self.source_id,
                url = %url,
                bytes = fetched.body.len(),
                "No candidate encoding fit, decoded with replacement characters"
            );
        }
        Ok(decoded)
    }
}

fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}

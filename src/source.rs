//! Source trait and collection for managing torrent index sites.
//!
//! This module defines the core [`Source`] trait that every site adapter
//! implements, the [`SourceConfig`] each adapter is constructed with, and the
//! [`Sources`] registry that looks adapters up by id, resolves per-call limits
//! and classifies outcomes for consumers.
//!
//! # Examples
//!
//! ```rust,no_run
//! use torrex::prelude::*;
//!
//! # async fn example() -> torrex::Result<()> {
//! let sources = Sources::with_all(FetchConfig::from_env()?);
//!
//! // One site, consumer-facing classification
//! match sources.search("ubuntu").limit(10).from_source("BitSearch").await {
//!     Ok(envelope) => println!("{} results", envelope.total),
//!     Err(failure) => println!("{} ({})", failure, failure.status_code()),
//! }
//!
//! // Direct adapter access
//! if let Some(source) = sources.get("torlock") {
//!     let trending = source.trending(QueryParams::default().with_category("movies")).await?;
//!     println!("{} trending", trending.total);
//! }
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use derive_builder::Builder;
use encoding_rs::Encoding;
use futures::future;
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

use crate::{
    enrich::{DEFAULT_CONCURRENCY, DetailEnricher},
    error::{Error, Result},
    net::{FetchConfig, HttpClient, TimeoutPolicy},
    search::{SearchBuilder, SearchFailure},
    types::{QueryParams, ResultEnvelope},
};

/// Construction-time settings of one adapter.
///
/// Everything that varies per call (query, page, limit, category) travels in
/// [`QueryParams`] instead, so an adapter holds no mutable state.
///
/// # Builder Usage
///
/// ```rust
/// use std::time::Duration;
/// use torrex::source::SourceConfigBuilder;
///
/// let config = SourceConfigBuilder::default()
///     .base_url("http://127.0.0.1:8080")
///     .default_limit(20usize)
///     .deadline(Some(Duration::from_secs(45)))
///     .build()
///     .unwrap();
/// assert_eq!(config.detail_concurrency, 8);
/// ```
#[derive(Debug, Clone, Builder)]
#[builder(setter(into))]
pub struct SourceConfig {
    /// Root URL without a trailing slash
    pub base_url: String,

    /// Result ceiling used when a call leaves the limit unset
    pub default_limit: usize,

    #[builder(default)]
    pub fetch: FetchConfig,

    /// Encoding forced for list pages instead of the declared charset
    #[builder(default)]
    pub encoding: Option<&'static Encoding>,

    /// Encoding forced for detail pages
    #[builder(default)]
    pub detail_encoding: Option<&'static Encoding>,

    /// Maximum detail pages fetched at once
    #[builder(default = "DEFAULT_CONCURRENCY")]
    pub detail_concurrency: usize,

    #[builder(default = "TimeoutPolicy::detail()")]
    pub detail_timeouts: TimeoutPolicy,

    /// Bound on a whole call, list fetch and enrichment included
    #[builder(default)]
    pub deadline: Option<Duration>,

    /// Fixed delay between sequential requests of one call
    #[builder(default)]
    pub request_delay: Duration,
}

impl SourceConfig {
    pub fn new(base_url: impl Into<String>, default_limit: usize) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_limit,
            fetch: FetchConfig::default(),
            encoding: None,
            detail_encoding: None,
            detail_concurrency: DEFAULT_CONCURRENCY,
            detail_timeouts: TimeoutPolicy::detail(),
            deadline: None,
            request_delay: Duration::ZERO,
        }
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// The HTTP client settings an adapter with id `source_id` uses.
    pub fn http_client(&self, source_id: &str) -> HttpClient {
        HttpClient::new(source_id, self.fetch.clone())
            .with_header("Referer", &format!("{}/", self.base_url))
            .with_request_delay(self.request_delay)
    }

    /// The detail enricher configured by this value.
    pub fn enricher(&self) -> DetailEnricher {
        DetailEnricher::new(self.detail_concurrency, self.detail_timeouts)
            .with_encoding(self.detail_encoding)
    }
}

/// Trait that all torrent index sites implement.
///
/// Each adapter owns its site's URL templates, its HTML structure and its
/// normalization rules, and exposes the same three listing operations.
///
/// # Result contract
///
/// - `Ok` with records: the page parsed and listed results.
/// - `Ok` with an empty envelope: the page was reached but its result
///   container was missing or empty. This is "no results", not an error.
/// - `Err`: the pipeline failed as a whole (the list page could not be
///   fetched or decoded).
///
/// Malformed single records are skipped and never produce an error.
///
/// # Implementation Guidelines
///
/// - Build one [`Session`](crate::net::Session) per call from
///   [`SourceConfig::http_client`] and drop it when the call ends
/// - Stop collecting once the call's limit is reached
/// - Keep parsing pure (`&str` in, [`Listing`](crate::Listing) out) so it can
///   be tested without a network
#[async_trait]
pub trait Source: Send + Sync {
    /// Lowercase identifier used for registry lookup, e.g. `"bitsearch"`.
    fn id(&self) -> &'static str;

    /// Human-readable name.
    fn name(&self) -> &'static str;

    /// Base URL, without a trailing slash.
    fn base_url(&self) -> &str;

    /// Result ceiling of this adapter. Calls with limit 0 get this many
    /// records at most, and the registry clamps larger limits to it.
    fn default_limit(&self) -> usize;

    /// Overall bound on one call, applied by the registry.
    fn deadline(&self) -> Option<Duration> {
        None
    }

    /// Searches the site for `params.query`.
    ///
    /// # Errors
    ///
    /// * [`Error::Fetch`](crate::Error::Fetch) - The list page could not be fetched
    /// * [`Error::Network`](crate::Error::Network) - The HTTP client could not be built
    async fn search(&self, params: QueryParams) -> Result<ResultEnvelope>;

    /// Lists what is popular now, optionally within `params.category`.
    async fn trending(&self, params: QueryParams) -> Result<ResultEnvelope>;

    /// Lists the newest uploads, optionally within `params.category`.
    async fn recent(&self, params: QueryParams) -> Result<ResultEnvelope>;
}

/// The listing operations every [`Source`] exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Search,
    Trending,
    Recent,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Search => "search",
            Operation::Trending => "trending",
            Operation::Recent => "recent",
        })
    }
}

/// A collection of site adapters with lookup and consumer-facing execution.
///
/// # Features
///
/// - **Case-insensitive lookup**: `"BitSearch"` finds `bitsearch`
/// - **Limit resolution**: 0 or over-ceiling limits become the adapter's ceiling
/// - **Deadlines**: an adapter's overall deadline bounds the whole call
/// - **Classification**: outcomes map onto [`SearchFailure`]
///
/// Sites are queried independently; results are never merged across sites.
///
/// # Examples
///
/// ```rust
/// use torrex::prelude::*;
///
/// let sources = Sources::with_all(FetchConfig::default());
/// assert!(sources.get("TORLOCK").is_some());
/// assert!(sources.get("unknown").is_none());
/// ```
pub struct Sources {
    sources: Vec<Box<dyn Source>>,
    by_id: HashMap<String, usize>,
}

impl Sources {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Registers every adapter enabled by feature flags, each built with
    /// its default [`SourceConfig`] and the given fetch settings.
    pub fn with_all(fetch: FetchConfig) -> Self {
        #[allow(unused_mut)]
        let mut sources = Self::new();

        #[cfg(feature = "source-bitsearch")]
        sources.add(crate::sources::Bitsearch::with_config(
            crate::sources::Bitsearch::default_config().with_fetch(fetch.clone()),
        ));

        #[cfg(feature = "source-glodls")]
        sources.add(crate::sources::Glodls::with_config(
            crate::sources::Glodls::default_config().with_fetch(fetch.clone()),
        ));

        #[cfg(feature = "source-torlock")]
        sources.add(crate::sources::Torlock::with_config(
            crate::sources::Torlock::default_config().with_fetch(fetch.clone()),
        ));

        #[cfg(feature = "source-torrentdownload")]
        sources.add(crate::sources::TorrentDownload::with_config(
            crate::sources::TorrentDownload::default_config().with_fetch(fetch.clone()),
        ));

        let _ = fetch;
        sources
    }

    /// Starts a fluent query.
    pub fn search(&self, query: impl Into<String>) -> SearchBuilder<'_> {
        SearchBuilder::new(self, query)
    }

    /// Adds an adapter, replacing any adapter registered under the same id.
    pub fn add(&mut self, source: impl Source + 'static) -> &mut Self {
        let id = source.id().to_lowercase();
        match self.by_id.get(&id) {
            Some(&index) => self.sources[index] = Box::new(source),
            None => {
                self.by_id.insert(id, self.sources.len());
                self.sources.push(Box::new(source));
            }
        }
        self
    }

    /// Looks an adapter up by id, ignoring case.
    pub fn get(&self, id: &str) -> Option<&dyn Source> {
        self.by_id
            .get(&id.trim().to_lowercase())
            .and_then(|&index| self.sources.get(index))
            .map(|s| s.as_ref())
    }

    /// Ids of all registered adapters, in registration order.
    pub fn list_ids(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.id()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Runs one operation on the adapter registered as `site` and classifies
    /// the outcome.
    ///
    /// # Errors
    ///
    /// * [`SearchFailure::SiteNotAvailable`] - No adapter has this id
    /// * [`SearchFailure::ScraperBroken`] - The adapter's pipeline failed
    /// * [`SearchFailure::InvalidResponse`] - The envelope broke its invariants
    /// * [`SearchFailure::NoResults`] - The envelope was valid but empty
    pub async fn query(
        &self,
        site: &str,
        operation: Operation,
        params: QueryParams,
    ) -> std::result::Result<ResultEnvelope, SearchFailure> {
        let Some(source) = self.get(site) else {
            debug!(site = %site, "Unknown site requested");
            return Err(SearchFailure::SiteNotAvailable {
                site: site.to_string(),
            });
        };
        let query = params.query.clone();
        let outcome = Self::run(source, operation, params).await;
        SearchFailure::classify(source.id(), &query, outcome)
    }

    /// Runs `operation` on every adapter concurrently and returns each
    /// site's classified outcome, in registration order.
    pub async fn query_all(
        &self,
        operation: Operation,
        params: QueryParams,
    ) -> Vec<(String, std::result::Result<ResultEnvelope, SearchFailure>)> {
        let futures = self.sources.iter().map(|source| {
            let params = params.clone();
            async move {
                let source_id = source.id().to_string();
                let query = params.query.clone();
                let outcome = Self::run(source.as_ref(), operation, params).await;
                let result = SearchFailure::classify(&source_id, &query, outcome);
                (source_id, result)
            }
        });

        future::join_all(futures).await
    }

    /// Runs one operation with the limit clamped to the adapter's ceiling and
    /// under the adapter's deadline, without classifying the outcome.
    pub async fn run(
        source: &dyn Source,
        operation: Operation,
        params: QueryParams,
    ) -> Result<ResultEnvelope> {
        let params = params.clamped(source.default_limit());
        debug!(
            source = source.id(),
            operation = %operation,
            query = %params.query,
            page = params.page,
            limit = params.limit,
            "Running source operation"
        );

        let call = async {
            match operation {
                Operation::Search => source.search(params).await,
                Operation::Trending => source.trending(params).await,
                Operation::Recent => source.recent(params).await,
            }
        };

        match source.deadline() {
            Some(deadline) => match tokio::time::timeout(deadline, call).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(
                        source = source.id(),
                        operation = %operation,
                        deadline_ms = deadline.as_millis() as u64,
                        "Deadline exceeded"
                    );
                    Err(Error::source(
                        source.id(),
                        format!("{} exceeded its {:?} deadline", operation, deadline),
                    ))
                }
            },
            None => call.await,
        }
    }
}

impl Default for Sources {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pagination::Pagination;
    use crate::types::{Listing, ResultRecord};
    use std::time::Instant;

    struct Fixed {
        records: usize,
        delay: Duration,
        deadline: Option<Duration>,
    }

    #[async_trait]
    impl Source for Fixed {
        fn id(&self) -> &'static str {
            "fixed"
        }

        fn name(&self) -> &'static str {
            "Fixed"
        }

        fn base_url(&self) -> &str {
            "http://fixed.invalid"
        }

        fn default_limit(&self) -> usize {
            5
        }

        fn deadline(&self) -> Option<Duration> {
            self.deadline
        }

        async fn search(&self, params: QueryParams) -> Result<ResultEnvelope> {
            let started = Instant::now();
            tokio::time::sleep(self.delay).await;
            let records = (0..self.records)
                .take(params.limit)
                .map(|i| ResultRecord::new(format!("r{}", i), format!("u{}", i)))
                .collect();
            Ok(ResultEnvelope::from_listing(
                Listing::new(records, Pagination::SINGLE),
                started,
            ))
        }

        async fn trending(&self, params: QueryParams) -> Result<ResultEnvelope> {
            self.search(params).await
        }

        async fn recent(&self, params: QueryParams) -> Result<ResultEnvelope> {
            self.search(params).await
        }
    }

    fn fixed(records: usize) -> Fixed {
        Fixed {
            records,
            delay: Duration::ZERO,
            deadline: None,
        }
    }

    #[test]
    fn lookup_ignores_case_and_replaces_duplicates() {
        let mut sources = Sources::new();
        sources.add(fixed(1)).add(fixed(2));
        assert_eq!(sources.len(), 1);
        assert!(sources.get("FIXED").is_some());
        assert!(sources.get(" Fixed ").is_some());
    }

    #[tokio::test]
    async fn run_clamps_limit_to_ceiling() {
        let source = fixed(20);
        let params = QueryParams {
            limit: 100,
            ..QueryParams::default()
        };
        let envelope = Sources::run(&source, Operation::Search, params).await.unwrap();
        assert_eq!(envelope.total, 5);

        let unset = Sources::run(&source, Operation::Trending, QueryParams::default())
            .await
            .unwrap();
        assert_eq!(unset.total, 5);
    }

    #[tokio::test]
    async fn deadline_turns_slow_call_into_error() {
        let source = Fixed {
            records: 3,
            delay: Duration::from_millis(500),
            deadline: Some(Duration::from_millis(20)),
        };
        let outcome = Sources::run(&source, Operation::Search, "x".into()).await;
        assert!(matches!(outcome, Err(Error::Source { .. })));
    }

    #[test]
    fn builder_requires_base_url_and_limit() {
        assert!(SourceConfigBuilder::default().build().is_err());
        let config = SourceConfig::new("https://example.com/", 10);
        assert_eq!(config.base_url, "https://example.com");
        assert_eq!(config.detail_timeouts, TimeoutPolicy::detail());
    }
}

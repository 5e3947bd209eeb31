//! Glodls adapter.
//!
//! Glodls serves Latin-1 pages, so list pages are always decoded as
//! windows-1252 whatever the response declares.
//!
//! Its search endpoint is unreliable and heavily rate limited. By default a
//! search therefore fetches the browse listing and keeps the records whose
//! name contains the query, ignoring case ([`GlodlsStrategy::BrowseAndFilter`]).
//! This degraded search only sees what the browse page lists. The endpoint can
//! be used instead, or tried first, by choosing another [`GlodlsStrategy`].

use async_trait::async_trait;
use encoding_rs::WINDOWS_1252;
use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::{
    error::Result,
    net::{FetchError, Session, html},
    pagination::{self, Pagination},
    search::RecordsExt,
    source::{Source, SourceConfig},
    sources::{or_default, viable},
    types::{Listing, NOT_AVAILABLE, QueryParams, ResultEnvelope, ResultRecord, UNKNOWN, ZERO},
};

const BASE_URL: &str = "https://glodls.to";
const DEFAULT_LIMIT: usize = 45;
const ANONYMOUS: &str = "Anonymous";

/// Paths requested by [`Glodls::probe_endpoints`], in order.
pub const PROBE_PATHS: [&str; 6] = [
    "/",
    "/search.php?cat=1",
    "/search.php",
    "/search_results.php?search={query}&cat=0&incldead=0&inclexternal=0&lang=0&sort=seeders&order=desc&page=0",
    "/search.php?search={query}",
    "/browse.php",
];

/// How [`Glodls`] answers a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlodlsStrategy {
    /// Fetch the browse listing and filter it by name.
    #[default]
    BrowseAndFilter,
    /// Use the site's search endpoint only.
    SearchEndpoint,
    /// Try the search endpoint, and fall back to browse-and-filter when it
    /// fails or lists nothing.
    EndpointThenBrowse,
}

/// Outcome of one diagnostic request made by [`Glodls::probe_endpoints`].
#[derive(Debug, Clone)]
pub struct EndpointProbe {
    pub url: String,
    pub outcome: std::result::Result<ProbeStats, FetchError>,
}

/// What a reachable endpoint returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStats {
    pub status: u16,
    pub bytes: usize,
    /// Number of `t-row` result rows in the page.
    pub rows: usize,
}

/// Glodls (glodls.to) adapter.
pub struct Glodls {
    config: SourceConfig,
    strategy: GlodlsStrategy,
}

impl Glodls {
    pub const ID: &'static str = "glodls";

    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: SourceConfig) -> Self {
        Self {
            config,
            strategy: GlodlsStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: GlodlsStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Base URL, result ceiling and the forced Latin-1 encoding.
    pub fn default_config() -> SourceConfig {
        let mut config = SourceConfig::new(BASE_URL, DEFAULT_LIMIT);
        config.encoding = Some(WINDOWS_1252);
        config
    }

    pub fn strategy(&self) -> GlodlsStrategy {
        self.strategy
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    /// The search endpoint uses zero-based pages.
    fn endpoint_url(&self, params: &QueryParams) -> String {
        self.url(&format!(
            "/search_results.php?search={}&cat=0&incldead=0&inclexternal=0&lang=0&sort=seeders&order=desc&page={}",
            urlencoding::encode(params.query.trim()),
            params.page() - 1
        ))
    }

    async fn fetch_listing(
        &self,
        session: &Session,
        url: &str,
        limit: usize,
        filter: Option<&str>,
        current_page: u32,
    ) -> Result<Listing> {
        let page = session
            .get_text(url, session.default_timeouts(), self.config.encoding)
            .await?;
        let listing =
            Self::parse_listing(&page.text, &self.config.base_url, limit, filter, current_page);
        debug!(source = Self::ID, url = %url, records = listing.records.len(), "Parsed listing");
        Ok(listing)
    }

    async fn browse_and_filter(&self, session: &Session, params: &QueryParams) -> Result<Listing> {
        let limit = params.limit_or(self.default_limit());
        let query = params.query.trim();
        debug!(source = Self::ID, query = %query, "Searching by filtering the browse listing");
        self.fetch_listing(session, &self.url("/browse.php"), limit, Some(query), 1)
            .await
    }

    async fn listing(&self, path: &str, params: QueryParams) -> Result<ResultEnvelope> {
        let started = Instant::now();
        let session = self.config.http_client(Self::ID).session()?;
        let limit = params.limit_or(self.default_limit());
        let listing = self
            .fetch_listing(&session, &self.url(path), limit, None, 1)
            .await?;
        Ok(ResultEnvelope::from_listing(listing, started))
    }

    /// Parses a browse, today, search or search-results page.
    ///
    /// Result rows alternate with spacer rows of the same class, and the last
    /// row closes the table, so every second row is read and the last one is
    /// ignored. Rows with fewer than eight cells or without a name are
    /// skipped. When `filter` is set, only records whose name contains it
    /// (ignoring case) are kept, and the limit applies after filtering.
    pub fn parse_listing(
        html: &str,
        base_url: &str,
        limit: usize,
        filter: Option<&str>,
        current_page: u32,
    ) -> Listing {
        let document = html::parse(html);
        let rows = html::select_doc(&document, "tr.t-row");
        let candidates = rows[..rows.len().saturating_sub(1)]
            .iter()
            .step_by(2)
            .filter_map(|row| {
                let record = Self::parse_row(*row, base_url);
                if record.is_none() {
                    debug!(source = Self::ID, "Skipping malformed result row");
                }
                record
            })
            .collect::<Vec<_>>();

        let records = match filter {
            Some(query) => candidates.filter_query(query),
            None => candidates,
        };
        let records = records.into_iter().take(limit).collect();
        Listing::new(records, Self::extract_pagination(&document, current_page))
    }

    fn parse_row(row: ElementRef<'_>, base_url: &str) -> Option<ResultRecord> {
        let cells = html::select_all(row, "td");
        if cells.len() < 8 {
            return None;
        }

        let link = html::select_all(cells[1], "a").pop()?;
        let name = html::select_first(link, "b").map(html::text_of)?;
        if name.is_empty() {
            return None;
        }
        let href = html::attr_of(link, "href").unwrap_or_default();

        let mut record = ResultRecord::new(name, html::absolutize(base_url, &href));
        record.torrent = html::select_first(cells[2], "a")
            .and_then(|a| html::attr_of(a, "href"))
            .map(|href| html::absolutize(base_url, &href))
            .unwrap_or_default();
        record.magnet = html::select_first(cells[3], "a")
            .and_then(|a| html::attr_of(a, "href"))
            .unwrap_or_default();
        record.size = or_default(Some(html::text_of(cells[4])), UNKNOWN);
        let count = |cell: ElementRef<'_>| html::select_first(cell, "font b").map(html::text_of);
        record.seeders = or_default(count(cells[5]), ZERO);
        record.leechers = or_default(count(cells[6]), ZERO);
        record.uploader = Some(or_default(
            html::select_first(cells[7], "a b font").map(html::text_of),
            ANONYMOUS,
        ));
        record.date = NOT_AVAILABLE.to_string();

        viable(Self::ID, record)
    }

    /// Reads the total page count from the `pagination` div.
    ///
    /// Links carry zero-based `page=` values, so the total is the highest
    /// one plus one. Glodls does not
    /// mark the current page; `current_page` is what was requested.
    /// Falls back to `(current_page, current_page)`, which is `(1, 1)` for
    /// the listing pages.
    pub fn extract_pagination(document: &Html, current_page: u32) -> Pagination {
        let total = html::select_all_attr(document, "div.pagination a", "href")
            .iter()
            .filter_map(|href| pagination::page_param(href, "page"))
            .max()
            .map(|zero_based| zero_based + 1);

        let current = current_page.max(1);
        Pagination::new(Some(current), Some(total.unwrap_or(current)))
    }

    /// Requests each of [`PROBE_PATHS`] in order, waiting `delay` between
    /// requests, and reports status, size and result-row count per endpoint.
    ///
    /// Meant for diagnosing which endpoints currently work. A failing
    /// endpoint is reported in its [`EndpointProbe`] and does not stop the
    /// probe.
    ///
    /// # Errors
    ///
    /// Only if the HTTP client cannot be built.
    pub async fn probe_endpoints(
        &self,
        query: &str,
        delay: Duration,
    ) -> Result<Vec<EndpointProbe>> {
        let session = self
            .config
            .http_client(Self::ID)
            .with_request_delay(delay)
            .session()?;
        let encoded = urlencoding::encode(query.trim());

        let mut probes = Vec::with_capacity(PROBE_PATHS.len());
        for path in PROBE_PATHS {
            let url = self.url(&path.replace("{query}", &encoded));
            let outcome = session
                .get(&url, session.default_timeouts())
                .await
                .map(|fetched| {
                    let text = crate::net::encoding::EncodingResolver::default()
                        .decode(&fetched.body, self.config.encoding)
                        .text;
                    let rows = html::select_doc(&html::parse(&text), "tr.t-row").len();
                    ProbeStats {
                        status: fetched.status,
                        bytes: fetched.body.len(),
                        rows,
                    }
                });

            match &outcome {
                Ok(stats) => info!(
                    source = Self::ID,
                    url = %url,
                    status = stats.status,
                    bytes = stats.bytes,
                    rows = stats.rows,
                    "Probed endpoint"
                ),
                Err(e) => warn!(source = Self::ID, url = %url, error = %e, "Endpoint probe failed"),
            }
            probes.push(EndpointProbe { url, outcome });
        }
        Ok(probes)
    }
}

impl Default for Glodls {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for Glodls {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Glodls"
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn default_limit(&self) -> usize {
        self.config.default_limit
    }

    fn deadline(&self) -> Option<Duration> {
        self.config.deadline
    }

    async fn search(&self, params: QueryParams) -> Result<ResultEnvelope> {
        let started = Instant::now();
        let session = self.config.http_client(Self::ID).session()?;
        let limit = params.limit_or(self.default_limit());
        let endpoint = self.endpoint_url(&params);

        let listing = match self.strategy {
            GlodlsStrategy::BrowseAndFilter => self.browse_and_filter(&session, &params).await?,
            GlodlsStrategy::SearchEndpoint => {
                self.fetch_listing(&session, &endpoint, limit, None, params.page())
                    .await?
            }
            GlodlsStrategy::EndpointThenBrowse => {
                match self
                    .fetch_listing(&session, &endpoint, limit, None, params.page())
                    .await
                {
                    Ok(listing) if !listing.records.is_empty() => listing,
                    Ok(_) => {
                        debug!(
                            source = Self::ID,
                            "Search endpoint listed nothing, browsing instead"
                        );
                        self.browse_and_filter(&session, &params).await?
                    }
                    Err(e) => {
                        warn!(
                            source = Self::ID,
                            error = %e,
                            "Search endpoint failed, browsing instead"
                        );
                        self.browse_and_filter(&session, &params).await?
                    }
                }
            }
        };

        Ok(ResultEnvelope::from_listing(listing, started))
    }

    async fn trending(&self, params: QueryParams) -> Result<ResultEnvelope> {
        self.listing("/today.php", params).await
    }

    async fn recent(&self, params: QueryParams) -> Result<ResultEnvelope> {
        self.listing("/search.php", params).await
    }
}

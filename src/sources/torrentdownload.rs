//! TorrentDownload adapter.
//!
//! List rows carry no magnet link, but every result link starts with the
//! uppercase info hash (`/<HASH>/<slug>`), so magnets are synthesized from it
//! with the shared public tracker list. Each record also gets a coarse
//! quality tier read from its name.
//!
//! The site has no trending page; [`Source::trending`] serves the front page
//! and [`Source::recent`] the date-sorted empty search.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{
    error::Result,
    magnet,
    net::html,
    pagination::{self, Pagination},
    source::{Source, SourceConfig},
    sources::{or_default, viable},
    types::{Listing, QueryParams, ResultEnvelope, ResultRecord, UNKNOWN, ZERO},
};

const BASE_URL: &str = "https://www.torrentdownload.info";
const DEFAULT_LIMIT: usize = 50;

const CATEGORY_SEPARATOR: &str = " » ";

static HASH_PATH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/([A-F0-9]{40})/").expect("valid hash path pattern"));

/// Quality tiers, checked in order; the first tier with a matching marker wins.
const QUALITY_TIERS: [(&str, &[&str]); 5] = [
    ("2160p", &["2160p", "4k", "uhd"]),
    ("1080p", &["1080p", "fullhd", "fhd"]),
    ("720p", &["720p", "hd"]),
    ("480p", &["480p", "dvdrip", "xvid"]),
    ("CAM", &["cam", "ts", "tc"]),
];

/// Classifies a release name into a quality tier.
///
/// Markers are matched as case-insensitive substrings, so short markers like
/// `hd` and `ts` also match inside longer words.
///
/// ```rust
/// use torrex::sources::torrentdownload::classify_quality;
///
/// assert_eq!(classify_quality("Movie.2019.2160p.WEB"), "2160p");
/// assert_eq!(classify_quality("Movie 1080p BluRay"), "1080p");
/// assert_eq!(classify_quality("Old.Film.DVDRip"), "480p");
/// assert_eq!(classify_quality("New Movie CAM"), "CAM");
/// assert_eq!(classify_quality("Linux Mint"), "Unknown");
/// ```
pub fn classify_quality(name: &str) -> &'static str {
    let name = name.to_lowercase();
    QUALITY_TIERS
        .iter()
        .find(|(_, markers)| markers.iter().any(|marker| name.contains(marker)))
        .map(|(tier, _)| *tier)
        .unwrap_or(UNKNOWN)
}

/// TorrentDownload (torrentdownload.info) adapter.
pub struct TorrentDownload {
    config: SourceConfig,
}

impl TorrentDownload {
    pub const ID: &'static str = "torrentdownload";

    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: SourceConfig) -> Self {
        Self { config }
    }

    pub fn default_config() -> SourceConfig {
        SourceConfig::new(BASE_URL, DEFAULT_LIMIT)
    }

    fn search_url(&self, params: &QueryParams) -> String {
        format!(
            "{}/search?q={}&p={}",
            self.config.base_url,
            urlencoding::encode(params.query.trim()),
            params.page()
        )
    }

    fn trending_url(&self) -> String {
        format!("{}/", self.config.base_url)
    }

    fn recent_url(&self, params: &QueryParams) -> String {
        format!("{}/searchd?q=&p={}", self.config.base_url, params.page())
    }

    async fn fetch_listing(&self, url: &str, params: &QueryParams) -> Result<ResultEnvelope> {
        let started = Instant::now();
        let session = self.config.http_client(Self::ID).session()?;
        let page = session
            .get_text(url, session.default_timeouts(), self.config.encoding)
            .await?;

        let limit = params.limit_or(self.default_limit());
        let listing = Self::parse_listing(&page.text, &self.config.base_url, limit);
        debug!(
            source = Self::ID,
            url = %url,
            records = listing.records.len(),
            "Parsed listing"
        );
        Ok(ResultEnvelope::from_listing(listing, started))
    }

    /// Parses a result page.
    ///
    /// Results live in the second `table.table2` (the first holds sponsored
    /// links); its header row is skipped. A page without that table yields
    /// an empty listing on page `(1, 1)`.
    pub fn parse_listing(html: &str, base_url: &str, limit: usize) -> Listing {
        let document = html::parse(html);
        let tables = html::select_doc(&document, "table.table2");
        let Some(results) = tables.get(1) else {
            debug!(source = Self::ID, tables = tables.len(), "No result table");
            return Listing::empty(Pagination::SINGLE);
        };

        let records = html::select_all(*results, "tr")
            .into_iter()
            .skip(1)
            .filter_map(|row| {
                let cells = html::select_all(row, "td");
                let record = Self::parse_row(&cells, base_url);
                if record.is_none() {
                    debug!(source = Self::ID, "Skipping malformed result row");
                }
                record
            })
            .take(limit)
            .collect();

        Listing::new(records, Self::extract_pagination(&document))
    }

    fn parse_row(cells: &[ElementRef<'_>], base_url: &str) -> Option<ResultRecord> {
        if cells.len() < 5 {
            return None;
        }
        let name_div = html::select_first(cells[0], "div.tt-name")?;
        let link = html::select_first(name_div, "a")?;

        let text = html::text_of(link);
        let name = text.split(CATEGORY_SEPARATOR).next().unwrap_or_default().trim();
        let href = html::attr_of(link, "href")?;
        let hash = HASH_PATH.captures(&href)?.get(1)?.as_str().to_string();
        if name.is_empty() {
            return None;
        }

        let count = |cell: ElementRef<'_>| Some(html::text_of(cell).replace(',', ""));

        let mut record = ResultRecord::new(name, html::absolutize(base_url, &href));
        record.date = or_default(Some(html::text_of(cells[1])), UNKNOWN);
        record.size = or_default(Some(html::text_of(cells[2])), UNKNOWN);
        record.seeders = or_default(count(cells[3]), ZERO);
        record.leechers = or_default(count(cells[4]), ZERO);
        record.category = or_default(
            html::select_first(name_div, "span.smallish").and_then(|span| {
                html::text_of(span)
                    .split(CATEGORY_SEPARATOR)
                    .nth(1)
                    .map(str::to_string)
            }),
            UNKNOWN,
        );
        record.quality = Some(classify_quality(name).to_string());
        record.magnet = magnet::synthesize(&hash, name);
        record.hash = Some(hash);

        viable(Self::ID, record)
    }

    /// Reads `(current, total)` from `div.search_stat`.
    ///
    /// The current page is the active span (1 when absent) and the total is
    /// the highest `p=` value among the page links, or the current page when
    /// no link carries one. Without the block the result is `(1, 1)`.
    pub fn extract_pagination(document: &Html) -> Pagination {
        let Some(stat) = html::select_doc(document, "div.search_stat").into_iter().next() else {
            return Pagination::SINGLE;
        };

        let current = html::select_first(stat, "span.active")
            .and_then(|span| pagination::page_number(&html::text_of(span)))
            .unwrap_or(1);
        let total = html::select_all(stat, "a")
            .into_iter()
            .filter_map(|link| html::attr_of(link, "href"))
            .filter_map(|href| pagination::page_param(&href, "p"))
            .max()
            .unwrap_or(current);

        Pagination::new(Some(current), Some(total))
    }
}

impl Default for TorrentDownload {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for TorrentDownload {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "TorrentDownload"
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
        let url = self.search_url(&params);
        self.fetch_listing(&url, &params).await
    }

    async fn trending(&self, params: QueryParams) -> Result<ResultEnvelope> {
        let url = self.trending_url();
        self.fetch_listing(&url, &params).await
    }

    async fn recent(&self, params: QueryParams) -> Result<ResultEnvelope> {
        let url = self.recent_url(&params);
        self.fetch_listing(&url, &params).await
    }
}

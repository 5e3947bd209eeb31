//! Bitsearch adapter.
//!
//! Results are self-contained `div` cards, so they are parsed in parallel.
//! Fields inside a card are labelled by Font Awesome icons, and each value is
//! the first `span` after its icon. Every card carries its own magnet link.
//!
//! Bitsearch has no recent listing; [`Source::recent`] serves the trending
//! page instead.

use async_trait::async_trait;
use scraper::Html;
use std::time::Instant;
use tracing::debug;

use crate::{
    error::Result,
    net::html,
    pagination::{self, Pagination},
    source::{Source, SourceConfig},
    sources::{or_default, viable},
    types::{Listing, QueryParams, ResultEnvelope, ResultRecord, UNKNOWN, ZERO},
};

const BASE_URL: &str = "https://bitsearch.to";
const DEFAULT_LIMIT: usize = 75;

const CARD: &str = "div.bg-white.rounded-lg.shadow-sm.border.border-gray-200.p-6";

/// Bitsearch (bitsearch.to) adapter.
pub struct Bitsearch {
    config: SourceConfig,
}

impl Bitsearch {
    pub const ID: &'static str = "bitsearch";

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
            "{}/search?q={}&page={}",
            self.config.base_url,
            urlencoding::encode(params.query.trim()),
            params.page()
        )
    }

    fn trending_url(&self) -> String {
        format!("{}/trending", self.config.base_url)
    }

    async fn fetch_listing(&self, url: &str, params: &QueryParams) -> Result<ResultEnvelope> {
        let started = Instant::now();
        let session = self.config.http_client(Self::ID).session()?;
        let page = session
            .get_text(url, session.default_timeouts(), self.config.encoding)
            .await?;

        let limit = params.limit_or(self.default_limit());
        let listing = Self::parse_listing(&page.text, &self.config.base_url, limit);
        debug!(source = Self::ID, url = %url, records = listing.records.len(), "Parsed listing");
        Ok(ResultEnvelope::from_listing(listing, started))
    }

    /// Parses a search or trending page.
    ///
    /// Cards without a title link or without a magnet link carrying a hash
    /// are skipped. A page with no cards yields an empty listing on one page.
    pub fn parse_listing(html: &str, base_url: &str, limit: usize) -> Listing {
        let document = html::parse(html);
        let cards = html::parse_items(&document, CARD, |card| {
            let record = Self::parse_card(card, base_url);
            if record.is_none() {
                debug!(source = Self::ID, "Skipping malformed result card");
            }
            record
        });

        if cards.is_empty() {
            return Listing::empty(Pagination::SINGLE);
        }

        let records = cards.into_iter().take(limit).collect();
        Listing::new(records, Self::extract_pagination(&document))
    }

    fn parse_card(card: scraper::ElementRef<'_>, base_url: &str) -> Option<ResultRecord> {
        let title = html::select_first(card, "h3[class*='text-gray-900'][class*='line-clamp-2'] a")
            .or_else(|| html::select_first(card, "h3 a"))?;
        let name = html::text_of(title);
        if name.is_empty() {
            return None;
        }
        let href = html::attr_of(title, "href").unwrap_or_default();

        let mut record = ResultRecord::new(name, html::absolutize(base_url, &href));
        record.category = or_default(Self::icon_value(card, "fa-video"), UNKNOWN);
        record.size = or_default(Self::icon_value(card, "fa-download"), UNKNOWN);
        record.date = or_default(Self::icon_value(card, "fa-calendar"), UNKNOWN);
        record.seeders = or_default(
            html::select_first(card, "span[class*='text-green-600'] span.font-medium")
                .map(html::text_of),
            ZERO,
        );
        record.leechers = or_default(
            html::select_first(card, "span[class*='text-red-600'] span.font-medium")
                .map(html::text_of),
            ZERO,
        );

        for link in html::select_all(card, "a[href]") {
            let Some(href) = html::attr_of(link, "href") else {
                continue;
            };
            if href.starts_with("magnet:") {
                record.magnet = href;
            } else if href.contains("/download/torrent/") {
                record.torrent = html::absolutize(base_url, &href);
            }
        }

        if record.magnet.is_empty() {
            return None;
        }
        let record = viable(Self::ID, record)?;
        record.hash.is_some().then_some(record)
    }

    fn icon_value(card: scraper::ElementRef<'_>, icon: &str) -> Option<String> {
        let marker = html::select_first(card, &format!("i[class*='{}']", icon))?;
        html::next_element(card, marker, "span").map(html::text_of)
    }

    /// Reads `(current, total)` from the `Pagination` nav.
    ///
    /// The current page is the highlighted `span`, and the total is the
    /// highest numbered page link. Falls back to `(1, 1)`.
    pub fn extract_pagination(document: &Html) -> Pagination {
        let Some(nav) = html::select_doc(document, "nav[aria-label='Pagination']")
            .into_iter()
            .next()
        else {
            return Pagination::SINGLE;
        };

        let current = html::select_first(nav, "span[class*='bg-primary']")
            .and_then(|span| pagination::page_number(&html::text_of(span)))
            .unwrap_or(1);
        let total = html::select_all(nav, "a[href]")
            .into_iter()
            .filter_map(|link| html::text_of(link).parse::<u32>().ok())
            .max()
            .unwrap_or(1);

        Pagination::new(Some(current), Some(total))
    }
}

impl Default for Bitsearch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for Bitsearch {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Bit Search"
    }

    fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn default_limit(&self) -> usize {
        self.config.default_limit
    }

    fn deadline(&self) -> Option<std::time::Duration> {
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
        self.trending(params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(index: usize, with_title: bool) -> String {
        let hash = format!("{:040x}", index + 1);
        let title = if with_title {
            format!(
                r#"<h3 class="text-lg font-semibold text-gray-900 line-clamp-2"><a href="/torrent/{i}">Result {i}</a></h3>"#,
                i = index
            )
        } else {
            String::new()
        };
        format!(
            r#"<div class="bg-white rounded-lg shadow-sm border border-gray-200 p-6">
                {title}
                <div>
                  <span><i class="fas fa-video"></i><span>Movies</span></span>
                  <span><i class="fas fa-download"></i><span>1.{i} GB</span></span>
                  <span><i class="fas fa-calendar"></i><span>2024-01-0{d}</span></span>
                  <span class="flex text-green-600"><span class="font-medium">{s}</span></span>
                  <span class="flex text-red-600"><span class="font-medium">{l}</span></span>
                </div>
                <a href="/download/torrent/{hash}">torrent</a>
                <a href="magnet:?xt=urn:btih:{hash}&dn=Result{i}">magnet</a>
            </div>"#,
            title = title,
            i = index,
            d = index % 9 + 1,
            s = 100 - index,
            l = index,
            hash = hash
        )
    }

    fn page(cards: &[String], pagination: &str) -> String {
        format!(
            "<html><body><main>{}</main>{}</body></html>",
            cards.join("\n"),
            pagination
        )
    }

    #[test]
    fn parses_card_fields() {
        let listing = Bitsearch::parse_listing(&page(&[card(0, true)], ""), BASE_URL, 75);
        assert_eq!(listing.records.len(), 1);

        let record = &listing.records[0];
        assert_eq!(record.name, "Result 0");
        assert_eq!(record.url, "https://bitsearch.to/torrent/0");
        assert_eq!(record.category, "Movies");
        assert_eq!(record.size, "1.0 GB");
        assert_eq!(record.date, "2024-01-01");
        assert_eq!(record.seeders, "100");
        assert_eq!(record.leechers, "0");
        assert_eq!(
            record.torrent,
            format!("https://bitsearch.to/download/torrent/{:040x}", 1)
        );
        let hash = record.hash.as_deref().unwrap();
        assert!(record.magnet.contains(hash));
    }

    #[test]
    fn malformed_card_is_skipped_without_affecting_siblings() {
        let cards: Vec<String> = (0..5).map(|i| card(i, i != 2)).collect();
        let listing = Bitsearch::parse_listing(&page(&cards, ""), BASE_URL, 75);
        let names: Vec<&str> = listing.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Result 0", "Result 1", "Result 3", "Result 4"]);
    }

    #[test]
    fn missing_icons_fall_back_to_defaults() {
        let html = page(
            &[r#"<div class="bg-white rounded-lg shadow-sm border border-gray-200 p-6">
                <h3 class="text-gray-900 line-clamp-2"><a href="/torrent/x">Bare</a></h3>
                <a href="magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567">m</a>
            </div>"#
                .to_string()],
            "",
        );
        let listing = Bitsearch::parse_listing(&html, BASE_URL, 75);
        let record = &listing.records[0];
        assert_eq!(record.size, UNKNOWN);
        assert_eq!(record.category, UNKNOWN);
        assert_eq!(record.seeders, ZERO);
        assert_eq!(record.torrent, "");
    }

    #[test]
    fn card_without_magnet_is_dropped() {
        let html = page(
            &[r#"<div class="bg-white rounded-lg shadow-sm border border-gray-200 p-6">
                <h3 class="text-gray-900 line-clamp-2"><a href="/torrent/x">No magnet</a></h3>
            </div>"#
                .to_string()],
            "",
        );
        assert!(Bitsearch::parse_listing(&html, BASE_URL, 75).records.is_empty());
    }

    #[test]
    fn limit_keeps_first_records_in_document_order() {
        let cards: Vec<String> = (0..10).map(|i| card(i, true)).collect();
        let listing = Bitsearch::parse_listing(&page(&cards, ""), BASE_URL, 3);
        let names: Vec<&str> = listing.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Result 0", "Result 1", "Result 2"]);
    }

    #[test]
    fn pagination_reads_highlighted_page_and_highest_link() {
        let nav = r#"<nav aria-label="Pagination">
            <a href="/search?q=x&page=1">1</a>
            <span class="px-3 bg-primary-600 text-white">2</span>
            <a href="/search?q=x&page=3">3</a>
            <a href="/search?q=x&page=14">14</a>
            <a href="/search?q=x&page=3">Next</a>
        </nav>"#;
        let listing = Bitsearch::parse_listing(&page(&[card(0, true)], nav), BASE_URL, 75);
        assert_eq!(listing.pagination, Pagination::new(Some(2), Some(14)));
    }

    #[test]
    fn missing_pagination_and_cards_fall_back_to_single_page() {
        let listing = Bitsearch::parse_listing(&page(&[card(0, true)], ""), BASE_URL, 75);
        assert_eq!(listing.pagination, Pagination::SINGLE);

        let html = "<html><body><p>No results</p></body></html>";
        let empty = Bitsearch::parse_listing(html, BASE_URL, 75);
        assert_eq!(empty, Listing::empty(Pagination::SINGLE));
    }

    #[test]
    fn parsing_is_idempotent() {
        let cards: Vec<String> = (0..6).map(|i| card(i, true)).collect();
        let html = page(&cards, "");
        assert_eq!(
            Bitsearch::parse_listing(&html, BASE_URL, 75),
            Bitsearch::parse_listing(&html, BASE_URL, 75)
        );
    }

    #[test]
    fn search_url_encodes_query() {
        let source = Bitsearch::new();
        let params = QueryParams {
            query: "ubuntu 22.04".to_string(),
            page: 2,
            ..QueryParams::default()
        };
        assert_eq!(
            source.search_url(&params),
            "https://bitsearch.to/search?q=ubuntu%2022.04&page=2"
        );
    }
}

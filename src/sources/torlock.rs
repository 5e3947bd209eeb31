//! Torlock adapter.
//!
//! Torlock list pages have no magnet links, so every call runs a second
//! round: the detail page of each kept row is fetched concurrently and its
//! magnet link, torrent link, category, poster and screenshots are merged into
//! the row. Rows whose detail page fails, times out or lacks a magnet or
//! torrent link are dropped afterwards.
//!
//! Category listings accept Torlock's own category slugs (`movies`,
//! `television`, `music`, `game`, `software`, `anime`, `ebooks`, ...), with
//! `books` accepted as an alias of `ebooks`.

use async_trait::async_trait;
use encoding_rs::WINDOWS_1252;
use scraper::{ElementRef, Html};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{
    enrich::DetailFields,
    error::Result,
    net::{TimeoutPolicy, html},
    pagination::{self, Pagination},
    search::RecordsExt,
    source::{Source, SourceConfig},
    sources::or_default,
    types::{Listing, QueryParams, ResultEnvelope, ResultRecord, UNKNOWN, ZERO},
};

const BASE_URL: &str = "https://www.torlock.com";
const DEFAULT_LIMIT: usize = 50;

/// Rows at the top of a search page that belong to the layout, not results.
const SEARCH_ROW_OFFSET: usize = 5;

/// Torlock (torlock.com) adapter.
pub struct Torlock {
    config: SourceConfig,
}

impl Torlock {
    pub const ID: &'static str = "torlock";

    pub fn new() -> Self {
        Self::with_config(Self::default_config())
    }

    pub fn with_config(config: SourceConfig) -> Self {
        Self { config }
    }

    /// Base URL, result ceiling, a 60s list-page bound and Latin-1 detail
    /// pages fetched within 10s each.
    pub fn default_config() -> SourceConfig {
        let mut config = SourceConfig::new(BASE_URL, DEFAULT_LIMIT);
        config.fetch.timeouts = TimeoutPolicy::from_secs(60, 10, 30);
        config.detail_encoding = Some(WINDOWS_1252);
        config.detail_timeouts = TimeoutPolicy::detail();
        config
    }

    /// Maps category aliases onto Torlock slugs.
    pub fn category_slug(category: &str) -> String {
        match category.trim().to_lowercase().as_str() {
            "books" => "ebooks".to_string(),
            other => other.to_string(),
        }
    }

    fn category(params: &QueryParams) -> Option<String> {
        params
            .category
            .as_deref()
            .map(Self::category_slug)
            .filter(|slug| !slug.is_empty())
    }

    fn search_url(&self, params: &QueryParams) -> String {
        format!(
            "{}/all/torrents/{}.html?sort=seeds&page={}",
            self.config.base_url,
            urlencoding::encode(params.query.trim()),
            params.page()
        )
    }

    fn trending_url(&self, params: &QueryParams) -> String {
        match Self::category(params) {
            Some(slug) => format!("{}/{}.html", self.config.base_url, slug),
            None => self.config.base_url.clone(),
        }
    }

    fn recent_url(&self, params: &QueryParams) -> String {
        match Self::category(params) {
            Some(slug) => format!(
                "{}/{}/{}/added/desc.html",
                self.config.base_url,
                slug,
                params.page()
            ),
            None => format!("{}/fresh.html", self.config.base_url),
        }
    }

    async fn fetch_listing(
        &self,
        url: &str,
        params: &QueryParams,
        row_offset: usize,
    ) -> Result<ResultEnvelope> {
        let started = Instant::now();
        let session = self.config.http_client(Self::ID).session()?;
        let page = session
            .get_text(url, session.default_timeouts(), self.config.encoding)
            .await?;

        let limit = params.limit_or(self.default_limit());
        let mut listing = Self::parse_listing(&page.text, &self.config.base_url, limit, row_offset);
        let detail_urls: Vec<String> = listing.records.iter().map(|r| r.url.clone()).collect();

        let base_url = self.config.base_url.clone();
        let report = self
            .config
            .enricher()
            .enrich(&session, &mut listing.records, &detail_urls, |text, _| {
                Self::extract_details(text, &base_url)
            })
            .await;

        let before = listing.records.len();
        listing.records = std::mem::take(&mut listing.records).actionable();
        debug!(
            source = Self::ID,
            url = %url,
            parsed = before,
            enriched = report.enriched,
            failed = report.failed.len(),
            kept = listing.records.len(),
            "Enriched listing"
        );

        Ok(ResultEnvelope::from_listing(listing, started))
    }

    /// Parses a search, trending or recent page into unenriched rows.
    ///
    /// The first `row_offset` table rows are skipped (search pages open with
    /// layout rows). Rows without cells are ignored, rows with fewer than five
    /// cells or without a linked name are skipped, and parsing stops at a row
    /// whose name link is empty. Records carry no magnet yet.
    pub fn parse_listing(html: &str, base_url: &str, limit: usize, row_offset: usize) -> Listing {
        let document = html::parse(html);
        let mut records = Vec::new();

        for row in html::select_doc(&document, "tr").into_iter().skip(row_offset) {
            if records.len() == limit {
                break;
            }
            let cells = html::select_all(row, "td");
            if cells.is_empty() {
                continue;
            }
            match Self::parse_row(&cells, base_url) {
                RowOutcome::Record(record) => records.push(*record),
                RowOutcome::Skip => {
                    debug!(source = Self::ID, "Skipping malformed result row");
                }
                RowOutcome::End => break,
            }
        }

        Listing::new(records, Self::extract_pagination(&document))
    }

    fn parse_row(cells: &[ElementRef<'_>], base_url: &str) -> RowOutcome {
        let name = html::text_of(cells[0]);
        if name.is_empty() {
            return RowOutcome::Skip;
        }
        let Some(link) = html::select_first(cells[0], "a") else {
            return RowOutcome::Skip;
        };
        let href = link.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() {
            return RowOutcome::End;
        }
        if cells.len() < 5 {
            return RowOutcome::Skip;
        }

        let cell = |index: usize| Some(html::text_of(cells[index]));

        let mut record = ResultRecord::new(name, html::absolutize(base_url, href));
        record.date = or_default(cell(1), UNKNOWN);
        record.size = or_default(cell(2), UNKNOWN);
        record.seeders = or_default(cell(3), ZERO);
        record.leechers = or_default(cell(4), ZERO);
        RowOutcome::Record(Box::new(record))
    }

    /// Reads magnet, torrent link, category, poster and screenshots from a
    /// detail page.
    ///
    /// Links are matched by pattern rather than position: the first
    /// `magnet:` link, the first link to a `.torrent` file or `/download/`
    /// path, and the text of the first `/cat/` or `/category/` link. Returns
    /// `None` unless both a magnet and a torrent link were found.
    pub fn extract_details(text: &str, base_url: &str) -> Option<DetailFields> {
        let document = html::parse(text);

        let mut magnet = None;
        let mut torrent = None;
        let mut category = None;
        for link in html::select_doc(&document, "a[href]") {
            let Some(href) = html::attr_of(link, "href") else {
                continue;
            };
            if href.starts_with("magnet:") {
                if magnet.is_none() {
                    magnet = Some(href);
                }
            } else if href.contains(".torrent") || href.contains("/download/") {
                if torrent.is_none() {
                    torrent = Some(html::absolutize(base_url, &href));
                }
            } else if category.is_none()
                && (href.contains("/cat/") || href.contains("/category/"))
            {
                category = Some(html::text_of(link)).filter(|c| !c.is_empty());
            }
        }

        let (magnet, torrent) = (magnet?, torrent?);
        let poster = html::select_attr(&document, "img.img-responsive", "src")
            .filter(|src| !src.trim().is_empty())
            .map(|src| html::absolutize(base_url, &src));
        let screenshots = html::select_all_attr(&document, ".tab-content img.img-fluid", "src")
            .into_iter()
            .filter(|src| !src.trim().is_empty())
            .map(|src| html::absolutize(base_url, &src))
            .collect();

        Some(DetailFields {
            magnet: Some(magnet),
            torrent: Some(torrent),
            category,
            poster,
            screenshots,
        })
    }

    /// Reads `(current, total)` from `ul.pagination`.
    ///
    /// The total is the highest numbered link and the current page is the
    /// first word of the active item. Falls back to `(None, None)` unless
    /// both are readable.
    pub fn extract_pagination(document: &Html) -> Pagination {
        let Some(list) = html::select_doc(document, "ul.pagination").into_iter().next() else {
            return Pagination::UNKNOWN;
        };

        let total = html::select_all_text(document, "ul.pagination a")
            .iter()
            .filter_map(|text| text.parse::<u32>().ok())
            .max();
        let current = html::select_first(list, "li.active span").and_then(|span| {
            html::text_of(span)
                .split(' ')
                .next()
                .and_then(pagination::page_number)
        });

        match (current, total) {
            (Some(current), Some(total)) => Pagination::new(Some(current), Some(total)),
            _ => Pagination::UNKNOWN,
        }
    }
}

enum RowOutcome {
    Record(Box<ResultRecord>),
    Skip,
    End,
}

impl Default for Torlock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for Torlock {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn name(&self) -> &'static str {
        "Tor Lock"
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
        self.fetch_listing(&url, &params, SEARCH_ROW_OFFSET).await
    }

    async fn trending(&self, params: QueryParams) -> Result<ResultEnvelope> {
        let url = self.trending_url(&params);
        self.fetch_listing(&url, &params, 0).await
    }

    async fn recent(&self, params: QueryParams) -> Result<ResultEnvelope> {
        let url = self.recent_url(&params);
        self.fetch_listing(&url, &params, 0).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: usize, malformed: bool) -> String {
        let name = if malformed {
            "<td></td>".to_string()
        } else {
            format!(
                r#"<td><a href="/torrent/{i}/release-{i}.html"><b>Release {i}</b></a></td>"#,
                i = index
            )
        };
        format!(
            r#"<tr>{name}<td>1/{d}/2024</td><td>{i}.5 GB</td><td class="tul">{s}</td><td class="tdl">{l}</td></tr>"#,
            name = name,
            i = index,
            d = index + 1,
            s = 100 + index,
            l = index
        )
    }

    fn page(rows: &[String], pagination: &str) -> String {
        format!(
            r#"<html><body><table><tr><th>Name</th><th>Added</th><th>Size</th><th>Seeds</th><th>Peers</th></tr>{}</table>{}</body></html>"#,
            rows.join(""),
            pagination
        )
    }

    fn rows(count: usize) -> Vec<String> {
        (0..count).map(|i| row(i, false)).collect()
    }

    #[test]
    fn parses_row_fields() {
        let listing = Torlock::parse_listing(&page(&rows(1), ""), BASE_URL, 50, 0);
        let record = &listing.records[0];
        assert_eq!(record.name, "Release 0");
        assert_eq!(record.url, "https://www.torlock.com/torrent/0/release-0.html");
        assert_eq!(record.date, "1/1/2024");
        assert_eq!(record.size, "0.5 GB");
        assert_eq!(record.seeders, "100");
        assert_eq!(record.leechers, "0");
        assert!(record.magnet.is_empty());
    }

    #[test]
    fn search_pages_skip_layout_rows() {
        let mut html_rows: Vec<String> = (0..4)
            .map(|i| format!("<tr><td><a href=\"/layout/{}\">Layout</a></td></tr>", i))
            .collect();
        html_rows.extend(rows(3));
        // header row + 4 layout rows = 5 skipped
        let listing =
            Torlock::parse_listing(&page(&html_rows, ""), BASE_URL, 50, SEARCH_ROW_OFFSET);
        let names: Vec<&str> = listing.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Release 0", "Release 1", "Release 2"]);
    }

    #[test]
    fn malformed_row_is_skipped_without_affecting_siblings() {
        let html_rows: Vec<String> = (0..5).map(|i| row(i, i == 3)).collect();
        let listing = Torlock::parse_listing(&page(&html_rows, ""), BASE_URL, 50, 0);
        assert_eq!(listing.records.len(), 4);
        assert!(listing.records.iter().all(|r| r.name != "Release 3"));
    }

    #[test]
    fn limit_keeps_first_records_in_document_order() {
        let listing = Torlock::parse_listing(&page(&rows(10), ""), BASE_URL, 3, 0);
        let names: Vec<&str> = listing.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Release 0", "Release 1", "Release 2"]);
    }

    #[test]
    fn pagination_reads_active_item_and_page_links() {
        let pagination = r#"<ul class="pagination">
            <li><a href="/p/1">1</a></li>
            <li class="active"><span>2 <span class="sr-only">(current)</span></span></li>
            <li><a href="/p/3">3</a></li>
            <li><a href="/p/40">40</a></li>
            <li><a href="/p/3">&raquo;</a></li>
        </ul>"#;
        let listing = Torlock::parse_listing(&page(&rows(1), pagination), BASE_URL, 50, 0);
        assert_eq!(listing.pagination, Pagination::new(Some(2), Some(40)));
    }

    #[test]
    fn pagination_total_is_highest_page_link() {
        let pagination = r#"<ul class="pagination">
            <li class="active"><span>1</span></li>
            <li><a href="/p/2">2</a></li>
            <li><a href="/p/57">57</a></li>
            <li><a href="/p/3">3</a></li>
            <li><a href="/p/2">&raquo;</a></li>
        </ul>"#;
        let listing = Torlock::parse_listing(&page(&rows(1), pagination), BASE_URL, 50, 0);
        assert_eq!(listing.pagination, Pagination::new(Some(1), Some(57)));
    }

    #[test]
    fn missing_or_partial_pagination_is_unknown() {
        let listing = Torlock::parse_listing(&page(&rows(1), ""), BASE_URL, 50, 0);
        assert_eq!(listing.pagination, Pagination::UNKNOWN);

        let no_active = r#"<ul class="pagination"><li><a>1</a></li><li><a>9</a></li><li><a>next</a></li></ul>"#;
        let listing = Torlock::parse_listing(&page(&rows(1), no_active), BASE_URL, 50, 0);
        assert_eq!(listing.pagination, Pagination::UNKNOWN);
    }

    #[test]
    fn parsing_is_idempotent() {
        let html = page(&rows(5), "");
        assert_eq!(
            Torlock::parse_listing(&html, BASE_URL, 50, 0),
            Torlock::parse_listing(&html, BASE_URL, 50, 0)
        );
    }

    #[test]
    fn details_require_magnet_and_torrent() {
        let full = r#"<html><body>
            <a href="/cat/movies.html">Movies</a>
            <a href="/tor/123.torrent">Download</a>
            <a href="magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567&dn=x">Magnet</a>
            <a href="magnet:?xt=urn:btih:ffffffffffffffffffffffffffffffffffffffff">Second</a>
            <img class="img-responsive" src="/posters/123.jpg">
            <div class="tab-content"><img class="img-fluid" src="https://img.example/1.jpg"><img class="img-fluid" src=""></div>
        </body></html>"#;
        let fields = Torlock::extract_details(full, BASE_URL).unwrap();
        assert!(fields.magnet.as_deref().unwrap().contains("0123456789abcdef"));
        assert_eq!(fields.torrent.as_deref(), Some("https://www.torlock.com/tor/123.torrent"));
        assert_eq!(fields.category.as_deref(), Some("Movies"));
        assert_eq!(fields.poster.as_deref(), Some("https://www.torlock.com/posters/123.jpg"));
        assert_eq!(fields.screenshots, vec!["https://img.example/1.jpg".to_string()]);

        let no_torrent = r#"<a href="magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567">m</a>"#;
        assert!(Torlock::extract_details(no_torrent, BASE_URL).is_none());
    }

    #[test]
    fn category_urls_use_slugs_and_aliases() {
        let torlock = Torlock::new();
        let books = QueryParams::default().with_category("Books");
        assert_eq!(torlock.trending_url(&books), "https://www.torlock.com/ebooks.html");

        let mut movies = QueryParams::default().with_category("movies");
        movies.page = 3;
        assert_eq!(
            torlock.recent_url(&movies),
            "https://www.torlock.com/movies/3/added/desc.html"
        );
        assert_eq!(
            torlock.recent_url(&QueryParams::default()),
            "https://www.torlock.com/fresh.html"
        );
        assert_eq!(torlock.trending_url(&QueryParams::default()), BASE_URL);
    }
}

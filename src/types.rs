//! Core data types for torrent listings and queries.
//!
//! This module defines the fundamental data structures used throughout Torrex:
//!
//! - [`ResultRecord`] - One torrent listing, normalized across sites
//! - [`Listing`] - Records and pagination parsed from one page
//! - [`ResultEnvelope`] - The response to one query, with timing and count
//! - [`QueryParams`] - Per-call query, page, limit and category
//!
//! All of these are built fresh per query and carry no identity across calls.
//!
//! # Examples
//!
//! ```rust
//! use torrex::types::*;
//!
//! let mut record = ResultRecord::new("Ubuntu 22.04 LTS", "https://bitsearch.to/torrent/1");
//! record.magnet = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef01234567".to_string();
//! record.derive_hash();
//! assert!(record.is_actionable());
//! ```

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::magnet;
use crate::pagination::Pagination;

/// Default for text fields that could not be read.
pub const UNKNOWN: &str = "Unknown";
/// Default for fields a site does not publish.
pub const NOT_AVAILABLE: &str = "N/A";
/// Default for seeder and leecher counts.
pub const ZERO: &str = "0";

/// One torrent listing.
///
/// Every field is a string as the site printed it, apart from the optional
/// adapter-specific extras. Missing values use the documented defaults
/// ([`UNKNOWN`], [`NOT_AVAILABLE`], [`ZERO`] or empty) rather than failing.
///
/// # Fields
///
/// * `name` - Display name of the torrent
/// * `size` - Size as printed by the site (`"1.4 GB"`)
/// * `seeders`, `leechers` - Peer counts as printed
/// * `category`, `date` - Site taxonomy and upload date
/// * `magnet` - Magnet URI, empty until found or enriched
/// * `torrent` - `.torrent` file URL, possibly empty
/// * `url` - Canonical detail page URL
/// * `hash` - 32 to 40 hex characters, taken from the magnet or the detail URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub name: String,
    pub size: String,
    pub seeders: String,
    pub leechers: String,
    pub category: String,
    pub date: String,
    pub magnet: String,
    pub torrent: String,
    pub url: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,

    /// Uploader name, for sites that show one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploader: Option<String>,

    /// Coarse resolution class derived from the name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub screenshots: Vec<String>,
}

impl ResultRecord {
    /// Creates a record with every other field at its default.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: UNKNOWN.to_string(),
            seeders: ZERO.to_string(),
            leechers: ZERO.to_string(),
            category: UNKNOWN.to_string(),
            date: UNKNOWN.to_string(),
            magnet: String::new(),
            torrent: String::new(),
            url: url.into(),
            hash: None,
            uploader: None,
            quality: None,
            poster: None,
            screenshots: Vec::new(),
        }
    }

    /// Fills `hash` from the magnet link, or from a 40-hex identifier in the
    /// detail URL when there is no magnet.
    ///
    /// An existing valid hash is kept. An invalid one is cleared.
    pub fn derive_hash(&mut self) {
        if self.hash.as_deref().is_some_and(magnet::is_valid_hash) {
            return;
        }
        self.hash = magnet::extract_hash(&self.magnet).or_else(|| {
            if self.magnet.is_empty() {
                magnet::hash_in_url(&self.url)
            } else {
                None
            }
        });
    }

    /// A record is actionable when it has a name and either a magnet link or
    /// a valid content hash.
    pub fn is_actionable(&self) -> bool {
        !self.name.trim().is_empty()
            && (self.magnet.starts_with("magnet:")
                || self.hash.as_deref().is_some_and(magnet::is_valid_hash))
    }
}

/// Records and pagination parsed from one document.
///
/// Parsers return a `Listing` so the same input always gives an equal value;
/// timing is added later by [`ResultEnvelope::from_listing`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub records: Vec<ResultRecord>,
    pub pagination: Pagination,
}

impl Listing {
    pub fn new(records: Vec<ResultRecord>, pagination: Pagination) -> Self {
        Self {
            records,
            pagination,
        }
    }

    /// No records, with the given pagination fallback.
    pub fn empty(pagination: Pagination) -> Self {
        Self::new(Vec::new(), pagination)
    }
}

/// The response to one query.
///
/// Serialized with the field names consumers expect: `data`, `current_page`,
/// `total_pages`, `total` and `time`.
///
/// # Examples
///
/// ```rust
/// use std::time::Instant;
/// use torrex::{Listing, Pagination, ResultEnvelope};
///
/// let envelope = ResultEnvelope::from_listing(Listing::empty(Pagination::SINGLE), Instant::now());
/// assert_eq!(envelope.total, 0);
/// assert!(envelope.is_well_formed());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub data: Vec<ResultRecord>,
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
    pub total: usize,
    /// Wall-clock seconds for the whole operation
    #[serde(rename = "time")]
    pub elapsed_time: f64,
}

impl ResultEnvelope {
    /// Stamps a parsed listing with its record count and the time elapsed
    /// since `started`.
    pub fn from_listing(listing: Listing, started: Instant) -> Self {
        Self {
            total: listing.records.len(),
            current_page: listing.pagination.current_page,
            total_pages: listing.pagination.total_pages,
            data: listing.records,
            elapsed_time: started.elapsed().as_secs_f64(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `total` matches the data, time is non-negative and `total_pages` is
    /// not below `current_page`.
    pub fn is_well_formed(&self) -> bool {
        let pages = Pagination {
            current_page: self.current_page,
            total_pages: self.total_pages,
        };
        self.total == self.data.len() && self.elapsed_time >= 0.0 && pages.is_consistent()
    }
}

/// Per-call query parameters.
///
/// The limit travels with each call, never on the adapter, so one adapter
/// instance can serve concurrent queries.
///
/// # Builder Usage
///
/// ```rust
/// use torrex::types::QueryParamsBuilder;
///
/// let params = QueryParamsBuilder::default()
///     .query("ubuntu")
///     .page(2u32)
///     .limit(10usize)
///     .build()
///     .unwrap();
/// assert_eq!(params.page, 2);
/// assert_eq!(params.limit_or(50), 10);
/// ```
///
/// # Fields
///
/// * `query` - Search terms, empty for trending and recent listings
/// * `page` - 1-based page number
/// * `limit` - Maximum records; 0 means the adapter's ceiling
/// * `category` - Adapter-defined category for trending and recent listings
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(setter(into))]
pub struct QueryParams {
    #[builder(default)]
    pub query: String,
    #[builder(default = "1")]
    pub page: u32,
    #[builder(default)]
    pub limit: usize,
    #[builder(default)]
    pub category: Option<String>,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            query: String::new(),
            page: 1,
            limit: 0,
            category: None,
        }
    }
}

impl QueryParams {
    /// Page number, treating 0 as the first page.
    pub fn page(&self) -> u32 {
        self.page.max(1)
    }

    /// The effective limit: `ceiling` when unset, otherwise the limit itself.
    pub fn limit_or(&self, ceiling: usize) -> usize {
        if self.limit == 0 { ceiling } else { self.limit }
    }

    /// Copy of these parameters with the limit resolved against `ceiling`:
    /// 0 and values above the ceiling become the ceiling.
    pub fn clamped(&self, ceiling: usize) -> Self {
        let limit = if self.limit == 0 || self.limit > ceiling {
            ceiling
        } else {
            self.limit
        };
        Self {
            limit,
            ..self.clone()
        }
    }

    /// Sets the category.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

impl From<String> for QueryParams {
    /// Creates query parameters from a query string.
    ///
    /// ```rust
    /// use torrex::types::QueryParams;
    ///
    /// let params: QueryParams = "ubuntu".to_string().into();
    /// assert_eq!(params.query, "ubuntu");
    /// assert_eq!(params.page, 1);
    /// assert_eq!(params.limit, 0);
    /// ```
    fn from(query: String) -> Self {
        QueryParams {
            query,
            ..Default::default()
        }
    }
}

impl From<&str> for QueryParams {
    fn from(query: &str) -> Self {
        query.to_string().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn record_without_magnet_or_hash_is_not_actionable() {
        let mut record = ResultRecord::new("Ubuntu", "https://example.com/torrent/1");
        record.derive_hash();
        assert_eq!(record.hash, None);
        assert!(!record.is_actionable());
    }

    #[test]
    fn hash_comes_from_magnet_before_url() {
        let mut record =
            ResultRecord::new("Ubuntu", format!("https://example.com/{}/x", "f".repeat(40)));
        record.magnet = format!("magnet:?xt=urn:btih:{}&dn=Ubuntu", HASH);
        record.derive_hash();
        assert_eq!(record.hash.as_deref(), Some(HASH));
        assert!(record.magnet.contains(record.hash.as_deref().unwrap()));
    }

    #[test]
    fn hash_in_detail_url_makes_record_actionable() {
        let mut record =
            ResultRecord::new("Ubuntu", format!("https://example.com/{}/ubuntu", HASH));
        record.derive_hash();
        assert_eq!(record.hash.as_deref(), Some(HASH));
        assert!(record.is_actionable());
    }

    #[test]
    fn blank_name_is_never_actionable() {
        let mut record = ResultRecord::new("  ", "https://example.com");
        record.magnet = format!("magnet:?xt=urn:btih:{}", HASH);
        assert!(!record.is_actionable());
    }

    #[test]
    fn envelope_serializes_time_field() {
        let mut envelope = ResultEnvelope::from_listing(
            Listing::new(vec![ResultRecord::new("a", "u")], Pagination::SINGLE),
            Instant::now(),
        );
        envelope.elapsed_time = 0.5;
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["time"], 0.5);
        assert_eq!(json["total"], 1);
        assert_eq!(json["current_page"], 1);
        assert!(json["data"][0].get("hash").is_none());
    }

    #[test]
    fn envelope_with_wrong_total_is_malformed() {
        let mut envelope =
            ResultEnvelope::from_listing(Listing::empty(Pagination::UNKNOWN), Instant::now());
        assert!(envelope.is_well_formed());
        envelope.total = 3;
        assert!(!envelope.is_well_formed());
    }

    #[test]
    fn envelope_pages_follow_pagination_consistency() {
        let mut envelope =
            ResultEnvelope::from_listing(Listing::empty(Pagination::SINGLE), Instant::now());
        envelope.total_pages = None;
        assert!(envelope.is_well_formed());

        envelope.current_page = Some(4);
        envelope.total_pages = Some(2);
        assert!(!envelope.is_well_formed());

        envelope.current_page = Some(0);
        envelope.total_pages = Some(2);
        assert!(!envelope.is_well_formed());
    }

    #[test]
    fn limit_is_clamped_to_ceiling() {
        let params = QueryParams {
            limit: 500,
            ..QueryParams::default()
        };
        assert_eq!(params.clamped(50).limit, 50);
        assert_eq!(QueryParams::default().clamped(50).limit, 50);
        assert_eq!(
            QueryParams {
                limit: 7,
                ..QueryParams::default()
            }
            .clamped(50)
            .limit,
            7
        );
    }

    #[test]
    fn builder_defaults_to_first_page() {
        let params = QueryParamsBuilder::default().build().unwrap();
        assert_eq!(params, QueryParams::default());
    }
}

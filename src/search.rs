//! Fluent query builder and consumer-facing outcome classification.
//!
//! Consumers usually go through [`Sources::search`], which returns a
//! [`SearchBuilder`]. The builder resolves to either a [`ResultEnvelope`] or a
//! [`SearchFailure`], which keeps apart the cases a consumer has to answer
//! differently: unknown site, no results, broken scraper and invalid response.
//!
//! # Examples
//!
//! ```rust,no_run
//! use torrex::prelude::*;
//!
//! # async fn example() {
//! let sources = Sources::with_all(FetchConfig::default());
//!
//! // One site
//! match sources.search("ubuntu").page(2).limit(10).from_source("bitsearch").await {
//!     Ok(envelope) => {
//!         let best = envelope.data.sort_by_seeders();
//!         println!("{} results, best: {:?}", best.len(), best.first().map(|r| &r.name));
//!     }
//!     Err(failure) => eprintln!("{}: {}", failure.status_code(), failure),
//! }
//!
//! // Every site, each outcome kept separate
//! for (site, outcome) in sources.search("ubuntu").group().await {
//!     println!("{}: {:?}", site, outcome.map(|e| e.total));
//! }
//! # }
//! ```

use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    error::Result,
    source::{Operation, Sources},
    types::{QueryParams, ResultEnvelope, ResultRecord},
};

/// Builder for one query, bound to a [`Sources`] registry.
pub struct SearchBuilder<'a> {
    sources: &'a Sources,
    params: QueryParams,
    operation: Operation,
}

impl<'a> SearchBuilder<'a> {
    pub(crate) fn new(sources: &'a Sources, query: impl Into<String>) -> Self {
        Self {
            sources,
            params: QueryParams::from(query.into()),
            operation: Operation::Search,
        }
    }

    /// Sets the 1-based page number.
    pub fn page(mut self, page: u32) -> Self {
        self.params.page = page;
        self
    }

    /// Sets the maximum number of records. 0 means the site's ceiling, and
    /// larger values are clamped to it.
    pub fn limit(mut self, limit: usize) -> Self {
        self.params.limit = limit;
        self
    }

    /// Sets the category for trending and recent listings.
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.params.category = Some(category.into());
        self
    }

    /// Runs the trending listing instead of a search.
    pub fn trending(mut self) -> Self {
        self.operation = Operation::Trending;
        self
    }

    /// Runs the recent listing instead of a search.
    pub fn recent(mut self) -> Self {
        self.operation = Operation::Recent;
        self
    }

    /// Runs the query on one site.
    pub async fn from_source(
        self,
        site: &str,
    ) -> std::result::Result<ResultEnvelope, SearchFailure> {
        self.sources.query(site, self.operation, self.params).await
    }

    /// Runs the query on every registered site and returns each outcome
    /// separately. Results are not merged.
    pub async fn group(self) -> Vec<(String, std::result::Result<ResultEnvelope, SearchFailure>)> {
        self.sources.query_all(self.operation, self.params).await
    }

    /// Returns the parameters without running anything.
    pub fn build(self) -> QueryParams {
        self.params
    }
}

/// Consumer-facing classification of a query outcome.
///
/// The HTTP-equivalent codes are what a thin REST layer would answer with.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SearchFailure {
    /// No adapter is registered under the requested id.
    #[error("site {site} is not available")]
    SiteNotAvailable { site: String },

    /// The site was reached and parsed, but listed nothing usable.
    #[error("no results for {query:?} on {site}")]
    NoResults { site: String, query: String },

    /// The adapter's pipeline failed as a whole.
    #[error("scraper for {site} is broken: {reason}")]
    ScraperBroken { site: String, reason: String },

    /// The adapter returned an envelope that breaks its invariants.
    #[error("invalid response from {site}: {reason}")]
    InvalidResponse { site: String, reason: String },
}

impl SearchFailure {
    /// HTTP-equivalent status: 404, 404, 503 and 500 respectively.
    pub fn status_code(&self) -> u16 {
        match self {
            SearchFailure::SiteNotAvailable { .. } | SearchFailure::NoResults { .. } => 404,
            SearchFailure::ScraperBroken { .. } => 503,
            SearchFailure::InvalidResponse { .. } => 500,
        }
    }

    /// Maps an adapter outcome onto the consumer-facing classes.
    ///
    /// ```rust
    /// use std::time::Instant;
    /// use torrex::{Error, Listing, Pagination, ResultEnvelope, SearchFailure};
    ///
    /// let empty = ResultEnvelope::from_listing(Listing::empty(Pagination::SINGLE), Instant::now());
    /// let failure = SearchFailure::classify("bitsearch", "ubuntu", Ok(empty)).unwrap_err();
    /// assert_eq!(failure.status_code(), 404);
    ///
    /// let broken = SearchFailure::classify("bitsearch", "ubuntu", Err(Error::parse("layout changed")));
    /// assert_eq!(broken.unwrap_err().status_code(), 503);
    /// ```
    pub fn classify(
        site: &str,
        query: &str,
        outcome: Result<ResultEnvelope>,
    ) -> std::result::Result<ResultEnvelope, SearchFailure> {
        match outcome {
            Err(e) => {
                warn!(source = %site, error = %e, "Scraper failed");
                Err(SearchFailure::ScraperBroken {
                    site: site.to_string(),
                    reason: e.to_string(),
                })
            }
            Ok(envelope) if !envelope.is_well_formed() => Err(SearchFailure::InvalidResponse {
                site: site.to_string(),
                reason: format!(
                    "total {} for {} records, page {:?} of {:?}",
                    envelope.total,
                    envelope.data.len(),
                    envelope.current_page,
                    envelope.total_pages
                ),
            }),
            Ok(envelope) if envelope.is_empty() => {
                debug!(source = %site, query = %query, "No results");
                Err(SearchFailure::NoResults {
                    site: site.to_string(),
                    query: query.to_string(),
                })
            }
            Ok(envelope) => Ok(envelope),
        }
    }
}

/// Extension methods for record lists.
///
/// None of these merge or deduplicate across sites; they work on one
/// site's records.
pub trait RecordsExt {
    /// Sorts by seeder count, highest first. Unparsable counts sort last,
    /// ties keep document order.
    fn sort_by_seeders(self) -> Self;

    /// Keeps records whose name contains `query`, ignoring case. An empty
    /// query keeps everything.
    fn filter_query(self, query: &str) -> Self;

    /// Keeps records that have a name and a magnet link or hash.
    fn actionable(self) -> Self;
}

impl RecordsExt for Vec<ResultRecord> {
    fn sort_by_seeders(mut self) -> Self {
        self.sort_by_key(|record| std::cmp::Reverse(peer_count(&record.seeders)));
        self
    }

    fn filter_query(mut self, query: &str) -> Self {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return self;
        }
        self.retain(|record| record.name.to_lowercase().contains(&needle));
        self
    }

    fn actionable(mut self) -> Self {
        self.retain(ResultRecord::is_actionable);
        self
    }
}

/// Parses a peer count as printed by a site ("1,204", " 17 ").
pub(crate) fn peer_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(|c| *c != ',' && !c.is_whitespace()).collect();
    digits.parse().ok()
}

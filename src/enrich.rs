//! Detail enricher - fills list-page records from their detail pages.
//!
//! Some sites list results without a magnet link or category. For those the
//! adapter collects the detail URLs of the records it kept, and
//! [`DetailEnricher::enrich`] fetches them concurrently, runs the adapter's
//! extractor on each page and merges the extracted [`DetailFields`] back into
//! every record whose `url` matches.
//!
//! Each fetch has its own timeout. A failed or unparsable detail page is
//! recorded in the [`EnrichmentReport`] and leaves its record untouched; it
//! never cancels sibling fetches or fails the operation.

use encoding_rs::Encoding;
use futures::stream::{self, StreamExt};
use thiserror::Error;
use tracing::debug;

use crate::net::{FetchError, Session, TimeoutPolicy};
use crate::types::ResultRecord;

/// Default number of detail pages fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Fields read from one detail page. `None` leaves the record's value as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailFields {
    pub magnet: Option<String>,
    pub torrent: Option<String>,
    pub category: Option<String>,
    pub poster: Option<String>,
    pub screenshots: Vec<String>,
}

impl DetailFields {
    /// Merges these fields into `record` and re-derives its hash.
    pub fn apply(&self, record: &mut ResultRecord) {
        if let Some(magnet) = &self.magnet {
            record.magnet = magnet.clone();
            record.hash = None;
        }
        if let Some(torrent) = &self.torrent {
            record.torrent = torrent.clone();
        }
        if let Some(category) = &self.category {
            record.category = category.clone();
        }
        if let Some(poster) = &self.poster {
            record.poster = Some(poster.clone());
        }
        if !self.screenshots.is_empty() {
            record.screenshots = self.screenshots.clone();
        }
        record.derive_hash();
    }
}

/// Why a single detail page could not be used.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrichError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("detail page {url} is missing required fields")]
    Incomplete { url: String },
}

/// Per-URL outcome of one enrichment round.
#[derive(Debug, Default)]
pub struct EnrichmentReport {
    /// Detail pages whose fields were merged.
    pub enriched: usize,
    /// Detail pages that failed, with the reason.
    pub failed: Vec<(String, EnrichError)>,
    /// Detail URLs that matched no record and were not fetched.
    pub unmatched: usize,
}

impl EnrichmentReport {
    pub fn attempted(&self) -> usize {
        self.enriched + self.failed.len()
    }
}

/// Bounded concurrent fetcher of detail pages.
#[derive(Debug, Clone)]
pub struct DetailEnricher {
    concurrency: usize,
    policy: TimeoutPolicy,
    encoding: Option<&'static Encoding>,
}

impl Default for DetailEnricher {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY, TimeoutPolicy::detail())
    }
}

impl DetailEnricher {
    /// Creates an enricher. A concurrency of 0 is treated as 1.
    pub fn new(concurrency: usize, policy: TimeoutPolicy) -> Self {
        Self {
            concurrency: concurrency.max(1),
            policy,
            encoding: None,
        }
    }

    /// Decodes detail pages with `encoding` instead of the declared charset.
    pub fn with_encoding(mut self, encoding: Option<&'static Encoding>) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Fetches every URL in `detail_urls` that matches a record's `url` and
    /// merges what `extract` returns into the matching records.
    ///
    /// `extract` receives the decoded page and its URL and returns `None`
    /// when the page lacks the fields the adapter requires. Duplicate URLs
    /// are fetched once. Records without a matching URL are not touched.
    pub async fn enrich<F>(
        &self,
        session: &Session,
        records: &mut [ResultRecord],
        detail_urls: &[String],
        extract: F,
    ) -> EnrichmentReport
    where
        F: Fn(&str, &str) -> Option<DetailFields> + Sync,
    {
        let mut report = EnrichmentReport::default();
        let mut targets: Vec<String> = Vec::new();
        for url in detail_urls {
            if targets.contains(url) {
                continue;
            }
            if records.iter().any(|record| &record.url == url) {
                targets.push(url.clone());
            } else {
                report.unmatched += 1;
            }
        }

        if targets.is_empty() {
            return report;
        }

        debug!(
            count = targets.len(),
            concurrency = self.concurrency,
            "Fetching detail pages for enrichment"
        );

        let extract = &extract;
        let outcomes: Vec<(String, Result<DetailFields, EnrichError>)> = stream::iter(targets)
            .map(|url| async move {
                let outcome = match session.get_text(&url, self.policy, self.encoding).await {
                    Ok(page) => extract(&page.text, &url).ok_or_else(|| EnrichError::Incomplete {
                        url: url.clone(),
                    }),
                    Err(e) => Err(EnrichError::from(e)),
                };
                (url, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (url, outcome) in outcomes {
            match outcome {
                Ok(fields) => {
                    for record in records.iter_mut().filter(|record| record.url == url) {
                        fields.apply(record);
                    }
                    report.enriched += 1;
                }
                Err(e) => {
                    debug!(url = %url, error = %e, "Detail page not used");
                    report.failed.push((url, e));
                }
            }
        }

        report
    }
}

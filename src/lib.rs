//! # Torrex - Multi-site torrent search scraping library
//!
//! Torrex queries several public torrent index sites, parses their HTML result
//! pages and normalizes every result into one [`ResultRecord`] shape, wrapped
//! in a [`ResultEnvelope`] with pagination and timing. Each site is a
//! [`Source`] adapter; a [`Sources`] registry looks adapters up by id, clamps
//! limits to each site's ceiling and classifies outcomes for consumers.
//!
//! ## Features
//!
//! - **One record shape**: Every site yields the same fields with the same
//!   defaults for missing values
//! - **Tolerant parsing**: A malformed result is skipped, never fatal to its
//!   siblings
//! - **Detail enrichment**: Concurrent, bounded detail-page fetches where a
//!   list page lacks magnet links
//! - **Magnet synthesis**: Magnets built from info hashes when a site prints
//!   only the hash
//! - **Legacy encodings**: Latin-1 and Windows-1252 pages decoded without loss
//! - **Fluent Builder Pattern**: `sources.search("q").page(2).limit(10)`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use torrex::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> torrex::Result<()> {
//!     let sources = Sources::with_all(FetchConfig::from_env()?);
//!
//!     match sources.search("ubuntu").limit(20).from_source("torlock").await {
//!         Ok(envelope) => {
//!             for record in envelope.data.sort_by_seeders() {
//!                 println!("{} [{}] {}", record.name, record.seeders, record.magnet);
//!             }
//!         }
//!         Err(failure) => eprintln!("{} ({})", failure, failure.status_code()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Calling an adapter directly
//!
//! ```rust,no_run
//! use torrex::prelude::*;
//! use torrex::sources::Bitsearch;
//!
//! # async fn example() -> torrex::Result<()> {
//! let bitsearch = Bitsearch::new();
//! let envelope = bitsearch.trending(QueryParams::default()).await?;
//! println!("{} results in {:.2}s", envelope.total, envelope.elapsed_time);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`source`]: The adapter trait, per-site configuration and the registry
//! - [`search`]: Fluent query builder, outcome classification, record helpers
//! - [`sources`]: One adapter per site, each behind a feature flag
//! - [`types`]: Records, listings, envelopes and query parameters
//! - [`net`]: Fetcher, HTML helpers and encoding resolution
//! - [`enrich`]: Bounded concurrent detail-page enrichment
//! - [`magnet`]: Hash extraction and magnet synthesis
//! - [`pagination`]: Page position helpers
//! - [`error`]: Error types
//!
//! Torrex logs through [`tracing`] and installs no subscriber.

pub mod enrich;
pub mod error;
pub mod magnet;
pub mod net;
pub mod pagination;
pub mod search;
pub mod source;
pub mod sources;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use torrex::prelude::*;
///
/// let params = QueryParams::from("ubuntu").with_category("software");
/// assert_eq!(params.page, 1);
/// ```
pub mod prelude {
    pub use crate::{
        net::{FetchConfig, TimeoutPolicy},
        pagination::Pagination,
        search::{RecordsExt, SearchBuilder, SearchFailure},
        source::{Operation, Source, SourceConfig, Sources},
        types::{Listing, QueryParams, ResultEnvelope, ResultRecord},
    };
}

// Re-export main types at crate root for direct access
pub use error::{Error, Result};
pub use pagination::Pagination;
pub use search::{RecordsExt, SearchBuilder, SearchFailure};
pub use source::{Operation, Source, Sources};
pub use types::{Listing, QueryParams, ResultEnvelope, ResultRecord};

//! Torrent site adapters with conditional compilation support.
//!
//! This module contains all site adapters, each behind its own feature flag
//! so minimal builds only include the sites they need.
//!
//! # Feature Flags
//!
//! - `source-bitsearch` - Enables [`Bitsearch`]
//! - `source-glodls` - Enables [`Glodls`]
//! - `source-torlock` - Enables [`Torlock`]
//! - `source-torrentdownload` - Enables [`TorrentDownload`]
//! - `all-sources` - Enables all adapters (default)
//!
//! # Examples
//!
//! Build with only Torlock support:
//! ```bash
//! cargo build --no-default-features --features source-torlock
//! ```
//!
//! # Adapter layout
//!
//! Every adapter follows the same shape: `new()` and `with_config()`
//! constructors, a `default_config()` with the site's base URL and result
//! ceiling, a pure `parse_listing()` that turns one HTML document into a
//! [`Listing`](crate::Listing), and an `extract_pagination()` that never fails.

use tracing::debug;

use crate::types::ResultRecord;

#[cfg(feature = "source-bitsearch")]
pub mod bitsearch;

#[cfg(feature = "source-glodls")]
pub mod glodls;

#[cfg(feature = "source-torlock")]
pub mod torlock;

#[cfg(feature = "source-torrentdownload")]
pub mod torrentdownload;

#[cfg(feature = "source-bitsearch")]
pub use bitsearch::Bitsearch;

#[cfg(feature = "source-glodls")]
pub use glodls::{Glodls, GlodlsStrategy};

#[cfg(feature = "source-torlock")]
pub use torlock::Torlock;

#[cfg(feature = "source-torrentdownload")]
pub use torrentdownload::TorrentDownload;

/// Derives the record's hash and keeps it only when it is actionable.
#[allow(dead_code)]
pub(crate) fn viable(source: &str, mut record: ResultRecord) -> Option<ResultRecord> {
    record.derive_hash();
    if record.is_actionable() {
        Some(record)
    } else {
        debug!(source = %source, name = %record.name, "Dropping record without magnet or hash");
        None
    }
}

/// Returns `text`, or `default` when it is blank.
#[allow(dead_code)]
pub(crate) fn or_default(text: Option<String>, default: &str) -> String {
    text.map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| default.to_string())
}

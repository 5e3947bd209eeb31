//! Error types and result handling for Torrex operations.
//!
//! This module defines the error handling system used throughout Torrex.
//! All fallible operations return a [`Result<T>`] which is a type alias for
//! `std::result::Result<T, Error>`.
//!
//! # Error Categories
//!
//! - **Fetch Errors**: Timeouts, connection failures and HTTP status failures
//!   raised by the fetcher, already classified by [`FetchError`]
//! - **Decode Errors**: Responses that no candidate encoding could decode
//! - **Parse Errors**: Pages whose layout no longer matches the adapter
//! - **Source Errors**: Site-specific errors with context
//! - **Config Errors**: Invalid configuration values or environment
//!
//! Adapters surface an [`Error`] only when their whole pipeline failed. A page
//! that was reached but listed nothing is returned as an empty envelope, and a
//! single malformed record never produces an error at all.
//!
//! # Examples
//!
//! ```rust
//! use torrex::error::{Error, Result};
//!
//! fn describe(result: Result<usize>) -> String {
//!     match result {
//!         Ok(count) => format!("{} records", count),
//!         Err(Error::Fetch(e)) if e.is_timeout() => "site timed out".to_string(),
//!         Err(e) => format!("scraper failed: {}", e),
//!     }
//! }
//! ```

use thiserror::Error;

pub use crate::net::FetchError;

/// Type alias for Results with Torrex errors.
///
/// # Examples
///
/// ```rust
/// use torrex::{Error, Result};
///
/// fn example_operation() -> Result<String> {
///     Ok("Success".to_string())
/// }
///
/// fn example_with_error() -> Result<()> {
///     Err(Error::parse("result table missing"))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all Torrex operations.
///
/// # Variants
///
/// * [`Fetch`](Error::Fetch) - A classified transport failure for one URL
/// * [`Network`](Error::Network) - HTTP client construction errors
/// * [`Decode`](Error::Decode) - Response bytes could not be decoded
/// * [`Parse`](Error::Parse) - Document layout did not match the adapter
/// * [`Source`](Error::Source) - Source-specific errors with context
/// * [`Config`](Error::Config) - Configuration loading errors
#[derive(Error, Debug)]
pub enum Error {
    /// A fetch of a single URL failed.
    ///
    /// The wrapped [`FetchError`] tells timeouts, client errors and unknown
    /// failures apart and keeps the URL that was being fetched.
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Errors from building the underlying HTTP client.
    ///
    /// Raised when a proxy URL or header cannot be accepted by reqwest.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The response could not be decoded by any candidate encoding.
    ///
    /// Only produced by strict decoding; the default decode path replaces
    /// invalid sequences and flags the result as lossy instead.
    #[error("Decode error: {0}")]
    Decode(String),

    /// HTML parsing and data format errors.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use torrex::Error;
    ///
    /// let error = Error::parse("result table missing");
    /// ```
    #[error("Parse error: {0}")]
    Parse(String),

    /// Source-specific errors with contextual information.
    ///
    /// # Fields
    ///
    /// * `src` - The identifier of the source that encountered the error
    /// * `message` - Descriptive error message explaining what went wrong
    ///
    /// # Examples
    ///
    /// ```rust
    /// use torrex::Error;
    ///
    /// let error = Error::source("glodls", "search endpoint unavailable");
    /// ```
    #[error("Source error [{src}]: {message}")]
    Source { src: String, message: String },

    /// Configuration could not be loaded or extracted.
    #[error("Config error: {0}")]
    Config(#[from] Box<figment::Error>),
}

impl Error {
    /// Creates a parse error with the given message.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use torrex::Error;
    ///
    /// let error = Error::parse("pagination widget changed");
    /// assert!(error.to_string().contains("pagination widget changed"));
    /// ```
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    /// Creates a source-specific error.
    ///
    /// # Parameters
    ///
    /// * `src` - The source identifier
    /// * `message` - Descriptive error message
    pub fn source(src: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Source {
            src: src.into(),
            message: message.into(),
        }
    }

    /// Creates a decode error with the given message.
    pub fn decode(msg: impl Into<String>) -> Self {
        Error::Decode(msg.into())
    }

    /// Returns `true` when retrying the same request could succeed.
    ///
    /// Only transport failures classified as retryable qualify. The library
    /// itself never retries; this is advisory for callers with a retry policy.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Fetch(e) => e.is_retryable(),
            _ => false,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Error::Config(Box::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_display_includes_site() {
        let error = Error::source("torlock", "detail page changed");
        let text = error.to_string();
        assert!(text.contains("torlock"));
        assert!(text.contains("detail page changed"));
    }

    #[test]
    fn fetch_errors_convert_and_keep_retry_class() {
        let timeout: Error = FetchError::Timeout {
            url: "https://example.com".to_string(),
        }
        .into();
        assert!(timeout.is_retryable());

        let fatal: Error = FetchError::Client {
            url: "https://example.com".to_string(),
            status: Some(404),
            reason: "HTTP 404 Not Found".to_string(),
        }
        .into();
        assert!(!fatal.is_retryable());
        assert!(!Error::parse("x").is_retryable());
    }
}

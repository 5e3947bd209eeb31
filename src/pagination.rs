//! Page position read from a site's pagination widget.
//!
//! Each adapter owns its own extractor because the markup differs per site,
//! but every extractor returns a [`Pagination`] and falls back to the site's
//! documented default instead of failing the parse. The helpers here are the
//! small pieces those extractors share: reading a page number out of link text
//! or out of a query parameter.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FIRST_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+").expect("valid page number pattern"));

/// Current and total page numbers of a listing. `None` means unknown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub current_page: Option<u32>,
    pub total_pages: Option<u32>,
}

impl Pagination {
    /// A single page: `(1, 1)`.
    pub const SINGLE: Pagination = Pagination {
        current_page: Some(1),
        total_pages: Some(1),
    };

    /// Nothing known: `(None, None)`.
    pub const UNKNOWN: Pagination = Pagination {
        current_page: None,
        total_pages: None,
    };

    /// Builds a pagination value, raising `total` to `current` when the page
    /// links visible on the current page stop short of it.
    ///
    /// ```rust
    /// use torrex::Pagination;
    ///
    /// let p = Pagination::new(Some(4), Some(3));
    /// assert_eq!(p.total_pages, Some(4));
    /// ```
    pub fn new(current: Option<u32>, total: Option<u32>) -> Self {
        let current = current.filter(|page| *page > 0);
        let total = match (current, total.filter(|page| *page > 0)) {
            (Some(current), Some(total)) => Some(total.max(current)),
            (_, total) => total,
        };
        Self {
            current_page: current,
            total_pages: total,
        }
    }

    /// `true` unless both values are known and `total < current`, or the
    /// current page is below 1. A value known on one side only is consistent.
    pub fn is_consistent(&self) -> bool {
        match (self.current_page, self.total_pages) {
            (Some(current), Some(total)) => current >= 1 && total >= current,
            _ => true,
        }
    }
}

/// First run of digits in `text`, as a page number.
///
/// ```rust
/// use torrex::pagination::page_number;
///
/// assert_eq!(page_number(" 12 "), Some(12));
/// assert_eq!(page_number("3 of 9"), Some(3));
/// assert_eq!(page_number("Next"), None);
/// ```
pub fn page_number(text: &str) -> Option<u32> {
    FIRST_NUMBER
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Value of query parameter `key` in `href`, parsed as a page number.
///
/// Works on relative links (`/search?q=x&p=7`) as well as absolute ones.
pub fn page_param(href: &str, key: &str) -> Option<u32> {
    let query = href.split_once('?').map(|(_, query)| query)?;
    let query = query.split('#').next().unwrap_or(query);
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then(|| value.trim().parse().ok()).flatten()
    })
}

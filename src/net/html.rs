//! HTML parsing utilities for torrent sites.
//!
//! This module provides convenient functions for parsing HTML content from
//! torrent index pages. It uses the `scraper` crate for CSS selector-based
//! parsing and `rayon` for parallel processing of independent result blocks.
//!
//! Every helper is tolerant: an invalid selector or a missing element yields
//! `None` or an empty vector, never a panic, so adapters can map each missing
//! field onto their own default.
//!
//! # Examples
//!
//! ```rust
//! use torrex::net::html;
//!
//! let document = html::parse(r#"
//!     <div class="result">
//!         <h3 class="title"><a href="/torrent/1">Ubuntu 22.04</a></h3>
//!         <a href="magnet:?xt=urn:btih:abc">magnet</a>
//!     </div>
//! "#);
//! let title = html::select_text(&document, ".title a");
//! assert_eq!(title.as_deref(), Some("Ubuntu 22.04"));
//! let magnet = html::select_attr(&document, "a[href^='magnet:']", "href");
//! assert!(magnet.is_some());
//! ```

use rayon::prelude::*;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Parses an HTML document from a string.
pub fn parse(html: &str) -> Html {
    Html::parse_document(html)
}

/// Extracts whitespace-normalized text from the first element matching a
/// CSS selector.
///
/// # Examples
///
/// ```rust
/// use torrex::net::html;
///
/// let document = html::parse(r#"<h1 class="title">  Fedora
///     38 </h1>"#);
/// assert_eq!(html::select_text(&document, ".title"), Some("Fedora 38".to_string()));
/// ```
pub fn select_text(html: &Html, selector: &str) -> Option<String> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| html.select(&sel).next().map(text_of))
}

/// Extracts an attribute value from the first element matching a CSS selector.
pub fn select_attr(html: &Html, selector: &str, attr: &str) -> Option<String> {
    Selector::parse(selector).ok().and_then(|sel| {
        html.select(&sel)
            .next()
            .and_then(|el| el.value().attr(attr).map(String::from))
    })
}

/// Extracts text content from all elements matching a CSS selector.
pub fn select_all_text(html: &Html, selector: &str) -> Vec<String> {
    Selector::parse(selector)
        .ok()
        .map(|sel| html.select(&sel).map(text_of).collect())
        .unwrap_or_default()
}

/// Extracts attribute values from all elements matching a CSS selector.
///
/// Elements without the attribute are skipped.
pub fn select_all_attr(html: &Html, selector: &str, attr: &str) -> Vec<String> {
    Selector::parse(selector)
        .ok()
        .map(|sel| {
            html.select(&sel)
                .filter_map(|el| el.value().attr(attr).map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

/// All elements of the document matching `selector`, in document order.
pub fn select_doc<'a>(html: &'a Html, selector: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(selector)
        .map(|sel| html.select(&sel).collect())
        .unwrap_or_default()
}

/// All descendants of `scope` matching `selector`, in document order.
pub fn select_all<'a>(scope: ElementRef<'a>, selector: &str) -> Vec<ElementRef<'a>> {
    Selector::parse(selector)
        .map(|sel| scope.select(&sel).collect())
        .unwrap_or_default()
}

/// The first descendant of `scope` matching `selector`.
pub fn select_first<'a>(scope: ElementRef<'a>, selector: &str) -> Option<ElementRef<'a>> {
    Selector::parse(selector)
        .ok()
        .and_then(|sel| scope.select(&sel).next())
}

/// Text of an element with runs of whitespace collapsed to single spaces.
pub fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Non-empty trimmed value of `attr` on `element`.
pub fn attr_of(element: ElementRef<'_>, attr: &str) -> Option<String> {
    element
        .value()
        .attr(attr)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// The first `tag` element that follows `marker` in document order within
/// `scope`.
///
/// Icon-labelled layouts (`<i class="fa-download"></i><span>1.2 GB</span>`)
/// put the value in the element after the icon rather than inside it.
pub fn next_element<'a>(
    scope: ElementRef<'a>,
    marker: ElementRef<'a>,
    tag: &str,
) -> Option<ElementRef<'a>> {
    scope
        .descendants()
        .skip_while(|node| node.id() != marker.id())
        .skip(1)
        .filter(|node| !marker.descendants().any(|inner| inner.id() == node.id()))
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == tag)
}

/// Resolves `href` against `base`, leaving absolute URLs untouched.
///
/// Falls back to plain concatenation when `base` is not a valid URL, so a
/// misconfigured base never drops a link.
pub fn absolutize(base: &str, href: &str) -> String {
    let href = href.trim();
    if href.starts_with("http://") || href.starts_with("https://") || href.starts_with("magnet:") {
        return href.to_string();
    }

    match Url::parse(base).and_then(|base| base.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            href.trim_start_matches('/')
        ),
    }
}

/// Parses independent result blocks in parallel using rayon.
///
/// Each element matching `selector` is serialized and re-parsed as a fragment,
/// so the parser runs without borrowing the document across threads. The
/// output keeps document order, and blocks for which `parser` returns `None`
/// are dropped without affecting their siblings.
///
/// Table rows cannot be re-parsed outside their table; use this only for
/// self-contained blocks such as `div` cards.
///
/// # Examples
///
/// ```rust
/// use torrex::net::html;
///
/// let document = html::parse(r#"
///     <div class="card"><h3>Ubuntu</h3></div>
///     <div class="card"></div>
///     <div class="card"><h3>Fedora</h3></div>
/// "#);
///
/// let names = html::parse_items(&document, "div.card", |card| {
///     html::select_first(card, "h3").map(html::text_of)
/// });
/// assert_eq!(names, vec!["Ubuntu", "Fedora"]);
/// ```
pub fn parse_items<T, F>(html: &Html, selector: &str, parser: F) -> Vec<T>
where
    T: Send,
    F: Fn(ElementRef<'_>) -> Option<T> + Sync,
{
    Selector::parse(selector)
        .ok()
        .map(|sel| {
            // Convert ElementRef to HTML strings which can be processed in parallel
            let elements: Vec<String> = html.select(&sel).map(|el| el.html()).collect();

            elements
                .into_par_iter()
                .filter_map(|html_str| {
                    let fragment = Html::parse_fragment(&html_str);
                    parser(fragment.root_element())
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_element_finds_value_after_icon() {
        let document = parse(
            r#"<div id="card">
                <span><i class="fas fa-download"></i><span>1.4 GB</span></span>
                <span><i class="fas fa-calendar"></i><span>2024-01-02</span></span>
            </div>"#,
        );
        let card = select_doc(&document, "#card")[0];
        let icon = select_first(card, "i.fa-calendar").unwrap();
        let value = next_element(card, icon, "span").map(text_of);
        assert_eq!(value.as_deref(), Some("2024-01-02"));
    }

    #[test]
    fn next_element_is_none_when_nothing_follows() {
        let document = parse(r#"<div id="card"><span>x</span><i class="last"></i></div>"#);
        let card = select_doc(&document, "#card")[0];
        let icon = select_first(card, "i.last").unwrap();
        assert!(next_element(card, icon, "span").is_none());
    }

    #[test]
    fn absolutize_handles_relative_and_absolute() {
        assert_eq!(
            absolutize("https://bitsearch.to", "/download/torrent/abc"),
            "https://bitsearch.to/download/torrent/abc"
        );
        assert_eq!(
            absolutize("https://bitsearch.to", "https://cdn.example.com/x"),
            "https://cdn.example.com/x"
        );
        assert_eq!(absolutize("not a base", "/x"), "not a base/x");
    }

    #[test]
    fn invalid_selectors_are_empty() {
        let document = parse("<p>hi</p>");
        assert!(select_text(&document, "p[").is_none());
        assert!(select_all_text(&document, "p[").is_empty());
        assert!(select_doc(&document, "p[").is_empty());
    }

    #[test]
    fn attr_of_ignores_blank_values() {
        let document = parse(r#"<a id="a" href="  "></a><a id="b" href=" /x "></a>"#);
        assert_eq!(attr_of(select_doc(&document, "#a")[0], "href"), None);
        assert_eq!(
            attr_of(select_doc(&document, "#b")[0], "href").as_deref(),
            Some("/x")
        );
    }
}

//! Magnet link helpers: hash extraction and synthesis.
//!
//! Sites either publish a magnet link, from which the content hash is read, or
//! publish only a 40-character hex identifier, from which a magnet is built
//! with [`synthesize`] and the [`PUBLIC_TRACKERS`] list.

use once_cell::sync::Lazy;
use regex::Regex;

/// Well-known public announce URLs added to synthesized magnets.
pub const PUBLIC_TRACKERS: [&str; 5] = [
    "udp://tracker.openbittorrent.com:80/announce",
    "udp://tracker.opentrackr.org:1337/announce",
    "udp://tracker.torrent.eu.org:451/announce",
    "udp://open.stealth.si:80/announce",
    "udp://tracker.tiny-vps.com:6969/announce",
];

static BTIH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)xt=urn:btih:([0-9a-f]{32,40})(?:[^0-9a-z]|$)").expect("valid btih pattern")
});

static HASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{32,40}$").expect("valid hash pattern"));

static EMBEDDED_HASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^0-9a-fA-F])([0-9a-fA-F]{40})(?:[^0-9a-fA-F]|$)")
        .expect("valid embedded hash pattern")
});

/// `true` when `hash` is 32 to 40 hexadecimal characters.
pub fn is_valid_hash(hash: &str) -> bool {
    HASH.is_match(hash)
}

/// Reads the BitTorrent info hash from a magnet URI, preserving its case so
/// the result is a literal substring of `magnet`.
///
/// ```rust
/// use torrex::magnet::extract_hash;
///
/// let magnet = "magnet:?xt=urn:btih:0123456789ABCDEF0123456789ABCDEF01234567&dn=x";
/// assert_eq!(
///     extract_hash(magnet).as_deref(),
///     Some("0123456789ABCDEF0123456789ABCDEF01234567")
/// );
/// assert_eq!(extract_hash("https://example.com"), None);
/// ```
pub fn extract_hash(magnet: &str) -> Option<String> {
    BTIH.captures(magnet)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Finds a standalone 40-character hex identifier inside a URL path, as some
/// sites embed the content hash in their detail links.
pub fn hash_in_url(url: &str) -> Option<String> {
    EMBEDDED_HASH
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Builds a magnet URI from a content hash and display name.
///
/// The hash is uppercased, the name is percent-encoded as `dn`, and every
/// entry of [`PUBLIC_TRACKERS`] is appended as a `tr` parameter.
///
/// ```rust
/// use torrex::magnet::synthesize;
///
/// let magnet = synthesize("abcdef0123456789abcdef0123456789abcdef01", "Big Buck Bunny");
/// assert!(magnet.starts_with("magnet:?xt=urn:btih:ABCDEF0123456789ABCDEF0123456789ABCDEF01"));
/// assert!(magnet.contains("&dn=Big%20Buck%20Bunny"));
/// assert!(magnet.contains("&tr=udp%3A%2F%2Ftracker.opentrackr.org"));
/// ```
pub fn synthesize(hash: &str, name: &str) -> String {
    let mut magnet = format!(
        "magnet:?xt=urn:btih:{}&dn={}",
        hash.to_ascii_uppercase(),
        urlencoding::encode(name)
    );
    for tracker in PUBLIC_TRACKERS {
        magnet.push_str("&tr=");
        magnet.push_str(&urlencoding::encode(tracker));
    }
    magnet
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH_40: &str = "0123456789abcdef0123456789abcdef01234567";

    #[test]
    fn extracts_hash_of_either_length() {
        let v1 = format!("magnet:?xt=urn:btih:{}&dn=a", HASH_40);
        assert_eq!(extract_hash(&v1).as_deref(), Some(HASH_40));

        let base32_length = "magnet:?xt=urn:btih:0123456789abcdef0123456789abcdef";
        assert_eq!(
            extract_hash(base32_length).as_deref(),
            Some("0123456789abcdef0123456789abcdef")
        );
    }

    #[test]
    fn rejects_non_hex_identifiers() {
        assert_eq!(extract_hash("magnet:?xt=urn:btih:zzzz&dn=a"), None);
        assert!(!is_valid_hash("1234"));
        assert!(is_valid_hash(HASH_40));
    }

    #[test]
    fn synthesized_magnet_contains_uppercase_hash_and_trackers() {
        let magnet = synthesize(HASH_40, "Name & Co");
        let upper = HASH_40.to_ascii_uppercase();
        assert!(magnet.contains(&format!("xt=urn:btih:{}", upper)));
        assert_eq!(magnet.matches("&tr=").count(), PUBLIC_TRACKERS.len());
        assert!(magnet.contains("dn=Name%20%26%20Co"));
        assert_eq!(extract_hash(&magnet), Some(upper));
    }

    #[test]
    fn finds_hash_embedded_in_path() {
        let url = format!("https://example.com/{}/some-name", HASH_40.to_uppercase());
        assert_eq!(hash_in_url(&url), Some(HASH_40.to_uppercase()));
        assert_eq!(hash_in_url("https://example.com/torrent/123"), None);
    }
}

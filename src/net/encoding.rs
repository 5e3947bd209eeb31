//! Decoding of response bodies from sites that do not serve clean UTF-8.
//!
//! Candidates are tried in a fixed order and the first one that decodes the
//! whole body without a malformed sequence wins:
//!
//! 1. the declared encoding (a site override, or the response `charset`)
//! 2. UTF-8
//! 3. the resolver's single-byte fallbacks (windows-1252, ISO-8859-15 by default)
//!
//! When every candidate fails, [`EncodingResolver::decode`] still returns text,
//! with invalid sequences replaced, and sets [`Decoded::lossy`] so callers can
//! tell the difference. [`EncodingResolver::decode_strict`] reports the same
//! case as an error instead.

use encoding_rs::{Encoding, ISO_8859_15, UTF_8, WINDOWS_1252};

use crate::error::{Error, Result};

/// Text produced from a response body.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub text: String,
    /// Encoding that produced `text`.
    pub encoding: &'static Encoding,
    /// `true` when no candidate fit and replacement characters were inserted.
    pub lossy: bool,
}

/// Ordered fallback chain for decoding.
#[derive(Debug, Clone)]
pub struct EncodingResolver {
    fallbacks: Vec<&'static Encoding>,
}

impl Default for EncodingResolver {
    fn default() -> Self {
        Self {
            fallbacks: vec![WINDOWS_1252, ISO_8859_15],
        }
    }
}

impl EncodingResolver {
    /// Creates a resolver with a custom fallback list, tried after UTF-8.
    pub fn with_fallbacks(fallbacks: Vec<&'static Encoding>) -> Self {
        Self { fallbacks }
    }

    /// Decodes `bytes`, never failing.
    pub fn decode(&self, bytes: &[u8], declared: Option<&'static Encoding>) -> Decoded {
        if let Some(decoded) = self.try_candidates(bytes, declared) {
            return decoded;
        }

        let (text, _) = UTF_8.decode_without_bom_handling(strip_utf8_bom(bytes));
        Decoded {
            text: text.into_owned(),
            encoding: UTF_8,
            lossy: true,
        }
    }

    /// Decodes `bytes`, failing when no candidate decodes them cleanly.
    ///
    /// # Errors
    ///
    /// [`Error::Decode`] naming the candidates that were tried.
    pub fn decode_strict(
        &self,
        bytes: &[u8],
        declared: Option<&'static Encoding>,
    ) -> Result<Decoded> {
        self.try_candidates(bytes, declared).ok_or_else(|| {
            let tried: Vec<&str> = self
                .candidates(declared)
                .map(|encoding| encoding.name())
                .collect();
            Error::decode(format!(
                "{} bytes undecodable as any of [{}]",
                bytes.len(),
                tried.join(", ")
            ))
        })
    }

    fn candidates(
        &self,
        declared: Option<&'static Encoding>,
    ) -> impl Iterator<Item = &'static Encoding> + '_ {
        let mut seen: Vec<&'static Encoding> = Vec::new();
        declared
            .into_iter()
            .chain(std::iter::once(UTF_8))
            .chain(self.fallbacks.iter().copied())
            .filter(move |encoding| {
                if seen.contains(encoding) {
                    false
                } else {
                    seen.push(*encoding);
                    true
                }
            })
    }

    fn try_candidates(&self, bytes: &[u8], declared: Option<&'static Encoding>) -> Option<Decoded> {
        self.candidates(declared).find_map(|encoding| {
            let input = if encoding == UTF_8 {
                strip_utf8_bom(bytes)
            } else {
                bytes
            };
            encoding
                .decode_without_bom_handling_and_without_replacement(input)
                .map(|text| Decoded {
                    text: text.into_owned(),
                    encoding,
                    lossy: false,
                })
        })
    }
}

fn strip_utf8_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

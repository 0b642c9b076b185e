//! Record id derivation.
//!
//! Ids are derived from titles so the same tune always lands on the same
//! index object. The normalization is lossy: titles that only differ in
//! punctuation or letter case share an id.

use lazy_static::lazy_static;
use regex::Regex;

/// Maximum length of a derived id, in bytes (ids are always ASCII).
pub const MAX_ID_LEN: usize = 50;

lazy_static! {
    static ref NON_ID_CHARS: Regex = Regex::new(r"[^a-z0-9\s]").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Derive the record id for a title.
///
/// Lowercases, strips everything that is not `[a-z0-9]` or whitespace,
/// collapses whitespace runs into `-` and caps the result at
/// [`MAX_ID_LEN`] characters. Surrounding whitespace is ignored.
pub fn derive_id(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let stripped = NON_ID_CHARS.replace_all(&lowered, "");
    let mut id = WHITESPACE_RUN.replace_all(&stripped, "-").into_owned();
    id.truncate(MAX_ID_LEN);
    id
}

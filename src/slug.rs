//! File-name-safe slugs for book titles.

use regex::Regex;
use std::sync::LazyLock;

static CAMEL_BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z])([A-Z])").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Trim, split camel case, collapse whitespace into `-`, lowercase.
///
/// Punctuation other than whitespace is kept as is.
pub fn slug(title: &str) -> String {
    let split = CAMEL_BOUNDARY.replace_all(title.trim(), "$1-$2");
    WHITESPACE.replace_all(&split, "-").to_lowercase()
}

//! Conditional request helpers
//!
//! `ETag` generation and `If-None-Match` evaluation for static assets.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Generate a strong `ETag` from the content and its length
///
/// Returns a quoted value, e.g. `"5-1a2b3c"`
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("\"{:x}-{:x}\"", content.len(), hasher.finish())
}

/// Check whether the client's `If-None-Match` value matches `etag`
///
/// Accepts comma-separated lists, the `*` wildcard and weak validators
/// (`W/"..."`), which compare equal to their strong form for GET/HEAD.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|header| {
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.strip_prefix("W/").unwrap_or(candidate) == etag
        })
    })
}

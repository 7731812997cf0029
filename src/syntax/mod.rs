//! Address shape checks performed before any network work.
//!
//! Accepted shape: `local@domain` where neither part holds `@` or whitespace
//! and the domain contains a dot. Quoted local parts and internationalised
//! domains are not judged here; they either pass through or fail later at MX
//! resolution.

use std::sync::LazyLock;

use regex::Regex;

static ADDRESS_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap_or_else(|err| {
        unreachable!("address pattern is a literal and must compile: {err}")
    })
});

/// Trim and lower-case `raw`; this is the cache key used for every lookup.
pub fn normalize_address(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// `true` when `address` has the `local@domain.tld` shape.
pub fn is_valid_syntax(address: &str) -> bool {
    ADDRESS_SHAPE.is_match(address)
}

/// Split a syntactically valid address into `(local, domain)`.
pub fn split_address(address: &str) -> Option<(&str, &str)> {
    let (local, domain) = address.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some((local, domain))
}

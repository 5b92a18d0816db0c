use once_cell::sync::Lazy;
use regex::Regex;

static SLUG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9-]{2,}$").unwrap_or_else(|e| unreachable!("slug regex: {e}"))
});

/// Slugs are URL path segments: ASCII alphanumerics and hyphens, at least two characters.
#[must_use]
pub fn is_valid_slug(slug: &str) -> bool {
    SLUG_RE.is_match(slug)
}

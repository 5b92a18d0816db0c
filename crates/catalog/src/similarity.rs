use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d[\d,]*(?:\.\d+)?").unwrap_or_else(|e| unreachable!("amount regex: {e}"))
});

static FREE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bfree\b").unwrap_or_else(|e| unreachable!("free regex: {e}")));

/// Jaccard similarity of two topic sets, in `[0, 1]`.
#[must_use]
pub fn topic_jaccard(a: &[String], b: &[String]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let left: HashSet<&str> = a.iter().map(String::as_str).collect();
    let right: HashSet<&str> = b.iter().map(String::as_str).collect();
    let shared = left.intersection(&right).count();
    let union = left.len() + right.len() - shared;
    if union == 0 {
        return 0.0;
    }
    shared as f64 / union as f64
}

/// First monetary amount in free text: "$1,299.00", "From £12/mo", "free".
#[must_use]
pub fn parse_price(text: &str) -> Option<f64> {
    if let Some(found) = AMOUNT_RE.find(text) {
        let digits: String = found.as_str().chars().filter(|c| *c != ',').collect();
        return digits.parse::<f64>().ok().filter(|v| v.is_finite());
    }
    FREE_RE.is_match(text).then_some(0.0)
}

/// Closeness of two free-text prices, in `[0, 1]`.
///
/// Identical non-empty strings score 1. Otherwise the ratio of the smaller to
/// the larger parsed amount; 0 when either side has no amount.
#[must_use]
pub fn price_affinity(a: &str, b: &str) -> f64 {
    let (a, b) = (a.trim(), b.trim());
    if !a.is_empty() && a == b {
        return 1.0;
    }
    match (parse_price(a), parse_price(b)) {
        (Some(x), Some(y)) => amount_affinity(x, y),
        _ => 0.0,
    }
}

pub(crate) fn amount_affinity(x: f64, y: f64) -> f64 {
    let (low, high) = if x <= y { (x, y) } else { (y, x) };
    if high <= 0.0 {
        return 1.0;
    }
    (low.max(0.0) / high).clamp(0.0, 1.0)
}

use crate::similarity::amount_affinity;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Raw item record as supplied by the catalog export
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    pub id: String,

    /// Unique, URL-safe key
    pub slug: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub category: String,

    /// Free-text price ("$19.99/mo", "From £12", "free"); numbers are accepted too
    #[serde(default, deserialize_with = "price_from_string_or_number")]
    pub price: String,

    #[serde(default)]
    pub rating: Option<f64>,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,
}

impl CatalogRecord {
    pub fn new(id: impl Into<String>, slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            slug: slug.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    /// Builder: set description
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Builder: set category
    #[must_use]
    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Builder: set price string
    #[must_use]
    pub fn price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    /// Builder: set rating
    #[must_use]
    pub const fn rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Builder: set last update timestamp
    #[must_use]
    pub fn updated_at(mut self, updated_at: impl Into<String>) -> Self {
        self.updated_at = Some(updated_at.into());
        self
    }
}

fn price_from_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPrice {
        Text(String),
        Number(serde_json::Number),
        Missing(()),
    }

    Ok(match RawPrice::deserialize(deserializer)? {
        RawPrice::Text(text) => text,
        RawPrice::Number(number) => number.to_string(),
        RawPrice::Missing(()) => String::new(),
    })
}

/// Coarse price bucket used by the per-node diversity caps
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceBand {
    Free,
    Under10,
    Under25,
    Under50,
    Under100,
    Under250,
    Premium,
    /// Price text could not be parsed
    Unknown,
}

impl PriceBand {
    #[must_use]
    pub fn from_amount(amount: Option<f64>) -> Self {
        match amount {
            None => Self::Unknown,
            Some(value) if value <= 0.0 => Self::Free,
            Some(value) if value < 10.0 => Self::Under10,
            Some(value) if value < 25.0 => Self::Under25,
            Some(value) if value < 50.0 => Self::Under50,
            Some(value) if value < 100.0 => Self::Under100,
            Some(value) if value < 250.0 => Self::Under250,
            Some(_) => Self::Premium,
        }
    }

    /// `Unknown` carries no information, so it never counts toward a cap.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

/// Catalog item with derived fields, immutable for the duration of a build
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Item {
    pub id: String,
    pub slug: String,
    pub name: String,
    pub description: String,

    /// Category as supplied
    pub category: String,

    /// Lowercased, trimmed category used for comparisons
    pub category_key: String,

    /// Derived from the name, lowercased
    pub brand: String,

    /// Raw price string
    pub price: String,

    pub price_value: Option<f64>,
    pub price_band: PriceBand,
    pub rating: f64,

    /// Salience-ranked keywords; the first entry is the primary topic
    pub topics: Vec<String>,

    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Item {
    #[must_use]
    pub fn primary_topic(&self) -> Option<&str> {
        self.topics.first().map(String::as_str)
    }

    #[must_use]
    pub fn shares_category(&self, other: &Item) -> bool {
        !self.category_key.is_empty() && self.category_key == other.category_key
    }

    #[must_use]
    pub fn shares_brand(&self, other: &Item) -> bool {
        !self.brand.is_empty() && self.brand == other.brand
    }

    #[must_use]
    pub fn shares_price_band(&self, other: &Item) -> bool {
        self.price_band.is_known() && self.price_band == other.price_band
    }

    /// Same result as [`crate::price_affinity`] on the raw strings, using the
    /// amounts parsed at load time.
    #[must_use]
    pub fn price_affinity(&self, other: &Item) -> f64 {
        let (a, b) = (self.price.trim(), other.price.trim());
        if !a.is_empty() && a == b {
            return 1.0;
        }
        match (self.price_value, other.price_value) {
            (Some(x), Some(y)) => amount_affinity(x, y),
            _ => 0.0,
        }
    }
}

/// Parse RFC 3339, `YYYY-MM-DD HH:MM:SS`, or a bare `YYYY-MM-DD` as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|ts| ts.and_utc())
}

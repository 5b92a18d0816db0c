use crate::error::{CatalogError, Result};
use crate::similarity::parse_price;
use crate::slug::is_valid_slug;
use crate::text::{derive_brand, extract_topics, DEFAULT_TOPIC_LIMIT};
use crate::types::{parse_timestamp, CatalogRecord, Item, PriceBand};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Ordered, immutable item set for one build
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    items: Vec<Item>,
    slug_index: HashMap<String, usize>,
}

impl Catalog {
    /// Build a catalog from raw records, keeping input order.
    ///
    /// Records whose slug is listed in `gone` are excluded. Records with an
    /// invalid slug or rating, and later duplicates of a slug, are skipped with a
    /// warning.
    pub fn from_records(records: Vec<CatalogRecord>, gone: &HashSet<String>) -> Result<Self> {
        let total = records.len();
        let mut items = Vec::with_capacity(total);
        let mut slug_index = HashMap::with_capacity(total);
        let mut gone_count = 0usize;

        for record in records {
            if gone.contains(&record.slug) {
                gone_count += 1;
                continue;
            }
            if slug_index.contains_key(&record.slug) {
                log::warn!("Duplicate slug {} (id={}), keeping first", record.slug, record.id);
                continue;
            }
            match item_from_record(record) {
                Ok(item) => {
                    slug_index.insert(item.slug.clone(), items.len());
                    items.push(item);
                }
                Err(err) => log::warn!("Skipping record: {err}"),
            }
        }

        if items.is_empty() {
            return Err(CatalogError::Empty);
        }

        log::info!(
            "Catalog ready: {} items ({} records, {} gone, {} skipped)",
            items.len(),
            total,
            gone_count,
            total - gone_count - items.len()
        );

        Ok(Self { items, slug_index })
    }

    /// Load a JSON array of records
    pub fn load(path: impl AsRef<Path>, gone: &HashSet<String>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let records: Vec<CatalogRecord> = serde_json::from_slice(&bytes)?;
        Self::from_records(records, gone)
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    #[must_use]
    pub fn get(&self, idx: usize) -> Option<&Item> {
        self.items.get(idx)
    }

    #[must_use]
    pub fn index_of(&self, slug: &str) -> Option<usize> {
        self.slug_index.get(slug).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Newest `updated_at` in the catalog.
    ///
    /// "Recently updated" is measured against this instead of the wall clock,
    /// so rebuilding the same snapshot later gives the same graph.
    #[must_use]
    pub fn snapshot_time(&self) -> Option<DateTime<Utc>> {
        self.items.iter().filter_map(|item| item.updated_at).max()
    }
}

fn item_from_record(record: CatalogRecord) -> Result<Item> {
    if !is_valid_slug(&record.slug) {
        return Err(CatalogError::invalid_record(&record.slug, "slug is not URL-safe"));
    }
    let rating = record.rating.unwrap_or(0.0);
    if !rating.is_finite() || rating < 0.0 {
        return Err(CatalogError::invalid_record(
            &record.slug,
            format!("rating {rating} out of range"),
        ));
    }

    let price_value = parse_price(&record.price);
    let topics = extract_topics(&record.name, &record.description, DEFAULT_TOPIC_LIMIT);

    Ok(Item {
        brand: derive_brand(&record.name),
        category_key: record.category.trim().to_lowercase(),
        price_band: PriceBand::from_amount(price_value),
        price_value,
        rating,
        topics,
        created_at: record.created_at.as_deref().and_then(parse_timestamp),
        updated_at: record.updated_at.as_deref().and_then(parse_timestamp),
        id: record.id,
        slug: record.slug,
        name: record.name,
        description: record.description,
        category: record.category,
        price: record.price,
    })
}

/// Read delisted slugs: a JSON array of strings, or one slug per line
/// (blank lines and `#` comments ignored).
pub fn load_gone_slugs(path: impl AsRef<Path>) -> Result<HashSet<String>> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let trimmed = raw.trim_start();
    if trimmed.starts_with('[') {
        let slugs: Vec<String> = serde_json::from_str(trimmed)?;
        return Ok(slugs.into_iter().map(|s| s.trim().to_string()).collect());
    }
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

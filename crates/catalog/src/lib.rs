//! # Sitegraph Catalog
//!
//! Item records for the site link-graph build, read once per run and immutable
//! afterwards.
//!
//! ## Pipeline
//!
//! ```text
//! catalog.json (CatalogRecord[])
//!     │
//!     ├──> Gone-slug filter (delisted items)
//!     │
//!     ├──> Slug validation + de-duplication
//!     │
//!     └──> Derivation
//!          ├─> brand       (leading token of the name)
//!          ├─> topics      (salience-ranked keywords, first = primary)
//!          ├─> price value + price band
//!          └─> updated_at  (UTC)
//! ```
//!
//! The item order of the input file is preserved. Downstream graph stages are
//! greedy and order-dependent, so the order is part of the determinism
//! contract.
//!
//! ## Example
//!
//! ```rust
//! use sitegraph_catalog::{Catalog, CatalogRecord};
//! use std::collections::HashSet;
//!
//! let records = vec![
//!     CatalogRecord::new("1", "acme-widget", "Acme - Blue Widget").category("tools"),
//!     CatalogRecord::new("2", "zen-widget", "Zen - Green Widget").category("tools"),
//! ];
//! let catalog = Catalog::from_records(records, &HashSet::new()).unwrap();
//! assert_eq!(catalog.len(), 2);
//! assert_eq!(catalog.items()[0].brand, "acme");
//! ```

mod catalog;
mod error;
mod similarity;
mod slug;
mod text;
mod types;

pub use catalog::{load_gone_slugs, Catalog};
pub use error::{CatalogError, Result};
pub use similarity::{parse_price, price_affinity, topic_jaccard};
pub use slug::is_valid_slug;
pub use text::{derive_brand, extract_topics, DEFAULT_TOPIC_LIMIT};
pub use types::{CatalogRecord, Item, PriceBand};

use thiserror::Error;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur while reading the item catalog
#[derive(Error, Debug)]
pub enum CatalogError {
    /// IO error occurred
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Catalog or gone-slug file is not valid JSON
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A record could not be turned into an item
    #[error("Invalid record {slug}: {reason}")]
    InvalidRecord { slug: String, reason: String },

    /// The catalog holds no usable items
    #[error("Catalog is empty after filtering")]
    Empty,
}

impl CatalogError {
    /// Create an invalid record error
    pub fn invalid_record(slug: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidRecord {
            slug: slug.into(),
            reason: reason.into(),
        }
    }
}

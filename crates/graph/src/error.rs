use thiserror::Error;

pub type Result<T> = std::result::Result<T, GraphError>;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Catalog error: {0}")]
    Catalog(#[from] sitegraph_catalog::CatalogError),

    /// Fatal gate failure; nothing is written.
    #[error(
        "Invariant gate failed: {} under-linked, {} over hub cap, {} structural",
        .under_linked.len(),
        .over_capped.len(),
        .structural.len()
    )]
    InvariantViolation {
        /// (slug, inbound count) below the floor
        under_linked: Vec<(String, usize)>,
        /// (slug, inbound count) above the hub cap
        over_capped: Vec<(String, usize)>,
        /// Self-loops, duplicate targets, diversity breaches, bad slugs
        structural: Vec<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl GraphError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Slugs the gate could not satisfy (under floor or over cap)
    #[must_use]
    pub fn unsatisfied_slugs(&self) -> Vec<&str> {
        match self {
            Self::InvariantViolation {
                under_linked,
                over_capped,
                ..
            } => under_linked
                .iter()
                .chain(over_capped.iter())
                .map(|(slug, _)| slug.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}

use crate::error::{GraphError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tunables for one graph build, grouped by stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    pub limits: LinkLimits,
    pub pools: PoolConfig,
    pub selector: SelectorConfig,
    pub alternatives: AlternativeConfig,
    pub rescue: RescueConfig,
    pub explore: ExploreConfig,
    pub gate: GateConfig,
}

/// Hard per-node limits and site-wide inbound bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkLimits {
    pub target_recommendations: usize,
    pub target_alternatives: usize,

    /// Inbound floor every node must reach
    pub min_inbound: usize,

    /// Hub cap
    pub max_inbound: usize,

    pub max_same_category: usize,
    pub max_same_price_band: usize,
    pub max_same_brand: usize,
}

impl Default for LinkLimits {
    fn default() -> Self {
        Self {
            target_recommendations: 4,
            target_alternatives: 4,
            min_inbound: 2,
            max_inbound: 250,
            max_same_category: 2,
            max_same_price_band: 2,
            max_same_brand: 1,
        }
    }
}

/// Candidate scoring weights and pool sizes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_candidates: usize,
    pub recommendation_threshold: f64,
    pub alternative_threshold: f64,

    pub category_match: f64,
    pub shared_topic: f64,
    pub primary_topic_match: f64,
    pub same_price: f64,
    pub rating_multiplier: f64,
    pub rating_bonus_above: f64,

    pub topic_weight: f64,
    pub price_weight: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_candidates: 50,
            recommendation_threshold: 20.0,
            alternative_threshold: 0.1,
            category_match: 100.0,
            shared_topic: 25.0,
            primary_topic_match: 80.0,
            same_price: 10.0,
            rating_multiplier: 2.0,
            rating_bonus_above: 4.0,
            topic_weight: 0.8,
            price_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Each node's top-K candidates seed the popularity estimate
    pub popularity_prior_top_k: usize,
    pub popularity_weight: f64,

    pub same_category_penalty: f64,
    pub same_price_band_penalty: f64,
    pub same_brand_penalty: f64,

    pub high_rating: f64,
    pub high_rating_bonus: f64,
    pub recent_days: i64,
    pub recent_bonus: f64,

    /// Limit the greedy walk to the head of the re-sorted list; unset walks
    /// the whole list. The exploration pick always scans the whole list.
    pub greedy_window: Option<usize>,

    pub exploration_modulus: u64,
    pub exploration_stride: u64,

    /// Exploration picks need inbound below `max_inbound / exploration_cap_divisor`
    pub exploration_cap_divisor: usize,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            popularity_prior_top_k: 20,
            popularity_weight: 15.0,
            same_category_penalty: 8.0,
            same_price_band_penalty: 5.0,
            same_brand_penalty: 25.0,
            high_rating: 4.5,
            high_rating_bonus: 3.0,
            recent_days: 30,
            recent_bonus: 2.0,
            greedy_window: None,
            exploration_modulus: 9973,
            exploration_stride: 7,
            exploration_cap_divisor: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlternativeConfig {
    pub popularity_weight: f64,
    pub same_category_penalty: f64,
    pub same_price_band_penalty: f64,

    /// Candidates kept before the jittered tie-break
    pub pool_width: usize,
    pub jitter: f64,
}

impl Default for AlternativeConfig {
    fn default() -> Self {
        Self {
            popularity_weight: 0.05,
            same_category_penalty: 0.02,
            same_price_band_penalty: 0.01,
            pool_width: 16,
            jitter: 0.015,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescueConfig {
    pub floor: usize,
    pub max_rounds: usize,
}

impl Default for RescueConfig {
    fn default() -> Self {
        Self {
            floor: 3,
            max_rounds: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExploreConfig {
    /// Floor the slot pass aims for; the top-up pass aims for `limits.min_inbound`
    pub floor: usize,

    /// Only same-category or same-brand donors may place explore links
    pub require_affinity: bool,
}

impl Default for ExploreConfig {
    fn default() -> Self {
        Self {
            floor: 3,
            require_affinity: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Warn when more nodes than this share one recommendation signature
    pub duplicate_signature_threshold: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            duplicate_signature_threshold: 12,
        }
    }
}

impl GraphConfig {
    /// Load from a TOML file; missing keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let limits = &self.limits;
        if limits.target_recommendations == 0 || limits.target_alternatives == 0 {
            return Err(GraphError::invalid_config(
                "limits.target_recommendations and limits.target_alternatives must be > 0",
            ));
        }
        if limits.min_inbound > limits.max_inbound {
            return Err(GraphError::invalid_config(format!(
                "limits.min_inbound ({}) cannot exceed limits.max_inbound ({})",
                limits.min_inbound, limits.max_inbound
            )));
        }
        if limits.max_same_category == 0
            || limits.max_same_price_band == 0
            || limits.max_same_brand == 0
        {
            return Err(GraphError::invalid_config("diversity caps must be > 0"));
        }
        if self.pools.max_candidates == 0 {
            return Err(GraphError::invalid_config("pools.max_candidates must be > 0"));
        }
        if self.rescue.floor < limits.min_inbound || self.rescue.floor > limits.max_inbound {
            return Err(GraphError::invalid_config(format!(
                "rescue.floor ({}) must lie within [{}, {}]",
                self.rescue.floor, limits.min_inbound, limits.max_inbound
            )));
        }
        if self.explore.floor < limits.min_inbound || self.explore.floor > limits.max_inbound {
            return Err(GraphError::invalid_config(format!(
                "explore.floor ({}) must lie within [{}, {}]",
                self.explore.floor, limits.min_inbound, limits.max_inbound
            )));
        }
        if self.selector.greedy_window == Some(0) {
            return Err(GraphError::invalid_config("selector.greedy_window must be > 0"));
        }
        if self.selector.exploration_modulus == 0
            || self.selector.exploration_stride == 0
            || self.selector.exploration_cap_divisor == 0
        {
            return Err(GraphError::invalid_config(
                "selector exploration modulus, stride and cap divisor must be > 0",
            ));
        }
        if self.alternatives.pool_width == 0 {
            return Err(GraphError::invalid_config("alternatives.pool_width must be > 0"));
        }
        if self.alternatives.jitter < 0.0 || !self.alternatives.jitter.is_finite() {
            return Err(GraphError::invalid_config("alternatives.jitter must be finite and >= 0"));
        }
        Ok(())
    }
}

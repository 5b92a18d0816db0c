use crate::config::PoolConfig;
use crate::hash::pair_hash;
use crate::state::NodeId;
use serde::Serialize;
use sitegraph_catalog::{is_valid_slug, topic_jaccard, Catalog, Item};
use std::collections::HashMap;

const WINDOW_SLACK: f64 = 1e-9;

/// Scored candidate link from an implicit source node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub target: NodeId,
    pub score: f64,
}

/// Per-node ranked candidates, built once and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct CandidatePools {
    recommendations: Vec<Vec<Edge>>,
    alternatives: Vec<Vec<Edge>>,
}

impl CandidatePools {
    /// Pools from precomputed candidate lists (lists are used as given)
    pub fn from_parts(recommendations: Vec<Vec<Edge>>, alternatives: Vec<Vec<Edge>>) -> Self {
        Self {
            recommendations,
            alternatives,
        }
    }

    pub fn recommendations(&self, node: NodeId) -> &[Edge] {
        self.recommendations.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn alternatives(&self, node: NodeId) -> &[Edge] {
        self.alternatives.get(node).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub recommendation_edges: usize,
    pub alternative_edges: usize,
    pub empty_recommendation_pools: usize,
    pub empty_alternative_pools: usize,

    /// Rating bonus alone can clear the threshold, so pruning was disabled
    pub full_scan: bool,
}

/// Builds recommendation and alternative candidate pools for every item
pub struct PoolBuilder<'a> {
    items: &'a [Item],
    config: &'a PoolConfig,
}

/// Inverted indices used to skip pairs that cannot clear a threshold
struct PruneIndex<'a> {
    by_category: HashMap<&'a str, Vec<NodeId>>,
    by_topic: HashMap<&'a str, Vec<NodeId>>,
    by_price: HashMap<&'a str, Vec<NodeId>>,
    /// (amount, node) sorted by amount
    by_amount: Vec<(f64, NodeId)>,
}

impl<'a> PoolBuilder<'a> {
    pub fn new(catalog: &'a Catalog, config: &'a PoolConfig) -> Self {
        Self {
            items: catalog.items(),
            config,
        }
    }

    /// Build pools for all items.
    ///
    /// Only pairs that share a category, a topic, or an exact price string
    /// (plus, for alternatives, pairs inside the price-affinity window) are
    /// scored. The pruning is exact: no skipped pair could have cleared its
    /// threshold.
    pub fn build(&self) -> (CandidatePools, PoolStats) {
        let n = self.items.len();
        let valid: Vec<bool> = self.items.iter().map(|i| is_valid_slug(&i.slug)).collect();

        // Phase 1: indices
        let index = self.prune_index();
        let full_scan = self.rating_alone_clears_threshold();
        let alt_ratio = self.alternative_affinity_floor();

        // Phase 2: score candidates per source
        let mut stats = PoolStats {
            full_scan,
            ..PoolStats::default()
        };
        let mut recommendations = Vec::with_capacity(n);
        let mut alternatives = Vec::with_capacity(n);
        let mut stamp = vec![usize::MAX; n];
        let mut candidates: Vec<NodeId> = Vec::new();

        for source in 0..n {
            candidates.clear();
            let mut mark = |node: NodeId, candidates: &mut Vec<NodeId>| {
                if node != source && stamp[node] != source {
                    stamp[node] = source;
                    candidates.push(node);
                }
            };
            let item = &self.items[source];

            if full_scan {
                for node in 0..n {
                    mark(node, &mut candidates);
                }
            } else {
                self.shared_neighbours(&index, item, |node| mark(node, &mut candidates));
            }

            let mut recs: Vec<Edge> = candidates
                .iter()
                .copied()
                .filter(|&target| valid[target])
                .map(|target| Edge {
                    target,
                    score: self.recommendation_score(source, target),
                })
                .filter(|edge| edge.score >= self.config.recommendation_threshold)
                .collect();
            self.rank(source, &mut recs);

            // Alternatives see the same neighbours plus the price window
            if let Some(ratio) = alt_ratio {
                if let Some(amount) = item.price_value {
                    // Widened slightly so rounding never drops a qualifying pair
                    let low = amount * ratio * (1.0 - WINDOW_SLACK);
                    let high = if ratio > 0.0 {
                        amount / ratio * (1.0 + WINDOW_SLACK)
                    } else {
                        f64::INFINITY
                    };
                    let start = index.by_amount.partition_point(|(value, _)| *value < low);
                    for &(value, node) in &index.by_amount[start..] {
                        if value > high {
                            break;
                        }
                        mark(node, &mut candidates);
                    }
                }
            }

            let mut alts: Vec<Edge> = candidates
                .iter()
                .copied()
                .filter(|&target| valid[target])
                .map(|target| Edge {
                    target,
                    score: self.alternative_score(source, target),
                })
                .filter(|edge| edge.score > self.config.alternative_threshold)
                .collect();
            self.rank(source, &mut alts);

            stats.recommendation_edges += recs.len();
            stats.alternative_edges += alts.len();
            stats.empty_recommendation_pools += usize::from(recs.is_empty());
            stats.empty_alternative_pools += usize::from(alts.is_empty());

            recommendations.push(recs);
            alternatives.push(alts);
        }

        log::info!(
            "Built candidate pools: {} items, {} recommendation edges, {} alternative edges{}",
            n,
            stats.recommendation_edges,
            stats.alternative_edges,
            if full_scan { " (full scan)" } else { "" }
        );

        (
            CandidatePools {
                recommendations,
                alternatives,
            },
            stats,
        )
    }

    /// Taxonomic/topical match score of `candidate` for `source`
    pub fn recommendation_score(&self, source: NodeId, candidate: NodeId) -> f64 {
        let cfg = self.config;
        let (a, b) = (&self.items[source], &self.items[candidate]);
        let mut score = 0.0;

        if a.shares_category(b) {
            score += cfg.category_match;
        }

        let shared = a.topics.iter().filter(|t| b.topics.contains(t)).count();
        score += cfg.shared_topic * shared as f64;

        if let (Some(pa), Some(pb)) = (a.primary_topic(), b.primary_topic()) {
            if pa == pb {
                score += cfg.primary_topic_match;
            }
        }

        let price = a.price.trim();
        if !price.is_empty() && price == b.price.trim() {
            score += cfg.same_price;
        }

        if b.rating > cfg.rating_bonus_above {
            score += cfg.rating_multiplier * b.rating;
        }

        score
    }

    /// Similarity + price-affinity score of `candidate` for `source`
    pub fn alternative_score(&self, source: NodeId, candidate: NodeId) -> f64 {
        let (a, b) = (&self.items[source], &self.items[candidate]);
        self.config.topic_weight * topic_jaccard(&a.topics, &b.topics)
            + self.config.price_weight * a.price_affinity(b)
    }

    /// Descending by score; ties by the `source->target` hash so equal scores
    /// don't all fall to the earliest catalog entries.
    fn rank(&self, source: NodeId, edges: &mut Vec<Edge>) {
        let slug = self.items[source].slug.as_str();
        let mut keyed: Vec<(Edge, u64)> = edges
            .drain(..)
            .map(|edge| (edge, pair_hash(slug, &self.items[edge.target].slug)))
            .collect();
        keyed.sort_by(|(a, ha), (b, hb)| {
            b.score
                .total_cmp(&a.score)
                .then(ha.cmp(hb))
                .then(a.target.cmp(&b.target))
        });
        keyed.truncate(self.config.max_candidates);
        edges.extend(keyed.into_iter().map(|(edge, _)| edge));
    }

    fn prune_index(&self) -> PruneIndex<'a> {
        let items: &'a [Item] = self.items;
        let mut by_category: HashMap<&'a str, Vec<NodeId>> = HashMap::new();
        let mut by_topic: HashMap<&'a str, Vec<NodeId>> = HashMap::new();
        let mut by_price: HashMap<&'a str, Vec<NodeId>> = HashMap::new();
        let mut by_amount = Vec::new();

        for (node, item) in items.iter().enumerate() {
            if !item.category_key.is_empty() {
                by_category.entry(item.category_key.as_str()).or_default().push(node);
            }
            for topic in &item.topics {
                by_topic.entry(topic.as_str()).or_default().push(node);
            }
            let price = item.price.trim();
            if !price.is_empty() {
                by_price.entry(price).or_default().push(node);
            }
            if let Some(amount) = item.price_value {
                by_amount.push((amount, node));
            }
        }
        by_amount.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        PruneIndex {
            by_category,
            by_topic,
            by_price,
            by_amount,
        }
    }

    fn shared_neighbours(&self, index: &PruneIndex<'_>, item: &Item, mut visit: impl FnMut(NodeId)) {
        if let Some(nodes) = index.by_category.get(item.category_key.as_str()) {
            nodes.iter().copied().for_each(&mut visit);
        }
        for topic in &item.topics {
            if let Some(nodes) = index.by_topic.get(topic.as_str()) {
                nodes.iter().copied().for_each(&mut visit);
            }
        }
        if let Some(nodes) = index.by_price.get(item.price.trim()) {
            nodes.iter().copied().for_each(&mut visit);
        }
    }

    fn rating_alone_clears_threshold(&self) -> bool {
        let max_bonus = self
            .items
            .iter()
            .filter(|item| item.rating > self.config.rating_bonus_above)
            .map(|item| self.config.rating_multiplier * item.rating)
            .fold(0.0f64, f64::max);
        self.config.recommendation_threshold <= max_bonus
    }

    /// Smallest price ratio that clears the alternative threshold on price
    /// affinity alone. `None` when no ratio in `[0, 1]` can.
    fn alternative_affinity_floor(&self) -> Option<f64> {
        let cfg = self.config;
        if cfg.price_weight <= 0.0 {
            return None;
        }
        let ratio = cfg.alternative_threshold / cfg.price_weight;
        (ratio < 1.0).then_some(ratio.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::catalog;
    use pretty_assertions::assert_eq;
    use sitegraph_catalog::CatalogRecord;
    use std::collections::HashSet;

    fn targets(edges: &[Edge]) -> Vec<NodeId> {
        edges.iter().map(|e| e.target).collect()
    }

    #[test]
    fn recommendation_score_components() {
        let catalog = catalog(&[
            ("timer-acme", "Timer Acme", "tools", "$10"),
            ("timer-bolt", "Timer Bolt", "tools", "$10"),
            ("fern-seeds", "Fern Seeds", "garden", "$3"),
        ]);
        let config = PoolConfig::default();
        let builder = PoolBuilder::new(&catalog, &config);

        // category 100 + shared "timer" 25 + primary topic 80 + same price 10
        assert_eq!(builder.recommendation_score(0, 1), 215.0);
        assert_eq!(builder.recommendation_score(0, 2), 0.0);
    }

    #[test]
    fn rating_bonus_only_above_threshold() {
        let records = vec![
            CatalogRecord::new("1", "plain-one", "Plain One").rating(4.0),
            CatalogRecord::new("2", "star-two", "Star Two").rating(4.5),
        ];
        let catalog = Catalog::from_records(records, &HashSet::new()).unwrap();
        let config = PoolConfig::default();
        let builder = PoolBuilder::new(&catalog, &config);

        assert_eq!(builder.recommendation_score(1, 0), 0.0);
        assert_eq!(builder.recommendation_score(0, 1), 9.0);
    }

    #[test]
    fn pools_exclude_self_and_respect_thresholds() {
        let catalog = catalog(&[
            ("acme-timer", "Acme Timer", "tools", "$10"),
            ("bolt-timer", "Bolt Timer", "tools", "$12"),
            ("core-drill", "Core Drill", "tools", "$90"),
            ("fern-seeds", "Fern Seeds", "garden", "$3"),
        ]);
        let config = PoolConfig::default();
        let (pools, stats) = PoolBuilder::new(&catalog, &config).build();

        assert_eq!(pools.len(), 4);
        assert!(!stats.full_scan);
        for node in 0..pools.len() {
            assert!(!targets(pools.recommendations(node)).contains(&node));
            assert!(!targets(pools.alternatives(node)).contains(&node));
        }

        // Same category ranks above everything else
        assert_eq!(targets(pools.recommendations(0))[0], 1);
        assert!(targets(pools.recommendations(0)).contains(&2));
        assert!(pools.recommendations(3).is_empty());

        // $10 vs $90 scores 0.2 * 0.111 < 0.1 without shared topics
        assert!(!targets(pools.alternatives(0)).contains(&2));
        for edge in pools.alternatives(0) {
            assert!(edge.score > config.alternative_threshold);
        }
    }

    #[test]
    fn pools_are_sorted_and_truncated() {
        let rows: Vec<(String, String)> = (0..70)
            .map(|i| (format!("item-{i:03}"), format!("Brand{i} Widget")))
            .collect();
        let borrowed: Vec<(&str, &str, &str, &str)> = rows
            .iter()
            .map(|(slug, name)| (slug.as_str(), name.as_str(), "widgets", "$20"))
            .collect();
        let catalog = catalog(&borrowed);
        let config = PoolConfig::default();
        let (pools, _) = PoolBuilder::new(&catalog, &config).build();

        for node in 0..pools.len() {
            let recs = pools.recommendations(node);
            assert_eq!(recs.len(), config.max_candidates);
            assert!(recs.windows(2).all(|w| w[0].score >= w[1].score));
        }
        // Equal scores are not handed to the lowest indices
        let first: HashSet<NodeId> = (0..pools.len())
            .map(|node| pools.recommendations(node)[0].target)
            .collect();
        assert!(first.len() > 1);
    }

    #[test]
    fn pruned_build_matches_brute_force() {
        let catalog = catalog(&[
            ("acme-timer", "Acme Focus Timer", "tools", "$10"),
            ("bolt-timer", "Bolt Timer", "tools", "$11"),
            ("core-drill", "Core Drill", "hardware", "$12"),
            ("dart-board", "Dart Board", "games", "$10"),
            ("echo-notes", "Echo Notes", "apps", "free"),
            ("fern-notes", "Fern Notes", "apps", "0"),
            ("gale-kite", "Gale Kite", "outdoor", "ask"),
        ]);
        let config = PoolConfig::default();
        let builder = PoolBuilder::new(&catalog, &config);
        let (pools, _) = builder.build();

        for source in 0..catalog.len() {
            let mut recs: Vec<NodeId> = (0..catalog.len())
                .filter(|&t| t != source)
                .filter(|&t| builder.recommendation_score(source, t) >= config.recommendation_threshold)
                .collect();
            let mut alts: Vec<NodeId> = (0..catalog.len())
                .filter(|&t| t != source)
                .filter(|&t| builder.alternative_score(source, t) > config.alternative_threshold)
                .collect();
            let mut got_recs = targets(pools.recommendations(source));
            let mut got_alts = targets(pools.alternatives(source));
            recs.sort_unstable();
            alts.sort_unstable();
            got_recs.sort_unstable();
            got_alts.sort_unstable();
            assert_eq!(got_recs, recs, "recommendations of {source}");
            assert_eq!(got_alts, alts, "alternatives of {source}");
        }
    }
}

use crate::config::{GraphConfig, SelectorConfig};
use crate::hash::{stable_hash, Jitter};
use crate::pool::{CandidatePools, Edge};
use crate::state::{diversity_allows, GraphState, NodeId};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use sitegraph_catalog::{Catalog, Item};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub recommendation_links: usize,
    pub exploration_picks: usize,
    pub rotated_sets: usize,
    /// Nodes left with fewer recommendations than the target
    pub short_recommendation_sets: usize,
    pub alternative_links: usize,
    /// Candidates passed over because they had reached the hub cap
    pub hub_cap_skips: usize,
}

/// Draft recommendation and alternative sets for every node.
///
/// Nodes are processed in catalog order and every acceptance updates the
/// counters immediately, so the result depends on that order.
pub fn run_selector(
    catalog: &Catalog,
    pools: &CandidatePools,
    config: &GraphConfig,
    state: &mut GraphState,
) -> SelectionStats {
    let mut stats = select_recommendations(catalog, pools, config, state);
    stats.rotated_sets = rotate_recommendations(catalog, config.limits.target_recommendations, state);
    select_alternatives(catalog, pools, config, state, &mut stats);

    log::info!(
        "Selected {} recommendations ({} exploration picks, {} short sets) and {} alternatives",
        stats.recommendation_links,
        stats.exploration_picks,
        stats.short_recommendation_sets,
        stats.alternative_links
    );
    stats
}

pub fn select_recommendations(
    catalog: &Catalog,
    pools: &CandidatePools,
    config: &GraphConfig,
    state: &mut GraphState,
) -> SelectionStats {
    let items = catalog.items();
    let limits = &config.limits;
    let cfg = &config.selector;
    let target = limits.target_recommendations;
    let quarter_cap = limits.max_inbound / cfg.exploration_cap_divisor;
    let recent_cutoff = catalog
        .snapshot_time()
        .zip(TimeDelta::try_days(cfg.recent_days))
        .and_then(|(newest, window)| newest.checked_sub_signed(window));

    let mut estimate = popularity_prior(pools, cfg.popularity_prior_top_k);
    let mut stats = SelectionStats::default();

    for source in 0..items.len() {
        let ranked = rerank(items, source, pools.recommendations(source), &estimate, cfg, recent_cutoff);
        let mut picks: Vec<NodeId> = Vec::with_capacity(target);

        let walk = cfg.greedy_window.unwrap_or(ranked.len());
        for edge in ranked.iter().take(walk) {
            if picks.len() >= target {
                break;
            }
            let candidate = edge.target;
            if candidate == source || picks.contains(&candidate) {
                continue;
            }
            if state.inbound[candidate] >= limits.max_inbound {
                stats.hub_cap_skips += 1;
                continue;
            }
            if !diversity_allows(items, picks.iter().copied(), candidate, limits) {
                continue;
            }
            picks.push(candidate);
            state.inbound[candidate] += 1;
            estimate[candidate] += 1.0;
        }

        if picks.len() < target {
            let offset = stable_hash(&items[source].slug) % cfg.exploration_modulus;
            let explored = ranked.iter().enumerate().find_map(|(index, edge)| {
                let candidate = edge.target;
                let on_stride = (index as u64 + offset) % cfg.exploration_stride == 0;
                (on_stride
                    && candidate != source
                    && !picks.contains(&candidate)
                    && state.inbound[candidate] < quarter_cap
                    && diversity_allows(items, picks.iter().copied(), candidate, limits))
                .then_some(candidate)
            });
            if let Some(candidate) = explored {
                picks.push(candidate);
                state.inbound[candidate] += 1;
                estimate[candidate] += 1.0;
                stats.exploration_picks += 1;
            }
        }

        stats.recommendation_links += picks.len();
        stats.short_recommendation_sets += usize::from(picks.len() < target);
        state.links[source].recommendations = picks;
    }

    stats
}

/// Rotate every full recommendation set by `hash(slug) % len` positions.
///
/// Only the display order changes; membership and topology stay the same.
pub fn rotate_recommendations(catalog: &Catalog, target: usize, state: &mut GraphState) -> usize {
    let mut rotated = 0;
    for (item, links) in catalog.items().iter().zip(state.links.iter_mut()) {
        let len = links.recommendations.len();
        if len == 0 || len < target {
            continue;
        }
        let shift = (stable_hash(&item.slug) % len as u64) as usize;
        if shift > 0 {
            links.recommendations.rotate_left(shift);
            rotated += 1;
        }
    }
    rotated
}

pub fn select_alternatives(
    catalog: &Catalog,
    pools: &CandidatePools,
    config: &GraphConfig,
    state: &mut GraphState,
    stats: &mut SelectionStats,
) {
    let items = catalog.items();
    let cfg = &config.alternatives;
    let limits = &config.limits;
    // Alternatives accepted per target across all nodes
    let mut usage = vec![0usize; items.len()];

    for source in 0..items.len() {
        let item = &items[source];
        let mut ranked: Vec<Edge> = pools
            .alternatives(source)
            .iter()
            .map(|edge| {
                let candidate = &items[edge.target];
                let mut score = edge.score - cfg.popularity_weight * (usage[edge.target] as f64).ln_1p();
                if item.shares_category(candidate) {
                    score -= cfg.same_category_penalty;
                }
                if item.shares_price_band(candidate) {
                    score -= cfg.same_price_band_penalty;
                }
                Edge {
                    target: edge.target,
                    score,
                }
            })
            .collect();
        sort_descending(&mut ranked);
        ranked.truncate(cfg.pool_width);

        let mut jitter = Jitter::for_slug(&item.slug);
        for edge in &mut ranked {
            edge.score += cfg.jitter * jitter.next_unit();
        }
        sort_descending(&mut ranked);

        let mut picks: Vec<NodeId> = Vec::with_capacity(limits.target_alternatives);
        for edge in ranked {
            if picks.len() >= limits.target_alternatives {
                break;
            }
            let candidate = edge.target;
            if candidate == source
                || picks.contains(&candidate)
                || state.links[source].recommendations.contains(&candidate)
            {
                continue;
            }
            if state.inbound[candidate] >= limits.max_inbound {
                stats.hub_cap_skips += 1;
                continue;
            }
            picks.push(candidate);
            state.inbound[candidate] += 1;
            usage[candidate] += 1;
        }

        stats.alternative_links += picks.len();
        state.links[source].alternatives = picks;
    }
}

/// Inbound estimate seeded from every node's top-K recommendation candidates
fn popularity_prior(pools: &CandidatePools, top_k: usize) -> Vec<f64> {
    let mut estimate = vec![0.0; pools.len()];
    for node in 0..pools.len() {
        for edge in pools.recommendations(node).iter().take(top_k) {
            estimate[edge.target] += 1.0;
        }
    }
    estimate
}

fn rerank(
    items: &[Item],
    source: NodeId,
    candidates: &[Edge],
    estimate: &[f64],
    cfg: &SelectorConfig,
    recent_cutoff: Option<DateTime<Utc>>,
) -> Vec<Edge> {
    let item = &items[source];
    let mut ranked: Vec<Edge> = candidates
        .iter()
        .map(|edge| {
            let candidate = &items[edge.target];
            let mut score = edge.score - cfg.popularity_weight * estimate[edge.target].ln_1p();
            if item.shares_category(candidate) {
                score -= cfg.same_category_penalty;
            }
            if item.shares_price_band(candidate) {
                score -= cfg.same_price_band_penalty;
            }
            if item.shares_brand(candidate) {
                score -= cfg.same_brand_penalty;
            }
            if candidate.rating >= cfg.high_rating {
                score += cfg.high_rating_bonus;
            }
            if let (Some(cutoff), Some(updated)) = (recent_cutoff, candidate.updated_at) {
                if updated >= cutoff {
                    score += cfg.recent_bonus;
                }
            }
            Edge {
                target: edge.target,
                score,
            }
        })
        .collect();
    sort_descending(&mut ranked);
    ranked
}

/// Stable: equal scores keep their pool order
fn sort_descending(edges: &mut [Edge]) {
    edges.sort_by(|a, b| b.score.total_cmp(&a.score));
}

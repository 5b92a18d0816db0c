use crate::config::{GraphConfig, LinkLimits};
use crate::hash::{pair_hash, stable_hash};
use crate::pool::CandidatePools;
use crate::state::{diversity_allows, GraphState, NodeId};
use serde::Serialize;
use sitegraph_catalog::{Catalog, Item};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RescueStats {
    pub rounds: usize,
    pub inserted: usize,
    pub swapped: usize,
    /// Nodes still below the rescue floor afterwards
    pub still_under_floor: usize,
}

/// Donate recommendation links to nodes below `rescue.floor`.
///
/// Inbound counts are recounted over recommendations and alternatives first.
/// Only recommendation lists are mutated. Each round processes under-linked
/// nodes worst-first; a round that places nothing ends the pass.
pub fn rescue_under_linked(
    catalog: &Catalog,
    pools: &CandidatePools,
    config: &GraphConfig,
    state: &mut GraphState,
) -> RescueStats {
    let items = catalog.items();
    let floor = config.rescue.floor;
    let mut stats = RescueStats::default();

    state.recount_inbound(false);

    for round in 1..=config.rescue.max_rounds {
        let mut needy: Vec<NodeId> = (0..items.len())
            .filter(|&node| state.inbound[node] < floor)
            .collect();
        if needy.is_empty() {
            break;
        }
        needy.sort_by_key(|&node| (state.inbound[node], stable_hash(&items[node].slug), node));

        stats.rounds = round;
        let mut placed = 0;
        for target in needy {
            placed += rescue_target(items, pools, config, target, state, &mut stats);
        }

        log::debug!("Rescue round {round}: {placed} links placed");
        if placed == 0 {
            break;
        }
    }

    stats.still_under_floor = state.inbound.iter().filter(|&&count| count < floor).count();
    log::info!(
        "Rescue: {} rounds, {} inserted, {} swapped, {} still below {}",
        stats.rounds,
        stats.inserted,
        stats.swapped,
        stats.still_under_floor,
        floor
    );
    stats
}

fn rescue_target(
    items: &[Item],
    pools: &CandidatePools,
    config: &GraphConfig,
    target: NodeId,
    state: &mut GraphState,
    stats: &mut RescueStats,
) -> usize {
    let limits = &config.limits;
    let floor = config.rescue.floor;
    let slug = items[target].slug.as_str();

    // Nodes topically close to the target, best first
    let mut donors: Vec<(f64, u64, NodeId)> = pools
        .recommendations(target)
        .iter()
        .filter(|edge| edge.target != target)
        .map(|edge| (edge.score, pair_hash(&items[edge.target].slug, slug), edge.target))
        .collect();
    donors.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

    // `validate` keeps the floor at or below the hub cap
    let mut placed = 0;
    for (_, _, donor) in donors {
        if state.inbound[target] >= floor {
            break;
        }
        if state.links[donor].links_to(target) {
            continue;
        }

        let recs = &state.links[donor].recommendations;
        if recs.len() < limits.target_recommendations
            && diversity_allows(items, recs.iter().copied(), target, limits)
        {
            state.links[donor].recommendations.push(target);
            state.inbound[target] += 1;
            stats.inserted += 1;
            placed += 1;
            continue;
        }

        if let Some(position) = eviction_candidate(items, state, limits, floor, donor, target) {
            let evicted =
                std::mem::replace(&mut state.links[donor].recommendations[position], target);
            state.inbound[evicted] -= 1;
            state.inbound[target] += 1;
            stats.swapped += 1;
            placed += 1;
            log::debug!(
                "Rescue swap at {}: {} -> {}",
                items[donor].slug,
                items[evicted].slug,
                slug
            );
        }
    }

    if placed == 0 {
        log::debug!("No donor could link {slug}");
    }
    placed
}

/// Position in `donor`'s recommendations that `target` may replace.
///
/// The evictee must stay above the rescue floor after losing this link, and
/// the replaced set must keep its diversity caps. The best-linked evictee
/// wins; ties go to the earliest position.
fn eviction_candidate(
    items: &[Item],
    state: &GraphState,
    limits: &LinkLimits,
    floor: usize,
    donor: NodeId,
    target: NodeId,
) -> Option<usize> {
    let recs = &state.links[donor].recommendations;
    let mut best: Option<(usize, usize)> = None;

    for (position, &current) in recs.iter().enumerate() {
        if current == target || state.inbound[current] <= floor + 1 {
            continue;
        }
        let rest = recs
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != position)
            .map(|(_, &node)| node);
        if !diversity_allows(items, rest, target, limits) {
            continue;
        }
        let inbound = state.inbound[current];
        if best.map_or(true, |(_, best_inbound)| inbound > best_inbound) {
            best = Some((position, inbound));
        }
    }

    best.map(|(position, _)| position)
}

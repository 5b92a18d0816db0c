use crate::config::GraphConfig;
use crate::hash::{pair_hash, stable_hash};
use crate::state::{diversity_allows, GraphState, NodeId};
use serde::Serialize;
use sitegraph_catalog::{Catalog, Item};

/// Kind of outgoing slot a donor offers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    Recommendation,
    Alternative,
    Explore,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationStats {
    pub recommendation_slots: usize,
    pub alternative_slots: usize,
    pub explore_slots: usize,
    pub top_up_links: usize,
    /// Top-up links that moved an explore slot off a well-linked node
    pub repointed_explore: usize,
    /// Nodes still below `limits.min_inbound`
    pub unsatisfied: usize,
}

/// Last-resort connectivity pass over recommendations, alternatives and the
/// single explore slot per node.
///
/// The slot pass raises every node toward `explore.floor` using whichever
/// free slot ranks best. The top-up pass then works on explore slots alone
/// and aims for `limits.min_inbound`.
pub fn allocate_explore_slots(
    catalog: &Catalog,
    config: &GraphConfig,
    state: &mut GraphState,
) -> AllocationStats {
    let items = catalog.items();
    let mut stats = AllocationStats::default();

    if !config.explore.require_affinity {
        log::info!("Explore links accept any donor (explore.require_affinity = false)");
    }

    state.recount_inbound(true);

    // Phase 1: best free slot per placement
    for target in needy(items, state, config.explore.floor) {
        while state.inbound[target] < config.explore.floor
            && state.inbound[target] < config.limits.max_inbound
        {
            let Some((kind, donor)) = best_slot(items, config, state, target) else {
                log::debug!("No free slot can link {}", items[target].slug);
                break;
            };
            let links = &mut state.links[donor];
            match kind {
                SlotKind::Recommendation => {
                    links.recommendations.push(target);
                    stats.recommendation_slots += 1;
                }
                SlotKind::Alternative => {
                    links.alternatives.push(target);
                    stats.alternative_slots += 1;
                }
                SlotKind::Explore => {
                    links.explore = Some(target);
                    stats.explore_slots += 1;
                }
            }
            state.inbound[target] += 1;
        }
    }

    // Phase 2: explore-only top-up toward the hard floor
    for target in needy(items, state, config.limits.min_inbound) {
        for donor in top_up_donors(items, config, state, target) {
            if state.inbound[target] >= config.limits.min_inbound
                || state.inbound[target] >= config.limits.max_inbound
            {
                break;
            }
            // Earlier re-points may have lowered the previous target's count
            match state.links[donor].explore {
                Some(previous) if state.inbound[previous] <= config.explore.floor => continue,
                Some(previous) => {
                    state.inbound[previous] -= 1;
                    stats.repointed_explore += 1;
                }
                None => {}
            }
            state.links[donor].explore = Some(target);
            state.inbound[target] += 1;
            stats.top_up_links += 1;
        }
    }

    state.recount_inbound(true);
    stats.unsatisfied = state
        .inbound
        .iter()
        .filter(|&&count| count < config.limits.min_inbound)
        .count();

    if stats.unsatisfied > 0 {
        log::warn!(
            "{} nodes remain below {} inbound links after allocation",
            stats.unsatisfied,
            config.limits.min_inbound
        );
    }
    log::info!(
        "Allocated {} recommendation, {} alternative, {} explore slots; {} top-up links",
        stats.recommendation_slots,
        stats.alternative_slots,
        stats.explore_slots,
        stats.top_up_links
    );
    stats
}

/// Nodes below `floor`, worst first
fn needy(items: &[Item], state: &GraphState, floor: usize) -> Vec<NodeId> {
    let mut nodes: Vec<NodeId> = (0..items.len())
        .filter(|&node| state.inbound[node] < floor)
        .collect();
    nodes.sort_by_key(|&node| (state.inbound[node], stable_hash(&items[node].slug), node));
    nodes
}

fn explore_feasible(config: &GraphConfig, donor: &Item, target: &Item) -> bool {
    !config.explore.require_affinity || donor.shares_category(target) || donor.shares_brand(target)
}

/// Free slot with the lowest (fill, closeness, hash, kind, donor) key
fn best_slot(
    items: &[Item],
    config: &GraphConfig,
    state: &GraphState,
    target: NodeId,
) -> Option<(SlotKind, NodeId)> {
    let limits = &config.limits;
    let wanted = &items[target];
    let mut best: Option<((usize, u8, u64, SlotKind, NodeId), SlotKind, NodeId)> = None;

    for (donor, links) in state.links.iter().enumerate() {
        if donor == target || links.links_to(target) {
            continue;
        }
        let item = &items[donor];
        let closeness = 2 - u8::from(item.shares_category(wanted)) - u8::from(item.shares_brand(wanted));
        let hash = pair_hash(&item.slug, &wanted.slug);

        let mut offer = |kind: SlotKind, fill: usize| {
            let key = (fill, closeness, hash, kind, donor);
            if best.as_ref().map_or(true, |(current, _, _)| key < *current) {
                best = Some((key, kind, donor));
            }
        };

        if links.recommendations.len() < limits.target_recommendations
            && diversity_allows(items, links.recommendations.iter().copied(), target, limits)
        {
            offer(
                SlotKind::Recommendation,
                permille(links.recommendations.len(), limits.target_recommendations),
            );
        }
        if links.alternatives.len() < limits.target_alternatives {
            offer(
                SlotKind::Alternative,
                permille(links.alternatives.len(), limits.target_alternatives),
            );
        }
        if links.explore.is_none() && explore_feasible(config, item, wanted) {
            offer(SlotKind::Explore, 0);
        }
    }

    best.map(|(_, kind, donor)| (kind, donor))
}

/// Same-category donors first, then the least-linked-out, then by hash
fn top_up_donors(
    items: &[Item],
    config: &GraphConfig,
    state: &GraphState,
    target: NodeId,
) -> Vec<NodeId> {
    let wanted = &items[target];
    let mut donors: Vec<(bool, usize, u64, NodeId)> = state
        .links
        .iter()
        .enumerate()
        .filter(|(donor, links)| {
            *donor != target
                && !links.links_to(target)
                && explore_feasible(config, &items[*donor], wanted)
                && links
                    .explore
                    .map_or(true, |previous| state.inbound[previous] > config.explore.floor)
        })
        .map(|(donor, links)| {
            (
                !items[donor].shares_category(wanted),
                links.out_degree(),
                pair_hash(&items[donor].slug, &wanted.slug),
                donor,
            )
        })
        .collect();
    donors.sort_unstable();
    donors.into_iter().map(|(_, _, _, donor)| donor).collect()
}

fn permille(len: usize, capacity: usize) -> usize {
    len * 1000 / capacity.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::catalog;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn assert_well_formed(state: &GraphState) {
        for (source, links) in state.links.iter().enumerate() {
            assert!(!links.links_to(source), "self link at {source}");
            let unique: BTreeSet<NodeId> = links.targets().collect();
            assert_eq!(unique.len(), links.out_degree(), "duplicate target at {source}");
        }
    }

    #[test]
    fn lifts_orphans_to_the_floor() {
        let catalog = catalog(&[
            ("alpha", "Alpha Lamp", "lighting", "$40"),
            ("bravo", "Bravo Kettle", "kitchen", "$25"),
            ("charlie", "Charlie Tent", "outdoor", "$300"),
        ]);
        let mut state = GraphState::new(3);
        state.links[0].recommendations = vec![1];

        let stats = allocate_explore_slots(&catalog, &GraphConfig::default(), &mut state);

        assert_eq!(state.inbound, vec![2, 2, 2]);
        assert_eq!(stats.unsatisfied, 0);
        assert_well_formed(&state);
    }

    fn full_lists() -> (Catalog, GraphConfig, GraphState) {
        let catalog = catalog(&[
            ("acme-saw", "Acme Saw", "tools", "$40"),
            ("bolt-drill", "Bolt Drill", "tools", "$60"),
            ("core-level", "Core Level", "tools", "$15"),
            ("fern-seeds", "Fern Seeds", "garden", "$3"),
        ]);
        let mut config = GraphConfig::default();
        config.limits.target_recommendations = 1;
        config.limits.target_alternatives = 1;

        let mut state = GraphState::new(4);
        let lists = [(1, 2), (2, 0), (0, 1), (0, 1)];
        for (links, (rec, alt)) in state.links.iter_mut().zip(lists) {
            links.recommendations = vec![rec];
            links.alternatives = vec![alt];
        }
        (catalog, config, state)
    }

    #[test]
    fn explore_slots_reach_unrelated_nodes_by_default() {
        let (catalog, config, mut state) = full_lists();

        let stats = allocate_explore_slots(&catalog, &config, &mut state);

        assert_eq!(stats.recommendation_slots + stats.alternative_slots, 0);
        assert_eq!(state.inbound[3], 3);
        assert!(state.inbound.iter().all(|&count| count >= 2));
        assert_eq!(stats.unsatisfied, 0);
        assert_well_formed(&state);
    }

    #[test]
    fn affinity_rule_leaves_isolated_node_unsatisfied() {
        let (catalog, mut config, mut state) = full_lists();
        config.explore.require_affinity = true;

        let stats = allocate_explore_slots(&catalog, &config, &mut state);

        assert_eq!(state.inbound[3], 0);
        assert_eq!(stats.unsatisfied, 1);
        assert!(state.links.iter().all(|links| links.explore != Some(3)));
    }

    #[test]
    fn top_up_prefers_same_category_donors_with_few_links() {
        let catalog = catalog(&[
            ("seed-tray", "Seed Tray", "garden", "ask"),
            ("wide-donor", "Wide Donor", "garden", "ask"),
            ("narrow-donor", "Narrow Donor", "garden", "ask"),
            ("idle-drill", "Idle Drill", "tools", "ask"),
            ("linked-donor", "Linked Donor", "garden", "ask"),
            ("busy-explore", "Busy Explore", "garden", "ask"),
        ]);
        let config = GraphConfig::default();
        let mut state = GraphState::new(6);
        state.links[1].recommendations = vec![2, 4];
        state.links[2].recommendations = vec![4];
        state.links[4].recommendations = vec![0];
        // Its explore target sits at one inbound link, below explore.floor
        state.links[5].explore = Some(3);
        state.recount_inbound(true);

        let donors = top_up_donors(catalog.items(), &config, &state, 0);

        // Same category before out-degree: the idle tools node comes last
        assert_eq!(donors, vec![2, 1, 3]);
    }

    #[test]
    fn top_up_repoints_explore_from_well_linked_node() {
        let catalog = catalog(&[
            ("hub-node", "Hub Node", "misc", "ask"),
            ("donor-one", "Donor One", "misc", "ask"),
            ("donor-two", "Donor Two", "misc", "ask"),
            ("donor-six", "Donor Six", "misc", "ask"),
            ("donor-ten", "Donor Ten", "misc", "ask"),
            ("lonely", "Lonely Page", "misc", "ask"),
        ]);
        let mut config = GraphConfig::default();
        config.limits.target_recommendations = 1;
        config.limits.target_alternatives = 1;

        // Every list is full; donors' explore slots all point at the hub
        let mut state = GraphState::new(6);
        for donor in 1..5 {
            state.links[donor].explore = Some(0);
        }
        state.links[0].recommendations = vec![1];
        state.links[0].alternatives = vec![4];
        state.links[5].recommendations = vec![3];
        state.links[5].alternatives = vec![4];
        for donor in 1..5 {
            let others: Vec<NodeId> = (1..5).filter(|&n| n != donor).collect();
            state.links[donor].recommendations = vec![others[0]];
            state.links[donor].alternatives = vec![others[1]];
        }

        let stats = allocate_explore_slots(&catalog, &config, &mut state);

        // The hub's own explore slot goes first, then one donor is re-pointed
        assert_eq!(stats.explore_slots, 1);
        assert_eq!(stats.repointed_explore, 1);
        assert_eq!(state.links[0].explore, Some(5));
        assert_eq!(state.inbound[5], 2);
        assert_eq!(state.inbound[0], config.explore.floor);
        assert_eq!(stats.unsatisfied, 0);
        assert_well_formed(&state);
    }
}

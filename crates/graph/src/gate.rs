use crate::config::GraphConfig;
use crate::error::{GraphError, Result};
use crate::state::{diversity_holds, GraphState, NodeId};
use petgraph::algo::kosaraju_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;
use sitegraph_catalog::{is_valid_slug, Catalog};
use std::collections::{HashMap, HashSet};

/// Type of a site link
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    Recommendation,
    Alternative,
    Explore,
}

/// Finished link structure as a petgraph digraph, one node per catalog item
pub struct SiteGraph {
    /// Directed graph (slug -> slug, weighted by link kind)
    pub graph: DiGraph<String, LinkKind>,

    /// Slug -> NodeIndex mapping for fast lookup
    pub slug_index: HashMap<String, NodeIndex>,
}

impl SiteGraph {
    /// Node `i` of the state becomes `NodeIndex::new(i)`. Targets outside
    /// the catalog are left out.
    pub fn from_state(catalog: &Catalog, state: &GraphState) -> Self {
        let mut graph = DiGraph::with_capacity(catalog.len(), state.edge_count());
        let mut slug_index = HashMap::with_capacity(catalog.len());

        // Phase 1: nodes in catalog order
        for item in catalog.items() {
            let idx = graph.add_node(item.slug.clone());
            slug_index.insert(item.slug.clone(), idx);
        }

        // Phase 2: edges
        let node_count = graph.node_count();
        for (source, links) in state.links.iter().enumerate().take(node_count) {
            let from = NodeIndex::new(source);
            let edges = links
                .recommendations
                .iter()
                .map(|&target| (target, LinkKind::Recommendation))
                .chain(links.alternatives.iter().map(|&target| (target, LinkKind::Alternative)))
                .chain(links.explore.map(|target| (target, LinkKind::Explore)));
            for (target, kind) in edges {
                if target < node_count {
                    graph.add_edge(from, NodeIndex::new(target), kind);
                }
            }
        }

        Self { graph, slug_index }
    }

    /// Find node by slug
    pub fn find_node(&self, slug: &str) -> Option<NodeIndex> {
        self.slug_index.get(slug).copied()
    }

    /// Distinct other nodes linking to `node`
    pub fn inbound_count(&self, node: NodeIndex) -> usize {
        self.graph
            .neighbors_directed(node, Direction::Incoming)
            .filter(|source| *source != node)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Inbound counts in catalog order
    pub fn inbound_counts(&self) -> Vec<usize> {
        self.graph
            .node_indices()
            .map(|node| self.inbound_count(node))
            .collect()
    }

    pub fn component_count(&self) -> usize {
        kosaraju_scc(&self.graph).len()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GateReport {
    pub nodes: usize,
    pub edges: usize,
    pub min_inbound: usize,
    pub max_inbound: usize,
    pub strongly_connected_components: usize,
    /// Recommendation signatures shared by more nodes than the threshold
    pub duplicate_signature_groups: usize,
    pub largest_signature_group: usize,
}

/// Validate the finished graph.
///
/// Returns the report and the authoritative inbound counts (catalog order).
/// Any node outside `[min_inbound, max_inbound]` or any structural defect
/// fails the whole build; repeated recommendation signatures only warn.
pub fn run_gate(
    catalog: &Catalog,
    state: &GraphState,
    config: &GraphConfig,
) -> Result<(GateReport, Vec<usize>)> {
    let items = catalog.items();
    let limits = &config.limits;
    let structural = structural_problems(catalog, state, config);

    let site = SiteGraph::from_state(catalog, state);
    let inbound = site.inbound_counts();

    let mut under_linked = Vec::new();
    let mut over_capped = Vec::new();
    for (item, &count) in items.iter().zip(&inbound) {
        if count < limits.min_inbound {
            under_linked.push((item.slug.clone(), count));
        } else if count > limits.max_inbound {
            over_capped.push((item.slug.clone(), count));
        }
    }

    if !under_linked.is_empty() || !over_capped.is_empty() || !structural.is_empty() {
        for (slug, count) in &under_linked {
            log::error!("{slug}: {count} inbound links, below the floor of {}", limits.min_inbound);
        }
        for (slug, count) in &over_capped {
            log::error!("{slug}: {count} inbound links, above the hub cap of {}", limits.max_inbound);
        }
        for problem in &structural {
            log::error!("{problem}");
        }
        return Err(GraphError::InvariantViolation {
            under_linked,
            over_capped,
            structural,
        });
    }

    // Quality only: identical ordered recommendation lists
    let mut signatures: HashMap<&[NodeId], usize> = HashMap::new();
    for links in state.links.iter().filter(|links| !links.recommendations.is_empty()) {
        *signatures.entry(links.recommendations.as_slice()).or_default() += 1;
    }
    let threshold = config.gate.duplicate_signature_threshold;
    let duplicate_signature_groups = signatures.values().filter(|&&n| n > threshold).count();
    let largest_signature_group = signatures.values().copied().max().unwrap_or(0);
    if duplicate_signature_groups > 0 {
        log::warn!(
            "{duplicate_signature_groups} recommendation signatures shared by more than {threshold} nodes (largest: {largest_signature_group})"
        );
    }

    let report = GateReport {
        nodes: site.node_count(),
        edges: site.edge_count(),
        min_inbound: inbound.iter().copied().min().unwrap_or(0),
        max_inbound: inbound.iter().copied().max().unwrap_or(0),
        strongly_connected_components: site.component_count(),
        duplicate_signature_groups,
        largest_signature_group,
    };

    log::info!(
        "Invariant gate passed: {} nodes, {} edges, inbound {}..={}",
        report.nodes,
        report.edges,
        report.min_inbound,
        report.max_inbound
    );

    Ok((report, inbound))
}

fn structural_problems(catalog: &Catalog, state: &GraphState, config: &GraphConfig) -> Vec<String> {
    let items = catalog.items();
    let limits = &config.limits;
    let mut problems = Vec::new();

    if state.len() != items.len() {
        problems.push(format!(
            "link state covers {} nodes, catalog has {}",
            state.len(),
            items.len()
        ));
    }

    for (source, links) in state.links.iter().enumerate() {
        let Some(item) = items.get(source) else {
            break;
        };
        let slug = item.slug.as_str();

        if !is_valid_slug(slug) {
            problems.push(format!("{slug}: not a valid slug"));
        }
        if links.recommendations.len() > limits.target_recommendations {
            problems.push(format!("{slug}: {} recommendations", links.recommendations.len()));
        }
        if links.alternatives.len() > limits.target_alternatives {
            problems.push(format!("{slug}: {} alternatives", links.alternatives.len()));
        }

        let mut seen = HashSet::new();
        for target in links.targets() {
            if target >= items.len() {
                problems.push(format!("{slug}: links to unknown node {target}"));
            } else if target == source {
                problems.push(format!("{slug}: links to itself"));
            } else if !seen.insert(target) {
                problems.push(format!("{slug}: links to {} more than once", items[target].slug));
            }
        }

        let in_range = links.recommendations.iter().all(|&target| target < items.len());
        if in_range && !diversity_holds(items, &links.recommendations, limits) {
            problems.push(format!("{slug}: recommendations break the diversity caps"));
        }
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::catalog;
    use pretty_assertions::assert_eq;

    fn ring(catalog: &Catalog) -> GraphState {
        let n = catalog.len();
        let mut state = GraphState::new(n);
        for (source, links) in state.links.iter_mut().enumerate() {
            links.recommendations = vec![(source + 1) % n];
            links.alternatives = vec![(source + 2) % n];
        }
        state
    }

    fn four() -> Catalog {
        catalog(&[
            ("alpha", "Alpha Lamp", "lighting", "$40"),
            ("bravo", "Bravo Kettle", "kitchen", "$25"),
            ("charlie", "Charlie Tent", "outdoor", "$300"),
            ("delta", "Delta Desk", "office", "$120"),
        ])
    }

    #[test]
    fn passes_a_well_formed_graph() {
        let catalog = four();
        let state = ring(&catalog);

        let (report, inbound) = run_gate(&catalog, &state, &GraphConfig::default()).unwrap();

        assert_eq!(inbound, vec![2, 2, 2, 2]);
        assert_eq!(report.nodes, 4);
        assert_eq!(report.edges, 8);
        assert_eq!(report.min_inbound, 2);
        assert_eq!(report.strongly_connected_components, 1);
        assert_eq!(report.duplicate_signature_groups, 0);
    }

    #[test]
    fn rejects_under_linked_and_self_loops() {
        let catalog = four();
        let mut state = ring(&catalog);
        state.links[3].alternatives = vec![3];

        let err = run_gate(&catalog, &state, &GraphConfig::default()).unwrap_err();

        match err {
            GraphError::InvariantViolation {
                under_linked,
                structural,
                ..
            } => {
                assert_eq!(under_linked, vec![("bravo".to_string(), 1)]);
                assert_eq!(structural, vec!["delta: links to itself".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_hub_cap_breach() {
        let catalog = four();
        let state = ring(&catalog);
        let mut config = GraphConfig::default();
        config.limits.max_inbound = 1;
        config.limits.min_inbound = 1;

        let err = run_gate(&catalog, &state, &config).unwrap_err();

        assert_eq!(err.unsatisfied_slugs(), vec!["alpha", "bravo", "charlie", "delta"]);
    }

    #[test]
    fn duplicate_signatures_only_warn() {
        let catalog = four();
        let mut state = GraphState::new(4);
        let lists: [(&[NodeId], &[NodeId]); 4] =
            [(&[1], &[2, 3]), (&[2], &[0, 3]), (&[1], &[0, 3]), (&[1], &[2])];
        for (links, (recs, alts)) in state.links.iter_mut().zip(lists) {
            links.recommendations = recs.to_vec();
            links.alternatives = alts.to_vec();
        }
        let mut config = GraphConfig::default();
        config.gate.duplicate_signature_threshold = 1;

        let (report, inbound) = run_gate(&catalog, &state, &config).unwrap();

        assert_eq!(inbound, vec![2, 3, 3, 3]);
        assert_eq!(report.duplicate_signature_groups, 1);
        assert_eq!(report.largest_signature_group, 3);
    }

    #[test]
    fn site_graph_lookup() {
        let catalog = four();
        let site = SiteGraph::from_state(&catalog, &ring(&catalog));
        let bravo = site.find_node("bravo").unwrap();
        assert_eq!(bravo.index(), 1);
        assert_eq!(site.inbound_count(bravo), 2);
        assert!(site.find_node("echo").is_none());
    }
}

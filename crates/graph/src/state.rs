use crate::config::LinkLimits;
use sitegraph_catalog::Item;

/// Position of an item in the catalog
pub type NodeId = usize;

/// Outgoing links of one node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeLinks {
    pub recommendations: Vec<NodeId>,
    pub alternatives: Vec<NodeId>,
    pub explore: Option<NodeId>,
}

impl NodeLinks {
    /// Whether any link kind already points at `target`
    pub fn links_to(&self, target: NodeId) -> bool {
        self.recommendations.contains(&target)
            || self.alternatives.contains(&target)
            || self.explore == Some(target)
    }

    /// Recommendations, then alternatives, then explore
    pub fn targets(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.recommendations
            .iter()
            .chain(self.alternatives.iter())
            .copied()
            .chain(self.explore)
    }

    pub fn out_degree(&self) -> usize {
        self.recommendations.len() + self.alternatives.len() + usize::from(self.explore.is_some())
    }
}

/// Mutable link state handed from stage to stage.
///
/// `inbound` is whatever the current stage maintains: a running count during
/// selection, recounted from `links` at the start of rescue and allocation.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    pub links: Vec<NodeLinks>,
    pub inbound: Vec<usize>,
}

impl GraphState {
    pub fn new(node_count: usize) -> Self {
        Self {
            links: vec![NodeLinks::default(); node_count],
            inbound: vec![0; node_count],
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn recount_inbound(&mut self, include_explore: bool) {
        self.inbound = compute_inbound(&self.links, include_explore);
    }

    pub fn edge_count(&self) -> usize {
        self.links.iter().map(NodeLinks::out_degree).sum()
    }
}

/// Number of distinct other nodes linking to each node.
pub fn compute_inbound(links: &[NodeLinks], include_explore: bool) -> Vec<usize> {
    let mut inbound = vec![0usize; links.len()];
    let mut targets: Vec<NodeId> = Vec::new();

    for (source, node) in links.iter().enumerate() {
        targets.clear();
        targets.extend(node.recommendations.iter().copied());
        targets.extend(node.alternatives.iter().copied());
        if include_explore {
            targets.extend(node.explore);
        }
        targets.sort_unstable();
        targets.dedup();

        for &target in &targets {
            if target != source && target < inbound.len() {
                inbound[target] += 1;
            }
        }
    }

    inbound
}

/// Whether `candidate` can join a recommendation set already holding `picks`
/// without breaking the category, price-band, or brand caps.
///
/// Empty categories, empty brands, and unknown price bands never count.
pub fn diversity_allows<I>(items: &[Item], picks: I, candidate: NodeId, limits: &LinkLimits) -> bool
where
    I: IntoIterator<Item = NodeId>,
{
    let candidate = &items[candidate];
    let mut same_category = 0usize;
    let mut same_band = 0usize;
    let mut same_brand = 0usize;

    for pick in picks {
        let pick = &items[pick];
        same_category += usize::from(pick.shares_category(candidate));
        same_band += usize::from(pick.shares_price_band(candidate));
        same_brand += usize::from(pick.shares_brand(candidate));
    }

    same_category < limits.max_same_category
        && same_band < limits.max_same_price_band
        && same_brand < limits.max_same_brand
}

/// Whether a whole recommendation set respects the caps
pub fn diversity_holds(items: &[Item], picks: &[NodeId], limits: &LinkLimits) -> bool {
    picks
        .iter()
        .enumerate()
        .all(|(pos, &pick)| diversity_allows(items, picks[..pos].iter().copied(), pick, limits))
}

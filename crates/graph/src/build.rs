use crate::artifacts::{write_artifacts, SiteArtifacts, WrittenArtifact};
use crate::config::GraphConfig;
use crate::error::Result;
use crate::explore::{allocate_explore_slots, AllocationStats};
use crate::gate::{run_gate, GateReport};
use crate::pool::{PoolBuilder, PoolStats};
use crate::rescue::{rescue_under_linked, RescueStats};
use crate::selector::{run_selector, SelectionStats};
use crate::state::GraphState;
use serde::Serialize;
use sitegraph_catalog::{load_gone_slugs, Catalog};
use std::collections::HashSet;
use std::path::Path;

/// Per-stage statistics of one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub items: usize,
    pub recommendation_links: usize,
    pub alternative_links: usize,
    pub explore_links: usize,
    pub pools: PoolStats,
    pub selection: SelectionStats,
    pub rescue: RescueStats,
    pub allocation: AllocationStats,
    pub gate: GateReport,
}

/// In-memory result of a successful build
#[derive(Debug, Clone)]
pub struct SiteGraphBuild {
    pub artifacts: SiteArtifacts,
    pub report: BuildReport,
}

/// Run every stage over `catalog`.
///
/// Pure given its inputs: the same catalog (in the same order) and config
/// always yield the same artifacts. Fails only at the invariant gate.
pub fn build_site_graph(catalog: &Catalog, config: &GraphConfig) -> Result<SiteGraphBuild> {
    config.validate()?;

    let (pools, pool_stats) = PoolBuilder::new(catalog, &config.pools).build();

    let mut state = GraphState::new(catalog.len());
    let selection = run_selector(catalog, &pools, config, &mut state);
    let rescue = rescue_under_linked(catalog, &pools, config, &mut state);
    let allocation = allocate_explore_slots(catalog, config, &mut state);
    let (gate, inbound) = run_gate(catalog, &state, config)?;

    let mut report = BuildReport {
        items: catalog.len(),
        pools: pool_stats,
        selection,
        rescue,
        allocation,
        gate,
        ..BuildReport::default()
    };
    for links in &state.links {
        report.recommendation_links += links.recommendations.len();
        report.alternative_links += links.alternatives.len();
        report.explore_links += usize::from(links.explore.is_some());
    }

    Ok(SiteGraphBuild {
        artifacts: SiteArtifacts::assemble(catalog, &state, &inbound),
        report,
    })
}

/// Load, build and write. Nothing is written unless the gate passes.
pub fn run_build(
    catalog_path: &Path,
    gone_path: Option<&Path>,
    config: &GraphConfig,
    out_dir: &Path,
) -> Result<(BuildReport, Vec<WrittenArtifact>)> {
    let build = load_and_build(catalog_path, gone_path, config)?;
    let written = write_artifacts(out_dir, &build.artifacts)?;
    Ok((build.report, written))
}

/// Load the catalog (minus gone slugs) and build in memory
pub fn load_and_build(
    catalog_path: &Path,
    gone_path: Option<&Path>,
    config: &GraphConfig,
) -> Result<SiteGraphBuild> {
    let gone = match gone_path {
        Some(path) => load_gone_slugs(path)?,
        None => HashSet::new(),
    };
    let catalog = Catalog::load(catalog_path, &gone)?;
    build_site_graph(&catalog, config)
}

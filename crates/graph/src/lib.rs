//! # Sitegraph Graph
//!
//! Builds the recommendation / alternative / explore link structure of a
//! catalog site under site-wide connectivity and anti-spam limits.
//!
//! ## Features
//!
//! - **Candidate pools** - ranked recommendation and alternative candidates per item
//! - **Diversity-aware selection** - popularity penalties, category/price/brand caps, hub cap
//! - **Rescue** - donated or swapped links for under-linked pages
//! - **Explore slots** - last-resort links that guarantee an inbound floor
//! - **Invariant gate** - all-or-nothing validation before anything is written
//!
//! ## Architecture
//!
//! ```text
//! Catalog (items, natural order)
//!     │
//!     ├──> Pool Builder
//!     │      ├─ Recommendation score (category, topics, price, rating)
//!     │      └─ Alternative score (topic Jaccard + price affinity)
//!     │
//!     ├──> Selector ──> GraphState { links, inbound }
//!     │      ├─ Greedy walk under diversity + hub caps
//!     │      ├─ Hash-strided exploration pick
//!     │      ├─ Rotation of full sets
//!     │      └─ Alternatives with usage penalty + seeded jitter
//!     │
//!     ├──> Rescue (recommendations only, insertion or swap)
//!     │
//!     ├──> Explore-Slot Allocator (slot pass, then explore top-up)
//!     │
//!     └──> Invariant Gate (petgraph)
//!            └─ neighbors.json, topics.json, inbound_counts.json
//! ```
//!
//! Every stage takes the same [`GraphState`] by `&mut` and hands it on. Nodes
//! are processed in catalog order and every tie-break hashes stable keys, so
//! identical catalogs always produce byte-identical artifacts.

mod artifacts;
mod build;
mod config;
mod error;
mod explore;
mod gate;
mod hash;
mod pool;
mod rescue;
mod selector;
mod state;

pub use artifacts::{
    topic_index, write_artifacts, NeighborEntry, SiteArtifacts, WrittenArtifact,
    INBOUND_COUNTS_FILE, NEIGHBORS_FILE, TOPICS_FILE,
};
pub use build::{build_site_graph, load_and_build, run_build, BuildReport, SiteGraphBuild};
pub use config::{
    AlternativeConfig, ExploreConfig, GateConfig, GraphConfig, LinkLimits, PoolConfig,
    RescueConfig, SelectorConfig,
};
pub use error::{GraphError, Result};
pub use explore::{allocate_explore_slots, AllocationStats, SlotKind};
pub use gate::{run_gate, GateReport, LinkKind, SiteGraph};
pub use hash::{fnv1a64, pair_hash, stable_hash, Jitter};
pub use pool::{CandidatePools, Edge, PoolBuilder, PoolStats};
pub use rescue::{rescue_under_linked, RescueStats};
pub use selector::{
    rotate_recommendations, run_selector, select_alternatives, select_recommendations,
    SelectionStats,
};
pub use state::{compute_inbound, diversity_allows, diversity_holds, GraphState, NodeId, NodeLinks};

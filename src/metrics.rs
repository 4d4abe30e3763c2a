//! Primary and secondary adjacency.
//!
//! ```text
//! primary(v)   = |N(v)|
//! secondary(v) = max over u in N(v) of |N(u) ∩ N(v)|
//! ```
//!
//! `secondary(v)` is undefined (`None`) when `N(v)` is empty. Each node's
//! pair depends only on the graph, never on other nodes' results, so nodes
//! can be computed in any order or in parallel.

use rayon::prelude::*;

use crate::graph::{AdjacencyGraph, GraphSnapshot};
use crate::model::*;
use crate::scratch::ScratchRegistry;
use crate::storage::TopologyOracle;
use crate::Result;

/// Largest overlap between `primary` and any of the given neighbor sets.
///
/// `None` when `neighbor_sets` is empty.
pub fn secondary_count<'a, I>(primary: &NeighborSet, neighbor_sets: I) -> Option<u32>
where
    I: IntoIterator<Item = &'a NeighborSet>,
{
    neighbor_sets
        .into_iter()
        .map(|theirs| common_count(primary, theirs) as u32)
        .max()
}

/// Computes metric pairs, one working set per node.
#[derive(Debug, Default)]
pub struct MetricEngine {
    scratch: ScratchRegistry,
}

impl MetricEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scratch(&self) -> &ScratchRegistry {
        &self.scratch
    }

    /// Metrics for `node`, pulling neighbor sets through the lazy graph.
    pub async fn compute<O>(&self, graph: &AdjacencyGraph<'_, O>, node: NodeId) -> Result<MetricResult>
    where
        O: TopologyOracle + ?Sized,
    {
        let primary = graph.neighbors(node).await?;
        let working = self.scratch.acquire(node, primary);

        let mut secondary: Option<u32> = None;
        for &neighbor in working.members() {
            let theirs = graph.neighbors(neighbor).await?;
            let shared = common_count(working.members(), &theirs) as u32;
            secondary = Some(secondary.map_or(shared, |best| best.max(shared)));
        }

        Ok(MetricResult {
            node,
            primary: working.members().len() as u32,
            secondary,
        })
    }

    /// Metrics for `node` against a materialized snapshot.
    pub fn compute_snapshot(&self, snapshot: &GraphSnapshot, node: NodeId) -> Result<MetricResult> {
        let working = self.scratch.acquire(node, snapshot.shared(node)?);

        let mut sets = Vec::with_capacity(working.members().len());
        for &neighbor in working.members() {
            sets.push(snapshot.neighbors(neighbor)?);
        }

        Ok(MetricResult {
            node,
            primary: working.members().len() as u32,
            secondary: secondary_count(working.members(), sets),
        })
    }

    /// Metrics for every node in `nodes`, computed in parallel. Results keep
    /// the order of `nodes`.
    ///
    /// Blocks the caller until the rayon pool has finished every node.
    pub fn compute_all(&self, snapshot: &GraphSnapshot, nodes: &[NodeId]) -> Vec<Result<MetricResult>> {
        nodes
            .par_iter()
            .map(|&node| self.compute_snapshot(snapshot, node))
            .collect()
    }
}

//! Fully materialized, read-only adjacency graph.
//!
//! Built once, before any parallel metric work starts, so that lookups
//! need no locking and no oracle.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::*;
use crate::{Error, Result};

#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    sets: HashMap<NodeId, Arc<NeighborSet>>,
}

impl GraphSnapshot {
    pub(crate) fn from_shared(sets: HashMap<NodeId, Arc<NeighborSet>>) -> Self {
        Self { sets }
    }

    /// Build a snapshot directly from adjacency lists. Self-references are
    /// dropped.
    pub fn from_adjacency<I, N>(adjacency: I) -> Self
    where
        I: IntoIterator<Item = (NodeId, N)>,
        N: IntoIterator<Item = NodeId>,
    {
        let sets = adjacency
            .into_iter()
            .map(|(node, neighbors)| {
                let set: NeighborSet = neighbors.into_iter().filter(|n| *n != node).collect();
                (node, Arc::new(set))
            })
            .collect();
        Self { sets }
    }

    /// Neighbors of `node`. A node outside the snapshot was never answered
    /// by the oracle and is reported as a failed query.
    pub fn neighbors(&self, node: NodeId) -> Result<&NeighborSet> {
        self.sets
            .get(&node)
            .map(|s| s.as_ref())
            .ok_or_else(|| Error::OracleQuery { node, message: "node not materialized".into() })
    }

    /// Like [`neighbors`](Self::neighbors), sharing the set instead of
    /// borrowing it.
    pub fn shared(&self, node: NodeId) -> Result<Arc<NeighborSet>> {
        self.sets
            .get(&node)
            .cloned()
            .ok_or_else(|| Error::OracleQuery { node, message: "node not materialized".into() })
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.sets.contains_key(&node)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// All nodes, sorted.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.sets.keys().copied().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Check `b ∈ neighbors(a) ⟺ a ∈ neighbors(b)` for every edge, in
    /// node order. An edge to a node outside the snapshot counts as a
    /// violation.
    pub fn validate_symmetry(&self) -> Result<()> {
        for node in self.nodes() {
            let mut neighbors: Vec<NodeId> = self.sets[&node].iter().copied().collect();
            neighbors.sort_unstable();
            for neighbor in neighbors {
                let reciprocated = self
                    .sets
                    .get(&neighbor)
                    .is_some_and(|theirs| theirs.contains(&node));
                if !reciprocated {
                    return Err(Error::AsymmetricAdjacency { node, neighbor });
                }
            }
        }
        Ok(())
    }
}

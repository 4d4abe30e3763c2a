//! # Adjacency Graph
//!
//! Memoized neighbor lookup over a [`TopologyOracle`].
//!
//! The oracle is asked about each node at most once per graph; every later
//! request, at primary or secondary level, is answered from the cache. A
//! returned set never contains the node it belongs to, whatever the oracle
//! said.
//!
//! ## Symmetry
//!
//! Each time a node is cached its set is checked against every already
//! cached node it touches, and against every cached node that claimed it.
//! A pair is therefore checked as soon as both ends are known. In strict
//! mode a violation fails the lookup with `Error::AsymmetricAdjacency`;
//! otherwise it is logged and the oracle's direction is kept.
//!
//! ## Failures
//!
//! A failed lookup, whether the oracle errored or strict mode rejected the
//! answer, is remembered too. Later requests for that node get the same
//! error back without a second oracle query.

pub mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::model::*;
use crate::storage::TopologyOracle;
use crate::{Error, Result};

pub use snapshot::GraphSnapshot;

/// Why a node's lookup failed, kept so the error can be handed out again.
#[derive(Debug, Clone)]
enum Failure {
    Oracle(String),
    Asymmetric { node: NodeId, neighbor: NodeId },
}

impl Failure {
    fn of(err: &Error) -> Self {
        match err {
            Error::AsymmetricAdjacency { node, neighbor } => {
                Failure::Asymmetric { node: *node, neighbor: *neighbor }
            }
            Error::OracleQuery { message, .. } => Failure::Oracle(message.clone()),
            other => Failure::Oracle(other.to_string()),
        }
    }

    fn to_error(&self, node: NodeId) -> Error {
        match self {
            Failure::Oracle(message) => Error::OracleQuery { node, message: message.clone() },
            Failure::Asymmetric { node, neighbor } => {
                Error::AsymmetricAdjacency { node: *node, neighbor: *neighbor }
            }
        }
    }
}

#[derive(Default)]
struct CacheState {
    sets: HashMap<NodeId, Arc<NeighborSet>>,
    failed: HashMap<NodeId, Failure>,
    /// not-yet-cached node → cached nodes that list it as a neighbor
    claims: HashMap<NodeId, Vec<NodeId>>,
}

/// Lazily populated, read-mostly adjacency graph for one run.
pub struct AdjacencyGraph<'o, O: TopologyOracle + ?Sized> {
    oracle: &'o O,
    strict: bool,
    state: RwLock<CacheState>,
    queries: AtomicU64,
}

impl<'o, O: TopologyOracle + ?Sized> AdjacencyGraph<'o, O> {
    pub fn new(oracle: &'o O) -> Self {
        Self {
            oracle,
            strict: false,
            state: RwLock::new(CacheState::default()),
            queries: AtomicU64::new(0),
        }
    }

    /// Fail lookups that reveal asymmetric adjacency.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Neighbors of `node`, querying the oracle only on first request.
    pub async fn neighbors(&self, node: NodeId) -> Result<Arc<NeighborSet>> {
        {
            let state = self.state.read();
            if let Some(hit) = state.sets.get(&node) {
                return Ok(hit.clone());
            }
            if let Some(failure) = state.failed.get(&node) {
                return Err(failure.to_error(node));
            }
        }

        self.queries.fetch_add(1, Ordering::Relaxed);
        let queried = self.oracle.adjacent_to(node).await;
        let result = match queried {
            Ok(mut set) => {
                if set.remove(&node) {
                    debug!(%node, "oracle listed node as its own neighbor; dropped");
                }
                self.insert(node, set)
            }
            Err(err) => Err(err),
        };

        if let Err(err) = &result {
            let mut state = self.state.write();
            if !state.sets.contains_key(&node) {
                state.failed.entry(node).or_insert_with(|| Failure::of(err));
            }
        }
        result
    }

    /// Cache a freshly queried set, or return the one a concurrent caller
    /// stored first.
    fn insert(&self, node: NodeId, set: NeighborSet) -> Result<Arc<NeighborSet>> {
        let mut state = self.state.write();
        if let Some(existing) = state.sets.get(&node) {
            return Ok(existing.clone());
        }
        if let Some(failure) = state.failed.get(&node) {
            return Err(failure.to_error(node));
        }

        // Cached neighbors of `node` must list `node` back.
        for &neighbor in &set {
            if let Some(theirs) = state.sets.get(&neighbor) {
                if !theirs.contains(&node) {
                    self.asymmetry(node, neighbor)?;
                }
            }
        }
        // Cached nodes that listed `node` must appear in its set.
        if let Some(claimants) = state.claims.get(&node) {
            for &claimant in claimants {
                if !set.contains(&claimant) {
                    self.asymmetry(claimant, node)?;
                }
            }
        }
        state.claims.remove(&node);
        for &neighbor in &set {
            if !state.sets.contains_key(&neighbor) {
                state.claims.entry(neighbor).or_default().push(node);
            }
        }

        debug!(%node, degree = set.len(), "cached neighbor set");
        let set = Arc::new(set);
        state.sets.insert(node, set.clone());
        Ok(set)
    }

    /// `neighbor ∈ neighbors(node)` but not the reverse.
    fn asymmetry(&self, node: NodeId, neighbor: NodeId) -> Result<()> {
        if self.strict {
            return Err(Error::AsymmetricAdjacency { node, neighbor });
        }
        warn!(%node, %neighbor, "asymmetric adjacency reported by oracle; using reported direction");
        Ok(())
    }

    /// Query every node of `universe`, plus any node they reference, then
    /// freeze the result into a read-only snapshot.
    pub async fn materialize(&self, universe: &[NodeId]) -> Result<GraphSnapshot> {
        for &node in universe {
            self.neighbors(node).await?;
        }
        loop {
            let missing: Vec<NodeId> = {
                let state = self.state.read();
                state.claims.keys().copied().collect()
            };
            if missing.is_empty() {
                break;
            }
            for node in missing {
                self.neighbors(node).await?;
            }
        }
        Ok(self.snapshot())
    }

    /// Read-only copy of everything cached so far.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from_shared(self.state.read().sets.clone())
    }

    /// Number of oracle queries issued.
    pub fn oracle_queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    /// Number of nodes whose neighbor set is cached.
    pub fn cached_nodes(&self) -> usize {
        self.state.read().sets.len()
    }

    /// Number of nodes whose lookup failed.
    pub fn failed_nodes(&self) -> usize {
        self.state.read().failed.len()
    }
}

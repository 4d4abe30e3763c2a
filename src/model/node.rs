//! Node identity and neighbor sets.

use serde::{Deserialize, Serialize};

/// Opaque polygon identifier.
///
/// Stable for the life of a run and unique within the dataset. Which
/// attribute it was read from is resolved once at run start (see
/// [`crate::run::resolve_identifier_field`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        NodeId(raw)
    }
}

/// The set of nodes sharing a boundary with some owner node.
///
/// Never contains its owner.
pub type NeighborSet = hashbrown::HashSet<NodeId>;

/// Size of the intersection of two neighbor sets.
///
/// Iterates the smaller set and probes the larger one.
pub fn common_count(a: &NeighborSet, b: &NeighborSet) -> usize {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small.iter().filter(|n| large.contains(*n)).count()
}

//! Per-node working sets.
//!
//! While a node's secondary adjacency is computed, its primary neighbor set
//! is held in a [`WorkingSet`]. Each one has its own [`ScratchId`] and is
//! released from its registry when dropped, on whichever path the node's
//! processing leaves by.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::model::*;

/// Unique identifier of one working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScratchId(pub u64);

impl std::fmt::Display for ScratchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scratch-{}", self.0)
    }
}

/// Hands out working sets and tracks which are still alive.
#[derive(Debug, Default)]
pub struct ScratchRegistry {
    next_id: AtomicU64,
    live: Mutex<hashbrown::HashMap<ScratchId, NodeId>>,
}

impl ScratchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a working set holding `members`, the primary neighbors of `owner`.
    pub fn acquire(&self, owner: NodeId, members: Arc<NeighborSet>) -> WorkingSet<'_> {
        let id = ScratchId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live.lock().insert(id, owner);
        WorkingSet { id, owner, members, registry: self }
    }

    /// Working sets acquired and not yet released.
    pub fn live(&self) -> usize {
        self.live.lock().len()
    }

    /// Total working sets ever acquired.
    pub fn issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed)
    }

    fn release(&self, id: ScratchId) {
        self.live.lock().remove(&id);
    }
}

/// Scoped handle to one node's primary neighbor set.
#[derive(Debug)]
pub struct WorkingSet<'r> {
    id: ScratchId,
    owner: NodeId,
    members: Arc<NeighborSet>,
    registry: &'r ScratchRegistry,
}

impl WorkingSet<'_> {
    pub fn id(&self) -> ScratchId {
        self.id
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn members(&self) -> &NeighborSet {
        &self.members
    }
}

impl Drop for WorkingSet<'_> {
    fn drop(&mut self) {
        self.registry.release(self.id);
    }
}

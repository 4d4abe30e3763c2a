//! # Storage Contracts
//!
//! The three seams between the metric engine and the dataset it runs over.
//! Boundary sharing, attribute persistence and identifier listing are not
//! computed here; implementations answer them however they like (spatial
//! index, precomputed table, remote service).
//!
//! ## Implementations
//!
//! | Type | Module | Description |
//! |------|--------|-------------|
//! | `MemoryLayer` | `memory` | In-memory dataset for testing/embedding |

pub mod memory;

use std::sync::Arc;
use async_trait::async_trait;
use crate::model::*;
use crate::Result;

pub use memory::MemoryLayer;

// ============================================================================
// TopologyOracle
// ============================================================================

/// Answers "which features share a boundary with this one?".
///
/// Implementations should exclude `node` from its own answer and keep
/// adjacency symmetric; [`crate::AdjacencyGraph`] filters the former and
/// can check the latter. Failures are reported as
/// [`crate::Error::OracleQuery`].
#[async_trait]
pub trait TopologyOracle: Send + Sync {
    async fn adjacent_to(&self, node: NodeId) -> Result<NeighborSet>;
}

// ============================================================================
// AttributeStore
// ============================================================================

/// Persists computed metric values as short-integer attributes.
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Write `value` into `field` on `node` (upsert).
    async fn write(&self, node: NodeId, field: &str, value: i16) -> Result<()>;
}

// ============================================================================
// FeatureSource
// ============================================================================

/// The identity side of a dataset: what attributes it carries and which
/// features it contains.
#[async_trait]
pub trait FeatureSource: Send + Sync {
    /// Names of all attribute fields on the dataset.
    fn field_names(&self) -> Vec<String>;

    /// Every feature identifier, read from the given identifier field.
    async fn node_ids(&self, id_field: &FieldName) -> Result<Vec<NodeId>>;
}

// ============================================================================
// Forwarding impls
// ============================================================================

#[async_trait]
impl<T: TopologyOracle + ?Sized> TopologyOracle for Arc<T> {
    async fn adjacent_to(&self, node: NodeId) -> Result<NeighborSet> {
        (**self).adjacent_to(node).await
    }
}

#[async_trait]
impl<T: AttributeStore + ?Sized> AttributeStore for Arc<T> {
    async fn write(&self, node: NodeId, field: &str, value: i16) -> Result<()> {
        (**self).write(node, field, value).await
    }
}

#[async_trait]
impl<T: FeatureSource + ?Sized> FeatureSource for Arc<T> {
    fn field_names(&self) -> Vec<String> {
        (**self).field_names()
    }

    async fn node_ids(&self, id_field: &FieldName) -> Result<Vec<NodeId>> {
        (**self).node_ids(id_field).await
    }
}

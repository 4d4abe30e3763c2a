//! In-memory dataset.
//!
//! This is the reference implementation of all three storage contracts.
//! It uses plain HashMaps protected by RwLock.
//!
//! ## Limitations
//!
//! - **Adjacency is stored, not derived**: there is no geometry. Callers
//!   declare which features touch via `add_adjacency()` or a JSON file.
//! - **No field provisioning**: any field name is accepted on write.
//!
//! Use this layer for:
//! - Testing the graph model and metric engine
//! - Running the CLI over precomputed adjacency tables
//! - Fault injection (`fail_oracle_for`, `fail_writes_for`)

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use parking_lot::RwLock;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::model::*;
use crate::{Error, Result};
use super::{TopologyOracle, AttributeStore, FeatureSource};

/// Adjacency list of one feature. Planar polygons rarely have more than a
/// handful of neighbors.
type AdjacencyList = SmallVec<[NodeId; 8]>;

// ============================================================================
// JSON layout
// ============================================================================

/// On-disk layout accepted by [`MemoryLayer::from_json_str`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerFile {
    pub id_field: String,
    #[serde(default)]
    pub fields: Vec<String>,
    pub features: Vec<FeatureRecord>,
}

/// One feature and the features it reports as adjacent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: NodeId,
    #[serde(default)]
    pub neighbors: Vec<NodeId>,
}

// ============================================================================
// MemoryLayer
// ============================================================================

/// In-memory polygon layer: identifiers, declared adjacency, attributes.
pub struct MemoryLayer {
    id_field: String,
    extra_fields: RwLock<Vec<String>>,
    /// Feature ids in insertion order.
    order: RwLock<Vec<NodeId>>,
    adjacency: RwLock<HashMap<NodeId, AdjacencyList>>,
    attributes: RwLock<HashMap<(NodeId, String), i16>>,
    write_counts: RwLock<HashMap<(NodeId, String), u32>>,
    failing_queries: RwLock<hashbrown::HashSet<NodeId>>,
    failing_writes: RwLock<hashbrown::HashSet<NodeId>>,
    queries: AtomicU64,
}

impl MemoryLayer {
    /// An empty layer whose identifiers live in `id_field`.
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            extra_fields: RwLock::new(Vec::new()),
            order: RwLock::new(Vec::new()),
            adjacency: RwLock::new(HashMap::new()),
            attributes: RwLock::new(HashMap::new()),
            write_counts: RwLock::new(HashMap::new()),
            failing_queries: RwLock::new(hashbrown::HashSet::new()),
            failing_writes: RwLock::new(hashbrown::HashSet::new()),
            queries: AtomicU64::new(0),
        }
    }

    /// Parse a layer from its JSON layout. Neighbor lists are taken as
    /// given, one direction per record.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: LayerFile = serde_json::from_str(json)?;
        Ok(Self::from_file(file))
    }

    /// Read and parse a JSON layer file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_file(file: LayerFile) -> Self {
        let layer = Self::new(file.id_field);
        layer.extra_fields.write().extend(file.fields);
        for record in file.features {
            layer.add_feature(record.id);
            for neighbor in record.neighbors {
                layer.add_directed(record.id, neighbor);
            }
        }
        layer
    }

    /// Register an extra (non-identifier) attribute field.
    pub fn with_field(self, name: impl Into<String>) -> Self {
        self.extra_fields.write().push(name.into());
        self
    }

    /// Add a feature with no adjacency. No-op if it already exists.
    pub fn add_feature(&self, id: NodeId) {
        let mut adj = self.adjacency.write();
        if !adj.contains_key(&id) {
            adj.insert(id, AdjacencyList::new());
            self.order.write().push(id);
        }
    }

    /// Declare that `a` and `b` share a boundary (both directions).
    pub fn add_adjacency(&self, a: NodeId, b: NodeId) {
        self.add_directed(a, b);
        self.add_directed(b, a);
    }

    /// Declare that `from` reports `to` as adjacent, without the reverse.
    /// Both features are created if missing.
    pub fn add_directed(&self, from: NodeId, to: NodeId) {
        self.add_feature(from);
        self.add_feature(to);
        let mut adj = self.adjacency.write();
        if let Some(list) = adj.get_mut(&from) {
            if !list.contains(&to) {
                list.push(to);
            }
        }
    }

    /// Make every topology query for `node` fail.
    pub fn fail_oracle_for(&self, node: NodeId) {
        self.failing_queries.write().insert(node);
    }

    /// Make every attribute write for `node` fail.
    pub fn fail_writes_for(&self, node: NodeId) {
        self.failing_writes.write().insert(node);
    }

    /// Current value of an attribute, if it was ever written.
    pub fn attribute(&self, node: NodeId, field: &str) -> Option<i16> {
        self.attributes.read().get(&(node, field.to_string())).copied()
    }

    /// How many times `field` was written on `node`.
    pub fn write_count(&self, node: NodeId, field: &str) -> u32 {
        self.write_counts.read().get(&(node, field.to_string())).copied().unwrap_or(0)
    }

    /// Total topology queries answered or refused so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn feature_count(&self) -> usize {
        self.order.read().len()
    }

    /// Feature ids in insertion order.
    pub fn feature_ids(&self) -> Vec<NodeId> {
        self.order.read().clone()
    }
}

// ============================================================================
// Contract impls
// ============================================================================

#[async_trait]
impl TopologyOracle for MemoryLayer {
    async fn adjacent_to(&self, node: NodeId) -> Result<NeighborSet> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        if self.failing_queries.read().contains(&node) {
            return Err(Error::OracleQuery { node, message: "injected failure".into() });
        }
        let adj = self.adjacency.read();
        let list = adj.get(&node).ok_or_else(|| Error::OracleQuery {
            node,
            message: "unknown feature".into(),
        })?;
        Ok(list.iter().copied().collect())
    }
}

#[async_trait]
impl AttributeStore for MemoryLayer {
    async fn write(&self, node: NodeId, field: &str, value: i16) -> Result<()> {
        if self.failing_writes.read().contains(&node) {
            return Err(Error::AttributeWrite {
                node,
                field: field.to_string(),
                message: "injected failure".into(),
            });
        }
        if !self.adjacency.read().contains_key(&node) {
            return Err(Error::AttributeWrite {
                node,
                field: field.to_string(),
                message: "unknown feature".into(),
            });
        }
        let key = (node, field.to_string());
        *self.write_counts.write().entry(key.clone()).or_insert(0) += 1;
        self.attributes.write().insert(key, value);
        Ok(())
    }
}

#[async_trait]
impl FeatureSource for MemoryLayer {
    fn field_names(&self) -> Vec<String> {
        let mut names = vec![self.id_field.clone()];
        names.extend(self.extra_fields.read().iter().cloned());
        names
    }

    async fn node_ids(&self, id_field: &FieldName) -> Result<Vec<NodeId>> {
        if id_field.as_str() != self.id_field {
            return Err(Error::MissingIdentifierField { candidates: vec![id_field.0.clone()] });
        }
        Ok(self.feature_ids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_adjacency_is_symmetric() {
        let layer = MemoryLayer::new("OBJECTID");
        layer.add_adjacency(NodeId(1), NodeId(2));

        let a = layer.adjacent_to(NodeId(1)).await.unwrap();
        let b = layer.adjacent_to(NodeId(2)).await.unwrap();
        assert!(a.contains(&NodeId(2)));
        assert!(b.contains(&NodeId(1)));
        assert_eq!(layer.query_count(), 2);
    }

    #[tokio::test]
    async fn test_directed_adjacency() {
        let layer = MemoryLayer::new("OBJECTID");
        layer.add_directed(NodeId(1), NodeId(2));

        assert_eq!(layer.adjacent_to(NodeId(1)).await.unwrap().len(), 1);
        assert!(layer.adjacent_to(NodeId(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_feature_query_fails() {
        let layer = MemoryLayer::new("OBJECTID");
        let err = layer.adjacent_to(NodeId(9)).await.unwrap_err();
        assert!(matches!(err, Error::OracleQuery { node: NodeId(9), .. }));
    }

    #[tokio::test]
    async fn test_write_and_read_attribute() {
        let layer = MemoryLayer::new("OBJECTID");
        layer.add_feature(NodeId(1));

        layer.write(NodeId(1), "PrimaryAdjacency", 3).await.unwrap();
        assert_eq!(layer.attribute(NodeId(1), "PrimaryAdjacency"), Some(3));
        assert_eq!(layer.write_count(NodeId(1), "PrimaryAdjacency"), 1);
        assert_eq!(layer.attribute(NodeId(1), "SecondaryAdjacency"), None);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let layer = MemoryLayer::new("OBJECTID");
        layer.add_feature(NodeId(1));
        layer.fail_oracle_for(NodeId(1));
        layer.fail_writes_for(NodeId(1));

        assert!(layer.adjacent_to(NodeId(1)).await.is_err());
        let err = layer.write(NodeId(1), "PrimaryAdjacency", 0).await.unwrap_err();
        assert!(matches!(err, Error::AttributeWrite { .. }));
        assert_eq!(layer.write_count(NodeId(1), "PrimaryAdjacency"), 0);
    }

    #[tokio::test]
    async fn test_from_json() {
        let layer = MemoryLayer::from_json_str(r#"{
            "id_field": "OID",
            "fields": ["Shape_Area"],
            "features": [
                { "id": 1, "neighbors": [2] },
                { "id": 2, "neighbors": [1] },
                { "id": 3 }
            ]
        }"#).unwrap();

        assert_eq!(layer.field_names(), vec!["OID", "Shape_Area"]);
        assert_eq!(layer.feature_ids(), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(layer.adjacent_to(NodeId(3)).await.unwrap().is_empty());

        let ids = layer.node_ids(&FieldName::from("OID")).await.unwrap();
        assert_eq!(ids.len(), 3);
        assert!(layer.node_ids(&FieldName::from("OBJECTID")).await.is_err());
    }

    #[test]
    fn test_extra_fields_and_feature_count() {
        let layer = MemoryLayer::new("OID").with_field("NAME").with_field("Shape_Area");
        layer.add_adjacency(NodeId(1), NodeId(2));
        layer.add_feature(NodeId(1));

        assert_eq!(layer.field_names(), vec!["OID", "NAME", "Shape_Area"]);
        assert_eq!(layer.feature_count(), 2);
    }
}

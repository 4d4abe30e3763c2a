//! Per-node metric results and the attribute fields they land in.

use serde::{Deserialize, Serialize};
use super::NodeId;

/// Default attribute name for the primary adjacency count.
pub const PRIMARY_FIELD: &str = "PrimaryAdjacency";

/// Default attribute name for the secondary adjacency count.
pub const SECONDARY_FIELD: &str = "SecondaryAdjacency";

/// Connectivity metrics for one polygon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricResult {
    pub node: NodeId,
    /// Number of direct neighbors.
    pub primary: u32,
    /// Largest number of common neighbors shared with any single direct
    /// neighbor. `None` when the node has no neighbors at all.
    pub secondary: Option<u32>,
}

impl MetricResult {
    pub fn is_isolated(&self) -> bool {
        self.primary == 0
    }
}

/// Resolved name of the unique-identifier attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldName(pub String);

impl FieldName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldName {
    fn from(s: &str) -> Self {
        FieldName(s.to_string())
    }
}

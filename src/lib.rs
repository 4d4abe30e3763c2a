//! # adjacency-rs — Polygon Adjacency Metrics
//!
//! Computes, for every polygon in a dataset, how many polygons touch it
//! along a boundary (*primary adjacency*) and the largest number of common
//! neighbors it shares with any one of those polygons (*secondary
//! adjacency*), and writes both back as attributes.
//!
//! ## Design Principles
//!
//! 1. **Trait-first**: `TopologyOracle`, `AttributeStore` and `FeatureSource`
//!    are the contract between the metric engine and whatever holds the data
//! 2. **One query per node**: `AdjacencyGraph` memoizes oracle answers
//! 3. **Errors are values**: the run returns `Result`, the caller decides
//!    whether to abort or continue
//! 4. **Explicit context**: every component receives its handles, nothing
//!    is ambient
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use adjacency_rs::{AdjacencyRun, MemoryLayer, NodeId, RunConfig, RunContext};
//!
//! # async fn example() -> adjacency_rs::Result<()> {
//! let layer = MemoryLayer::new("OBJECTID");
//! layer.add_adjacency(NodeId(1), NodeId(2));
//! layer.add_adjacency(NodeId(2), NodeId(3));
//! layer.add_adjacency(NodeId(3), NodeId(1));
//!
//! let run = AdjacencyRun::new(RunContext {
//!     oracle: &layer,
//!     store: &layer,
//!     source: &layer,
//!     config: RunConfig::default(),
//! })?;
//! let report = run.execute().await?;
//! assert!(report.is_complete());
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod storage;
pub mod graph;
pub mod metrics;
pub mod scratch;
pub mod config;
pub mod run;

// ============================================================================
// Re-exports
// ============================================================================

pub use model::{
    NodeId, NeighborSet, MetricResult, FieldName,
    PRIMARY_FIELD, SECONDARY_FIELD,
};

pub use storage::{TopologyOracle, AttributeStore, FeatureSource, MemoryLayer};

pub use graph::{AdjacencyGraph, GraphSnapshot};

pub use metrics::MetricEngine;

pub use scratch::{ScratchRegistry, ScratchId, WorkingSet};

pub use config::{RunConfig, IsolatedPolicy, FailurePolicy};

pub use run::{AdjacencyRun, RunContext, RunReport, NodeFailure, resolve_identifier_field};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("No unique identifier field found (looked for: {})", .candidates.join(", "))]
    MissingIdentifierField { candidates: Vec<String> },

    #[error("Asymmetric adjacency: {node} lists {neighbor} as adjacent, but {neighbor} does not list {node}")]
    AsymmetricAdjacency { node: NodeId, neighbor: NodeId },

    #[error("Node {0} has no adjacent features; secondary adjacency is undefined")]
    EmptyNeighborhood(NodeId),

    #[error("Topology query failed for node {node}: {message}")]
    OracleQuery { node: NodeId, message: String },

    #[error("Writing {field} for node {node} failed: {message}")]
    AttributeWrite { node: NodeId, field: String, message: String },

    #[error("Value {value} for {field} on node {node} does not fit a short integer field")]
    ValueOutOfRange { node: NodeId, field: String, value: u32 },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// The node this error concerns, if it is tied to one.
    pub fn node(&self) -> Option<NodeId> {
        match self {
            Error::AsymmetricAdjacency { node, .. }
            | Error::OracleQuery { node, .. }
            | Error::AttributeWrite { node, .. }
            | Error::ValueOutOfRange { node, .. } => Some(*node),
            Error::EmptyNeighborhood(node) => Some(*node),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

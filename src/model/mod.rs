//! # Adjacency Model
//!
//! Plain DTOs shared by the oracle, graph, metric engine and store seams.
//!
//! Design rule: no I/O, no locks, no async here.

pub mod node;
pub mod metrics;

pub use node::{NodeId, NeighborSet, common_count};
pub use metrics::{MetricResult, FieldName, PRIMARY_FIELD, SECONDARY_FIELD};

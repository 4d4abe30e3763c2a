//! Run orchestration.
//!
//! A run resolves the identifier field once, lists the node universe,
//! computes each node's metric pair and hands it to the attribute store
//! straight away.
//!
//! ```text
//! FeatureSource ──ids──▶ AdjacencyRun ──node──▶ MetricEngine ──▶ AdjacencyGraph ──▶ TopologyOracle
//!                             │
//!                             └──(node, field, i16)──▶ AttributeStore
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use tracing::{debug, info, warn};

use crate::config::{FailurePolicy, IsolatedPolicy, RunConfig};
use crate::graph::AdjacencyGraph;
use crate::metrics::MetricEngine;
use crate::model::*;
use crate::storage::{AttributeStore, FeatureSource, TopologyOracle};
use crate::{Error, Result};

// ============================================================================
// Identifier negotiation
// ============================================================================

/// Pick the identifier field: the first of `candidates` present in
/// `available`.
pub fn resolve_identifier_field<A, C>(available: &[A], candidates: &[C]) -> Result<FieldName>
where
    A: AsRef<str>,
    C: AsRef<str>,
{
    candidates
        .iter()
        .map(AsRef::as_ref)
        .find(|candidate| available.iter().any(|name| name.as_ref() == *candidate))
        .map(FieldName::from)
        .ok_or_else(|| Error::MissingIdentifierField {
            candidates: candidates.iter().map(|c| c.as_ref().to_string()).collect(),
        })
}

// ============================================================================
// Context and report
// ============================================================================

/// Everything a run operates on, passed in explicitly.
pub struct RunContext<'a, O: ?Sized, S: ?Sized, F: ?Sized> {
    pub oracle: &'a O,
    pub store: &'a S,
    pub source: &'a F,
    pub config: RunConfig,
}

/// A node that failed under `FailurePolicy::Continue`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFailure {
    pub node: NodeId,
    pub error: String,
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub dataset: Option<String>,
    pub id_field: FieldName,
    pub nodes_total: usize,
    pub nodes_processed: usize,
    /// Attribute writes performed.
    pub writes: u64,
    /// Nodes with no neighbors.
    pub isolated: usize,
    pub failures: Vec<NodeFailure>,
    pub oracle_queries: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    fn new(dataset: Option<String>, id_field: FieldName, nodes_total: usize) -> Self {
        Self {
            dataset,
            id_field,
            nodes_total,
            nodes_processed: 0,
            writes: 0,
            isolated: 0,
            failures: Vec::new(),
            oracle_queries: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Every node processed, none failed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.nodes_processed == self.nodes_total
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// AdjacencyRun
// ============================================================================

/// One metric run over one dataset.
pub struct AdjacencyRun<'a, O: ?Sized, S: ?Sized, F: ?Sized> {
    ctx: RunContext<'a, O, S, F>,
    id_field: FieldName,
    engine: MetricEngine,
}

impl<'a, O, S, F> AdjacencyRun<'a, O, S, F>
where
    O: TopologyOracle + ?Sized,
    S: AttributeStore + ?Sized,
    F: FeatureSource + ?Sized,
{
    /// Validate the configuration and negotiate the identifier field.
    /// Fails before any metric work if neither succeeds.
    pub fn new(ctx: RunContext<'a, O, S, F>) -> Result<Self> {
        ctx.config.validate()?;
        let id_field = resolve_identifier_field(
            &ctx.source.field_names(),
            &ctx.config.id_field_candidates,
        )?;
        Ok(Self { ctx, id_field, engine: MetricEngine::new() })
    }

    pub fn id_field(&self) -> &FieldName {
        &self.id_field
    }

    pub fn config(&self) -> &RunConfig {
        &self.ctx.config
    }

    pub fn engine(&self) -> &MetricEngine {
        &self.engine
    }

    /// Process nodes one at a time through the lazily cached graph.
    pub async fn execute(&self) -> Result<RunReport> {
        let nodes = self.start().await?;
        let mut report = self.new_report(nodes.len());
        let graph = AdjacencyGraph::new(self.ctx.oracle).strict(self.ctx.config.strict_symmetry);

        for (index, &node) in nodes.iter().enumerate() {
            let outcome = match self.engine.compute(&graph, node).await {
                Ok(metrics) => self.write_metrics(&metrics, &mut report).await,
                Err(err) => Err(err),
            };
            self.settle(&mut report, node, outcome)?;
            debug!(processed = index + 1, total = nodes.len(), "features processed");
        }

        report.oracle_queries = graph.oracle_queries();
        Ok(self.finish(report))
    }

    /// Materialize the whole graph, compute every node in parallel, then
    /// write results in node order. Any oracle failure while materializing
    /// ends the run, whatever the failure policy.
    ///
    /// The rayon fan-out runs on the calling thread until every node is
    /// done, so that executor thread makes no progress on other tasks in
    /// the meantime. Under tokio, call this from a multi-threaded runtime
    /// or from `spawn_blocking`.
    pub async fn execute_parallel(&self) -> Result<RunReport> {
        let nodes = self.start().await?;
        let mut report = self.new_report(nodes.len());
        let graph = AdjacencyGraph::new(self.ctx.oracle).strict(self.ctx.config.strict_symmetry);

        let snapshot = graph.materialize(&nodes).await?;
        report.oracle_queries = graph.oracle_queries();
        drop(graph);

        let results = self.engine.compute_all(&snapshot, &nodes);
        for (&node, result) in nodes.iter().zip(results) {
            let outcome = match result {
                Ok(metrics) => self.write_metrics(&metrics, &mut report).await,
                Err(err) => Err(err),
            };
            self.settle(&mut report, node, outcome)?;
        }

        Ok(self.finish(report))
    }

    async fn start(&self) -> Result<Vec<NodeId>> {
        let config = &self.ctx.config;
        info!(
            dataset = ?config.dataset,
            working_storage = ?config.working_storage,
            scratch_storage = ?config.scratch_storage,
            id_field = %self.id_field,
            "starting adjacency run"
        );
        let nodes = self.ctx.source.node_ids(&self.id_field).await?;
        info!(features = nodes.len(), "node universe loaded");
        Ok(nodes)
    }

    fn new_report(&self, nodes_total: usize) -> RunReport {
        RunReport::new(self.ctx.config.dataset.clone(), self.id_field.clone(), nodes_total)
    }

    fn finish(&self, mut report: RunReport) -> RunReport {
        report.finished_at = Some(Utc::now());
        info!(
            processed = report.nodes_processed,
            failed = report.failures.len(),
            writes = report.writes,
            oracle_queries = report.oracle_queries,
            "adjacency run finished"
        );
        report
    }

    /// Apply the failure policy to one node's outcome.
    fn settle(&self, report: &mut RunReport, node: NodeId, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => {
                report.nodes_processed += 1;
                Ok(())
            }
            Err(err) => match self.ctx.config.failure_policy {
                FailurePolicy::Abort => Err(err),
                FailurePolicy::Continue => {
                    warn!(%node, error = %err, "feature failed; continuing");
                    report.failures.push(NodeFailure { node, error: err.to_string() });
                    Ok(())
                }
            },
        }
    }

    /// Decide every value for the node first, then write. The isolated
    /// policy and the range checks run before the first write; a store
    /// failure on a later field leaves earlier fields written.
    async fn write_metrics(&self, metrics: &MetricResult, report: &mut RunReport) -> Result<()> {
        let config = &self.ctx.config;
        let node = metrics.node;
        let mut writes: SmallVec<[(&str, i16); 2]> = SmallVec::new();

        writes.push((config.primary_field.as_str(), to_short(node, &config.primary_field, metrics.primary)?));

        match metrics.secondary {
            Some(value) => {
                writes.push((config.secondary_field.as_str(), to_short(node, &config.secondary_field, value)?));
            }
            None => {
                match config.isolated_policy {
                    IsolatedPolicy::Skip => {
                        debug!(%node, "isolated feature; secondary adjacency left unset");
                    }
                    IsolatedPolicy::Zero => writes.push((config.secondary_field.as_str(), 0)),
                    IsolatedPolicy::Sentinel(marker) => writes.push((config.secondary_field.as_str(), marker)),
                    IsolatedPolicy::Error => return Err(Error::EmptyNeighborhood(node)),
                }
                report.isolated += 1;
            }
        }

        for (field, value) in writes {
            self.ctx.store.write(node, field, value).await?;
            report.writes += 1;
        }

        info!(
            %node,
            primary = metrics.primary,
            secondary = ?metrics.secondary,
            "adjacency computed"
        );
        Ok(())
    }
}

fn to_short(node: NodeId, field: &str, value: u32) -> Result<i16> {
    i16::try_from(value).map_err(|_| Error::ValueOutOfRange { node, field: field.to_string(), value })
}

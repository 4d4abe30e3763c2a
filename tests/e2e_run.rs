//! End-to-end tests for run orchestration: identifier negotiation, oracle
//! query budget, failure policies, the parallel path and the report.

use std::sync::Arc;

use adjacency_rs::{
    AdjacencyRun, Error, FailurePolicy, MemoryLayer, NodeId, RunConfig, RunContext, RunReport,
    PRIMARY_FIELD, SECONDARY_FIELD,
};
use pretty_assertions::assert_eq;

// ============================================================================
// Helpers
// ============================================================================

/// Triangles 1-2-3 and 3-4-5 meeting at 3, plus a pendant 6 on 5.
fn sample_layer(id_field: &str) -> MemoryLayer {
    let layer = MemoryLayer::new(id_field);
    for (a, b) in [(1, 2), (2, 3), (3, 1), (3, 4), (4, 5), (5, 3), (5, 6)] {
        layer.add_adjacency(NodeId(a), NodeId(b));
    }
    layer
}

fn context(layer: &MemoryLayer, config: RunConfig) -> RunContext<'_, MemoryLayer, MemoryLayer, MemoryLayer> {
    RunContext { oracle: layer, store: layer, source: layer, config }
}

fn snapshot(layer: &MemoryLayer) -> Vec<(NodeId, Option<i16>, Option<i16>)> {
    layer
        .feature_ids()
        .into_iter()
        .map(|n| (n, layer.attribute(n, PRIMARY_FIELD), layer.attribute(n, SECONDARY_FIELD)))
        .collect()
}

// ============================================================================
// Identifier negotiation
// ============================================================================

#[tokio::test]
async fn test_oid_fallback() {
    let layer = sample_layer("OID");
    let run = AdjacencyRun::new(context(&layer, RunConfig::default())).unwrap();
    assert_eq!(run.id_field().as_str(), "OID");
    assert_eq!(run.config().id_field_candidates, vec!["OBJECTID", "OID"]);

    let report = run.execute().await.unwrap();
    assert_eq!(report.id_field.as_str(), "OID");
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_missing_identifier_field_fails_before_any_query() {
    let layer = sample_layer("FID");
    let result = AdjacencyRun::new(context(&layer, RunConfig::default()));

    assert!(matches!(result, Err(Error::MissingIdentifierField { .. })));
    assert_eq!(layer.query_count(), 0);
}

#[tokio::test]
async fn test_custom_candidates() {
    let layer = sample_layer("FID");
    let config = RunConfig::from_json_str(r#"{ "id_field_candidates": ["FID"] }"#).unwrap();
    let report = AdjacencyRun::new(context(&layer, config)).unwrap().execute().await.unwrap();
    assert_eq!(report.nodes_processed, 6);
}

// ============================================================================
// Oracle query budget
// ============================================================================

#[tokio::test]
async fn test_one_oracle_query_per_node() {
    let layer = sample_layer("OBJECTID");
    let report = AdjacencyRun::new(context(&layer, RunConfig::default()))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(layer.query_count(), 6);
    assert_eq!(report.oracle_queries, 6);
}

#[tokio::test]
async fn test_metric_values() {
    let layer = sample_layer("OBJECTID");
    AdjacencyRun::new(context(&layer, RunConfig::default()))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(
        snapshot(&layer),
        vec![
            (NodeId(1), Some(2), Some(1)),
            (NodeId(2), Some(2), Some(1)),
            (NodeId(3), Some(4), Some(1)),
            (NodeId(4), Some(2), Some(1)),
            (NodeId(5), Some(3), Some(1)),
            (NodeId(6), Some(1), Some(0)),
        ]
    );
}

// ============================================================================
// Failure policies
// ============================================================================

#[tokio::test]
async fn test_abort_stops_at_first_failure() {
    let layer = sample_layer("OBJECTID");
    layer.fail_writes_for(NodeId(2));

    let run = AdjacencyRun::new(context(&layer, RunConfig::default())).unwrap();
    let err = run.execute().await.unwrap_err();

    assert!(matches!(err, Error::AttributeWrite { node: NodeId(2), .. }));
    assert_eq!(layer.attribute(NodeId(1), PRIMARY_FIELD), Some(2));
    assert_eq!(layer.attribute(NodeId(3), PRIMARY_FIELD), None);
    assert_eq!(run.engine().scratch().live(), 0);
}

#[tokio::test]
async fn test_continue_isolates_failures() {
    let layer = sample_layer("OBJECTID");
    layer.fail_oracle_for(NodeId(6));
    layer.fail_writes_for(NodeId(1));

    let config = RunConfig::default().with_failure_policy(FailurePolicy::Continue);
    let run = AdjacencyRun::new(context(&layer, config)).unwrap();
    let report = run.execute().await.unwrap();

    // 1 fails on write; 5 needs 6's neighbors; 6 fails on its own query
    let failed: Vec<NodeId> = report.failures.iter().map(|f| f.node).collect();
    assert_eq!(failed, vec![NodeId(1), NodeId(5), NodeId(6)]);
    assert_eq!(report.nodes_processed, 3);
    assert!(!report.is_complete());

    assert_eq!(layer.attribute(NodeId(3), PRIMARY_FIELD), Some(4));
    assert_eq!(layer.attribute(NodeId(5), PRIMARY_FIELD), None);
    assert_eq!(run.engine().scratch().live(), 0);
    assert_eq!(run.engine().scratch().issued(), 5);
}

#[tokio::test]
async fn test_failed_neighbor_is_queried_once() {
    // hub 1 surrounded by the chain 2-3-4-5-6
    let layer = MemoryLayer::new("OBJECTID");
    for (a, b) in [(1, 2), (1, 3), (1, 4), (1, 5), (1, 6), (2, 3), (3, 4), (4, 5), (5, 6)] {
        layer.add_adjacency(NodeId(a), NodeId(b));
    }
    layer.fail_oracle_for(NodeId(6));

    let config = RunConfig::default().with_failure_policy(FailurePolicy::Continue);
    let report = AdjacencyRun::new(context(&layer, config)).unwrap().execute().await.unwrap();

    let failed: Vec<NodeId> = report.failures.iter().map(|f| f.node).collect();
    assert_eq!(failed, vec![NodeId(1), NodeId(5), NodeId(6)]);
    assert_eq!(layer.query_count(), 6);
    assert_eq!(report.oracle_queries, 6);
}

// ============================================================================
// Exactly-once writes and idempotence
// ============================================================================

#[tokio::test]
async fn test_each_field_written_once() {
    let layer = sample_layer("OBJECTID");
    AdjacencyRun::new(context(&layer, RunConfig::default()))
        .unwrap()
        .execute()
        .await
        .unwrap();

    for node in layer.feature_ids() {
        assert_eq!(layer.write_count(node, PRIMARY_FIELD), 1);
        assert_eq!(layer.write_count(node, SECONDARY_FIELD), 1);
    }
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let layer = sample_layer("OBJECTID");
    AdjacencyRun::new(context(&layer, RunConfig::default())).unwrap().execute().await.unwrap();
    let first = snapshot(&layer);

    AdjacencyRun::new(context(&layer, RunConfig::default())).unwrap().execute().await.unwrap();
    assert_eq!(snapshot(&layer), first);
}

// ============================================================================
// Parallel path
// ============================================================================

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let sequential = sample_layer("OBJECTID");
    AdjacencyRun::new(context(&sequential, RunConfig::default())).unwrap().execute().await.unwrap();

    let parallel = sample_layer("OBJECTID");
    let report = AdjacencyRun::new(context(&parallel, RunConfig::default()))
        .unwrap()
        .execute_parallel()
        .await
        .unwrap();

    assert_eq!(snapshot(&parallel), snapshot(&sequential));
    assert_eq!(report.oracle_queries, 6);
    assert!(report.is_complete());
}

#[tokio::test]
async fn test_parallel_oracle_failure_is_fatal() {
    let layer = sample_layer("OBJECTID");
    layer.fail_oracle_for(NodeId(4));

    let config = RunConfig::default().with_failure_policy(FailurePolicy::Continue);
    let err = AdjacencyRun::new(context(&layer, config))
        .unwrap()
        .execute_parallel()
        .await
        .unwrap_err();

    assert!(matches!(err, Error::OracleQuery { node: NodeId(4), .. }));
    assert_eq!(layer.attribute(NodeId(1), PRIMARY_FIELD), None);
}

#[tokio::test]
async fn test_shared_handles() {
    let layer = Arc::new(sample_layer("OBJECTID"));
    let run = AdjacencyRun::new(RunContext {
        oracle: &layer,
        store: &layer,
        source: &layer,
        config: RunConfig::default(),
    })
    .unwrap();
    assert!(run.execute().await.unwrap().is_complete());
}

// ============================================================================
// Report
// ============================================================================

#[tokio::test]
async fn test_report_round_trips_through_json() {
    let layer = sample_layer("OBJECTID");
    let mut config = RunConfig::default();
    config.dataset = Some("parcels".into());

    let report = AdjacencyRun::new(context(&layer, config)).unwrap().execute().await.unwrap();
    let json = report.to_json().unwrap();
    let back: RunReport = serde_json::from_str(&json).unwrap();

    assert_eq!(back, report);
    assert_eq!(back.dataset.as_deref(), Some("parcels"));
    assert_eq!(back.writes, 12);
    assert!(back.finished_at.is_some());
}

//! End-to-end assessments through the engine facade

use esia_core::prelude::*;
use esia_core::impact::Finding;
use esia_core::ontology::{Edge, UpsertBatch};
use esia_core::risk::{ResidualRisk, RiskThresholds, RuleId};
use esia_test_utils::{order_cancellation, order_cancellation_store, order_cancelled};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

fn engine() -> ImpactEngine {
    ImpactEngine::new(Arc::new(order_cancellation_store()), EngineConfig::default()).unwrap()
}

fn shipping_batch() -> UpsertBatch {
    UpsertBatch::new()
        .with_node(Node::context("shipping", "Shipping"))
        .with_node(Node::aggregate("shipping-agg", "Shipment"))
        .with_node(Node::command("hold-shipment", "HoldShipment"))
        .with_node(Node::policy("hold-on-cancel", "HoldShipmentOnOrderCancelled"))
        .with_edge(EdgeKind::HasAggregate, NodeRef::context("shipping"), NodeRef::aggregate("shipping-agg"))
        .with_edge(EdgeKind::HasCommand, NodeRef::aggregate("shipping-agg"), NodeRef::command("hold-shipment"))
        .with_edge(EdgeKind::HasPolicy, NodeRef::context("shipping"), NodeRef::policy("hold-on-cancel"))
        .with_edge(EdgeKind::Triggers, order_cancelled(), NodeRef::policy("hold-on-cancel"))
        .with_edge(EdgeKind::Invokes, NodeRef::policy("hold-on-cancel"), NodeRef::command("hold-shipment"))
}

#[test]
fn test_assess_run_time_field_delete() {
    let engine = engine();
    assert!(engine.validate_graph().is_empty());

    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventFieldDelete);
    let assessment = engine.assess(&change, CancelToken::new()).unwrap();

    assert_eq!(assessment.generation, 0);
    assert_eq!(assessment.scope, ChangeScope::CrossContext);
    assert_eq!(assessment.verdict.level, RiskLevel::Forbidden);
    assert_eq!(assessment.verdict.fired_rules, vec![RuleId::BREAKING_SCHEMA]);
    assert_eq!(
        assessment.impact.affected_context_names(),
        vec!["Inventory", "Notification", "Payment"]
    );
    let strategies: Vec<StrategyKind> = assessment.strategies.iter().map(|s| s.kind).collect();
    assert_eq!(
        strategies,
        vec![StrategyKind::VersionedMigration, StrategyKind::CoordinatedChange]
    );
    assert_eq!(assessment.safest().unwrap().residual_risk, ResidualRisk::Risky);
}

#[test]
fn test_assess_command_add_is_new_capability() {
    let engine = engine();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::CommandAdd);
    let assessment = engine.assess(&change, CancelToken::new()).unwrap();
    assert_eq!(assessment.scope, ChangeScope::NewCapability);
    assert_eq!(assessment.verdict.level, RiskLevel::Risky);
}

#[test]
fn test_configured_threshold_controls_escalation() {
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventFieldAdd);

    let assessment = engine().assess(&change, CancelToken::new()).unwrap();
    assert_eq!(assessment.verdict.level, RiskLevel::Risky);

    let config = EngineConfig::default()
        .with_risk(RiskThresholds::default().with_broad_blast_radius(4));
    let relaxed = ImpactEngine::new(Arc::new(order_cancellation_store()), config).unwrap();
    let assessment = relaxed.assess(&change, CancelToken::new()).unwrap();
    assert_eq!(assessment.verdict.level, RiskLevel::Safe);
    assert_eq!(assessment.safest().unwrap().kind, StrategyKind::AppendField);
}

#[test]
fn test_assessment_follows_published_generation() {
    let engine = engine();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventFieldAdd);
    let before = engine.assess(&change, CancelToken::new()).unwrap();

    let report = engine.store().bulk_upsert(shipping_batch()).unwrap();
    assert_eq!(report.generation, 1);
    assert_eq!(report.nodes_inserted, 4);
    assert_eq!(report.edges_inserted, 5);

    let after = engine.assess(&change, CancelToken::new()).unwrap();
    assert_eq!(before.generation, 0);
    assert_eq!(after.generation, 1);
    assert_eq!(
        after.impact.affected_context_names(),
        vec!["Inventory", "Notification", "Payment", "Shipping"]
    );
    assert_eq!(before.impact.affected_contexts.len(), 3);
}

#[test]
fn test_rejected_batch_publishes_nothing() {
    let engine = engine();
    // Shipping policy may not invoke an Order command
    let batch = shipping_batch().with_edge(
        EdgeKind::Invokes,
        NodeRef::policy("hold-on-cancel"),
        NodeRef::command("cancel-order"),
    );
    let err = engine.store().bulk_upsert(batch).unwrap_err();
    assert_eq!(err.rule().name(), "invokes-intra-bc");
    assert_eq!(engine.store().generation(), 0);
    assert!(!engine.store().snapshot().contains(&NodeRef::context("shipping")));
}

#[test]
fn test_readers_see_consistent_snapshots_during_writes() {
    let engine = Arc::new(engine());
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventFieldAdd);

    thread::scope(|scope| {
        let writer = Arc::clone(&engine);
        scope.spawn(move || {
            writer.store().bulk_upsert(shipping_batch()).unwrap();
        });
        for _ in 0..4 {
            let reader = Arc::clone(&engine);
            let change = change.clone();
            scope.spawn(move || {
                for _ in 0..25 {
                    let assessment = reader.assess(&change, CancelToken::new()).unwrap();
                    let expected = if assessment.generation == 0 { 3 } else { 4 };
                    assert_eq!(assessment.impact.affected_contexts.len(), expected);
                }
            });
        }
    });

    assert_eq!(engine.store().generation(), 1);
}

#[test]
fn test_cancelled_assessment_is_interrupted() {
    let engine = engine();
    let cancel = CancelToken::new();
    cancel.cancel();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventRename);
    let err = engine.assess(&change, cancel).unwrap_err();
    assert!(err.is_interrupted());
    assert_eq!(err.rule(), "cancellation");
}

#[test]
fn test_permissive_config_reports_dangling_edges() {
    let mut nodes: Vec<Node> = order_cancellation().nodes().cloned().collect();
    nodes.retain(|n| n.id != "send-email");
    let edges: Vec<Edge> = order_cancellation().edges().cloned().collect();
    let store = Arc::new(SnapshotStore::default());
    let violations = store.reload(OntologyGraph::from_parts_unchecked(nodes, edges));
    assert!(!violations.is_empty());

    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventRename);

    let strict = ImpactEngine::new(Arc::clone(&store), EngineConfig::default()).unwrap();
    let err = strict.assess(&change, CancelToken::new()).unwrap_err();
    assert_eq!(err.rule(), "edge-endpoint");

    let config = EngineConfig::default()
        .with_analysis(AnalysisConfig::default().with_strict_integrity(false));
    let permissive = ImpactEngine::new(store, config).unwrap();
    let assessment = permissive.assess(&change, CancelToken::new()).unwrap();
    assert!(matches!(
        assessment.impact.findings.as_slice(),
        [Finding::IntegrityWarning { .. }]
    ));
    assert_eq!(assessment.generation, 1);
}

#[test]
fn test_assessment_serializes_deterministically() {
    let engine = engine();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::PolicyLogicChange);
    let first = serde_json::to_string(&engine.assess(&change, CancelToken::new()).unwrap()).unwrap();
    let second = serde_json::to_string(&engine.assess(&change, CancelToken::new()).unwrap()).unwrap();
    assert_eq!(first, second);
    assert!(first.contains("\"scope\":\"cross_context\""));
}

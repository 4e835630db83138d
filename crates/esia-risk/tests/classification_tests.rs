//! Classification and recommendation over analyzed graphs

use esia_impact::{analyze_impact, AnalysisOptions, ImpactResult};
use esia_ontology::NodeRef;
use esia_risk::{
    classify, recommend, ChangeDescriptor, ChangeKind, ExecutionPhase, ResidualRisk, RiskLevel,
    RiskThresholds, RuleId, StrategyKind,
};
use esia_test_utils::{order_cancellation, order_cancelled, retry_loop, shared_event};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn order_cancelled_impact() -> ImpactResult {
    analyze_impact(&order_cancelled(), &order_cancellation(), &AnalysisOptions::new()).unwrap()
}

fn kinds(strategies: &[esia_risk::Strategy]) -> Vec<StrategyKind> {
    strategies.iter().map(|s| s.kind).collect()
}

#[test]
fn test_run_time_field_delete_is_forbidden() {
    let impact = order_cancelled_impact();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventFieldDelete);
    let verdict = classify(&change, &impact, &RiskThresholds::default()).unwrap();

    assert_eq!(verdict.level, RiskLevel::Forbidden);
    assert_eq!(verdict.fired_rules, vec![RuleId::BREAKING_SCHEMA]);
    assert_eq!(verdict.affected_contexts, 3);
    assert!(verdict.rationale.contains("rule 2"));

    let strategies = recommend(&verdict, &impact);
    assert_eq!(
        kinds(&strategies),
        vec![StrategyKind::VersionedMigration, StrategyKind::CoordinatedChange]
    );
    assert_eq!(strategies[0].name, "Versioned artifact + phased migration");
    assert_eq!(strategies[1].residual_risk, ResidualRisk::Highest);
    for name in ["Payment", "Inventory", "Notification"] {
        assert!(strategies[1].description.contains(name), "{name}");
    }
    assert!(strategies[1].description.contains("RefundOnOrderCancelled/ProcessRefund"));
}

#[test]
fn test_additive_field_escalates_with_broad_blast_radius() {
    let impact = order_cancelled_impact();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventFieldAdd);

    let verdict = classify(&change, &impact, &RiskThresholds::default()).unwrap();
    assert_eq!(verdict.base_level, RiskLevel::Safe);
    assert_eq!(verdict.level, RiskLevel::Risky);
    assert!(verdict.escalated());
    assert_eq!(
        verdict.fired_rules,
        vec![RuleId::ADDITIVE_FIELD, RuleId::BROAD_BLAST_RADIUS]
    );
    assert!(verdict.rationale.contains("rule 3"));
    assert!(verdict.rationale.contains("escalated Safe -> Risky"));

    let strategies = recommend(&verdict, &impact);
    assert_eq!(
        kinds(&strategies),
        vec![
            StrategyKind::AppendField,
            StrategyKind::VersionedMigration,
            StrategyKind::CoordinatedChange,
        ]
    );
    assert!(strategies[0].description.contains("OrderCancelled"));
}

#[test]
fn test_additive_field_stays_safe_below_threshold() {
    let impact = order_cancelled_impact();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::EventFieldAdd);
    let thresholds = RiskThresholds::default().with_broad_blast_radius(4);

    let verdict = classify(&change, &impact, &thresholds).unwrap();
    assert_eq!(verdict.level, RiskLevel::Safe);
    assert_eq!(verdict.fired_rules, vec![RuleId::ADDITIVE_FIELD]);

    let strategies = recommend(&verdict, &impact);
    assert_eq!(
        kinds(&strategies),
        vec![StrategyKind::AppendField, StrategyKind::VersionedMigration]
    );
}

#[test]
fn test_single_context_loop_is_not_escalated() {
    let graph = retry_loop();
    let seed = NodeRef::event("job-failed");
    let impact = analyze_impact(&seed, &graph, &AnalysisOptions::new()).unwrap();
    assert!(impact.affected_contexts.is_empty());

    let change = ChangeDescriptor::run_time(seed, ChangeKind::EventFieldAdd);
    let verdict = classify(&change, &impact, &RiskThresholds::default()).unwrap();
    assert_eq!(verdict.level, RiskLevel::Safe);

    let strategies = recommend(&verdict, &impact);
    assert!(strategies[1].description.contains("no other context"));
}

#[test]
fn test_unreached_emitter_context_does_not_escalate() {
    let graph = shared_event();
    let seed = NodeRef::event("seed");
    let impact = analyze_impact(&seed, &graph, &AnalysisOptions::new()).unwrap();
    assert_eq!(impact.affected_context_names(), vec!["Payment"]);

    let change = ChangeDescriptor::run_time(seed, ChangeKind::EventFieldAdd);
    let verdict = classify(&change, &impact, &RiskThresholds::default()).unwrap();
    assert_eq!(verdict.level, RiskLevel::Safe);
    assert_eq!(verdict.affected_contexts, 1);
    assert_eq!(verdict.fired_rules, vec![RuleId::ADDITIVE_FIELD]);
}

#[test]
fn test_policy_logic_change_recommendations() {
    let impact = order_cancelled_impact();
    let change = ChangeDescriptor::run_time(order_cancelled(), ChangeKind::PolicyLogicChange);
    let verdict = classify(&change, &impact, &RiskThresholds::default()).unwrap();
    assert_eq!(verdict.level, RiskLevel::Risky);

    let strategies = recommend(&verdict, &impact);
    assert!(!strategies.iter().any(|s| s.kind == StrategyKind::AppendField));
    assert!(strategies
        .windows(2)
        .all(|pair| pair[0].residual_risk <= pair[1].residual_risk));
}

fn any_kind() -> impl Strategy<Value = ChangeKind> {
    prop::sample::select(ChangeKind::ALL.to_vec())
}

fn any_phase() -> impl Strategy<Value = ExecutionPhase> {
    prop_oneof![Just(ExecutionPhase::BuildTime), Just(ExecutionPhase::RunTime)]
}

proptest! {
    #[test]
    fn prop_classification_is_pure_and_monotone(
        kind in any_kind(),
        phase in any_phase(),
        contexts in 0usize..=3,
        threshold in 1usize..5,
        escalate_build_time in any::<bool>(),
    ) {
        let mut impact = order_cancelled_impact();
        impact.affected_contexts.truncate(contexts);
        let change = ChangeDescriptor::new(order_cancelled(), kind, phase);
        let thresholds = RiskThresholds::default()
            .with_broad_blast_radius(threshold)
            .with_escalate_build_time(escalate_build_time);

        let first = classify(&change, &impact, &thresholds);
        let second = classify(&change, &impact, &thresholds);
        prop_assert_eq!(&first, &second);

        if let Ok(verdict) = first {
            prop_assert!(verdict.level >= verdict.base_level);
            if verdict.base_level == RiskLevel::Forbidden {
                prop_assert_eq!(verdict.level, RiskLevel::Forbidden);
            }
            let exempt = phase == ExecutionPhase::BuildTime && !escalate_build_time;
            let broad = contexts >= threshold && !exempt;
            if verdict.base_level == RiskLevel::Safe {
                prop_assert_eq!(verdict.escalated(), broad);
            }
            prop_assert!(verdict.fired_rules.len() <= 2);

            let strategies = recommend(&verdict, &impact);
            prop_assert!(strategies.iter().any(|s| s.kind == StrategyKind::VersionedMigration));
            prop_assert!(strategies
                .windows(2)
                .all(|pair| pair[0].residual_risk <= pair[1].residual_risk));
        } else {
            prop_assert_eq!(phase, ExecutionPhase::RunTime);
        }
    }
}

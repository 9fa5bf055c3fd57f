//! Coverage over real executions, plus the monotonicity property.

use proptest::prelude::*;
use serde_json::json;
use stepcheck_coverage::{CoverageTracker, NestedKind};
use stepcheck_eval::{execute, ExecutionOptions, MockEngine};
use stepcheck_interchange::{MockConfig, StateMachine};

fn options() -> ExecutionOptions {
    ExecutionOptions::default()
        .with_seed(Some(11))
        .with_execution_name("coverage")
}

fn router() -> StateMachine {
    StateMachine::from_json(&json!({
        "StartAt": "Route",
        "States": {
            "Route": {
                "Type": "Choice",
                "Choices": [
                    { "Variable": "$.n", "NumericGreaterThan": 10, "Next": "Big" },
                    { "Variable": "$.n", "NumericLessThan": 0, "Next": "Negative" }
                ],
                "Default": "Small"
            },
            "Big": { "Type": "Pass", "End": true },
            "Negative": { "Type": "Pass", "End": true },
            "Small": { "Type": "Pass", "End": true }
        }
    }))
    .unwrap()
}

// ──────────────────────────────────────────────
// Executions
// ──────────────────────────────────────────────

#[test]
fn three_inputs_exercise_every_branch() {
    let definition = router();
    let mut tracker = CoverageTracker::new(&definition);
    for n in [20, -5, 3] {
        let trace = execute(&definition, json!({ "n": n }), &mut MockEngine::empty(), &options());
        assert!(trace.success);
        tracker.track_trace(&trace);
    }
    let report = tracker.get_coverage();

    assert_eq!(report.states.percentage, 100.0);
    assert_eq!(report.branches.total, 3);
    assert_eq!(report.branches.percentage, 100.0);
    assert_eq!(report.paths.unique, 3);
    assert!(report.nested.is_none());
}

#[test]
fn parallel_inside_map_is_reported_per_container() {
    let definition = StateMachine::from_json(&json!({
        "StartAt": "Orders",
        "States": {
            "Orders": {
                "Type": "Map",
                "ItemsPath": "$.orders",
                "ItemProcessor": {
                    "StartAt": "Fan",
                    "States": {
                        "Fan": {
                            "Type": "Parallel",
                            "Branches": [
                                { "StartAt": "Charge", "States": { "Charge": { "Type": "Task", "Resource": "arn:aws:lambda:::function:charge", "End": true } } },
                                { "StartAt": "Notify", "States": { "Notify": { "Type": "Pass", "End": true } } }
                            ],
                            "End": true
                        }
                    }
                },
                "End": true
            }
        }
    }))
    .unwrap();
    let mocks = MockConfig::from_json(&json!({
        "mocks": [ { "state": "Charge", "type": "fixed", "response": { "charged": true } } ]
    }))
    .unwrap();
    let trace = execute(
        &definition,
        json!({ "orders": [ { "id": 1 }, { "id": 2 } ] }),
        &mut MockEngine::new(mocks),
        &options(),
    );
    assert!(trace.success);

    let mut tracker = CoverageTracker::new(&definition);
    tracker.track_trace(&trace);
    let report = tracker.get_coverage();
    let nested = report.nested.unwrap();

    assert_eq!(nested["Orders"].kind, NestedKind::Map);
    assert_eq!(nested["Orders"].executions, 1);
    assert_eq!(nested["Orders"].states.covered, 1);
    assert_eq!(nested["Fan"].kind, NestedKind::Parallel);
    assert_eq!(nested["Fan"].executions, 2);
    assert_eq!(nested["Fan"].states.total, 2);
    assert_eq!(nested["Fan"].states.percentage, 100.0);
}

#[test]
fn report_serializes_with_camel_case_fields() {
    let definition = router();
    let mut tracker = CoverageTracker::new(&definition);
    let trace = execute(&definition, json!({ "n": 1 }), &mut MockEngine::empty(), &options());
    tracker.track_trace(&trace);
    let doc = serde_json::to_value(tracker.get_coverage()).unwrap();

    assert_eq!(doc["paths"]["uniquePaths"], json!(["Route -> Small"]));
    assert_eq!(doc["branches"]["uncovered"], json!(["Route->Big", "Route->Negative"]));
    assert!(doc.get("nested").is_none());
}

// ──────────────────────────────────────────────
// Monotonicity
// ──────────────────────────────────────────────

fn state_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["Route", "Big", "Negative", "Small", "Stray"]).prop_map(String::from)
}

proptest! {
    #[test]
    fn covered_counts_never_decrease(paths in prop::collection::vec(prop::collection::vec(state_name(), 0..6), 1..12)) {
        let mut tracker = CoverageTracker::new(&router());
        let mut states = 0;
        let mut branches = 0;
        for path in &paths {
            tracker.track_execution(path);
            let report = tracker.get_coverage();
            prop_assert!(report.states.covered >= states);
            prop_assert!(report.branches.covered >= branches);
            prop_assert!(report.states.covered <= report.states.total);
            prop_assert!(report.branches.covered <= report.branches.total);
            states = report.states.covered;
            branches = report.branches.covered;
        }
    }

    #[test]
    fn merging_never_loses_coverage(left in prop::collection::vec(state_name(), 0..8), right in prop::collection::vec(state_name(), 0..8)) {
        let mut a = CoverageTracker::new(&router());
        a.track_execution(&left);
        let mut b = CoverageTracker::new(&router());
        b.track_execution(&right);
        let before_a = a.get_coverage();
        let before_b = b.get_coverage();

        a.merge(&b);
        let merged = a.get_coverage();
        prop_assert!(merged.states.covered >= before_a.states.covered.max(before_b.states.covered));
        prop_assert!(merged.branches.covered >= before_a.branches.covered.max(before_b.branches.covered));
        prop_assert_eq!(merged.paths.total, 2);
    }
}

//! End-to-end executions of small definitions, plus property tests for
//! determinism, stateful ordering and Map output shape.

use proptest::prelude::*;
use serde_json::{json, Value};
use stepcheck_eval::{execute, ExecutionOptions, MockEngine};
use stepcheck_interchange::{MockConfig, StateMachine};
use time::macros::datetime;

fn options() -> ExecutionOptions {
    ExecutionOptions::default()
        .with_seed(Some(2024))
        .with_execution_name("scenario")
        .with_start_time(datetime!(2024-06-01 12:00 UTC))
}

fn machine(definition: Value) -> StateMachine {
    StateMachine::from_json(&definition).unwrap()
}

fn engine(config: Value) -> MockEngine {
    MockEngine::new(MockConfig::from_json(&config).unwrap())
}

// ──────────────────────────────────────────────
// Scenarios
// ──────────────────────────────────────────────

#[test]
fn scenario_a_choice_routes_to_big() {
    let definition = machine(json!({
        "StartAt": "Check",
        "States": {
            "Check": {
                "Type": "Choice",
                "Choices": [ { "Variable": "$.x", "NumericGreaterThan": 10, "Next": "Big" } ],
                "Default": "Small"
            },
            "Big": { "Type": "Pass", "Result": "big", "End": true },
            "Small": { "Type": "Pass", "Result": "small", "End": true }
        }
    }));
    let trace = execute(&definition, json!({ "x": 20 }), &mut MockEngine::empty(), &options());

    assert!(trace.success);
    assert_eq!(trace.output, json!("big"));
    assert_eq!(trace.execution_path, vec!["Check", "Big"]);
}

#[test]
fn scenario_b_map_over_three_items() {
    let definition = machine(json!({
        "StartAt": "Each",
        "States": {
            "Each": {
                "Type": "Map",
                "ItemProcessor": {
                    "StartAt": "Item",
                    "States": { "Item": { "Type": "Pass", "End": true } }
                },
                "End": true
            }
        }
    }));
    let trace = execute(&definition, json!([1, 2, 3]), &mut MockEngine::empty(), &options());

    assert!(trace.success);
    assert_eq!(trace.output, json!([1, 2, 3]));
    assert_eq!(trace.map_executions.len(), 1);
    assert_eq!(trace.map_executions[0].iteration_paths.len(), 3);
}

#[test]
fn scenario_c_uncaught_task_failure() {
    let definition = machine(json!({
        "StartAt": "Prepare",
        "States": {
            "Prepare": { "Type": "Pass", "Next": "Charge" },
            "Charge": { "Type": "Task", "Resource": "arn:aws:lambda:::function:charge", "End": true }
        }
    }));
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Charge", "type": "error",
                     "error": { "type": "States.TaskFailed", "cause": "card declined" } } ]
    }));
    let trace = execute(&definition, json!({}), &mut mocks, &options());

    assert!(!trace.success);
    let error = trace.error.as_ref().unwrap();
    assert_eq!(error.error, "States.TaskFailed");
    assert_eq!(error.state.as_deref(), Some("Charge"));
    assert_eq!(trace.execution_path.last().map(String::as_str), Some("Charge"));
}

#[test]
fn trace_serializes_with_camel_case_fields() {
    let definition = machine(json!({
        "StartAt": "Only",
        "States": { "Only": { "Type": "Succeed" } }
    }));
    let trace = execute(&definition, json!({ "k": 1 }), &mut MockEngine::empty(), &options());
    let doc = serde_json::to_value(&trace).unwrap();

    assert_eq!(doc["executionPath"], json!(["Only"]));
    assert_eq!(doc["mapExecutions"], json!([]));
    assert_eq!(doc["parallelExecutions"], json!([]));
    assert_eq!(doc["success"], json!(true));
    assert!(doc.get("error").is_none());
}

// ──────────────────────────────────────────────
// Properties
// ──────────────────────────────────────────────

fn uuid_machine() -> StateMachine {
    machine(json!({
        "StartAt": "Stamp",
        "States": {
            "Stamp": {
                "Type": "Pass",
                "Parameters": {
                    "id.$": "States.UUID()",
                    "roll.$": "States.MathRandom(1, 1000)",
                    "input.$": "$"
                },
                "Next": "Call"
            },
            "Call": { "Type": "Task", "Resource": "arn:aws:lambda:::function:c", "End": true }
        }
    }))
}

proptest! {
    #[test]
    fn identical_configuration_gives_identical_traces(x in any::<i64>(), label in "[a-z]{0,8}") {
        let definition = uuid_machine();
        let config = json!({
            "mocks": [ { "state": "Call", "type": "stateful", "responses": [ { "n": 1 }, { "n": 2 } ] } ]
        });
        let input = json!({ "x": x, "label": label });

        let first = execute(&definition, input.clone(), &mut engine(config.clone()), &options());
        let second = execute(&definition, input, &mut engine(config), &options());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn stateful_rule_repeats_its_last_response(responses in prop::collection::vec(any::<u16>(), 1..6), extra in 1usize..4) {
        let config = json!({
            "mocks": [ { "state": "Poll", "type": "stateful", "responses": responses } ]
        });
        let mut mocks = engine(config);
        let calls = responses.len() + extra;
        let seen: Vec<Value> = (0..calls)
            .map(|_| match mocks.resolve("Poll", &json!({})).outcome {
                stepcheck_eval::MockOutcome::Value(v) => v,
                stepcheck_eval::MockOutcome::Error(e) => panic!("unexpected error {:?}", e),
            })
            .collect();

        for (i, value) in seen.iter().enumerate() {
            let expected = responses[i.min(responses.len() - 1)];
            prop_assert_eq!(value, &json!(expected));
        }
        prop_assert_eq!(mocks.call_count("Poll"), calls);
    }

    #[test]
    fn map_output_is_an_array_unless_a_writer_is_present(count in 0usize..8, with_writer in any::<bool>()) {
        let mut map = json!({
            "Type": "Map",
            "ItemProcessor": { "StartAt": "P", "States": { "P": { "Type": "Pass", "End": true } } },
            "End": true
        });
        if with_writer {
            map["ResultWriter"] = json!({
                "Resource": "arn:aws:states:::s3:putObject",
                "Parameters": { "Bucket": "b", "Prefix": "p" }
            });
        }
        let definition = machine(json!({ "StartAt": "M", "States": { "M": map } }));
        let items: Vec<Value> = (0..count).map(|i| json!(i)).collect();
        let trace = execute(&definition, Value::Array(items), &mut MockEngine::empty(), &options());

        prop_assert!(trace.success);
        if with_writer {
            prop_assert!(trace.output.is_object());
        } else {
            prop_assert_eq!(trace.output.as_array().map(Vec::len), Some(count));
        }
        prop_assert_eq!(trace.map_executions[0].iteration_paths.len(), count);
    }
}

#[test]
fn retry_precedence_calls_the_mock_three_times_before_catch() {
    let definition = machine(json!({
        "StartAt": "Call",
        "States": {
            "Call": {
                "Type": "Task",
                "Resource": "arn:aws:lambda:::function:c",
                "Retry": [ { "ErrorEquals": ["E"], "MaxAttempts": 2 } ],
                "Catch": [ { "ErrorEquals": ["E"], "Next": "Caught" } ],
                "End": true
            },
            "Caught": { "Type": "Succeed" }
        }
    }));
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Call", "type": "error", "error": { "type": "E" } } ]
    }));
    let trace = execute(&definition, json!({}), &mut mocks, &options());

    assert_eq!(mocks.call_count("Call"), 3);
    assert_eq!(trace.execution_path, vec!["Call", "Caught"]);
    assert_eq!(trace.retries.len(), 2);
}

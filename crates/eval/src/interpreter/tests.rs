use super::*;

use serde_json::json;
use stepcheck_interchange::MockConfig;
use time::macros::datetime;

fn machine(definition: Value) -> StateMachine {
    StateMachine::from_json(&definition).unwrap()
}

fn engine(config: Value) -> MockEngine {
    MockEngine::new(MockConfig::from_json(&config).unwrap())
}

fn options() -> ExecutionOptions {
    ExecutionOptions::default()
        .with_seed(Some(11))
        .with_execution_name("test-run")
        .with_state_machine_name("Checkout")
        .with_start_time(datetime!(2024-01-01 00:00 UTC))
}

fn run(definition: Value, input: Value, mocks: &mut MockEngine) -> ExecutionTrace {
    execute(&machine(definition), input, mocks, &options())
}

// ──────────────────────────────────────────────
// Data flow
// ──────────────────────────────────────────────

#[test]
fn pass_result_is_merged_at_result_path() {
    let trace = run(
        json!({
            "StartAt": "Tag",
            "States": {
                "Tag": { "Type": "Pass", "Result": { "ok": true }, "ResultPath": "$.tag", "End": true }
            }
        }),
        json!({ "id": 1 }),
        &mut MockEngine::empty(),
    );
    assert!(trace.success);
    assert_eq!(trace.output, json!({ "id": 1, "tag": { "ok": true } }));
    assert_eq!(trace.execution_path, vec!["Tag"]);
}

#[test]
fn task_applies_the_full_io_pipeline() {
    let mut mocks = engine(json!({
        "mocks": [ {
            "state": "Fetch", "type": "conditional",
            "conditions": [ {
                "when": { "id": 7, "kind": "user" },
                "response": { "body": { "name": "Ada", "age": 36 } }
            } ]
        } ]
    }));
    let input = json!({ "request": { "id": 7 }, "other": 1 });
    let trace = run(
        json!({
            "StartAt": "Fetch",
            "States": {
                "Fetch": {
                    "Type": "Task",
                    "Resource": "arn:aws:lambda:us-east-1:123456789012:function:fetch",
                    "InputPath": "$.request",
                    "Parameters": { "id.$": "$.id", "kind": "user" },
                    "ResultSelector": { "name.$": "$.body.name" },
                    "ResultPath": "$.user",
                    "OutputPath": "$.user",
                    "End": true
                }
            }
        }),
        input.clone(),
        &mut mocks,
    );
    assert!(trace.success, "{:?}", trace.error);
    assert_eq!(trace.output, json!({ "name": "Ada" }));
    assert_eq!(trace.state_executions[0].input, input);
    assert_eq!(mocks.call_count("Fetch"), 1);
}

#[test]
fn null_result_path_and_null_output_path() {
    let trace = run(
        json!({
            "StartAt": "Keep",
            "States": {
                "Keep": { "Type": "Pass", "Result": "dropped", "ResultPath": null, "Next": "Empty" },
                "Empty": { "Type": "Pass", "OutputPath": null, "End": true }
            }
        }),
        json!({ "a": 1 }),
        &mut MockEngine::empty(),
    );
    assert_eq!(trace.state_executions[0].output, Some(json!({ "a": 1 })));
    assert_eq!(trace.output, json!({}));
}

#[test]
fn context_object_is_available_to_templates() {
    let trace = run(
        json!({
            "StartAt": "Ctx",
            "States": {
                "Ctx": {
                    "Type": "Pass",
                    "Parameters": {
                        "name.$": "$$.Execution.Name",
                        "state.$": "$$.State.Name",
                        "greeting.$": "States.Format('hi {}', $.who)"
                    },
                    "End": true
                }
            }
        }),
        json!({ "who": "bob" }),
        &mut MockEngine::empty(),
    );
    assert_eq!(
        trace.output,
        json!({ "name": "test-run", "state": "Ctx", "greeting": "hi bob" })
    );
}

// ──────────────────────────────────────────────
// Choice
// ──────────────────────────────────────────────

fn choice_machine(with_default: bool) -> Value {
    let mut check = json!({
        "Type": "Choice",
        "Choices": [ { "Variable": "$.x", "NumericGreaterThan": 10, "Next": "Big" } ]
    });
    if with_default {
        check["Default"] = json!("Small");
    }
    json!({
        "StartAt": "Check",
        "States": {
            "Check": check,
            "Big": { "Type": "Pass", "Result": "big", "End": true },
            "Small": { "Type": "Pass", "Result": "small", "End": true }
        }
    })
}

#[test]
fn choice_takes_first_matching_rule_or_default() {
    let big = run(choice_machine(true), json!({ "x": 20 }), &mut MockEngine::empty());
    assert_eq!(big.output, json!("big"));
    assert_eq!(big.execution_path, vec!["Check", "Big"]);

    let small = run(choice_machine(true), json!({ "x": 2 }), &mut MockEngine::empty());
    assert_eq!(small.output, json!("small"));
    assert_eq!(small.execution_path, vec!["Check", "Small"]);
}

#[test]
fn choice_without_default_fails_with_no_choice_matched() {
    let trace = run(choice_machine(false), json!({ "x": 2 }), &mut MockEngine::empty());
    assert!(!trace.success);
    let error = trace.error.unwrap();
    assert_eq!(error.error, errors::NO_CHOICE_MATCHED);
    assert_eq!(error.state.as_deref(), Some("Check"));
}

#[test]
fn missing_choice_variable_is_a_runtime_error() {
    let trace = run(choice_machine(true), json!({}), &mut MockEngine::empty());
    assert_eq!(trace.error_name(), Some(errors::RUNTIME));
}

#[test]
fn is_null_on_a_missing_variable_falls_through_to_default() {
    let definition = json!({
        "StartAt": "Check",
        "States": {
            "Check": {
                "Type": "Choice",
                "Choices": [ { "Variable": "$.absent", "IsNull": true, "Next": "A" } ],
                "Default": "B"
            },
            "A": { "Type": "Pass", "Result": "null", "End": true },
            "B": { "Type": "Pass", "Result": "absent", "End": true }
        }
    });
    let trace = run(definition, json!({}), &mut MockEngine::empty());
    assert!(trace.success);
    assert_eq!(trace.execution_path, vec!["Check", "B"]);
    assert_eq!(trace.output, json!("absent"));
}

// ──────────────────────────────────────────────
// Retry / Catch
// ──────────────────────────────────────────────

fn retry_machine(retry: Value, catch: Value) -> Value {
    json!({
        "StartAt": "Call",
        "States": {
            "Call": {
                "Type": "Task",
                "Resource": "arn:aws:lambda:us-east-1:123456789012:function:call",
                "Retry": retry,
                "Catch": catch,
                "End": true
            },
            "Handler": { "Type": "Pass", "End": true }
        }
    })
}

#[test]
fn retrier_invokes_mock_max_attempts_plus_one_then_catches() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Call", "type": "error", "error": { "type": "Custom.Error", "cause": "bad" } } ]
    }));
    let trace = run(
        retry_machine(
            json!([ { "ErrorEquals": ["Custom.Error"], "MaxAttempts": 2, "IntervalSeconds": 1, "BackoffRate": 2 } ]),
            json!([ { "ErrorEquals": ["States.ALL"], "Next": "Handler", "ResultPath": "$.error" } ]),
        ),
        json!({ "x": 1 }),
        &mut mocks,
    );

    assert_eq!(mocks.call_count("Call"), 3);
    assert!(trace.success);
    assert_eq!(trace.execution_path, vec!["Call", "Handler"]);
    assert_eq!(
        trace.output,
        json!({ "x": 1, "error": { "Error": "Custom.Error", "Cause": "bad" } })
    );
    let delays: Vec<f64> = trace.retries.iter().map(|r| r.delay_seconds).collect();
    assert_eq!(delays, vec![1.0, 2.0]);
}

#[test]
fn exhausted_retrier_without_catcher_fails() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Call", "type": "conditional",
                     "conditions": [ { "when": { "attempt": 0 }, "error": { "type": "Flaky" } } ],
                     "default": "ok" } ]
    }));
    // The input never changes, so every attempt fails the same way.
    let trace = run(
        retry_machine(json!([ { "ErrorEquals": ["Flaky"], "MaxAttempts": 1 } ]), json!([])),
        json!({ "attempt": 0 }),
        &mut mocks,
    );
    assert_eq!(mocks.call_count("Call"), 2);
    assert!(!trace.success);
    assert_eq!(trace.error_name(), Some("Flaky"));
}

#[test]
fn retries_count_against_the_step_ceiling() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Call", "type": "error", "error": { "type": "Custom.Error" } } ]
    }));
    let definition = machine(retry_machine(
        json!([ { "ErrorEquals": ["States.ALL"], "MaxAttempts": 1000000 } ]),
        json!([ { "ErrorEquals": ["States.ALL"], "Next": "Handler" } ]),
    ));
    let trace = execute(&definition, json!({}), &mut mocks, &options().with_max_steps(5));

    assert_eq!(mocks.call_count("Call"), 5);
    assert_eq!(trace.retries.len(), 4);
    assert_eq!(trace.error_name(), Some(errors::EXECUTION_LIMIT_EXCEEDED));
    assert_eq!(trace.error.unwrap().state.as_deref(), Some("Call"));
}

#[test]
fn uncaught_task_error_fails_at_the_last_path_entry() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Call", "type": "error", "error": { "type": "States.TaskFailed", "cause": "boom" } } ]
    }));
    let trace = run(retry_machine(json!([]), json!([])), json!({}), &mut mocks);

    assert!(!trace.success);
    assert_eq!(trace.output, Value::Null);
    let error = trace.error.clone().unwrap();
    assert_eq!(error.error, "States.TaskFailed");
    assert_eq!(error.cause.as_deref(), Some("boom"));
    assert_eq!(error.state.as_deref(), trace.execution_path.last().map(String::as_str));
}

#[test]
fn task_failed_does_not_match_timeout() {
    let config = json!({
        "mocks": [ { "state": "Call", "type": "fixed", "delay": 5000, "response": {} } ]
    });
    let mut definition = retry_machine(
        json!([]),
        json!([ { "ErrorEquals": ["States.TaskFailed"], "Next": "Handler" } ]),
    );
    definition["States"]["Call"]["TimeoutSeconds"] = json!(1);

    let trace = run(definition.clone(), json!({}), &mut engine(config.clone()));
    assert_eq!(trace.error_name(), Some(errors::TIMEOUT));

    definition["States"]["Call"]["Catch"] =
        json!([ { "ErrorEquals": ["States.ALL"], "Next": "Handler" } ]);
    let caught = run(definition, json!({}), &mut engine(config));
    assert!(caught.success);
    assert_eq!(caught.output["Error"], json!(errors::TIMEOUT));
}

#[test]
fn runtime_errors_bypass_catch_all() {
    let mut definition = retry_machine(
        json!([ { "ErrorEquals": ["States.ALL"], "MaxAttempts": 3 } ]),
        json!([ { "ErrorEquals": ["States.ALL"], "Next": "Handler" } ]),
    );
    definition["States"]["Call"]["InputPath"] = json!("$.missing");
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Call", "type": "fixed", "response": 1 } ]
    }));
    let trace = run(definition, json!({}), &mut mocks);

    assert_eq!(trace.error_name(), Some(errors::RUNTIME));
    assert_eq!(mocks.call_count("Call"), 0);
    assert!(trace.retries.is_empty());
}

#[test]
fn missing_mock_is_a_catchable_task_error() {
    let trace = run(
        retry_machine(json!([]), json!([ { "ErrorEquals": ["NoMockDefined"], "Next": "Handler" } ])),
        json!({}),
        &mut MockEngine::empty(),
    );
    assert!(trace.success);
    assert_eq!(trace.output["Error"], json!("NoMockDefined"));
}

// ──────────────────────────────────────────────
// Wait / Fail / step ceiling
// ──────────────────────────────────────────────

#[test]
fn wait_is_validated_but_not_slept() {
    let definition = |path: &str| {
        json!({
            "StartAt": "Pause",
            "States": { "Pause": { "Type": "Wait", "SecondsPath": path, "End": true } }
        })
    };
    let ok = run(definition("$.delay"), json!({ "delay": 3600 }), &mut MockEngine::empty());
    assert!(ok.success);
    assert_eq!(ok.output, json!({ "delay": 3600 }));

    let bad = run(definition("$.delay"), json!({ "delay": "soon" }), &mut MockEngine::empty());
    assert_eq!(bad.error_name(), Some(errors::RUNTIME));
}

#[test]
fn fail_state_reports_error_and_cause() {
    let trace = run(
        json!({
            "StartAt": "Stop",
            "States": { "Stop": { "Type": "Fail", "ErrorPath": "$.code", "Cause": "static cause" } }
        }),
        json!({ "code": "E42" }),
        &mut MockEngine::empty(),
    );
    let error = trace.error.unwrap();
    assert_eq!(error.error, "E42");
    assert_eq!(error.cause.as_deref(), Some("static cause"));
    assert_eq!(error.state.as_deref(), Some("Stop"));
}

#[test]
fn cycles_hit_the_step_ceiling() {
    let definition = machine(json!({
        "StartAt": "A",
        "States": {
            "A": { "Type": "Pass", "Next": "B" },
            "B": { "Type": "Pass", "Next": "A" }
        }
    }));
    let trace = execute(
        &definition,
        json!({}),
        &mut MockEngine::empty(),
        &options().with_max_steps(10),
    );
    assert_eq!(trace.error_name(), Some(errors::EXECUTION_LIMIT_EXCEEDED));
    assert_eq!(trace.execution_path.len(), 10);
    assert_eq!(trace.error.unwrap().state.as_deref(), Some("B"));
}

// ──────────────────────────────────────────────
// Map
// ──────────────────────────────────────────────

#[test]
fn map_runs_each_item_in_order() {
    let trace = run(
        json!({
            "StartAt": "Each",
            "States": {
                "Each": {
                    "Type": "Map",
                    "ItemsPath": "$.items",
                    "ItemSelector": {
                        "value.$": "$$.Map.Item.Value",
                        "index.$": "$$.Map.Item.Index",
                        "tag.$": "$.tag"
                    },
                    "ItemProcessor": {
                        "StartAt": "Echo",
                        "States": { "Echo": { "Type": "Pass", "End": true } }
                    },
                    "End": true
                }
            }
        }),
        json!({ "items": ["a", "b", "c"], "tag": "t" }),
        &mut MockEngine::empty(),
    );

    assert!(trace.success);
    assert_eq!(
        trace.output,
        json!([
            { "value": "a", "index": 0, "tag": "t" },
            { "value": "b", "index": 1, "tag": "t" },
            { "value": "c", "index": 2, "tag": "t" }
        ])
    );
    assert_eq!(trace.execution_path, vec!["Each"]);
    assert_eq!(trace.map_executions.len(), 1);
    assert_eq!(trace.map_executions[0].iteration_paths, vec![vec!["Echo"]; 3]);

    let scopes: Vec<&str> = trace.state_executions.iter().map(|s| s.scope.as_str()).collect();
    assert_eq!(scopes, vec!["", "Each[0]", "Each[1]", "Each[2]"]);
}

#[test]
fn map_items_path_must_be_an_array() {
    let trace = run(
        json!({
            "StartAt": "Each",
            "States": {
                "Each": {
                    "Type": "Map",
                    "ItemsPath": "$.items",
                    "ItemProcessor": { "StartAt": "P", "States": { "P": { "Type": "Pass", "End": true } } },
                    "End": true
                }
            }
        }),
        json!({ "items": "nope" }),
        &mut MockEngine::empty(),
    );
    assert_eq!(trace.error_name(), Some(errors::RUNTIME));
}

#[test]
fn distributed_map_with_result_writer_returns_summary() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Dist", "type": "fixed", "response": [1, 2, 3] } ]
    }));
    let trace = run(
        json!({
            "StartAt": "Dist",
            "States": {
                "Dist": {
                    "Type": "Map",
                    "ItemReader": {
                        "Resource": "arn:aws:states:::s3:getObject",
                        "ReaderConfig": { "InputType": "JSON" },
                        "Parameters": { "Bucket": "in", "Key": "items.json" }
                    },
                    "ItemProcessor": {
                        "ProcessorConfig": { "Mode": "DISTRIBUTED", "ExecutionType": "STANDARD" },
                        "StartAt": "P",
                        "States": { "P": { "Type": "Pass", "End": true } }
                    },
                    "ResultWriter": {
                        "Resource": "arn:aws:states:::s3:putObject",
                        "Parameters": { "Bucket": "out", "Prefix": "results" }
                    },
                    "End": true
                }
            }
        }),
        json!({}),
        &mut mocks,
    );

    assert!(trace.success, "{:?}", trace.error);
    assert!(trace.output.is_object());
    assert_eq!(
        trace.output["ResultWriterDetails"],
        json!({ "Bucket": "out", "Key": "results/test-run/manifest.json" })
    );
    assert_eq!(
        trace.output["MapRunArn"],
        json!("arn:aws:states:us-east-1:123456789012:mapRun:Checkout/Dist:test-run")
    );
    assert_eq!(trace.map_executions[0].iteration_paths.len(), 3);
}

#[test]
fn item_reader_must_return_an_array() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Dist", "type": "fixed", "response": { "not": "array" } } ]
    }));
    let trace = run(
        json!({
            "StartAt": "Dist",
            "States": {
                "Dist": {
                    "Type": "Map",
                    "ItemReader": { "Resource": "arn:aws:states:::s3:getObject" },
                    "ItemProcessor": { "StartAt": "P", "States": { "P": { "Type": "Pass", "End": true } } },
                    "End": true
                }
            }
        }),
        json!({}),
        &mut mocks,
    );
    assert_eq!(trace.error_name(), Some(errors::ITEM_READER_FAILED));
}

#[test]
fn item_batcher_groups_items() {
    let trace = run(
        json!({
            "StartAt": "Batch",
            "States": {
                "Batch": {
                    "Type": "Map",
                    "ItemBatcher": { "MaxItemsPerBatch": 2, "BatchInput": { "tag": "t" } },
                    "ItemProcessor": { "StartAt": "P", "States": { "P": { "Type": "Pass", "End": true } } },
                    "End": true
                }
            }
        }),
        json!([1, 2, 3]),
        &mut MockEngine::empty(),
    );
    assert_eq!(
        trace.output,
        json!([
            { "Items": [1, 2], "BatchInput": { "tag": "t" } },
            { "Items": [3], "BatchInput": { "tag": "t" } }
        ])
    );
}

#[test]
fn failing_iteration_fails_the_map_and_is_catchable() {
    let mut mocks = engine(json!({
        "mocks": [ {
            "state": "Work", "type": "conditional",
            "conditions": [ { "when": { "n": 2 }, "error": { "type": "BadItem", "cause": "two" } } ],
            "default": "done"
        } ]
    }));
    let trace = run(
        json!({
            "StartAt": "Each",
            "States": {
                "Each": {
                    "Type": "Map",
                    "ItemProcessor": {
                        "StartAt": "Work",
                        "States": { "Work": { "Type": "Task", "Resource": "arn:aws:lambda:::function:w", "End": true } }
                    },
                    "Catch": [ { "ErrorEquals": ["BadItem"], "Next": "Recover", "ResultPath": "$.failure" } ],
                    "End": true
                },
                "Recover": { "Type": "Pass", "End": true }
            }
        }),
        json!([ { "n": 1 }, { "n": 2 }, { "n": 3 } ]),
        &mut mocks,
    );

    assert!(trace.success, "{:?}", trace.error);
    assert_eq!(trace.execution_path, vec!["Each", "Recover"]);
    // Iteration 3 never runs once iteration 2 fails.
    assert_eq!(trace.map_executions[0].iteration_paths.len(), 2);
    assert_eq!(mocks.call_count("Work"), 2);
}

// ──────────────────────────────────────────────
// Parallel
// ──────────────────────────────────────────────

#[test]
fn parallel_collects_branch_outputs_in_order() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Price", "type": "fixed", "response": 9.5 } ]
    }));
    let trace = run(
        json!({
            "StartAt": "Fan",
            "States": {
                "Fan": {
                    "Type": "Parallel",
                    "Branches": [
                        { "StartAt": "Price", "States": {
                            "Price": { "Type": "Task", "Resource": "arn:aws:lambda:::function:p", "End": true } } },
                        { "StartAt": "Stock", "States": {
                            "Stock": { "Type": "Pass", "Result": 4, "End": true } } }
                    ],
                    "ResultPath": "$.results",
                    "End": true
                }
            }
        }),
        json!({ "sku": "x" }),
        &mut mocks,
    );

    assert!(trace.success);
    assert_eq!(trace.output, json!({ "sku": "x", "results": [9.5, 4] }));
    assert_eq!(
        trace.parallel_executions,
        vec![ParallelExecution {
            state: "Fan".to_string(),
            branch_paths: vec![vec!["Price".to_string()], vec!["Stock".to_string()]],
        }]
    );
}

#[test]
fn nested_containers_are_reported_at_top_level() {
    let trace = run(
        json!({
            "StartAt": "Fan",
            "States": {
                "Fan": {
                    "Type": "Parallel",
                    "Branches": [
                        { "StartAt": "Inner", "States": {
                            "Inner": {
                                "Type": "Map",
                                "ItemsPath": "$.xs",
                                "ItemProcessor": { "StartAt": "Leaf", "States": { "Leaf": { "Type": "Pass", "End": true } } },
                                "End": true
                            } } },
                        { "StartAt": "Other", "States": { "Other": { "Type": "Pass", "End": true } } }
                    ],
                    "End": true
                }
            }
        }),
        json!({ "xs": [1, 2] }),
        &mut MockEngine::empty(),
    );

    assert!(trace.success);
    assert_eq!(trace.execution_path, vec!["Fan"]);
    assert_eq!(trace.map_executions[0].state, "Inner");
    assert_eq!(trace.map_executions[0].iteration_paths.len(), 2);
    assert_eq!(trace.parallel_executions[0].branch_paths.len(), 2);
    assert!(trace
        .state_executions
        .iter()
        .any(|s| s.state == "Leaf" && s.scope == "Fan[0]/Inner[1]"));
}

#[test]
fn uncaught_branch_failure_fails_the_parallel_state() {
    let mut mocks = engine(json!({
        "mocks": [ { "state": "Boom", "type": "error", "error": { "type": "BranchError" } } ]
    }));
    let trace = run(
        json!({
            "StartAt": "Fan",
            "States": {
                "Fan": {
                    "Type": "Parallel",
                    "Branches": [
                        { "StartAt": "Fine", "States": { "Fine": { "Type": "Pass", "End": true } } },
                        { "StartAt": "Boom", "States": {
                            "Boom": { "Type": "Task", "Resource": "arn:aws:lambda:::function:b", "End": true } } }
                    ],
                    "End": true
                }
            }
        }),
        json!({}),
        &mut mocks,
    );

    assert!(!trace.success);
    let error = trace.error.unwrap();
    assert_eq!(error.error, "BranchError");
    assert_eq!(error.state.as_deref(), Some("Fan"));
    assert_eq!(trace.parallel_executions[0].branch_paths.len(), 2);
}

#[test]
fn backoff_is_capped_by_max_delay() {
    let retrier = Retrier {
        error_equals: vec![errors::ALL.to_string()],
        interval_seconds: 2.0,
        max_attempts: 5,
        backoff_rate: 3.0,
        max_delay_seconds: Some(10.0),
        ..Retrier::default()
    };
    assert_eq!(backoff_delay(&retrier, 1), 2.0);
    assert_eq!(backoff_delay(&retrier, 2), 6.0);
    assert_eq!(backoff_delay(&retrier, 3), 10.0);
}

#[test]
fn child_scope_labels_compose() {
    assert_eq!(child_scope("", "Map", 2), "Map[2]");
    assert_eq!(child_scope("Outer[0]", "Inner", 1), "Outer[0]/Inner[1]");
}

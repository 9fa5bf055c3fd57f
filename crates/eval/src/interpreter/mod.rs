//! State interpreter: walks a state machine from `StartAt` to a terminal state.
//!
//! Each scope (the top-level machine, one Map iteration, one Parallel
//! branch) is driven by an iterative loop with its own step ceiling.
//! Nested Map/Parallel scopes are entered by structural recursion on the
//! definition, so the Rust stack depth is bounded by the definition's
//! nesting depth, never by the number of steps.
//!
//! Per-state data flow:
//! `InputPath -> Parameters -> result -> ResultSelector -> ResultPath -> OutputPath`.

use serde_json::{json, Map, Value};
use stepcheck_interchange::{
    error_matches, errors, Catcher, ChoiceState, FailState, MapState, ParallelState, PassState,
    PathField, Retrier, State, StateKind, StateMachine, TaskState, Transition, WaitDuration,
    WaitState,
};

use crate::context::{Context, Entropy, ExecutionOptions};
use crate::error::EvalError;
use crate::mock::{MockEngine, MockOutcome, TaskError};
use crate::numeric;
use crate::path::{self, Scope};
use crate::payload;
use crate::predicate;
use crate::trace::{
    ExecutionTrace, MapExecution, ParallelExecution, RetryRecord, StateExecution, TraceError,
};

// ──────────────────────────────────────────────
// Failures
// ──────────────────────────────────────────────

/// A failure raised while running a state.
///
/// `catchable` separates simulated task errors (and Fail states inside
/// nested scopes) from runtime faults that no Retry/Catch may intercept.
#[derive(Debug, Clone, PartialEq)]
struct Fault {
    error: String,
    cause: Option<String>,
    catchable: bool,
    state: Option<String>,
}

impl Fault {
    fn task(e: TaskError) -> Self {
        Fault {
            error: e.error,
            cause: e.cause,
            catchable: true,
            state: None,
        }
    }

    fn fatal(error: &str, cause: impl Into<String>) -> Self {
        Fault {
            error: error.to_string(),
            cause: Some(cause.into()),
            catchable: false,
            state: None,
        }
    }

    fn at(mut self, state: &str) -> Self {
        self.state = Some(state.to_string());
        self
    }
}

impl From<EvalError> for Fault {
    fn from(e: EvalError) -> Self {
        Fault::fatal(e.error_name(), e.to_string())
    }
}

/// Where control goes after a state completes.
enum Step {
    Next(String, Value),
    End(Value),
}

fn follow(transition: &Transition, output: Value) -> Step {
    match transition {
        Transition::Next(next) => Step::Next(next.clone(), output),
        Transition::End => Step::End(output),
    }
}

/// Result of running one scope to completion.
struct ScopeRun {
    output: Result<Value, Fault>,
    path: Vec<String>,
}

// ──────────────────────────────────────────────
// Entry point
// ──────────────────────────────────────────────

/// Execute `definition` against `input`, resolving every task-like call
/// through `mocks`.
///
/// Never fails: runtime problems are reported in the returned trace.
pub fn execute(
    definition: &StateMachine,
    input: Value,
    mocks: &mut MockEngine,
    options: &ExecutionOptions,
) -> ExecutionTrace {
    warn_on_suspicious_retriers(definition);

    let mut entropy = Entropy::new(options.seed);
    let context = Context::new(options, &input, &mut entropy);
    let mut interpreter = Interpreter {
        mocks,
        max_steps: options.max_steps,
        entropy,
        map_executions: Vec::new(),
        parallel_executions: Vec::new(),
        state_executions: Vec::new(),
        retries: Vec::new(),
    };

    let run = interpreter.run_scope(definition, input, &context, "");
    let (output, success, error) = match run.output {
        Ok(output) => (output, true, None),
        Err(fault) => {
            tracing::debug!(error = %fault.error, state = ?fault.state, "execution failed");
            (
                Value::Null,
                false,
                Some(TraceError {
                    error: fault.error,
                    cause: fault.cause,
                    state: fault.state,
                }),
            )
        }
    };

    ExecutionTrace {
        output,
        execution_path: run.path,
        map_executions: interpreter.map_executions,
        parallel_executions: interpreter.parallel_executions,
        state_executions: interpreter.state_executions,
        retries: interpreter.retries,
        success,
        error,
    }
}

fn warn_on_suspicious_retriers(definition: &StateMachine) {
    let scopes = std::iter::once(definition).chain(
        definition
            .containers()
            .into_iter()
            .flat_map(|c| c.scopes.iter().collect::<Vec<_>>()),
    );
    for scope in scopes {
        for state in &scope.states {
            let zero = state
                .kind
                .retriers()
                .unwrap_or_default()
                .iter()
                .any(|r| r.max_attempts == 0);
            if zero {
                tracing::warn!(state = %state.name, "retrier with MaxAttempts 0 never retries");
            }
        }
    }
}

// ──────────────────────────────────────────────
// Interpreter
// ──────────────────────────────────────────────

struct Interpreter<'m> {
    mocks: &'m mut MockEngine,
    max_steps: usize,
    entropy: Entropy,
    map_executions: Vec<MapExecution>,
    parallel_executions: Vec<ParallelExecution>,
    state_executions: Vec<StateExecution>,
    retries: Vec<RetryRecord>,
}

impl Interpreter<'_> {
    fn run_scope(
        &mut self,
        machine: &StateMachine,
        input: Value,
        context: &Context,
        scope: &str,
    ) -> ScopeRun {
        let mut path: Vec<String> = Vec::new();
        let mut current = machine.start_at.clone();
        let mut document = input;
        let mut step_count = 0;

        loop {
            step_count += 1;
            if step_count > self.max_steps {
                let fault = Fault::fatal(
                    errors::EXECUTION_LIMIT_EXCEEDED,
                    format!("exceeded maximum step count ({})", self.max_steps),
                );
                let last = path.last().cloned().unwrap_or_else(|| current.clone());
                return ScopeRun {
                    output: Err(fault.at(&last)),
                    path,
                };
            }

            let Some(state) = machine.get_state(&current) else {
                let fault = Fault::fatal(
                    errors::RUNTIME,
                    format!("state '{}' does not exist in this scope", current),
                );
                return ScopeRun {
                    output: Err(fault.at(&current)),
                    path,
                };
            };
            path.push(current.clone());
            tracing::debug!(state = %state.name, kind = state.kind.type_name(), scope, "entering state");

            let record = self.state_executions.len();
            self.state_executions.push(StateExecution {
                state: state.name.clone(),
                scope: scope.to_string(),
                input: document.clone(),
                output: None,
            });

            match self.run_state(state, &document, context, scope) {
                Ok(Step::Next(next, output)) => {
                    self.state_executions[record].output = Some(output.clone());
                    document = output;
                    current = next;
                }
                Ok(Step::End(output)) => {
                    self.state_executions[record].output = Some(output.clone());
                    return ScopeRun {
                        output: Ok(output),
                        path,
                    };
                }
                Err(fault) => {
                    return ScopeRun {
                        output: Err(fault.at(&state.name)),
                        path,
                    };
                }
            }
        }
    }

    fn run_state(
        &mut self,
        state: &State,
        raw: &Value,
        context: &Context,
        scope: &str,
    ) -> Result<Step, Fault> {
        match &state.kind {
            StateKind::Pass(pass) => self.run_pass(state, pass, raw, context),
            StateKind::Task(task) => self.with_policy(
                state,
                raw,
                scope,
                &task.retry,
                &task.catch,
                &task.transition,
                |this, retry_count| this.task_attempt(state, task, raw, context, retry_count),
            ),
            StateKind::Choice(choice) => self.run_choice(state, choice, raw, context),
            StateKind::Wait(wait) => self.run_wait(state, wait, raw, context),
            StateKind::Succeed(succeed) => {
                let ctx = context.render(&state.name, 0);
                let effective = path::select(&succeed.io.input_path, &Scope::new(raw, &ctx))?;
                let output = path::select(&succeed.io.output_path, &Scope::new(&effective, &ctx))?;
                Ok(Step::End(output))
            }
            StateKind::Fail(fail) => Err(self.run_fail(state, fail, raw, context)),
            StateKind::Map(map) => self.with_policy(
                state,
                raw,
                scope,
                &map.retry,
                &map.catch,
                &map.transition,
                |this, retry_count| this.map_attempt(state, map, raw, context, scope, retry_count),
            ),
            StateKind::Parallel(parallel) => self.with_policy(
                state,
                raw,
                scope,
                &parallel.retry,
                &parallel.catch,
                &parallel.transition,
                |this, retry_count| {
                    this.parallel_attempt(state, parallel, raw, context, scope, retry_count)
                },
            ),
        }
    }

    // ── Retry / Catch ───────────────────────────

    /// Run `attempt` until it succeeds, a matching retrier is exhausted,
    /// or the error matches no retrier. A catchable error then goes to the
    /// first matching catcher.
    ///
    /// Every attempt counts against the step ceiling, so one state's
    /// attempts never exceed `max_steps`.
    #[allow(clippy::too_many_arguments)]
    fn with_policy<F>(
        &mut self,
        state: &State,
        raw: &Value,
        scope: &str,
        retriers: &[Retrier],
        catchers: &[Catcher],
        transition: &Transition,
        mut attempt: F,
    ) -> Result<Step, Fault>
    where
        F: FnMut(&mut Self, u32) -> Result<Value, Fault>,
    {
        let mut attempts = vec![0u32; retriers.len()];
        let mut retry_count = 0u32;

        loop {
            let fault = match attempt(self, retry_count) {
                Ok(output) => return Ok(follow(transition, output)),
                Err(fault) if !fault.catchable => return Err(fault),
                Err(fault) => fault,
            };

            if let Some(index) = retriers
                .iter()
                .position(|r| error_matches(&r.error_equals, &fault.error))
            {
                let retrier = &retriers[index];
                if attempts[index] < retrier.max_attempts {
                    if retry_count as usize + 1 >= self.max_steps {
                        return Err(Fault::fatal(
                            errors::EXECUTION_LIMIT_EXCEEDED,
                            format!(
                                "retries of '{}' exceeded maximum step count ({})",
                                state.name, self.max_steps
                            ),
                        ));
                    }
                    attempts[index] += 1;
                    retry_count += 1;
                    let delay_seconds = backoff_delay(retrier, attempts[index]);
                    tracing::debug!(
                        state = %state.name,
                        error = %fault.error,
                        attempt = attempts[index],
                        delay_seconds,
                        "retrying"
                    );
                    self.retries.push(RetryRecord {
                        state: state.name.clone(),
                        scope: scope.to_string(),
                        error: fault.error.clone(),
                        attempt: attempts[index],
                        delay_seconds,
                    });
                    continue;
                }
            }

            if let Some(catcher) = catchers
                .iter()
                .find(|c| error_matches(&c.error_equals, &fault.error))
            {
                tracing::debug!(state = %state.name, error = %fault.error, next = %catcher.next, "caught");
                let error_output = json!({
                    "Error": fault.error,
                    "Cause": fault.cause.clone().unwrap_or_default(),
                });
                let injected = path::merge_result(&catcher.result_path, raw, error_output)?;
                return Ok(Step::Next(catcher.next.clone(), injected));
            }

            return Err(fault);
        }
    }

    // ── Pass / Choice / Wait / Fail ─────────────

    fn run_pass(
        &mut self,
        state: &State,
        pass: &PassState,
        raw: &Value,
        context: &Context,
    ) -> Result<Step, Fault> {
        let ctx = context.render(&state.name, 0);
        let effective = path::select(&pass.io.input_path, &Scope::new(raw, &ctx))?;
        let effective = match &pass.parameters {
            Some(template) => {
                payload::render(template, &Scope::new(&effective, &ctx), &mut self.entropy)?
            }
            None => effective,
        };
        let result = pass.result.clone().unwrap_or(effective);
        let merged = path::merge_result(&pass.result_path, raw, result)?;
        let output = path::select(&pass.io.output_path, &Scope::new(&merged, &ctx))?;
        Ok(follow(&pass.transition, output))
    }

    fn run_choice(
        &mut self,
        state: &State,
        choice: &ChoiceState,
        raw: &Value,
        context: &Context,
    ) -> Result<Step, Fault> {
        let ctx = context.render(&state.name, 0);
        let effective = path::select(&choice.io.input_path, &Scope::new(raw, &ctx))?;
        let scope = Scope::new(&effective, &ctx);

        let mut next = None;
        for rule in &choice.choices {
            if predicate::eval_condition(&rule.condition, &scope)? {
                next = Some(rule.next.clone());
                break;
            }
        }
        let next = match next.or_else(|| choice.default.clone()) {
            Some(next) => next,
            None => {
                return Err(Fault::fatal(
                    errors::NO_CHOICE_MATCHED,
                    format!("no Choice rule matched and '{}' has no Default", state.name),
                ))
            }
        };
        let output = path::select(&choice.io.output_path, &scope)?;
        Ok(Step::Next(next, output))
    }

    fn run_wait(
        &mut self,
        state: &State,
        wait: &WaitState,
        raw: &Value,
        context: &Context,
    ) -> Result<Step, Fault> {
        let ctx = context.render(&state.name, 0);
        let effective = path::select(&wait.io.input_path, &Scope::new(raw, &ctx))?;
        let scope = Scope::new(&effective, &ctx);

        // Durations are checked but never slept.
        match &wait.duration {
            WaitDuration::Seconds(_) => {}
            WaitDuration::SecondsPath(p) => {
                let value = path::resolve(p, &scope)?;
                if value.as_u64().is_none() {
                    return Err(Fault::fatal(
                        errors::RUNTIME,
                        format!("SecondsPath '{}' must resolve to a non-negative integer, got {}", p, value),
                    ));
                }
            }
            WaitDuration::Timestamp(ts) => {
                if predicate::parse_timestamp(&Value::String(ts.clone())).is_none() {
                    return Err(Fault::fatal(
                        errors::RUNTIME,
                        format!("Timestamp '{}' is not an RFC 3339 timestamp", ts),
                    ));
                }
            }
            WaitDuration::TimestampPath(p) => {
                let value = path::resolve(p, &scope)?;
                if predicate::parse_timestamp(&value).is_none() {
                    return Err(Fault::fatal(
                        errors::RUNTIME,
                        format!("TimestampPath '{}' must resolve to an RFC 3339 timestamp, got {}", p, value),
                    ));
                }
            }
        }

        let output = path::select(&wait.io.output_path, &scope)?;
        Ok(follow(&wait.transition, output))
    }

    fn run_fail(&mut self, state: &State, fail: &FailState, raw: &Value, context: &Context) -> Fault {
        let ctx = context.render(&state.name, 0);
        let scope = Scope::new(raw, &ctx);
        let read = |literal: &Option<String>, dynamic: &Option<String>| -> Result<Option<String>, Fault> {
            match (literal, dynamic) {
                (Some(text), _) => Ok(Some(text.clone())),
                (None, Some(p)) => match path::resolve(p, &scope)? {
                    Value::String(s) => Ok(Some(s)),
                    other => Err(Fault::fatal(
                        errors::RUNTIME,
                        format!("'{}' must resolve to a string, got {}", p, other),
                    )),
                },
                (None, None) => Ok(None),
            }
        };

        let error = match read(&fail.error, &fail.error_path) {
            Ok(error) => error.unwrap_or_else(|| "States.Fail".to_string()),
            Err(fault) => return fault,
        };
        let cause = match read(&fail.cause, &fail.cause_path) {
            Ok(cause) => cause,
            Err(fault) => return fault,
        };
        Fault {
            error,
            cause,
            catchable: true,
            state: None,
        }
    }

    // ── Task ────────────────────────────────────

    fn task_attempt(
        &mut self,
        state: &State,
        task: &TaskState,
        raw: &Value,
        context: &Context,
        retry_count: u32,
    ) -> Result<Value, Fault> {
        let ctx = context.render(&state.name, retry_count);
        let effective = path::select(&task.io.input_path, &Scope::new(raw, &ctx))?;
        let request = match &task.parameters {
            Some(template) => {
                payload::render(template, &Scope::new(&effective, &ctx), &mut self.entropy)?
            }
            None => effective.clone(),
        };

        let timeout_seconds = match (&task.timeout_seconds, &task.timeout_seconds_path) {
            (Some(seconds), _) => Some(*seconds),
            (None, Some(p)) => {
                let value = path::resolve(p, &Scope::new(&effective, &ctx))?;
                Some(value.as_u64().ok_or_else(|| {
                    Fault::fatal(
                        errors::RUNTIME,
                        format!("TimeoutSecondsPath '{}' must resolve to a positive integer, got {}", p, value),
                    )
                })?)
            }
            (None, None) => None,
        };

        let response = self.mocks.resolve(&state.name, &request);
        if let (Some(delay_ms), Some(timeout)) = (response.delay_ms, timeout_seconds) {
            if delay_ms > timeout.saturating_mul(1000) {
                return Err(Fault::task(TaskError::new(
                    errors::TIMEOUT,
                    format!(
                        "task '{}' took {}ms, exceeding TimeoutSeconds {}",
                        state.name, delay_ms, timeout
                    ),
                )));
            }
        }
        let result = match response.outcome {
            MockOutcome::Value(value) => value,
            MockOutcome::Error(e) => return Err(Fault::task(e)),
        };

        self.finish(
            raw,
            result,
            task.result_selector.as_ref(),
            &task.result_path,
            &task.io.output_path,
            &ctx,
        )
    }

    /// `ResultSelector -> ResultPath -> OutputPath` for task-like states.
    fn finish(
        &mut self,
        raw: &Value,
        result: Value,
        result_selector: Option<&Value>,
        result_path: &PathField,
        output_path: &PathField,
        ctx: &Value,
    ) -> Result<Value, Fault> {
        let selected = match result_selector {
            Some(template) => payload::render(template, &Scope::new(&result, ctx), &mut self.entropy)?,
            None => result,
        };
        let merged = path::merge_result(result_path, raw, selected)?;
        Ok(path::select(output_path, &Scope::new(&merged, ctx))?)
    }

    // ── Map ─────────────────────────────────────

    fn map_attempt(
        &mut self,
        state: &State,
        map: &MapState,
        raw: &Value,
        context: &Context,
        scope: &str,
        retry_count: u32,
    ) -> Result<Value, Fault> {
        let ctx = context.render(&state.name, retry_count);
        let effective = path::select(&map.io.input_path, &Scope::new(raw, &ctx))?;

        let items = match &map.item_reader {
            Some(_) => self.read_items(&state.name, &effective)?,
            None => {
                let items_path = map.items_path.as_deref().unwrap_or("$");
                match path::resolve(items_path, &Scope::new(&effective, &ctx))? {
                    Value::Array(items) => items,
                    other => {
                        return Err(Fault::fatal(
                            errors::RUNTIME,
                            format!(
                                "ItemsPath '{}' must resolve to an array, got {}",
                                items_path,
                                numeric::type_of(&other)
                            ),
                        ))
                    }
                }
            }
        };

        let inputs = match &map.item_batcher {
            Some(batcher) => {
                let size = batcher
                    .max_items_per_batch
                    .and_then(|n| usize::try_from(n).ok())
                    .filter(|n| *n > 0)
                    .unwrap_or_else(|| items.len().max(1));
                let batch_input = match &batcher.batch_input {
                    Some(template) => Some(payload::render(
                        template,
                        &Scope::new(&effective, &ctx),
                        &mut self.entropy,
                    )?),
                    None => None,
                };
                items
                    .chunks(size)
                    .map(|chunk| {
                        let mut batch = Map::new();
                        batch.insert("Items".to_string(), Value::Array(chunk.to_vec()));
                        if let Some(extra) = &batch_input {
                            batch.insert("BatchInput".to_string(), extra.clone());
                        }
                        Value::Object(batch)
                    })
                    .collect::<Vec<_>>()
            }
            None => items,
        };

        let mut iteration_paths = Vec::with_capacity(inputs.len());
        let mut outputs = Vec::with_capacity(inputs.len());
        let mut failure = None;
        for (index, item) in inputs.into_iter().enumerate() {
            let item_context = context.with_map_item(index, item.clone());
            let item_input = match &map.item_selector {
                Some(template) => {
                    let item_ctx = item_context.render(&state.name, retry_count);
                    match payload::render(template, &Scope::new(&effective, &item_ctx), &mut self.entropy) {
                        Ok(v) => v,
                        Err(e) => {
                            failure = Some(Fault::from(e));
                            break;
                        }
                    }
                }
                None => item,
            };
            let label = child_scope(scope, &state.name, index);
            let run = self.run_scope(&map.item_processor, item_input, &item_context, &label);
            iteration_paths.push(run.path);
            match run.output {
                Ok(output) => outputs.push(output),
                Err(fault) => {
                    failure = Some(fault);
                    break;
                }
            }
        }
        self.map_executions.push(MapExecution {
            state: state.name.clone(),
            iteration_paths,
        });
        if let Some(fault) = failure {
            return Err(fault);
        }

        let result = match &map.result_writer {
            Some(writer) => self.writer_summary(&state.name, writer, &effective, &ctx, context)?,
            None => Value::Array(outputs),
        };

        self.finish(
            raw,
            result,
            map.result_selector.as_ref(),
            &map.result_path,
            &map.io.output_path,
            &ctx,
        )
    }

    /// Items from an `ItemReader` come from the mock registered under the
    /// Map state's own name.
    fn read_items(&mut self, state: &str, effective: &Value) -> Result<Vec<Value>, Fault> {
        match self.mocks.resolve(state, effective).outcome {
            MockOutcome::Value(Value::Array(items)) => Ok(items),
            MockOutcome::Value(other) => Err(Fault::task(TaskError::new(
                errors::ITEM_READER_FAILED,
                format!(
                    "item reader for '{}' must return an array, got {}",
                    state,
                    numeric::type_of(&other)
                ),
            ))),
            MockOutcome::Error(e) => Err(Fault::task(e)),
        }
    }

    fn writer_summary(
        &mut self,
        state: &str,
        writer: &Value,
        effective: &Value,
        ctx: &Value,
        context: &Context,
    ) -> Result<Value, Fault> {
        let parameters = match writer.get("Parameters").or_else(|| writer.get("Arguments")) {
            Some(template) => {
                payload::render(template, &Scope::new(effective, ctx), &mut self.entropy)?
            }
            None => Value::Object(Map::new()),
        };
        let bucket = parameters
            .get("Bucket")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let prefix = parameters
            .get("Prefix")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim_end_matches('/');
        let run_id = context.execution_name();
        let key = if prefix.is_empty() {
            format!("{}/manifest.json", run_id)
        } else {
            format!("{}/{}/manifest.json", prefix, run_id)
        };
        Ok(json!({
            "MapRunArn": context.map_run_arn(state),
            "ResultWriterDetails": { "Bucket": bucket, "Key": key },
        }))
    }

    // ── Parallel ────────────────────────────────

    fn parallel_attempt(
        &mut self,
        state: &State,
        parallel: &ParallelState,
        raw: &Value,
        context: &Context,
        scope: &str,
        retry_count: u32,
    ) -> Result<Value, Fault> {
        let ctx = context.render(&state.name, retry_count);
        let effective = path::select(&parallel.io.input_path, &Scope::new(raw, &ctx))?;
        let branch_input = match &parallel.parameters {
            Some(template) => {
                payload::render(template, &Scope::new(&effective, &ctx), &mut self.entropy)?
            }
            None => effective,
        };

        let mut branch_paths = Vec::with_capacity(parallel.branches.len());
        let mut outputs = Vec::with_capacity(parallel.branches.len());
        let mut failure = None;
        for (index, branch) in parallel.branches.iter().enumerate() {
            let label = child_scope(scope, &state.name, index);
            let run = self.run_scope(branch, branch_input.clone(), context, &label);
            branch_paths.push(run.path);
            match run.output {
                Ok(output) => outputs.push(output),
                Err(fault) => {
                    failure = Some(fault);
                    break;
                }
            }
        }
        self.parallel_executions.push(ParallelExecution {
            state: state.name.clone(),
            branch_paths,
        });
        if let Some(fault) = failure {
            return Err(fault);
        }

        self.finish(
            raw,
            Value::Array(outputs),
            parallel.result_selector.as_ref(),
            &parallel.result_path,
            &parallel.io.output_path,
            &ctx,
        )
    }
}

/// Scope label for iteration/branch `index` of `container`.
fn child_scope(parent: &str, container: &str, index: usize) -> String {
    if parent.is_empty() {
        format!("{}[{}]", container, index)
    } else {
        format!("{}/{}[{}]", parent, container, index)
    }
}

/// `IntervalSeconds * BackoffRate^(attempt-1)`, capped by `MaxDelaySeconds`.
fn backoff_delay(retrier: &Retrier, attempt: u32) -> f64 {
    let exponent = attempt.saturating_sub(1) as i32;
    let delay = retrier.interval_seconds * retrier.backoff_rate.powi(exponent);
    match retrier.max_delay_seconds {
        Some(max) => delay.min(max),
        None => delay,
    }
}

#[cfg(test)]
mod tests;

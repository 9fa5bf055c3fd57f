//! Typed structs representing an Amazon States Language document.
//!
//! Every state variant is a closed `StateKind` enum arm. Fields that carry
//! free-form payload templates (`Parameters`, `ResultSelector`, `ItemReader`,
//! ...) are kept as `serde_json::Value` and interpreted by the evaluator.

use std::collections::HashMap;

use serde_json::Value;

/// Well-known ASL error names.
pub mod errors {
    pub const ALL: &str = "States.ALL";
    pub const TASK_FAILED: &str = "States.TaskFailed";
    pub const TIMEOUT: &str = "States.Timeout";
    pub const RUNTIME: &str = "States.Runtime";
    pub const NO_CHOICE_MATCHED: &str = "States.NoChoiceMatched";
    pub const INTRINSIC_FAILURE: &str = "States.IntrinsicFailure";
    pub const BRANCH_FAILED: &str = "States.BranchFailed";
    pub const ITEM_READER_FAILED: &str = "States.ItemReaderFailed";
    pub const EXECUTION_LIMIT_EXCEEDED: &str = "ExecutionLimitExceeded";
}

// ── State machine ───────────────────────────────────────────────────

/// A state machine scope: the top-level definition, a Map ItemProcessor,
/// or one Parallel branch.
#[derive(Debug, Clone, PartialEq)]
pub struct StateMachine {
    pub comment: Option<String>,
    pub start_at: String,
    pub states: Vec<State>,
    pub timeout_seconds: Option<u64>,
    state_index: HashMap<String, usize>,
}

impl StateMachine {
    /// Construct a scope from its states, building the name index.
    pub fn new(start_at: impl Into<String>, states: Vec<State>) -> Self {
        let state_index = states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        StateMachine {
            comment: None,
            start_at: start_at.into(),
            states,
            timeout_seconds: None,
            state_index,
        }
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn with_timeout(mut self, timeout_seconds: Option<u64>) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Look up a state by name in O(1) via the index.
    pub fn get_state(&self, name: &str) -> Option<&State> {
        self.state_index.get(name).map(|&i| &self.states[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.state_index.contains_key(name)
    }

    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    /// Every `Map`/`Parallel` container reachable from this scope at any
    /// depth, paired with the scopes it owns.
    pub fn containers(&self) -> Vec<Container<'_>> {
        let mut out = Vec::new();
        collect_containers(self, &mut out);
        out
    }
}

/// A nested container state and the sub-machines it executes.
#[derive(Debug, Clone, Copy)]
pub struct Container<'a> {
    pub state: &'a State,
    pub kind: ContainerKind,
    pub scopes: ContainerScopes<'a>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Map,
    Parallel,
}

#[derive(Debug, Clone, Copy)]
pub enum ContainerScopes<'a> {
    Map(&'a StateMachine),
    Parallel(&'a [StateMachine]),
}

impl<'a> ContainerScopes<'a> {
    pub fn iter(&self) -> impl Iterator<Item = &'a StateMachine> {
        let slice: &'a [StateMachine] = match *self {
            ContainerScopes::Map(sm) => std::slice::from_ref(sm),
            ContainerScopes::Parallel(branches) => branches,
        };
        slice.iter()
    }
}

fn collect_containers<'a>(sm: &'a StateMachine, out: &mut Vec<Container<'a>>) {
    for state in &sm.states {
        match &state.kind {
            StateKind::Map(map) => {
                out.push(Container {
                    state,
                    kind: ContainerKind::Map,
                    scopes: ContainerScopes::Map(&map.item_processor),
                });
                collect_containers(&map.item_processor, out);
            }
            StateKind::Parallel(par) => {
                out.push(Container {
                    state,
                    kind: ContainerKind::Parallel,
                    scopes: ContainerScopes::Parallel(&par.branches),
                });
                for branch in &par.branches {
                    collect_containers(branch, out);
                }
            }
            _ => {}
        }
    }
}

// ── States ──────────────────────────────────────────────────────────

/// A named state.
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub name: String,
    pub comment: Option<String>,
    pub kind: StateKind,
}

impl State {
    /// Names of every state this state can transition to, in declaration
    /// order (`Next`, Choice targets, `Default`, then `Catch` targets).
    pub fn successors(&self) -> Vec<&str> {
        let mut out = Vec::new();
        if let Some(Transition::Next(next)) = self.kind.transition() {
            out.push(next.as_str());
        }
        if let StateKind::Choice(choice) = &self.kind {
            out.extend(choice.choices.iter().map(|r| r.next.as_str()));
            if let Some(default) = &choice.default {
                out.push(default.as_str());
            }
        }
        if let Some(catchers) = self.kind.catchers() {
            out.extend(catchers.iter().map(|c| c.next.as_str()));
        }
        out
    }
}

/// The closed set of ASL state variants.
#[derive(Debug, Clone, PartialEq)]
pub enum StateKind {
    Pass(PassState),
    Task(TaskState),
    Choice(ChoiceState),
    Wait(WaitState),
    Succeed(SucceedState),
    Fail(FailState),
    Map(MapState),
    Parallel(ParallelState),
}

impl StateKind {
    /// The ASL `Type` string for this variant.
    pub fn type_name(&self) -> &'static str {
        match self {
            StateKind::Pass(_) => "Pass",
            StateKind::Task(_) => "Task",
            StateKind::Choice(_) => "Choice",
            StateKind::Wait(_) => "Wait",
            StateKind::Succeed(_) => "Succeed",
            StateKind::Fail(_) => "Fail",
            StateKind::Map(_) => "Map",
            StateKind::Parallel(_) => "Parallel",
        }
    }

    /// `Next`/`End` for variants that carry one.
    pub fn transition(&self) -> Option<&Transition> {
        match self {
            StateKind::Pass(s) => Some(&s.transition),
            StateKind::Task(s) => Some(&s.transition),
            StateKind::Wait(s) => Some(&s.transition),
            StateKind::Map(s) => Some(&s.transition),
            StateKind::Parallel(s) => Some(&s.transition),
            StateKind::Choice(_) | StateKind::Succeed(_) | StateKind::Fail(_) => None,
        }
    }

    pub fn retriers(&self) -> Option<&[Retrier]> {
        match self {
            StateKind::Task(s) => Some(&s.retry),
            StateKind::Map(s) => Some(&s.retry),
            StateKind::Parallel(s) => Some(&s.retry),
            _ => None,
        }
    }

    pub fn catchers(&self) -> Option<&[Catcher]> {
        match self {
            StateKind::Task(s) => Some(&s.catch),
            StateKind::Map(s) => Some(&s.catch),
            StateKind::Parallel(s) => Some(&s.catch),
            _ => None,
        }
    }
}

/// `Next` or `End: true`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Next(String),
    End,
}

/// An `InputPath`/`OutputPath`/`ResultPath` field.
///
/// An absent field means `$`; an explicit JSON `null` means `Discard`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathField {
    Path(String),
    Discard,
}

impl Default for PathField {
    fn default() -> Self {
        PathField::Path("$".to_string())
    }
}

/// `InputPath` and `OutputPath`, shared by every variant except Fail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputOutput {
    pub input_path: PathField,
    pub output_path: PathField,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PassState {
    pub io: InputOutput,
    pub result_path: PathField,
    pub parameters: Option<Value>,
    pub result: Option<Value>,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskState {
    pub io: InputOutput,
    pub result_path: PathField,
    pub resource: String,
    pub parameters: Option<Value>,
    pub result_selector: Option<Value>,
    pub timeout_seconds: Option<u64>,
    pub timeout_seconds_path: Option<String>,
    pub heartbeat_seconds: Option<u64>,
    pub retry: Vec<Retrier>,
    pub catch: Vec<Catcher>,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceState {
    pub io: InputOutput,
    pub choices: Vec<ChoiceRule>,
    pub default: Option<String>,
}

/// A top-level Choice rule: a condition plus its `Next` target.
#[derive(Debug, Clone, PartialEq)]
pub struct ChoiceRule {
    pub condition: Condition,
    pub next: String,
}

/// A recursively composable boolean predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    And(Vec<Condition>),
    Or(Vec<Condition>),
    Not(Box<Condition>),
    Test {
        variable: String,
        comparison: Comparison,
        operand: Operand,
    },
}

/// Right-hand side of a data-test expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    /// The `...Path` operator forms compare against another path.
    Path(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparison {
    StringEquals,
    StringLessThan,
    StringGreaterThan,
    StringLessThanEquals,
    StringGreaterThanEquals,
    StringMatches,
    NumericEquals,
    NumericLessThan,
    NumericGreaterThan,
    NumericLessThanEquals,
    NumericGreaterThanEquals,
    BooleanEquals,
    TimestampEquals,
    TimestampLessThan,
    TimestampGreaterThan,
    TimestampLessThanEquals,
    TimestampGreaterThanEquals,
    IsNull,
    IsPresent,
    IsNumeric,
    IsString,
    IsBoolean,
    IsTimestamp,
}

impl Comparison {
    const ALL: [(&'static str, Comparison); 23] = [
        ("StringEquals", Comparison::StringEquals),
        ("StringLessThan", Comparison::StringLessThan),
        ("StringGreaterThan", Comparison::StringGreaterThan),
        ("StringLessThanEquals", Comparison::StringLessThanEquals),
        ("StringGreaterThanEquals", Comparison::StringGreaterThanEquals),
        ("StringMatches", Comparison::StringMatches),
        ("NumericEquals", Comparison::NumericEquals),
        ("NumericLessThan", Comparison::NumericLessThan),
        ("NumericGreaterThan", Comparison::NumericGreaterThan),
        ("NumericLessThanEquals", Comparison::NumericLessThanEquals),
        ("NumericGreaterThanEquals", Comparison::NumericGreaterThanEquals),
        ("BooleanEquals", Comparison::BooleanEquals),
        ("TimestampEquals", Comparison::TimestampEquals),
        ("TimestampLessThan", Comparison::TimestampLessThan),
        ("TimestampGreaterThan", Comparison::TimestampGreaterThan),
        ("TimestampLessThanEquals", Comparison::TimestampLessThanEquals),
        ("TimestampGreaterThanEquals", Comparison::TimestampGreaterThanEquals),
        ("IsNull", Comparison::IsNull),
        ("IsPresent", Comparison::IsPresent),
        ("IsNumeric", Comparison::IsNumeric),
        ("IsString", Comparison::IsString),
        ("IsBoolean", Comparison::IsBoolean),
        ("IsTimestamp", Comparison::IsTimestamp),
    ];

    /// Parse an operator key such as `NumericGreaterThan` or
    /// `StringEqualsPath`. The flag is true for the `...Path` form.
    pub fn from_key(key: &str) -> Option<(Comparison, bool)> {
        if let Some(found) = Self::lookup(key) {
            return Some((found, false));
        }
        let base = key.strip_suffix("Path")?;
        match Self::lookup(base)? {
            // The type tests and StringMatches have no Path form.
            Comparison::IsNull
            | Comparison::IsPresent
            | Comparison::IsNumeric
            | Comparison::IsString
            | Comparison::IsBoolean
            | Comparison::IsTimestamp
            | Comparison::StringMatches => None,
            other => Some((other, true)),
        }
    }

    fn lookup(key: &str) -> Option<Comparison> {
        Self::ALL
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, c)| *c)
    }

    pub fn name(&self) -> &'static str {
        Self::ALL
            .iter()
            .find(|(_, c)| c == self)
            .map(|(name, _)| *name)
            .unwrap_or("Unknown")
    }

    /// True for the presence/type tests, whose operand is a boolean.
    pub fn is_type_test(&self) -> bool {
        matches!(
            self,
            Comparison::IsNull
                | Comparison::IsPresent
                | Comparison::IsNumeric
                | Comparison::IsString
                | Comparison::IsBoolean
                | Comparison::IsTimestamp
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitState {
    pub io: InputOutput,
    pub duration: WaitDuration,
    pub transition: Transition,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitDuration {
    Seconds(u64),
    SecondsPath(String),
    Timestamp(String),
    TimestampPath(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SucceedState {
    pub io: InputOutput,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FailState {
    pub error: Option<String>,
    pub cause: Option<String>,
    pub error_path: Option<String>,
    pub cause_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapState {
    pub io: InputOutput,
    pub result_path: PathField,
    pub result_selector: Option<Value>,
    pub items_path: Option<String>,
    /// `ItemSelector`, or the legacy `Parameters` field.
    pub item_selector: Option<Value>,
    /// `ItemProcessor`, or the legacy `Iterator` field.
    pub item_processor: Box<StateMachine>,
    pub processor_mode: ProcessorMode,
    pub max_concurrency: Option<u64>,
    pub item_reader: Option<Value>,
    pub item_batcher: Option<ItemBatcher>,
    pub result_writer: Option<Value>,
    pub retry: Vec<Retrier>,
    pub catch: Vec<Catcher>,
    pub transition: Transition,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProcessorMode {
    #[default]
    Inline,
    Distributed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemBatcher {
    pub max_items_per_batch: Option<u64>,
    pub batch_input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParallelState {
    pub io: InputOutput,
    pub result_path: PathField,
    pub parameters: Option<Value>,
    pub result_selector: Option<Value>,
    pub branches: Vec<StateMachine>,
    pub retry: Vec<Retrier>,
    pub catch: Vec<Catcher>,
    pub transition: Transition,
}

// ── Error handling ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct Retrier {
    pub error_equals: Vec<String>,
    pub interval_seconds: f64,
    pub max_attempts: u32,
    pub backoff_rate: f64,
    pub max_delay_seconds: Option<f64>,
    pub jitter_strategy: JitterStrategy,
}

impl Default for Retrier {
    fn default() -> Self {
        Retrier {
            error_equals: Vec::new(),
            interval_seconds: 1.0,
            max_attempts: 3,
            backoff_rate: 2.0,
            max_delay_seconds: None,
            jitter_strategy: JitterStrategy::None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum JitterStrategy {
    #[default]
    None,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catcher {
    pub error_equals: Vec<String>,
    pub next: String,
    pub result_path: PathField,
}

/// Does an `ErrorEquals` list match the given error name?
///
/// `States.ALL` matches everything; `States.TaskFailed` matches every
/// error name except `States.Timeout`.
pub fn error_matches(error_equals: &[String], error: &str) -> bool {
    error_equals.iter().any(|candidate| {
        candidate == error
            || candidate == errors::ALL
            || (candidate == errors::TASK_FAILED && error != errors::TIMEOUT)
    })
}

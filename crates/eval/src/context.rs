//! Execution options, the entropy seam, and the `$$` context object.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Step ceiling applied when none is configured.
pub const DEFAULT_MAX_STEPS: usize = 1000;

const ACCOUNT_ARN: &str = "arn:aws:states:us-east-1:123456789012";

/// Per-execution settings, threaded explicitly into `execute`.
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Maximum number of state visits before `ExecutionLimitExceeded`.
    /// Counted per scope: each Map iteration and Parallel branch gets its own budget.
    pub max_steps: usize,
    /// Seeds UUID and random intrinsics. `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub start_time: OffsetDateTime,
    pub execution_name: Option<String>,
    pub state_machine_name: String,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        ExecutionOptions {
            max_steps: DEFAULT_MAX_STEPS,
            seed: None,
            start_time: OffsetDateTime::now_utc(),
            execution_name: None,
            state_machine_name: "StateMachine".to_string(),
        }
    }
}

impl ExecutionOptions {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_start_time(mut self, start_time: OffsetDateTime) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn with_execution_name(mut self, name: impl Into<String>) -> Self {
        self.execution_name = Some(name.into());
        self
    }

    pub fn with_state_machine_name(mut self, name: impl Into<String>) -> Self {
        self.state_machine_name = name.into();
        self
    }
}

/// Source of every non-deterministic value an execution can observe.
pub struct Entropy {
    rng: StdRng,
}

impl Entropy {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Entropy { rng }
    }

    pub fn uuid(&mut self) -> uuid::Uuid {
        let bytes: [u8; 16] = self.rng.gen();
        uuid::Builder::from_random_bytes(bytes).into_uuid()
    }

    /// A uniformly distributed integer in `[start, end]`.
    pub fn integer_between(&mut self, start: i64, end: i64) -> i64 {
        if start >= end {
            return start;
        }
        self.rng.gen_range(start..=end)
    }
}

/// The `$$` object for one execution. Cheap to extend per state.
#[derive(Debug, Clone)]
pub struct Context {
    execution: Value,
    state_machine: Value,
    entered_time: String,
    map_item: Option<(usize, Value)>,
}

impl Context {
    pub fn new(options: &ExecutionOptions, input: &Value, entropy: &mut Entropy) -> Self {
        let name = options
            .execution_name
            .clone()
            .unwrap_or_else(|| entropy.uuid().to_string());
        let start = options
            .start_time
            .format(&Rfc3339)
            .unwrap_or_else(|_| options.start_time.unix_timestamp().to_string());
        let sm = &options.state_machine_name;
        Context {
            execution: json!({
                "Id": format!("{}:execution:{}:{}", ACCOUNT_ARN, sm, name),
                "Name": name,
                "StartTime": start,
                "Input": input,
                "RoleArn": "arn:aws:iam::123456789012:role/StepFunctionsRole",
                "RedriveCount": 0,
            }),
            state_machine: json!({
                "Id": format!("{}:stateMachine:{}", ACCOUNT_ARN, sm),
                "Name": sm,
            }),
            entered_time: start,
            map_item: None,
        }
    }

    /// The context as seen by one Map iteration.
    pub fn with_map_item(&self, index: usize, value: Value) -> Context {
        Context {
            map_item: Some((index, value)),
            ..self.clone()
        }
    }

    pub fn execution_name(&self) -> &str {
        self.execution
            .get("Name")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Stable identifier for a distributed Map run of `map_state`.
    pub fn map_run_arn(&self, map_state: &str) -> String {
        let sm = self
            .state_machine
            .get("Name")
            .and_then(Value::as_str)
            .unwrap_or_default();
        format!(
            "{}:mapRun:{}/{}:{}",
            ACCOUNT_ARN,
            sm,
            map_state,
            self.execution_name()
        )
    }

    /// Render the `$$` document while inside `state`.
    pub fn render(&self, state: &str, retry_count: u32) -> Value {
        let mut ctx = json!({
            "Execution": self.execution,
            "StateMachine": self.state_machine,
            "State": {
                "Name": state,
                "EnteredTime": self.entered_time,
                "RetryCount": retry_count,
            },
        });
        if let (Some((index, value)), Some(obj)) = (&self.map_item, ctx.as_object_mut()) {
            obj.insert(
                "Map".to_string(),
                json!({ "Item": { "Index": index, "Value": value } }),
            );
        }
        ctx
    }
}

//! stepcheck evaluator: runs an Amazon States Language definition locally
//! against mocked task responses and produces an execution trace.
//!
//! The evaluator consumes a validated `StateMachine` from
//! `stepcheck-interchange`, resolves every task-like call through a
//! [`MockEngine`], and never performs real I/O or real waits.

pub mod context;
pub mod error;
pub mod interpreter;
pub mod intrinsic;
pub mod mock;
pub mod numeric;
pub mod path;
pub mod payload;
pub mod predicate;
pub mod trace;

pub use context::{Entropy, ExecutionOptions, DEFAULT_MAX_STEPS};
pub use error::EvalError;
pub use interpreter::execute;
pub use mock::{ExhaustionPolicy, MockEngine, MockOptions, MockOutcome, MockResponse, TaskError};
pub use trace::{
    ExecutionTrace, MapExecution, ParallelExecution, RetryRecord, StateExecution, TraceError,
};

use stepcheck_interchange::{DefinitionError, MockConfig, StateMachine};

/// Parse a definition document and execute it once with a fresh engine.
///
/// This is the convenience entry point for single-run callers. A malformed
/// definition is the only failure surfaced as `Err`; everything that goes
/// wrong during the run is reported in the trace.
pub fn run_document(
    definition: &serde_json::Value,
    input: serde_json::Value,
    mocks: &MockConfig,
    mock_options: MockOptions,
    options: &ExecutionOptions,
) -> Result<ExecutionTrace, DefinitionError> {
    let machine = StateMachine::from_json(definition)?;
    let mut engine = MockEngine::with_options(mocks.clone(), mock_options);
    Ok(execute(&machine, input, &mut engine, options))
}

//! stepcheck-interchange: typed Amazon States Language documents.
//!
//! Provides the state machine model (a closed `StateKind` sum type with
//! recursive `Map`/`Parallel` scopes), the mock configuration model, and
//! load-time validation. Every consumer (evaluator, coverage tracker,
//! suite runner) works from these types rather than raw JSON.

pub mod deserialize;
pub mod mock;
pub mod types;

pub use mock::{MockBehavior, MockCondition, MockConfig, MockError, MockRule};
pub use types::*;

/// A malformed document. Fatal at load time and never retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DefinitionError {
    /// The text could not be parsed as the expected document kind.
    #[error("invalid {kind}: {message}")]
    Document { kind: String, message: String },

    /// A scope is missing a required field such as `StartAt`.
    #[error("{scope}: missing required field '{field}'")]
    MissingField { scope: String, field: String },

    /// `StartAt` names a state that is not in the same scope.
    #[error("{scope}: StartAt '{target}' does not name a state in this scope")]
    UnknownStartAt { scope: String, target: String },

    /// A `Next`/`Default`/`Catch.Next` names a state outside its scope.
    #[error("{scope}: state '{state}' transitions to unknown state '{target}'")]
    DanglingTransition {
        scope: String,
        state: String,
        target: String,
    },

    /// A state body is structurally invalid.
    #[error("state '{state}': {message}")]
    InvalidState { state: String, message: String },

    #[error("state '{state}' has unsupported Type '{type_name}'")]
    UnsupportedType { state: String, type_name: String },

    #[error("unsupported QueryLanguage '{0}'")]
    UnsupportedQueryLanguage(String),
}

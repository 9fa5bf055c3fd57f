//! Errors raised while evaluating paths, templates, and intrinsics.
//!
//! These are fatal to the single execution that raised them: the
//! interpreter turns them into a failed trace with a non-catchable
//! `States.Runtime`/`States.IntrinsicFailure` error.

use stepcheck_interchange::errors;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    /// A required path did not resolve against the document.
    #[error("path '{path}' could not be found in the input")]
    PathNotFound { path: String },

    /// The path text itself is malformed.
    #[error("invalid path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// An intrinsic name outside the supported set.
    #[error("unsupported intrinsic function '{name}'")]
    UnsupportedIntrinsic { name: String },

    /// An intrinsic was called with bad arguments or failed to evaluate.
    #[error("{name}: {message}")]
    IntrinsicFailure { name: String, message: String },

    /// A value had the wrong JSON type for the place it was used.
    #[error("type error: {message}")]
    TypeError { message: String },
}

impl EvalError {
    /// The ASL error name reported in a failed trace.
    pub fn error_name(&self) -> &'static str {
        match self {
            EvalError::UnsupportedIntrinsic { .. } | EvalError::IntrinsicFailure { .. } => {
                errors::INTRINSIC_FAILURE
            }
            EvalError::PathNotFound { .. }
            | EvalError::InvalidPath { .. }
            | EvalError::TypeError { .. } => errors::RUNTIME,
        }
    }

    pub(crate) fn intrinsic(name: &str, message: impl Into<String>) -> Self {
        EvalError::IntrinsicFailure {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

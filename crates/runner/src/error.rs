use std::path::PathBuf;

use stepcheck_interchange::DefinitionError;

/// Errors that prevent a suite from starting or finishing.
///
/// Per-case problems (assertion mismatches, failed executions) are result
/// data and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum SuiteError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The suite document itself is malformed.
    #[error("invalid test suite {origin}: {message}")]
    Parse { origin: String, message: String },

    /// The definition or a mock config failed to load.
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error("test case '{case}': {message}")]
    InvalidCase { case: String, message: String },

    /// A worker task panicked or was aborted.
    #[error("test worker failed: {0}")]
    Worker(String),
}

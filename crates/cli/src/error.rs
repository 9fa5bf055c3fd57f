use std::path::PathBuf;

use stepcheck_interchange::DefinitionError;
use stepcheck_runner::SuiteError;

/// Exit code for anything that stops a command before it can run.
pub(crate) const EXIT_LOAD_ERROR: i32 = 2;

#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid --input: {0}")]
    Input(String),

    #[error("invalid config '{path}': {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Suite(#[from] SuiteError),

    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl CliError {
    pub(crate) fn exit_code(&self) -> i32 {
        EXIT_LOAD_ERROR
    }
}

pub(crate) fn read_file(path: &std::path::Path) -> Result<String, CliError> {
    std::fs::read_to_string(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

mod run;
mod validate;

pub(crate) use run::{cmd_run, RunArgs};
pub(crate) use test::{cmd_test, TestArgs};
pub(crate) use validate::cmd_validate;

use std::path::Path;

use stepcheck_interchange::StateMachine;

use crate::error::{read_file, CliError};

/// Read and validate a definition file.
pub(crate) fn load_definition(path: &Path) -> Result<StateMachine, CliError> {
    let text = read_file(path)?;
    Ok(StateMachine::from_str_json(&text)?)
}

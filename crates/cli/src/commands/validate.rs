use std::path::Path;

use stepcheck_interchange::ContainerKind;

use super::load_definition;
use crate::error::CliError;

pub(crate) fn cmd_validate(definition_path: &Path, quiet: bool) -> Result<bool, CliError> {
    let definition = load_definition(definition_path)?;
    if !quiet {
        let containers = definition.containers();
        let maps = containers
            .iter()
            .filter(|c| c.kind == ContainerKind::Map)
            .count();
        let parallels = containers.len() - maps;
        println!(
            "valid: {} ({} states, {} map, {} parallel)",
            definition_path.display(),
            definition.states.len(),
            maps,
            parallels
        );
    }
    Ok(true)
}

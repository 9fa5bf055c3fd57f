use std::path::{Path, PathBuf};

use serde_json::Value;
use stepcheck_eval::{execute, ExecutionOptions, MockEngine};
use stepcheck_interchange::MockConfig;

use super::load_definition;
use crate::config::ProjectConfig;
use crate::error::{read_file, CliError};
use crate::report::{render_trace, to_pretty_json};
use crate::OutputFormat;

pub(crate) struct RunArgs<'a> {
    pub definition: &'a Path,
    pub input: Option<&'a str>,
    pub mock: Option<&'a Path>,
    pub output: OutputFormat,
    pub seed: Option<u64>,
    pub max_steps: Option<usize>,
}

pub(crate) fn cmd_run(args: RunArgs<'_>, config: &ProjectConfig) -> Result<bool, CliError> {
    let definition = load_definition(args.definition)?;
    let input = parse_input(args.input)?;
    let mocks = match args.mock {
        Some(path) => MockConfig::parse(&read_file(&locate_mock(path, config))?)?,
        None => MockConfig::default(),
    };

    let mut options = ExecutionOptions::default()
        .with_seed(args.seed.or(config.runner.seed))
        .with_state_machine_name(machine_name(args.definition));
    if let Some(max_steps) = args.max_steps.or(config.runner.max_steps) {
        options = options.with_max_steps(max_steps);
    }

    let mut engine = MockEngine::with_options(mocks, config.mock_options());
    let trace = execute(&definition, input, &mut engine, &options);

    match args.output {
        OutputFormat::Text => print!("{}", render_trace(&trace)),
        OutputFormat::Json => print!("{}", to_pretty_json(&trace)),
    }
    Ok(trace.success)
}

/// `--input` is inline JSON, or `@path` to read it from a file.
fn parse_input(raw: Option<&str>) -> Result<Value, CliError> {
    let text = match raw {
        None => return Ok(Value::Object(serde_json::Map::new())),
        Some(raw) => match raw.strip_prefix('@') {
            Some(path) => read_file(Path::new(path))?,
            None => raw.to_string(),
        },
    };
    serde_json::from_str(&text).map_err(|e| CliError::Input(e.to_string()))
}

fn locate_mock(path: &Path, config: &ProjectConfig) -> PathBuf {
    match &config.paths.mocks {
        Some(dir) if !path.exists() && path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

fn machine_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches(".asl").to_string())
        .unwrap_or_else(|| "StateMachine".to_string())
}

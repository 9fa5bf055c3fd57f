mod commands;
mod config;
mod error;
mod logging;
mod report;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use crate::commands::{RunArgs, TestArgs};
use crate::config::ProjectConfig;
use crate::error::CliError;
use crate::report::Reporter;

/// Output format for single-run responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Local simulator and test runner for Amazon States Language workflows.
#[derive(Parser)]
#[command(
    name = "stepcheck",
    version,
    about = "Local simulator and test runner for Amazon States Language workflows"
)]
struct Cli {
    /// Project configuration file (default: ./stepcheck.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug events to stderr (STEPCHECK_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load and validate a state machine definition
    Validate {
        /// Path to the ASL definition (JSON)
        definition: PathBuf,
    },

    /// Execute a definition once against mocked tasks and print the trace
    Run {
        /// Path to the ASL definition (JSON)
        definition: PathBuf,
        /// Execution input as JSON, or @path to read it from a file
        #[arg(long)]
        input: Option<String>,
        /// Mock configuration file (JSON or YAML)
        #[arg(long)]
        mock: Option<PathBuf>,
        /// Output format (text or json)
        #[arg(long, default_value = "text", value_enum)]
        output: OutputFormat,
        /// Seed for UUID and random intrinsics
        #[arg(long)]
        seed: Option<u64>,
        /// Maximum state visits per scope
        #[arg(long)]
        max_steps: Option<usize>,
    },

    /// Run a test suite
    Test {
        /// Path to the suite file (JSON or YAML)
        suite: PathBuf,
        /// Report format
        #[arg(long, default_value = "text", value_enum)]
        reporter: Reporter,
        /// Include state and branch coverage in the report
        #[arg(long)]
        coverage: bool,
        /// Maximum number of test cases run at once
        #[arg(long)]
        max_concurrency: Option<usize>,
        /// Stop starting new test cases after the first failure
        #[arg(long)]
        bail: bool,
        /// Seed for UUID and random intrinsics
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let outcome = ProjectConfig::discover(cli.config.as_deref()).and_then(|config| {
        match &cli.command {
            Commands::Validate { definition } => commands::cmd_validate(definition, cli.quiet),
            Commands::Run {
                definition,
                input,
                mock,
                output,
                seed,
                max_steps,
            } => commands::cmd_run(
                RunArgs {
                    definition,
                    input: input.as_deref(),
                    mock: mock.as_deref(),
                    output: *output,
                    seed: *seed,
                    max_steps: *max_steps,
                },
                &config,
            ),
            Commands::Test {
                suite,
                reporter,
                coverage,
                max_concurrency,
                bail,
                seed,
            } => commands::cmd_test(
                TestArgs {
                    suite,
                    reporter: *reporter,
                    coverage: *coverage,
                    max_concurrency: *max_concurrency,
                    bail: *bail,
                    seed: *seed,
                },
                &config,
            ),
        }
    });

    match outcome {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            report_error(&e, cli.quiet);
            process::exit(e.exit_code());
        }
    }
}

pub(crate) fn report_error(err: &CliError, quiet: bool) {
    if quiet {
        return;
    }
    eprintln!("error: {}", err);
}

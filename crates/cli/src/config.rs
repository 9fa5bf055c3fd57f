//! Project configuration read from `stepcheck.toml`.
//!
//! # Example
//!
//! ```toml
//! [paths]
//! state_machines = "statemachines"
//! mocks = "mocks"
//! test_suites = "tests"
//!
//! [runner]
//! max_concurrency = 4
//! max_steps = 500
//! seed = 42
//! stop_on_failure = false
//!
//! [mock]
//! exhaustion = "error"
//! ```
//!
//! Relative directories are resolved against the file's own directory.
//! Values left out fall through to the suite's settings, then to defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use stepcheck_eval::{ExhaustionPolicy, MockOptions};
use stepcheck_runner::{RunOptions, SearchPaths, SuiteSettings};

use crate::error::{read_file, CliError};

pub(crate) const DEFAULT_CONFIG_FILE: &str = "stepcheck.toml";

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct ProjectConfig {
    pub paths: PathsConfig,
    pub runner: RunnerConfig,
    pub mock: MockSection,
}

/// `[paths]`: base directories for relative document references.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct PathsConfig {
    pub state_machines: Option<PathBuf>,
    pub mocks: Option<PathBuf>,
    pub test_suites: Option<PathBuf>,
}

/// `[runner]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct RunnerConfig {
    pub max_concurrency: Option<usize>,
    pub max_steps: Option<usize>,
    pub seed: Option<u64>,
    pub stop_on_failure: Option<bool>,
}

/// `[mock]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct MockSection {
    pub exhaustion: Option<ExhaustionPolicy>,
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl ProjectConfig {
    pub(crate) fn parse(text: &str, path: &Path) -> Result<ProjectConfig, CliError> {
        let mut config: ProjectConfig = toml::from_str(text).map_err(|e| CliError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        if let Some(base) = path.parent() {
            config.paths.rebase(base);
        }
        Ok(config)
    }

    /// An explicit path must exist; otherwise `./stepcheck.toml` is used
    /// when present and defaults apply when it is not.
    pub(crate) fn discover(explicit: Option<&Path>) -> Result<ProjectConfig, CliError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let candidate = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !candidate.exists() {
                    return Ok(ProjectConfig::default());
                }
                candidate
            }
        };
        tracing::debug!(path = %path.display(), "loading project config");
        ProjectConfig::parse(&read_file(&path)?, &path)
    }

    pub(crate) fn mock_options(&self) -> MockOptions {
        MockOptions {
            exhaustion: self.mock.exhaustion.unwrap_or_default(),
        }
    }

    /// Run options layered as defaults, this file, then the suite's settings.
    pub(crate) fn run_options(&self, suite: &SuiteSettings) -> RunOptions {
        let mut options = RunOptions::default().with_mock_options(self.mock_options());
        let runner = &self.runner;
        if let Some(max_concurrency) = runner.max_concurrency {
            options.max_concurrency = max_concurrency;
        }
        if let Some(max_steps) = runner.max_steps {
            options.max_steps = max_steps;
        }
        if runner.seed.is_some() {
            options.seed = runner.seed;
        }
        if let Some(stop_on_failure) = runner.stop_on_failure {
            options.stop_on_failure = stop_on_failure;
        }
        options.with_suite_settings(suite)
    }

    pub(crate) fn search_paths(&self, suite_file: &Path) -> SearchPaths {
        SearchPaths {
            state_machines: self.paths.state_machines.clone(),
            mocks: self.paths.mocks.clone(),
            ..SearchPaths::for_suite_file(suite_file)
        }
    }

    /// A suite argument that does not exist as given is looked up under
    /// `[paths] test_suites`.
    pub(crate) fn locate_suite(&self, suite: &Path) -> PathBuf {
        if suite.exists() || suite.is_absolute() {
            return suite.to_path_buf();
        }
        match &self.paths.test_suites {
            Some(dir) if dir.join(suite).exists() => dir.join(suite),
            _ => suite.to_path_buf(),
        }
    }
}

impl PathsConfig {
    fn rebase(&mut self, base: &Path) {
        for dir in [
            &mut self.state_machines,
            &mut self.mocks,
            &mut self.test_suites,
        ] {
            if let Some(path) = dir {
                if path.is_relative() {
                    *path = base.join(&*path);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_section() {
        let text = r#"
[paths]
state_machines = "sm"
mocks = "/abs/mocks"

[runner]
max_concurrency = 4
seed = 9

[mock]
exhaustion = "error"
"#;
        let config = ProjectConfig::parse(text, Path::new("project/stepcheck.toml")).unwrap();
        assert_eq!(
            config.paths.state_machines,
            Some(PathBuf::from("project/sm"))
        );
        assert_eq!(config.paths.mocks, Some(PathBuf::from("/abs/mocks")));
        assert_eq!(config.runner.max_concurrency, Some(4));
        assert_eq!(config.mock_options().exhaustion, ExhaustionPolicy::Error);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ProjectConfig::parse("[runner]\nthreads = 2\n", Path::new("stepcheck.toml"))
            .unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }

    #[test]
    fn suite_settings_override_the_file() {
        let config =
            ProjectConfig::parse("[runner]\nmax_steps = 50\nseed = 1\n", Path::new("x.toml"))
                .unwrap();
        let suite = SuiteSettings {
            seed: Some(2),
            ..SuiteSettings::default()
        };
        let options = config.run_options(&suite);
        assert_eq!(options.max_steps, 50);
        assert_eq!(options.seed, Some(2));
        assert_eq!(options.max_concurrency, 1);
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config = ProjectConfig::parse("", Path::new("stepcheck.toml")).unwrap();
        assert_eq!(config, ProjectConfig::default());
        assert_eq!(config.mock_options(), MockOptions::default());
    }
}

//! Additive coverage accumulation.

use crate::report::{CoverageMetric, CoverageReport, NestedCoverage, NestedKind, PathStats};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use stepcheck_eval::{ExecutionTrace, MapExecution, ParallelExecution};
use stepcheck_interchange::{StateKind, StateMachine};

/// Joins path entries when comparing paths for uniqueness.
pub const PATH_SEPARATOR: &str = " -> ";

/// `"{choice}->{target}"`. Rules that share a target share a branch.
pub fn branch_id(choice: &str, target: &str) -> String {
    format!("{}->{}", choice, target)
}

// ──────────────────────────────────────────────
// Per-scope accumulator
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct Accumulator {
    known_states: BTreeSet<String>,
    known_branches: BTreeSet<String>,
    total_states: usize,
    total_branches: usize,
    covered_states: BTreeSet<String>,
    covered_branches: BTreeSet<String>,
}

impl Accumulator {
    fn declare(&mut self, scope: &StateMachine) {
        for state in &scope.states {
            self.known_states.insert(state.name.clone());
            if let StateKind::Choice(choice) = &state.kind {
                let targets = choice
                    .choices
                    .iter()
                    .map(|rule| rule.next.as_str())
                    .chain(choice.default.as_deref());
                for target in targets {
                    self.known_branches.insert(branch_id(&state.name, target));
                }
            }
        }
        self.total_states = self.known_states.len();
        self.total_branches = self.known_branches.len();
    }

    fn observe(&mut self, path: &[String]) {
        for state in path {
            if self.known_states.contains(state) {
                self.covered_states.insert(state.clone());
            }
        }
        for step in path.windows(2) {
            let id = branch_id(&step[0], &step[1]);
            if self.known_branches.contains(&id) {
                self.covered_branches.insert(id);
            }
        }
    }

    fn merge(&mut self, other: &Accumulator) {
        self.known_states.extend(other.known_states.iter().cloned());
        self.known_branches.extend(other.known_branches.iter().cloned());
        self.covered_states.extend(other.covered_states.iter().cloned());
        self.covered_branches.extend(other.covered_branches.iter().cloned());
        self.total_states = self.total_states.max(other.total_states);
        self.total_branches = self.total_branches.max(other.total_branches);
    }

    fn states(&self) -> CoverageMetric {
        CoverageMetric::from_sets(self.total_states, &self.known_states, &self.covered_states)
    }

    fn branches(&self) -> CoverageMetric {
        CoverageMetric::from_sets(
            self.total_branches,
            &self.known_branches,
            &self.covered_branches,
        )
    }
}

#[derive(Debug, Clone)]
struct ContainerAccumulator {
    kind: NestedKind,
    executions: usize,
    coverage: Accumulator,
}

// ──────────────────────────────────────────────
// Tracker
// ──────────────────────────────────────────────

/// Cumulative coverage for one state machine.
#[derive(Debug, Clone)]
pub struct CoverageTracker {
    top: Accumulator,
    /// Keyed by container state name. Containers with the same name in
    /// different scopes share one entry.
    nested: BTreeMap<String, ContainerAccumulator>,
    nested_tracked: bool,
    paths: Vec<Vec<String>>,
}

impl CoverageTracker {
    pub fn new(definition: &StateMachine) -> Self {
        let mut top = Accumulator::default();
        top.declare(definition);

        let mut nested: BTreeMap<String, ContainerAccumulator> = BTreeMap::new();
        for container in definition.containers() {
            let entry = nested
                .entry(container.state.name.clone())
                .or_insert_with(|| ContainerAccumulator {
                    kind: container.kind.into(),
                    executions: 0,
                    coverage: Accumulator::default(),
                });
            for scope in container.scopes.iter() {
                entry.coverage.declare(scope);
            }
        }

        CoverageTracker {
            top,
            nested,
            nested_tracked: false,
            paths: Vec::new(),
        }
    }

    /// Fold in one top-level execution path.
    pub fn track_execution(&mut self, path: &[String]) {
        self.top.observe(path);
        self.paths.push(path.to_vec());
    }

    pub fn track_map_executions(&mut self, executions: &[MapExecution]) {
        for execution in executions {
            self.track_nested(&execution.state, &execution.iteration_paths);
        }
    }

    pub fn track_parallel_executions(&mut self, executions: &[ParallelExecution]) {
        for execution in executions {
            self.track_nested(&execution.state, &execution.branch_paths);
        }
    }

    /// Fold in the top-level path and every nested sub-path of a trace.
    pub fn track_trace(&mut self, trace: &ExecutionTrace) {
        self.track_execution(&trace.execution_path);
        self.track_map_executions(&trace.map_executions);
        self.track_parallel_executions(&trace.parallel_executions);
    }

    fn track_nested(&mut self, container: &str, paths: &[Vec<String>]) {
        self.nested_tracked = true;
        let Some(entry) = self.nested.get_mut(container) else {
            tracing::debug!(container, "ignoring sub-paths of an unknown container");
            return;
        };
        entry.executions += 1;
        for path in paths {
            entry.coverage.observe(path);
        }
    }

    /// Union another tracker into this one. Totals take the larger side.
    pub fn merge(&mut self, other: &CoverageTracker) {
        self.top.merge(&other.top);
        for (name, theirs) in &other.nested {
            match self.nested.get_mut(name) {
                Some(ours) => {
                    ours.executions += theirs.executions;
                    ours.coverage.merge(&theirs.coverage);
                }
                None => {
                    self.nested.insert(name.clone(), theirs.clone());
                }
            }
        }
        self.nested_tracked |= other.nested_tracked;
        self.paths.extend(other.paths.iter().cloned());
    }

    pub fn get_coverage(&self) -> CoverageReport {
        let mut seen = HashSet::new();
        let mut unique_paths = Vec::new();
        for path in &self.paths {
            let joined = path.join(PATH_SEPARATOR);
            if seen.insert(joined.clone()) {
                unique_paths.push(joined);
            }
        }

        let nested = self.nested_tracked.then(|| {
            self.nested
                .iter()
                .map(|(name, acc)| {
                    let report = NestedCoverage {
                        kind: acc.kind,
                        executions: acc.executions,
                        states: acc.coverage.states(),
                        branches: acc.coverage.branches(),
                    };
                    (name.clone(), report)
                })
                .collect()
        });

        CoverageReport {
            states: self.top.states(),
            branches: self.top.branches(),
            paths: PathStats {
                total: self.paths.len(),
                unique: unique_paths.len(),
                unique_paths,
            },
            nested,
        }
    }
}

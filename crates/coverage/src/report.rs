//! CoverageReport: the plain-data contract consumed by renderers.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use stepcheck_interchange::ContainerKind;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageReport {
    pub states: CoverageMetric,
    pub branches: CoverageMetric,
    pub paths: PathStats,
    /// Per-container coverage keyed by container state name. Present only
    /// once at least one nested trace has been tracked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nested: Option<BTreeMap<String, NestedCoverage>>,
}

/// Covered/total counts for one kind of coverage item.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageMetric {
    pub total: usize,
    pub covered: usize,
    /// Rounded to two decimals. An empty metric reports 100.
    pub percentage: f64,
    /// Items never exercised, sorted.
    pub uncovered: Vec<String>,
}

impl CoverageMetric {
    pub(crate) fn from_sets(
        total: usize,
        known: &BTreeSet<String>,
        covered: &BTreeSet<String>,
    ) -> Self {
        CoverageMetric {
            total,
            covered: covered.len(),
            percentage: percentage(covered.len(), total),
            uncovered: known.difference(covered).cloned().collect(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.uncovered.is_empty() && self.covered >= self.total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PathStats {
    pub total: usize,
    pub unique: usize,
    /// Distinct joined paths in first-seen order.
    pub unique_paths: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NestedKind {
    Map,
    Parallel,
}

impl From<ContainerKind> for NestedKind {
    fn from(kind: ContainerKind) -> Self {
        match kind {
            ContainerKind::Map => NestedKind::Map,
            ContainerKind::Parallel => NestedKind::Parallel,
        }
    }
}

/// Coverage of the scopes owned by one container state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NestedCoverage {
    pub kind: NestedKind,
    /// Number of container executions folded in.
    pub executions: usize,
    pub states: CoverageMetric,
    pub branches: CoverageMetric,
}

fn percentage(covered: usize, total: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let raw = (covered as f64 / total as f64 * 100.0).min(100.0);
    (raw * 100.0).round() / 100.0
}

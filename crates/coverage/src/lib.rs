//! stepcheck-coverage: state and branch coverage over execution traces.
//!
//! A `CoverageTracker` is built once per state machine from its definition,
//! which fixes the set of states and Choice branches that can be covered.
//! Traces are then folded in additively; `get_coverage` is a pure read that
//! produces a serializable `CoverageReport`. Nested Map/Parallel scopes are
//! accumulated separately, keyed by container state name, so states that
//! share a name across scopes are never conflated.

pub mod report;
pub mod tracker;

pub use report::{CoverageMetric, CoverageReport, NestedCoverage, NestedKind, PathStats};
pub use tracker::{branch_id, CoverageTracker, PATH_SEPARATOR};

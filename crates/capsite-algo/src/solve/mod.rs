//! Solve adapter: backend trait, configuration and terminal status.
//!
//! A [`SolveBackend`] receives a finished [`ConicProblem`] and returns a
//! [`SolveOutcome`]. Infeasibility, unboundedness and limits are reported as
//! [`SolveStatus`] values; only a backend that cannot be set up at all returns
//! an error.

mod branch_bound;
mod relaxation;

pub use branch_bound::ClarabelBranchAndBound;
pub use relaxation::{ClarabelRelaxation, RelaxationOutcome, RelaxationStatus};

use crate::model::ConicProblem;
use capsite_core::{CapsiteError, CapsiteResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Terminal status of a placement solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolveStatus {
    /// Proven optimal within the configured gaps
    Optimal,
    /// No allocation satisfies balance and limits
    Infeasible,
    /// Objective unbounded below (modeling error)
    Unbounded,
    /// Deadline reached before optimality was proven
    TimeLimit,
    /// Node or interior-point iteration budget exhausted
    IterationLimit,
    /// Relaxations failed numerically
    NumericalError,
}

impl SolveStatus {
    pub fn is_optimal(&self) -> bool {
        matches!(self, SolveStatus::Optimal)
    }

    /// Limit statuses may still carry a feasible incumbent.
    pub fn is_limit(&self) -> bool {
        matches!(self, SolveStatus::TimeLimit | SolveStatus::IterationLimit)
    }
}

impl std::fmt::Display for SolveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveStatus::Optimal => write!(f, "optimal"),
            SolveStatus::Infeasible => write!(f, "infeasible"),
            SolveStatus::Unbounded => write!(f, "unbounded"),
            SolveStatus::TimeLimit => write!(f, "time_limit"),
            SolveStatus::IterationLimit => write!(f, "iteration_limit"),
            SolveStatus::NumericalError => write!(f, "numerical_error"),
        }
    }
}

/// Solver configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolveConfig {
    /// Absolute optimality gap (0 = proven optimum)
    pub absolute_gap: f64,
    /// Relative optimality gap (0 = proven optimum)
    pub relative_gap: f64,
    /// Wall-clock budget for the whole solve
    pub time_limit: Option<Duration>,
    /// Branch-and-bound node budget
    pub max_nodes: usize,
    /// Interior-point iteration limit per relaxation
    pub max_iterations: u32,
    /// Distance from 0/1 below which a binary counts as integral
    pub integrality_tolerance: f64,
    /// Print Clarabel's per-iteration log
    pub verbose: bool,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            absolute_gap: 0.0,
            relative_gap: 0.0,
            time_limit: None,
            max_nodes: 10_000,
            max_iterations: 200,
            integrality_tolerance: 1e-6,
            verbose: false,
        }
    }
}

impl SolveConfig {
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn with_gaps(mut self, absolute: f64, relative: f64) -> Self {
        self.absolute_gap = absolute;
        self.relative_gap = relative;
        self
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = max_nodes;
        self
    }

    pub fn validate(&self) -> CapsiteResult<()> {
        if !(self.absolute_gap.is_finite() && self.absolute_gap >= 0.0) {
            return Err(CapsiteError::config(
                "config",
                format!("solver_options.absolute_gap must be non-negative, got {}", self.absolute_gap),
            ));
        }
        if !(self.relative_gap.is_finite() && self.relative_gap >= 0.0) {
            return Err(CapsiteError::config(
                "config",
                format!("solver_options.relative_gap must be non-negative, got {}", self.relative_gap),
            ));
        }
        if !(self.integrality_tolerance > 0.0 && self.integrality_tolerance < 0.5) {
            return Err(CapsiteError::config(
                "config",
                "solver_options.integrality_tolerance must lie in (0, 0.5)",
            ));
        }
        if self.max_nodes == 0 || self.max_iterations == 0 {
            return Err(CapsiteError::config(
                "config",
                "solver_options.max_nodes and max_iterations must be positive",
            ));
        }
        Ok(())
    }
}

/// Raw result of a backend run.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Primal point, present when a feasible incumbent exists
    pub x: Option<Vec<f64>>,
    /// Objective of `x`
    pub objective: Option<f64>,
    /// Lowest relaxation bound still open when the search stopped
    pub best_bound: Option<f64>,
    pub nodes: usize,
    /// Total interior-point iterations across all relaxations
    pub iterations: u32,
    pub elapsed: Duration,
}

/// Backend capable of solving the placement MISOCP.
pub trait SolveBackend: Send + Sync {
    /// Registry identifier, as written in the configuration
    fn id(&self) -> &'static str;

    fn is_available(&self) -> bool {
        true
    }

    fn solve(&self, problem: &ConicProblem, config: &SolveConfig) -> CapsiteResult<SolveOutcome>;
}

/// Backends selectable through the `solver` configuration key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SolverChoice {
    #[default]
    #[serde(rename = "clarabel-bnb")]
    ClarabelBnb,
}

impl SolverChoice {
    pub const AVAILABLE: &'static [&'static str] = &["clarabel-bnb"];

    pub fn id(&self) -> &'static str {
        match self {
            SolverChoice::ClarabelBnb => "clarabel-bnb",
        }
    }

    pub fn backend(&self) -> Box<dyn SolveBackend> {
        match self {
            SolverChoice::ClarabelBnb => Box::new(ClarabelBranchAndBound::new()),
        }
    }
}

impl std::fmt::Display for SolverChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for SolverChoice {
    type Err = CapsiteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "clarabel-bnb" | "clarabel" | "bnb" => Ok(SolverChoice::ClarabelBnb),
            other => Err(CapsiteError::config(
                "config",
                format!(
                    "solver '{other}' is not available (available: {})",
                    Self::AVAILABLE.join(", ")
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_is_object_safe() {
        fn accepts(_: &dyn SolveBackend) {}
        let backend = SolverChoice::ClarabelBnb.backend();
        accepts(backend.as_ref());
        assert_eq!(backend.id(), "clarabel-bnb");
        assert!(backend.is_available());
    }

    #[test]
    fn test_backend_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ClarabelBranchAndBound>();
        assert_send_sync::<Box<dyn SolveBackend>>();
    }

    #[test]
    fn test_solver_choice_parsing() {
        assert_eq!("clarabel-bnb".parse::<SolverChoice>().unwrap(), SolverChoice::ClarabelBnb);
        assert_eq!("Clarabel".parse::<SolverChoice>().unwrap(), SolverChoice::ClarabelBnb);
        assert_eq!("bnb".parse::<SolverChoice>().unwrap(), SolverChoice::ClarabelBnb);

        let err = "cplex".parse::<SolverChoice>().unwrap_err();
        assert_eq!(err.entity(), Some("config"));
        assert!(err.to_string().contains("clarabel-bnb"));
    }

    #[test]
    fn test_status_display_and_serde() {
        assert_eq!(SolveStatus::TimeLimit.to_string(), "time_limit");
        let json = serde_json::to_string(&SolveStatus::NumericalError).unwrap();
        assert_eq!(json, "\"numerical_error\"");
        assert!(SolveStatus::IterationLimit.is_limit());
        assert!(!SolveStatus::Infeasible.is_limit());
    }

    #[test]
    fn test_config_validation() {
        assert!(SolveConfig::default().validate().is_ok());
        assert!(SolveConfig::default().with_gaps(-1.0, 0.0).validate().is_err());
        assert!(SolveConfig::default().with_max_nodes(0).validate().is_err());
    }
}

//! # capsite-algo: Capacitor Placement MISOCP
//!
//! Builds and solves the mixed-integer second-order-cone program that sites
//! shunt capacitors on a radial feeder.
//!
//! The pipeline is strictly staged and each stage only reads the output of
//! the previous one:
//!
//! ```text
//! Feeder ──▶ ModelBuilder ──▶ ConicProblem ──▶ SolveBackend ──▶ PlacementResult
//!            (DistFlow + SOC)   (A, b, c, K)     (Clarabel B&B)   (named tables)
//! ```
//!
//! - [`model`] - variable layout and constraint assembly
//! - [`solve`] - backend trait, Clarabel relaxation and branch-and-bound
//! - [`projection`] - solved vector to per-entity tables, cost split, relaxation gaps
//! - [`batch`] - independent scenarios solved in parallel
//!
//! ## Example
//!
//! ```no_run
//! use capsite_algo::{solve_placement, ClarabelBranchAndBound, SolveConfig};
//! # fn run(feeder: &capsite_core::Feeder) -> capsite_core::CapsiteResult<()> {
//! let result = solve_placement(feeder, &ClarabelBranchAndBound::new(), &SolveConfig::default())?;
//! println!("{}", result.summary());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod model;
pub mod projection;
pub mod solve;

pub use batch::{run_scenarios, BatchManifest, BatchSummary, Scenario, ScenarioRecord};
pub use model::{ConicProblem, ModelBuilder};
pub use projection::{PlacementResult, VariableTable};
pub use solve::{
    ClarabelBranchAndBound, SolveBackend, SolveConfig, SolveOutcome, SolveStatus, SolverChoice,
};

use capsite_core::{CapsiteError, CapsiteResult, Feeder};
use tracing::info;

/// Build the placement model for a feeder, solve it and project the result.
pub fn solve_placement(
    feeder: &Feeder,
    backend: &dyn SolveBackend,
    config: &SolveConfig,
) -> CapsiteResult<PlacementResult> {
    if !backend.is_available() {
        return Err(CapsiteError::Solver(format!(
            "backend '{}' is not available",
            backend.id()
        )));
    }

    let problem = ModelBuilder::new(feeder).build()?;
    info!(
        variables = problem.n_var(),
        rows = problem.n_rows(),
        binaries = problem.binaries.len(),
        backend = backend.id(),
        "solving capacitor placement"
    );

    let outcome = backend.solve(&problem, config)?;
    Ok(PlacementResult::project(feeder, &problem, outcome))
}

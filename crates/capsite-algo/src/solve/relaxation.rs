//! Continuous SOCP relaxation solved with Clarabel.
//!
//! The constraint matrix and cones are converted to Clarabel's types once.
//! Each branch-and-bound node only supplies its own right-hand side, where
//! the bound rows of fixed binaries have been tightened.

use crate::model::{ConeBlock, ConicProblem};
use crate::solve::SolveConfig;
use capsite_core::{CapsiteError, CapsiteResult};
use clarabel::{
    algebra::CscMatrix,
    solver::{DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT},
};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelaxationStatus {
    Solved,
    Infeasible,
    Unbounded,
    IterationLimit,
    TimeLimit,
    NumericalError,
}

impl From<SolverStatus> for RelaxationStatus {
    fn from(status: SolverStatus) -> Self {
        match status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => RelaxationStatus::Solved,
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                RelaxationStatus::Infeasible
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                RelaxationStatus::Unbounded
            }
            SolverStatus::MaxIterations => RelaxationStatus::IterationLimit,
            SolverStatus::MaxTime => RelaxationStatus::TimeLimit,
            _ => RelaxationStatus::NumericalError,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RelaxationOutcome {
    pub status: RelaxationStatus,
    pub x: Vec<f64>,
    /// cᵀx at the returned point
    pub objective: f64,
    pub iterations: u32,
}

pub struct ClarabelRelaxation<'a> {
    problem: &'a ConicProblem,
    p_mat: CscMatrix<f64>,
    a_mat: CscMatrix<f64>,
    cones: Vec<SupportedConeT<f64>>,
}

impl<'a> ClarabelRelaxation<'a> {
    pub fn new(problem: &'a ConicProblem) -> Self {
        let n_var = problem.n_var();
        let n_rows = problem.n_rows();

        let mut col_ptr = Vec::with_capacity(n_var + 1);
        let mut row_idx = Vec::with_capacity(problem.nnz());
        let mut values = Vec::with_capacity(problem.nnz());
        let mut nnz = 0;
        for column in &problem.columns {
            col_ptr.push(nnz);
            for &(r, v) in column {
                row_idx.push(r);
                values.push(v);
                nnz += 1;
            }
        }
        col_ptr.push(nnz);

        let a_mat = CscMatrix::new(n_rows, n_var, col_ptr, row_idx, values);
        // Purely linear objective
        let p_mat = CscMatrix::new(n_var, n_var, vec![0; n_var + 1], Vec::new(), Vec::new());

        let cones = problem
            .cones
            .iter()
            .map(|block| match *block {
                ConeBlock::Zero(n) => SupportedConeT::ZeroConeT(n),
                ConeBlock::Nonnegative(n) => SupportedConeT::NonnegativeConeT(n),
                ConeBlock::SecondOrder(n) => SupportedConeT::SecondOrderConeT(n),
            })
            .collect();

        Self {
            problem,
            p_mat,
            a_mat,
            cones,
        }
    }

    /// Solve the relaxation for the given right-hand side.
    pub fn solve(
        &self,
        rhs: &[f64],
        config: &SolveConfig,
        time_left: Option<Duration>,
    ) -> CapsiteResult<RelaxationOutcome> {
        let mut builder = DefaultSettingsBuilder::default();
        builder
            .verbose(config.verbose)
            .max_iter(config.max_iterations);
        if let Some(limit) = time_left {
            builder.time_limit(limit.as_secs_f64());
        }
        let settings = builder
            .build()
            .map_err(|e| CapsiteError::Solver(format!("Clarabel settings error: {:?}", e)))?;

        let mut solver = DefaultSolver::new(
            &self.p_mat,
            &self.problem.objective,
            &self.a_mat,
            rhs,
            &self.cones,
            settings,
        )
        .map_err(|e| CapsiteError::Solver(format!("Clarabel initialization failed: {:?}", e)))?;

        solver.solve();

        let sol = solver.solution;
        let objective = self.problem.objective_value(&sol.x);
        Ok(RelaxationOutcome {
            status: sol.status.into(),
            x: sol.x,
            objective,
            iterations: sol.iterations,
        })
    }
}

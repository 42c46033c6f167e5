//! Conic problem representation produced by the [`ModelBuilder`].
//!
//! The problem is stored in the form Clarabel consumes:
//!
//! ```text
//! minimize    cᵀx
//! subject to  Ax + s = b,   s ∈ K
//! ```
//!
//! `A` is kept column-wise as `(row, coefficient)` pairs and `K` as a list of
//! [`ConeBlock`]s in row order. Selection binaries are relaxed to [0, 1]
//! through two nonnegative rows each; branch-and-bound fixes a binary by
//! editing the right-hand side of those rows, so the matrix is assembled once
//! per model.

mod builder;
mod layout;

pub use builder::ModelBuilder;
pub use layout::VariableLayout;

use capsite_core::TopologyIndex;

/// A run of consecutive constraint rows sharing one cone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeBlock {
    /// Equalities: s = 0
    Zero(usize),
    /// Inequalities: s ≥ 0
    Nonnegative(usize),
    /// Second-order cone of the given dimension: s₀ ≥ ‖s₁..‖
    SecondOrder(usize),
}

impl ConeBlock {
    pub fn rows(&self) -> usize {
        match *self {
            ConeBlock::Zero(n) | ConeBlock::Nonnegative(n) | ConeBlock::SecondOrder(n) => n,
        }
    }
}

/// A capacitor selection variable and the rows bounding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryVar {
    pub var: usize,
    pub bus: usize,
    pub cap: usize,
    /// Row encoding `-z ≤ -lower`
    pub lower_row: usize,
    /// Row encoding `z ≤ upper`
    pub upper_row: usize,
}

impl BinaryVar {
    /// Overwrite the bound rows of this binary in a right-hand side vector.
    pub fn set_bounds(&self, rhs: &mut [f64], lower: f64, upper: f64) {
        rhs[self.lower_row] = -lower;
        rhs[self.upper_row] = upper;
    }
}

/// Row accumulator that merges consecutive rows of the same cone kind.
#[derive(Debug, Clone)]
pub struct ConstraintSet {
    columns: Vec<Vec<(usize, f64)>>,
    rhs: Vec<f64>,
    blocks: Vec<ConeBlock>,
}

impl ConstraintSet {
    pub fn new(n_var: usize) -> Self {
        Self {
            columns: vec![Vec::new(); n_var],
            rhs: Vec::new(),
            blocks: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rhs.len()
    }

    fn push_row(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        let row = self.rhs.len();
        for &(col, val) in coeffs {
            if val != 0.0 {
                self.columns[col].push((row, val));
            }
        }
        self.rhs.push(b);
        row
    }

    /// Σ coeffᵢ·xᵢ = b
    pub fn eq(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        let row = self.push_row(coeffs, b);
        match self.blocks.last_mut() {
            Some(ConeBlock::Zero(n)) => *n += 1,
            _ => self.blocks.push(ConeBlock::Zero(1)),
        }
        row
    }

    /// Σ coeffᵢ·xᵢ ≤ b
    pub fn leq(&mut self, coeffs: &[(usize, f64)], b: f64) -> usize {
        let row = self.push_row(coeffs, b);
        match self.blocks.last_mut() {
            Some(ConeBlock::Nonnegative(n)) => *n += 1,
            _ => self.blocks.push(ConeBlock::Nonnegative(1)),
        }
        row
    }

    /// Rotated cone `v·l ≥ p² + q²` with v, l ≥ 0, written as the standard cone
    ///
    /// ```text
    /// (v + l) ≥ ‖(2p, 2q, v − l)‖
    /// ```
    ///
    /// Clarabel keeps s on the left of `Ax + s = b`, so each row carries the
    /// negated expression with a zero right-hand side. Returns the first row.
    pub fn rotated_soc(&mut self, v: usize, l: usize, p: usize, q: usize) -> usize {
        let base = self.push_row(&[(v, -1.0), (l, -1.0)], 0.0);
        self.push_row(&[(p, -2.0)], 0.0);
        self.push_row(&[(q, -2.0)], 0.0);
        self.push_row(&[(v, -1.0), (l, 1.0)], 0.0);
        self.blocks.push(ConeBlock::SecondOrder(4));
        base
    }

    fn finish(mut self) -> (Vec<Vec<(usize, f64)>>, Vec<f64>, Vec<ConeBlock>) {
        for col in &mut self.columns {
            col.sort_by_key(|(r, _)| *r);
        }
        (self.columns, self.rhs, self.blocks)
    }
}

/// Objective coefficients split by cost component.
#[derive(Debug, Clone, Default)]
pub struct ObjectiveTerms {
    /// Annual energy-loss cost per unit of squared current
    pub loss: Vec<(usize, f64)>,
    /// Annualized investment per selected capacitor
    pub investment: Vec<(usize, f64)>,
}

impl ObjectiveTerms {
    pub fn loss_cost(&self, x: &[f64]) -> f64 {
        self.loss.iter().map(|&(j, c)| c * x[j]).sum()
    }

    pub fn investment_cost(&self, x: &[f64]) -> f64 {
        self.investment.iter().map(|&(j, c)| c * x[j]).sum()
    }
}

/// Fully assembled capacitor placement problem.
#[derive(Debug, Clone)]
pub struct ConicProblem {
    pub layout: VariableLayout,
    pub topology: TopologyIndex,
    /// Linear objective c
    pub objective: Vec<f64>,
    pub terms: ObjectiveTerms,
    /// Constraint matrix A, column-wise, rows sorted within each column
    pub columns: Vec<Vec<(usize, f64)>>,
    pub rhs: Vec<f64>,
    pub cones: Vec<ConeBlock>,
    pub binaries: Vec<BinaryVar>,
    /// Per-unit size of each catalog option, indexed like `BinaryVar::cap`
    pub cap_sizes: Vec<f64>,
}

impl ConicProblem {
    pub fn n_var(&self) -> usize {
        self.layout.n_var()
    }

    pub fn n_rows(&self) -> usize {
        self.rhs.len()
    }

    pub fn nnz(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }

    pub fn objective_value(&self, x: &[f64]) -> f64 {
        self.objective.iter().zip(x).map(|(c, v)| c * v).sum()
    }

    /// Round every selection binary and rebuild the installed injection
    /// `q_cap,i = Σ_k Qc_k·z_ik` from the rounded values.
    pub fn snap_binaries(&self, x: &mut [f64]) {
        for bin in &self.binaries {
            x[bin.var] = x[bin.var].round();
        }
        if self.binaries.is_empty() {
            return;
        }
        for bus in 0..self.layout.n_bus() {
            x[self.layout.q_cap(bus)] = 0.0;
        }
        for bin in &self.binaries {
            x[self.layout.q_cap(bin.bus)] += self.cap_sizes[bin.cap] * x[bin.var];
        }
    }

    /// Residual b − Ax for a candidate point
    pub fn slack(&self, x: &[f64]) -> Vec<f64> {
        let mut s = self.rhs.clone();
        for (col, entries) in self.columns.iter().enumerate() {
            for &(row, val) in entries {
                s[row] -= val * x[col];
            }
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consecutive_rows_merge_into_blocks() {
        let mut set = ConstraintSet::new(4);
        set.eq(&[(0, 1.0)], 1.0);
        set.eq(&[(1, 1.0), (2, -1.0)], 0.0);
        set.leq(&[(3, 1.0)], 1.0);
        set.rotated_soc(0, 1, 2, 3);
        set.leq(&[(3, -1.0)], 0.0);

        let (columns, rhs, blocks) = set.finish();
        assert_eq!(
            blocks,
            vec![
                ConeBlock::Zero(2),
                ConeBlock::Nonnegative(1),
                ConeBlock::SecondOrder(4),
                ConeBlock::Nonnegative(1),
            ]
        );
        assert_eq!(rhs.len(), 8);
        assert_eq!(blocks.iter().map(ConeBlock::rows).sum::<usize>(), 8);
        // v column: equality row 0 then the two cone rows 3 and 6
        assert_eq!(columns[0], vec![(0, 1.0), (3, -1.0), (6, -1.0)]);
        assert_eq!(columns[1], vec![(1, 1.0), (3, -1.0), (6, 1.0)]);
    }

    #[test]
    fn test_zero_coefficients_are_not_stored() {
        let mut set = ConstraintSet::new(2);
        set.eq(&[(0, 0.0), (1, 2.0)], 0.0);
        let (columns, _, _) = set.finish();
        assert!(columns[0].is_empty());
        assert_eq!(columns[1], vec![(0, 2.0)]);
    }

    #[test]
    fn test_binary_bounds_edit_rhs() {
        let bin = BinaryVar {
            var: 5,
            bus: 1,
            cap: 0,
            lower_row: 2,
            upper_row: 3,
        };
        let mut rhs = vec![0.0; 4];
        bin.set_bounds(&mut rhs, 1.0, 1.0);
        assert_eq!(rhs, vec![0.0, 0.0, -1.0, 1.0]);
    }
}

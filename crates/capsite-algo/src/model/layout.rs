//! Column layout of the decision vector.
//!
//! ```text
//! [ vsq | isq | p_branch | q_branch | p_gen | q_gen | q_cap | z_cap ]
//!   B·T   L·T    L·T        L·T        T       T       B       B·C
//! ```
//!
//! B buses, L branches, T periods, C capacitor options. Within a family the
//! entity index varies slowest, so all periods of one bus are contiguous.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariableLayout {
    n_bus: usize,
    n_branch: usize,
    n_period: usize,
    n_cap: usize,
    vsq_start: usize,
    isq_start: usize,
    p_branch_start: usize,
    q_branch_start: usize,
    p_gen_start: usize,
    q_gen_start: usize,
    q_cap_start: usize,
    z_cap_start: usize,
    n_var: usize,
}

impl VariableLayout {
    pub fn new(n_bus: usize, n_branch: usize, n_period: usize, n_cap: usize) -> Self {
        let vsq_start = 0;
        let isq_start = vsq_start + n_bus * n_period;
        let p_branch_start = isq_start + n_branch * n_period;
        let q_branch_start = p_branch_start + n_branch * n_period;
        let p_gen_start = q_branch_start + n_branch * n_period;
        let q_gen_start = p_gen_start + n_period;
        let q_cap_start = q_gen_start + n_period;
        let z_cap_start = q_cap_start + n_bus;
        let n_var = z_cap_start + n_bus * n_cap;
        Self {
            n_bus,
            n_branch,
            n_period,
            n_cap,
            vsq_start,
            isq_start,
            p_branch_start,
            q_branch_start,
            p_gen_start,
            q_gen_start,
            q_cap_start,
            z_cap_start,
            n_var,
        }
    }

    pub fn n_var(&self) -> usize {
        self.n_var
    }

    pub fn n_bus(&self) -> usize {
        self.n_bus
    }

    pub fn n_branch(&self) -> usize {
        self.n_branch
    }

    pub fn n_period(&self) -> usize {
        self.n_period
    }

    pub fn n_cap(&self) -> usize {
        self.n_cap
    }

    /// Squared voltage magnitude at a bus
    #[inline]
    pub fn vsq(&self, bus: usize, t: usize) -> usize {
        self.vsq_start + bus * self.n_period + t
    }

    /// Squared current magnitude on a branch
    #[inline]
    pub fn isq(&self, branch: usize, t: usize) -> usize {
        self.isq_start + branch * self.n_period + t
    }

    /// Active flow leaving the parent end of a branch
    #[inline]
    pub fn p_branch(&self, branch: usize, t: usize) -> usize {
        self.p_branch_start + branch * self.n_period + t
    }

    /// Reactive flow leaving the parent end of a branch
    #[inline]
    pub fn q_branch(&self, branch: usize, t: usize) -> usize {
        self.q_branch_start + branch * self.n_period + t
    }

    /// Active import at the slack bus
    #[inline]
    pub fn p_gen(&self, t: usize) -> usize {
        self.p_gen_start + t
    }

    /// Reactive import at the slack bus
    #[inline]
    pub fn q_gen(&self, t: usize) -> usize {
        self.q_gen_start + t
    }

    /// Installed capacitor injection at a bus
    #[inline]
    pub fn q_cap(&self, bus: usize) -> usize {
        self.q_cap_start + bus
    }

    /// Selection binary for a (bus, capacitor option) pair
    #[inline]
    pub fn z_cap(&self, bus: usize, cap: usize) -> usize {
        self.z_cap_start + bus * self.n_cap + cap
    }

    /// Range of columns holding selection binaries
    pub fn binary_columns(&self) -> std::ops::Range<usize> {
        self.z_cap_start..self.n_var
    }
}

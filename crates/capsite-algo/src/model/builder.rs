//! DistFlow model assembly.
//!
//! Translates a validated [`Feeder`] into a [`ConicProblem`]:
//!
//! ```text
//! min  365·Σ_{ij,t} R_ij·ℓ_ij,t·S_base·c_loss  +  Σ_{i,k} z_ik·cost_k·Qc_k·S_base·CRF
//!
//! s.t. v_slack,t = V_sch²
//!      p_gen,t[i=slack] + (P_hi,t − R_hi·ℓ_hi,t) − Σ_j P_ij,t             = PD_i,t
//!      q_gen,t[i=slack] + (Q_hi,t − X_hi·ℓ_hi,t) + q_cap,i − Σ_j Q_ij,t   = QD_i,t
//!      v_i,t − v_j,t − 2(R_ij·P_ij,t + X_ij·Q_ij,t) + (R_ij² + X_ij²)·ℓ_ij,t = 0
//!      ℓ_ij,t·v_i,t ≥ P_ij,t² + Q_ij,t²
//!      q_cap,i = Σ_k Qc_k·z_ik,   Σ_k z_ik ≤ 1,   Σ_ik z_ik ≤ Y
//!      Vmin² ≤ v_i,t ≤ Vmax²,   0 ≤ ℓ_ij,t ≤ Imax²,   z_ik ∈ {0, 1}
//! ```
//!
//! h is the parent of bus i and j ranges over its children, both taken from
//! the [`TopologyIndex`]. Every branch appears once, parent → child, in every
//! equation family and in the loss term.

use super::{BinaryVar, ConicProblem, ConstraintSet, ObjectiveTerms, VariableLayout};
use capsite_core::{CapsiteError, CapsiteResult, Feeder, TopologyIndex};
use tracing::debug;

/// Days per year used to annualize the per-period loss cost
const DAYS_PER_YEAR: f64 = 365.0;

pub struct ModelBuilder<'a> {
    feeder: &'a Feeder,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(feeder: &'a Feeder) -> Self {
        Self { feeder }
    }

    pub fn build(&self) -> CapsiteResult<ConicProblem> {
        let feeder = self.feeder;

        // ====================================================================
        // STEP 1: TOPOLOGY
        // ====================================================================
        let topology = TopologyIndex::build(feeder)?;

        // ====================================================================
        // STEP 2: DECISION VARIABLE LAYOUT
        // ====================================================================
        let n_bus = feeder.buses().len();
        let n_branch = feeder.branches().len();
        let n_period = feeder.periods().len();
        let n_cap = feeder.capacitors().len();
        let layout = VariableLayout::new(n_bus, n_branch, n_period, n_cap);
        let n_var = layout.n_var();

        // ====================================================================
        // STEP 3: OBJECTIVE
        // ====================================================================
        let s_base = feeder.bases().s_base().value();
        let econ = feeder.economics();

        let mut terms = ObjectiveTerms::default();
        for (br, branch) in feeder.branches().iter().enumerate() {
            let coeff = DAYS_PER_YEAR * branch.resistance.value() * s_base * econ.loss_price;
            for t in 0..n_period {
                terms.loss.push((layout.isq(br, t), coeff));
            }
        }
        for bus in 0..n_bus {
            for (k, cap) in feeder.capacitors().iter().enumerate() {
                let coeff = econ.annualized(cap.cost_per_mvar * cap.size.value() * s_base);
                terms.investment.push((layout.z_cap(bus, k), coeff));
            }
        }

        let mut objective = vec![0.0; n_var];
        for &(j, c) in terms.loss.iter().chain(&terms.investment) {
            objective[j] += c;
        }

        // ====================================================================
        // STEP 4: EQUALITY CONSTRAINTS
        // ====================================================================
        let mut set = ConstraintSet::new(n_var);
        let slack = topology.slack();

        // Slack voltage fixed at the scheduled value in every period
        let slack_bus = &feeder.buses()[slack];
        let v_sched = slack_bus
            .v_sched
            .map(|v| v.squared())
            .ok_or_else(|| {
                CapsiteError::formulation(slack_bus.id.entity(), "slack bus has no scheduled voltage")
            })?;
        for t in 0..n_period {
            set.eq(&[(layout.vsq(slack, t), 1.0)], v_sched);
        }

        // Active and reactive balance at every bus
        for bus in 0..n_bus {
            for t in 0..n_period {
                let (pd, qd) = feeder.demand(bus, t);
                let mut p_row = Vec::new();
                let mut q_row = Vec::new();

                if bus == slack {
                    p_row.push((layout.p_gen(t), 1.0));
                    q_row.push((layout.q_gen(t), 1.0));
                }
                if let Some(br) = topology.parent_branch(bus) {
                    let branch = &feeder.branches()[br];
                    p_row.push((layout.p_branch(br, t), 1.0));
                    p_row.push((layout.isq(br, t), -branch.resistance.value()));
                    q_row.push((layout.q_branch(br, t), 1.0));
                    q_row.push((layout.isq(br, t), -branch.reactance.value()));
                }
                for &br in topology.child_branches(bus) {
                    p_row.push((layout.p_branch(br, t), -1.0));
                    q_row.push((layout.q_branch(br, t), -1.0));
                }
                q_row.push((layout.q_cap(bus), 1.0));

                set.eq(&p_row, pd.value());
                set.eq(&q_row, qd.value());
            }
        }

        // Voltage drop along every branch, parent → child
        for edge in topology.branches() {
            let branch = &feeder.branches()[edge.branch];
            let r = branch.resistance.value();
            let x = branch.reactance.value();
            for t in 0..n_period {
                set.eq(
                    &[
                        (layout.vsq(edge.from, t), 1.0),
                        (layout.vsq(edge.to, t), -1.0),
                        (layout.p_branch(edge.branch, t), -2.0 * r),
                        (layout.q_branch(edge.branch, t), -2.0 * x),
                        (layout.isq(edge.branch, t), r * r + x * x),
                    ],
                    0.0,
                );
            }
        }

        // Installed reactive injection couples to the selection binaries
        for bus in 0..n_bus {
            let mut row = vec![(layout.q_cap(bus), 1.0)];
            for (k, cap) in feeder.capacitors().iter().enumerate() {
                row.push((layout.z_cap(bus, k), -cap.size.value()));
            }
            set.eq(&row, 0.0);
        }
        let n_eq = set.n_rows();

        // ====================================================================
        // STEP 5: INEQUALITY CONSTRAINTS
        // ====================================================================
        for (bus, b) in feeder.buses().iter().enumerate() {
            if bus == slack {
                continue;
            }
            for t in 0..n_period {
                set.leq(&[(layout.vsq(bus, t), 1.0)], b.vsq_max);
                set.leq(&[(layout.vsq(bus, t), -1.0)], -b.vsq_min);
            }
        }

        for (br, branch) in feeder.branches().iter().enumerate() {
            let isq_max = branch.rating.squared();
            for t in 0..n_period {
                set.leq(&[(layout.isq(br, t), -1.0)], 0.0);
                set.leq(&[(layout.isq(br, t), 1.0)], isq_max);
            }
        }

        let mut binaries = Vec::with_capacity(n_bus * n_cap);
        if n_cap > 0 {
            for bus in 0..n_bus {
                let row: Vec<(usize, f64)> =
                    (0..n_cap).map(|k| (layout.z_cap(bus, k), 1.0)).collect();
                set.leq(&row, 1.0);
            }

            let all: Vec<(usize, f64)> = layout.binary_columns().map(|j| (j, 1.0)).collect();
            set.leq(&all, econ.max_placements as f64);

            for bus in 0..n_bus {
                for cap in 0..n_cap {
                    let var = layout.z_cap(bus, cap);
                    let lower_row = set.leq(&[(var, -1.0)], 0.0);
                    let upper_row = set.leq(&[(var, 1.0)], 1.0);
                    binaries.push(BinaryVar {
                        var,
                        bus,
                        cap,
                        lower_row,
                        upper_row,
                    });
                }
            }
        }
        let n_ineq = set.n_rows() - n_eq;

        // ====================================================================
        // STEP 6: SECOND-ORDER CONES
        // ====================================================================
        for edge in topology.branches() {
            for t in 0..n_period {
                set.rotated_soc(
                    layout.vsq(edge.from, t),
                    layout.isq(edge.branch, t),
                    layout.p_branch(edge.branch, t),
                    layout.q_branch(edge.branch, t),
                );
            }
        }

        let (columns, rhs, cones) = set.finish();
        debug!(
            n_var,
            n_eq,
            n_ineq,
            n_soc = n_branch * n_period,
            n_binary = binaries.len(),
            "assembled capacitor placement model"
        );

        Ok(ConicProblem {
            layout,
            topology,
            objective,
            terms,
            columns,
            rhs,
            cones,
            binaries,
            cap_sizes: feeder.capacitors().iter().map(|c| c.size.value()).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConeBlock;
    use capsite_core::*;

    fn feeder(reverse_second_line: bool) -> Feeder {
        let second = if reverse_second_line {
            LineRecord::new(2, 3, 2, 0.02, 0.03, 1.0)
        } else {
            LineRecord::new(2, 2, 3, 0.02, 0.03, 1.0)
        };
        FeederBuilder::new(
            PerUnitBases::new(1.0, 1.0).unwrap(),
            VoltageLimits::new(0.9, 1.1),
            EconomicParams::new(1000.0, 0.1, 10, 1),
        )
        .bus(BusRecord::new(1, "Head").slack(1.0))
        .bus(BusRecord::new(2, "B2"))
        .bus(BusRecord::new(3, "B3").with_load(LoadType::Residential, 500.0, 300.0))
        .line(LineRecord::new(1, 1, 2, 0.02, 0.03, 1.0))
        .line(second)
        .period(TimePeriod::new("1", 1.0, 1.0, 1.0))
        .capacitor(CapacitorRecord::new(1, "fixed", 300.0, 1.0))
        .build()
        .unwrap()
    }

    #[test]
    fn test_row_and_cone_counts() {
        let problem = ModelBuilder::new(&feeder(false)).build().unwrap();
        // 1 slack + 6 balance + 2 drop + 3 coupling
        // 4 voltage + 4 current + 3 per-bus + 1 global + 6 binary bounds
        // 2 cones of 4 rows
        assert_eq!(
            problem.cones,
            vec![
                ConeBlock::Zero(12),
                ConeBlock::Nonnegative(18),
                ConeBlock::SecondOrder(4),
                ConeBlock::SecondOrder(4),
            ]
        );
        assert_eq!(problem.n_rows(), 38);
        assert_eq!(problem.binaries.len(), 3);
        assert_eq!(problem.columns.len(), problem.n_var());
    }

    #[test]
    fn test_objective_coefficients() {
        let problem = ModelBuilder::new(&feeder(false)).build().unwrap();
        let layout = problem.layout;
        // z_base = 1 Ω, so R = 0.02 pu
        let loss = problem.objective[layout.isq(0, 0)];
        assert!((loss - 365.0 * 0.02 * 1000.0).abs() < 1e-9);

        let crf = EconomicParams::new(1000.0, 0.1, 10, 1).capital_recovery_factor();
        let inv = problem.objective[layout.z_cap(2, 0)];
        assert!((inv - 1000.0 * 0.3 * crf).abs() < 1e-9);

        assert_eq!(problem.objective[layout.p_branch(0, 0)], 0.0);
        assert_eq!(problem.terms.loss.len(), 2);
        assert_eq!(problem.terms.investment.len(), 3);
    }

    #[test]
    fn test_slack_voltage_fixed_and_demand_on_rhs() {
        let problem = ModelBuilder::new(&feeder(false)).build().unwrap();
        let layout = problem.layout;
        assert_eq!(problem.columns[layout.vsq(0, 0)][0], (0, 1.0));
        assert_eq!(problem.rhs[0], 1.0);
        // balance rows for bus 3 come last among the six
        assert!((problem.rhs[5] - 0.5).abs() < 1e-12);
        assert!((problem.rhs[6] - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_scheduled_slack_voltage_reaches_rhs() {
        let f = FeederBuilder::new(
            PerUnitBases::new(1.0, 1.0).unwrap(),
            VoltageLimits::new(0.9, 1.1),
            EconomicParams::new(1000.0, 0.1, 10, 1),
        )
        .bus(BusRecord::new(1, "Head").slack(1.05))
        .bus(BusRecord::new(2, "B2").with_load(LoadType::Residential, 100.0, 50.0))
        .line(LineRecord::new(1, 1, 2, 0.02, 0.03, 1.0))
        .period(TimePeriod::new("1", 1.0, 1.0, 1.0))
        .build()
        .unwrap();
        let problem = ModelBuilder::new(&f).build().unwrap();
        assert!((problem.rhs[0] - 1.05 * 1.05).abs() < 1e-12);
    }

    #[test]
    fn test_snap_rebuilds_installed_injection() {
        let problem = ModelBuilder::new(&feeder(false)).build().unwrap();
        let layout = problem.layout;
        let mut x = vec![0.0; problem.n_var()];
        x[layout.z_cap(2, 0)] = 1.0 - 3e-7;
        x[layout.q_cap(2)] = 0.3 * (1.0 - 3e-7);
        x[layout.z_cap(1, 0)] = 2e-7;
        x[layout.q_cap(1)] = 0.3 * 2e-7;

        problem.snap_binaries(&mut x);
        assert_eq!(x[layout.z_cap(2, 0)], 1.0);
        assert_eq!(x[layout.z_cap(1, 0)], 0.0);
        assert_eq!(x[layout.q_cap(1)], 0.0);
        assert!((x[layout.q_cap(2)] - 0.3).abs() < 1e-15);
        // coupling rows hold exactly after snapping
        let residual = problem.slack(&x);
        for row in 9..12 {
            assert!(residual[row].abs() < 1e-15, "coupling row {row}: {}", residual[row]);
        }
    }

    #[test]
    fn test_declared_direction_does_not_change_problem() {
        let a = ModelBuilder::new(&feeder(false)).build().unwrap();
        let b = ModelBuilder::new(&feeder(true)).build().unwrap();
        assert_eq!(a.objective, b.objective);
        assert_eq!(a.rhs, b.rhs);
        assert_eq!(a.columns, b.columns);
        assert_eq!(a.cones, b.cones);
    }

    #[test]
    fn test_empty_catalog_has_no_cardinality_rows() {
        let f = FeederBuilder::new(
            PerUnitBases::new(1.0, 1.0).unwrap(),
            VoltageLimits::new(0.9, 1.1),
            EconomicParams::new(1000.0, 0.1, 10, 1),
        )
        .bus(BusRecord::new(1, "Head").slack(1.0))
        .bus(BusRecord::new(2, "B2").with_load(LoadType::Commercial, 100.0, 50.0))
        .line(LineRecord::new(1, 1, 2, 0.02, 0.03, 1.0))
        .period(TimePeriod::new("1", 1.0, 1.0, 1.0))
        .build()
        .unwrap();
        let problem = ModelBuilder::new(&f).build().unwrap();
        assert!(problem.binaries.is_empty());
        assert!(problem.terms.investment.is_empty());
        assert_eq!(
            problem.cones,
            vec![
                ConeBlock::Zero(1 + 4 + 1 + 2),
                ConeBlock::Nonnegative(2 + 2),
                ConeBlock::SecondOrder(4),
            ]
        );
    }

    #[test]
    fn test_topology_errors_abort_build() {
        let f = FeederBuilder::new(
            PerUnitBases::new(1.0, 1.0).unwrap(),
            VoltageLimits::new(0.9, 1.1),
            EconomicParams::new(1000.0, 0.1, 10, 1),
        )
        .bus(BusRecord::new(1, "Head").slack(1.0))
        .bus(BusRecord::new(2, "B2").with_load(LoadType::Commercial, 100.0, 50.0))
        .line(LineRecord::new(1, 1, 5, 0.02, 0.03, 1.0))
        .period(TimePeriod::new("1", 1.0, 1.0, 1.0))
        .build()
        .unwrap();
        let err = ModelBuilder::new(&f).build().unwrap_err();
        assert!(matches!(err, CapsiteError::Formulation { .. }));
    }
}

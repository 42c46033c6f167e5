//! Result projection: solved vector → named, indexed variable tables.
//!
//! Every variable family becomes a [`VariableTable`] whose rows pair an index
//! tuple (bus id, branch id, period label, ...) with the solved level. Costs
//! are split into the loss and investment components, installed capacitors
//! are listed, and the conic relaxation gap is reported per branch and period.

use crate::model::ConicProblem;
use crate::solve::{SolveOutcome, SolveStatus};
use capsite_core::{BranchId, BusId, CapacitorId, Feeder};
use serde::Serialize;

/// Selection level above which a capacitor counts as installed
pub const INSTALLED_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Serialize)]
pub struct VariableEntry {
    pub key: Vec<String>,
    pub level: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct VariableTable {
    pub name: String,
    /// Names of the index columns
    pub index: Vec<String>,
    pub rows: Vec<VariableEntry>,
}

impl VariableTable {
    fn new(name: &str, index: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            index: index.iter().map(|s| s.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    fn push(&mut self, key: Vec<String>, level: f64) {
        self.rows.push(VariableEntry { key, level });
    }

    pub fn get(&self, key: &[&str]) -> Option<f64> {
        self.rows
            .iter()
            .find(|row| row.key.iter().map(String::as_str).eq(key.iter().copied()))
            .map(|row| row.level)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstalledCapacitor {
    pub bus: BusId,
    pub bus_name: String,
    pub capacitor: CapacitorId,
    pub kind: String,
    pub size_kvar: f64,
    /// Annualized investment charge
    pub annual_cost: f64,
}

/// `I²·V²(from) − (P² + Q²)` for one branch and period
#[derive(Debug, Clone, Serialize)]
pub struct RelaxationGap {
    pub branch: BranchId,
    pub period: String,
    pub gap: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SolveStats {
    pub nodes: usize,
    pub iterations: u32,
    pub solve_time_seconds: f64,
    pub best_bound: Option<f64>,
}

/// Placement study result handed to the export layer.
#[derive(Debug, Clone, Serialize)]
pub struct PlacementResult {
    pub status: SolveStatus,
    /// Total annual cost ($/year)
    pub objective: Option<f64>,
    pub loss_cost: Option<f64>,
    pub investment_cost: Option<f64>,
    pub tables: Vec<VariableTable>,
    pub installed: Vec<InstalledCapacitor>,
    pub relaxation_gaps: Vec<RelaxationGap>,
    pub stats: SolveStats,
}

impl PlacementResult {
    /// Project a backend outcome onto the feeder's entities.
    pub fn project(feeder: &Feeder, problem: &ConicProblem, outcome: SolveOutcome) -> Self {
        let stats = SolveStats {
            nodes: outcome.nodes,
            iterations: outcome.iterations,
            solve_time_seconds: outcome.elapsed.as_secs_f64(),
            best_bound: outcome.best_bound,
        };

        let Some(x) = outcome.x else {
            return Self {
                status: outcome.status,
                objective: None,
                loss_cost: None,
                investment_cost: None,
                tables: demand_tables(feeder),
                installed: Vec::new(),
                relaxation_gaps: Vec::new(),
                stats,
            };
        };

        let layout = problem.layout;
        let topo = &problem.topology;
        let buses = feeder.buses();
        let periods = feeder.periods();
        let bus_key = |bus: usize| buses[bus].id.to_string();

        let mut vsq = VariableTable::new("voltage_sqr", &["bus", "time"]);
        for bus in 0..buses.len() {
            for (t, period) in periods.iter().enumerate() {
                vsq.push(vec![bus_key(bus), period.label.clone()], x[layout.vsq(bus, t)]);
            }
        }

        let branch_index = ["branch", "from_bus", "to_bus", "time"];
        let mut isq = VariableTable::new("current_sqr", &branch_index);
        let mut p_branch = VariableTable::new("p_branch", &branch_index);
        let mut q_branch = VariableTable::new("q_branch", &branch_index);
        let mut relaxation_gaps = Vec::new();
        for edge in topo.branches() {
            let id = feeder.branches()[edge.branch].id;
            for (t, period) in periods.iter().enumerate() {
                let key = vec![
                    id.to_string(),
                    bus_key(edge.from),
                    bus_key(edge.to),
                    period.label.clone(),
                ];
                let l = x[layout.isq(edge.branch, t)];
                let p = x[layout.p_branch(edge.branch, t)];
                let q = x[layout.q_branch(edge.branch, t)];
                let v = x[layout.vsq(edge.from, t)];
                isq.push(key.clone(), l);
                p_branch.push(key.clone(), p);
                q_branch.push(key, q);
                relaxation_gaps.push(RelaxationGap {
                    branch: id,
                    period: period.label.clone(),
                    gap: l * v - (p * p + q * q),
                });
            }
        }

        let slack = bus_key(topo.slack());
        let mut p_gen = VariableTable::new("p_gen", &["bus", "time"]);
        let mut q_gen = VariableTable::new("q_gen", &["bus", "time"]);
        for (t, period) in periods.iter().enumerate() {
            p_gen.push(vec![slack.clone(), period.label.clone()], x[layout.p_gen(t)]);
            q_gen.push(vec![slack.clone(), period.label.clone()], x[layout.q_gen(t)]);
        }

        let mut q_cap = VariableTable::new("q_cap", &["bus"]);
        for bus in 0..buses.len() {
            q_cap.push(vec![bus_key(bus)], x[layout.q_cap(bus)]);
        }

        let s_base = feeder.bases().s_base().value();
        let mut z_cap = VariableTable::new("z_cap", &["bus", "capacitor"]);
        let mut installed = Vec::new();
        for bin in &problem.binaries {
            let level = x[bin.var];
            let cap = &feeder.capacitors()[bin.cap];
            z_cap.push(vec![bus_key(bin.bus), cap.id.to_string()], level);
            if level > INSTALLED_THRESHOLD {
                installed.push(InstalledCapacitor {
                    bus: buses[bin.bus].id,
                    bus_name: buses[bin.bus].name.clone(),
                    capacitor: cap.id,
                    kind: cap.kind.clone(),
                    size_kvar: feeder.bases().reactive_from_pu(cap.size).value(),
                    annual_cost: feeder
                        .economics()
                        .annualized(cap.cost_per_mvar * cap.size.value() * s_base),
                });
            }
        }

        let mut tables = vec![vsq, isq, p_branch, q_branch, p_gen, q_gen, q_cap, z_cap];
        tables.extend(demand_tables(feeder));

        Self {
            status: outcome.status,
            objective: outcome.objective.or_else(|| Some(problem.objective_value(&x))),
            loss_cost: Some(problem.terms.loss_cost(&x)),
            investment_cost: Some(problem.terms.investment_cost(&x)),
            tables,
            installed,
            relaxation_gaps,
            stats,
        }
    }

    pub fn has_solution(&self) -> bool {
        self.objective.is_some()
    }

    pub fn table(&self, name: &str) -> Option<&VariableTable> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Solved level of one variable, e.g. `value("z_cap", &["3", "1"])`
    pub fn value(&self, name: &str, key: &[&str]) -> Option<f64> {
        self.table(name).and_then(|t| t.get(key))
    }

    pub fn relaxation_gaps(&self) -> &[RelaxationGap] {
        &self.relaxation_gaps
    }

    /// Largest absolute relaxation gap; zero means the SOC relaxation is exact
    pub fn max_relaxation_gap(&self) -> Option<f64> {
        self.relaxation_gaps
            .iter()
            .map(|g| g.gap.abs())
            .max_by(|a, b| a.total_cmp(b))
    }

    pub fn installed_kvar(&self) -> f64 {
        self.installed.iter().map(|c| c.size_kvar).sum()
    }

    pub fn summary(&self) -> String {
        let money = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| format!("${:.2}", v));
        let mut s = String::new();
        s.push_str(&format!("Capacitor Placement Summary\n{}\n", "=".repeat(40)));
        s.push_str(&format!("Status: {}\n", self.status));
        s.push_str(&format!("Total Cost ($/year): {}\n", money(self.objective)));
        s.push_str(&format!("  Energy loss: {}\n", money(self.loss_cost)));
        s.push_str(&format!("  Investment:  {}\n", money(self.investment_cost)));
        s.push_str(&format!(
            "Capacitors Installed: {} ({:.1} kVAr)\n",
            self.installed.len(),
            self.installed_kvar()
        ));
        if let Some(gap) = self.max_relaxation_gap() {
            s.push_str(&format!("Max Relaxation Gap: {:.3e}\n", gap));
        }
        s.push_str(&format!(
            "Nodes: {}  Iterations: {}  Solve Time: {:.3}s\n",
            self.stats.nodes, self.stats.iterations, self.stats.solve_time_seconds
        ));

        if !self.installed.is_empty() {
            s.push_str("\nInstalled:\n");
            for cap in &self.installed {
                s.push_str(&format!(
                    "  [BUS {}] {} - capacitor {} ({}, {:.1} kVAr) ${:.2}/year\n",
                    cap.bus, cap.bus_name, cap.capacitor, cap.kind, cap.size_kvar, cap.annual_cost
                ));
            }
        }
        s
    }
}

/// Demand tables reflect inputs and are reported even without a solution.
fn demand_tables(feeder: &Feeder) -> Vec<VariableTable> {
    let mut p_demand = VariableTable::new("p_demand", &["bus", "time"]);
    let mut q_demand = VariableTable::new("q_demand", &["bus", "time"]);
    for (bus, b) in feeder.buses().iter().enumerate() {
        for (t, period) in feeder.periods().iter().enumerate() {
            let (pd, qd) = feeder.demand(bus, t);
            let key = vec![b.id.to_string(), period.label.clone()];
            p_demand.push(key.clone(), pd.value());
            q_demand.push(key, qd.value());
        }
    }
    vec![p_demand, q_demand]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelBuilder;
    use capsite_core::*;
    use std::time::Duration;

    fn feeder() -> Feeder {
        FeederBuilder::new(
            PerUnitBases::new(1.0, 1.0).unwrap(),
            VoltageLimits::new(0.9, 1.1),
            EconomicParams::new(1000.0, 0.1, 10, 1),
        )
        .bus(BusRecord::new(1, "Head").slack(1.0))
        .bus(BusRecord::new(2, "Tail").with_load(LoadType::Residential, 400.0, 300.0))
        .line(LineRecord::new(7, 1, 2, 0.01, 0.01, 1.0))
        .period(TimePeriod::new("h1", 1.0, 1.0, 1.0))
        .capacitor(CapacitorRecord::new(1, "fixed", 300.0, 1.0))
        .build()
        .unwrap()
    }

    /// Hand-built point: capacitor at bus 2, flow 0.4 + j0.0
    fn outcome(problem: &ConicProblem) -> SolveOutcome {
        let l = problem.layout;
        let mut x = vec![0.0; problem.n_var()];
        x[l.vsq(0, 0)] = 1.0;
        x[l.vsq(1, 0)] = 0.99;
        x[l.isq(0, 0)] = 0.16;
        x[l.p_branch(0, 0)] = 0.4;
        x[l.q_cap(1)] = 0.3;
        x[l.z_cap(1, 0)] = 1.0;
        SolveOutcome {
            status: SolveStatus::Optimal,
            objective: None,
            best_bound: None,
            x: Some(x),
            nodes: 3,
            iterations: 40,
            elapsed: Duration::from_millis(12),
        }
    }

    #[test]
    fn test_tables_and_costs() {
        let feeder = feeder();
        let problem = ModelBuilder::new(&feeder).build().unwrap();
        let result = PlacementResult::project(&feeder, &problem, outcome(&problem));

        assert_eq!(result.value("voltage_sqr", &["2", "h1"]), Some(0.99));
        assert_eq!(result.value("current_sqr", &["7", "1", "2", "h1"]), Some(0.16));
        assert_eq!(result.value("z_cap", &["2", "1"]), Some(1.0));
        assert_eq!(result.value("z_cap", &["1", "1"]), Some(0.0));
        assert!((result.value("p_demand", &["2", "h1"]).unwrap() - 0.4).abs() < 1e-12);

        let loss = result.loss_cost.unwrap();
        assert!((loss - 365.0 * 0.01 * 1000.0 * 0.16).abs() < 1e-9);
        let total = result.objective.unwrap();
        assert!((total - loss - result.investment_cost.unwrap()).abs() < 1e-9);

        assert_eq!(result.installed.len(), 1);
        assert_eq!(result.installed[0].bus, BusId::new(2));
        assert!((result.installed_kvar() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_relaxation_gap() {
        let feeder = feeder();
        let problem = ModelBuilder::new(&feeder).build().unwrap();
        let result = PlacementResult::project(&feeder, &problem, outcome(&problem));
        // 0.16 · 1.0 − 0.4² = 0
        assert!(result.max_relaxation_gap().unwrap() < 1e-12);
        assert_eq!(result.relaxation_gaps().len(), 1);
    }

    #[test]
    fn test_no_solution_keeps_demand_tables() {
        let feeder = feeder();
        let problem = ModelBuilder::new(&feeder).build().unwrap();
        let outcome = SolveOutcome {
            status: SolveStatus::Infeasible,
            x: None,
            objective: None,
            best_bound: None,
            nodes: 1,
            iterations: 12,
            elapsed: Duration::from_millis(2),
        };
        let result = PlacementResult::project(&feeder, &problem, outcome);
        assert!(!result.has_solution());
        assert!(result.table("voltage_sqr").is_none());
        assert!(result.table("q_demand").is_some());
        assert!(result.max_relaxation_gap().is_none());
        assert!(result.summary().contains("infeasible"));
    }
}

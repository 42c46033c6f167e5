//! Parallel scenario runs.
//!
//! Each scenario overrides the placement cap Y and/or the load-type filter of
//! a base feeder, then builds and solves its own model on a Rayon pool. The
//! runs share nothing but the read-only base feeder.

use crate::projection::PlacementResult;
use crate::solve::{SolveBackend, SolveConfig, SolveStatus};
use crate::solve_placement;
use anyhow::{Context, Result};
use capsite_core::{Feeder, LoadTypeFilter};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// One what-if variant of the base study.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub scenario_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_placements: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_filter: Option<LoadTypeFilter>,
}

impl Scenario {
    pub fn new(scenario_id: impl Into<String>) -> Self {
        Self {
            scenario_id: scenario_id.into(),
            max_placements: None,
            load_filter: None,
        }
    }

    pub fn with_max_placements(mut self, y: usize) -> Self {
        self.max_placements = Some(y);
        self
    }

    pub fn with_load_filter(mut self, filter: LoadTypeFilter) -> Self {
        self.load_filter = Some(filter);
        self
    }

    /// Base feeder with this scenario's overrides applied
    pub fn apply(&self, base: &Feeder) -> Feeder {
        let mut feeder = match self.max_placements {
            Some(y) => base.with_max_placements(y),
            None => base.clone(),
        };
        if let Some(filter) = self.load_filter {
            feeder = feeder.with_load_filter(filter);
        }
        feeder
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub scenario_id: String,
    pub max_placements: usize,
    pub type_load: String,
    /// "ok" when the model was built and solved, "error" otherwise
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solve_status: Option<SolveStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loss_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_cost: Option<f64>,
    /// Installed capacitors as "bus:capacitor"
    #[serde(default)]
    pub installed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct ScenarioRun {
    pub record: ScenarioRecord,
    pub result: Option<PlacementResult>,
}

pub struct BatchSummary {
    pub success: usize,
    pub failure: usize,
    pub runs: Vec<ScenarioRun>,
}

/// Solve every scenario in parallel. `threads == 0` uses one thread per CPU.
pub fn run_scenarios(
    base: &Feeder,
    scenarios: &[Scenario],
    backend: &dyn SolveBackend,
    config: &SolveConfig,
    threads: usize,
) -> Result<BatchSummary> {
    let thread_count = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for scenario runs")?;

    info!(
        scenarios = scenarios.len(),
        threads = thread_count,
        backend = backend.id(),
        "running scenarios"
    );

    let runs: Vec<ScenarioRun> = pool.install(|| {
        scenarios
            .par_iter()
            .map(|scenario| run_scenario(base, scenario, backend, config))
            .collect()
    });

    let success = runs.iter().filter(|run| run.record.status == "ok").count();
    let failure = runs.len() - success;
    Ok(BatchSummary {
        success,
        failure,
        runs,
    })
}

fn run_scenario(
    base: &Feeder,
    scenario: &Scenario,
    backend: &dyn SolveBackend,
    config: &SolveConfig,
) -> ScenarioRun {
    let feeder = scenario.apply(base);
    let mut record = ScenarioRecord {
        scenario_id: scenario.scenario_id.clone(),
        max_placements: feeder.economics().max_placements,
        type_load: feeder.load_filter().to_string(),
        status: "ok".to_string(),
        solve_status: None,
        objective: None,
        loss_cost: None,
        investment_cost: None,
        installed: Vec::new(),
        error: None,
    };

    match solve_placement(&feeder, backend, config) {
        Ok(result) => {
            record.solve_status = Some(result.status);
            record.objective = result.objective;
            record.loss_cost = result.loss_cost;
            record.investment_cost = result.investment_cost;
            record.installed = result
                .installed
                .iter()
                .map(|c| format!("{}:{}", c.bus, c.capacitor))
                .collect();
            ScenarioRun {
                record,
                result: Some(result),
            }
        }
        Err(err) => {
            warn!(scenario = %scenario.scenario_id, error = %err, "scenario failed");
            record.status = "error".to_string();
            record.error = Some(err.to_string());
            ScenarioRun {
                record,
                result: None,
            }
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BatchManifest {
    pub created_at: DateTime<Utc>,
    pub solver: String,
    pub num_scenarios: usize,
    pub success: usize,
    pub failure: usize,
    pub scenarios: Vec<ScenarioRecord>,
}

impl BatchManifest {
    pub fn from_summary(solver: &str, summary: &BatchSummary) -> Self {
        Self {
            created_at: Utc::now(),
            solver: solver.to_string(),
            num_scenarios: summary.runs.len(),
            success: summary.success,
            failure: summary.failure,
            scenarios: summary.runs.iter().map(|run| run.record.clone()).collect(),
        }
    }
}

pub fn write_batch_manifest(path: &Path, manifest: &BatchManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing batch manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing batch manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_batch_manifest(path: &Path) -> Result<BatchManifest> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening batch manifest '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing batch manifest '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsite_core::LoadType;
    use tempfile::NamedTempFile;

    #[test]
    fn manifest_writes_and_reads_back() {
        let record = ScenarioRecord {
            scenario_id: "y0".into(),
            max_placements: 0,
            type_load: "All".into(),
            status: "ok".into(),
            solve_status: Some(SolveStatus::Optimal),
            objective: Some(1234.5),
            loss_cost: Some(1234.5),
            investment_cost: Some(0.0),
            installed: Vec::new(),
            error: None,
        };
        let manifest = BatchManifest {
            created_at: Utc::now(),
            solver: "clarabel-bnb".into(),
            num_scenarios: 1,
            success: 1,
            failure: 0,
            scenarios: vec![record],
        };
        let tmp = NamedTempFile::new().unwrap();
        write_batch_manifest(tmp.path(), &manifest).unwrap();
        let parsed = load_batch_manifest(tmp.path()).unwrap();
        assert_eq!(parsed.solver, "clarabel-bnb");
        assert_eq!(parsed.scenarios[0].solve_status, Some(SolveStatus::Optimal));
        let text = fs::read_to_string(tmp.path()).unwrap();
        assert!(!text.contains("\"error\""));
    }

    #[test]
    fn scenario_serde_accepts_partial_overrides() {
        let s: Scenario = serde_json::from_str(r#"{"scenario_id": "base"}"#).unwrap();
        assert_eq!(s, Scenario::new("base"));

        let s = Scenario::new("ind").with_load_filter(LoadTypeFilter::Only(LoadType::Industrial));
        let json = serde_json::to_string(&s).unwrap();
        assert!(!json.contains("max_placements"));
    }
}

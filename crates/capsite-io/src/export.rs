//! Result export: one CSV per variable family plus a JSON summary.

use anyhow::{Context, Result};
use capsite_algo::projection::{InstalledCapacitor, VariableTable};
use capsite_algo::{PlacementResult, SolveStatus};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const SUMMARY_FILE: &str = "summary.json";
pub const INSTALLED_FILE: &str = "cap_installed.csv";

/// Contents of `summary.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultSummary {
    pub status: SolveStatus,
    #[serde(rename = "Total Cost ($/year)")]
    pub objective: Option<f64>,
    pub loss_cost: Option<f64>,
    pub investment_cost: Option<f64>,
    /// Installed capacitors as "bus:capacitor"
    pub installed: Vec<String>,
    pub installed_kvar: f64,
    pub max_relaxation_gap: Option<f64>,
    pub best_bound: Option<f64>,
    pub nodes: usize,
    pub iterations: u32,
    pub solve_time_seconds: f64,
}

impl ResultSummary {
    pub fn from_result(result: &PlacementResult) -> Self {
        Self {
            status: result.status,
            objective: result.objective,
            loss_cost: result.loss_cost,
            investment_cost: result.investment_cost,
            installed: result
                .installed
                .iter()
                .map(|c| format!("{}:{}", c.bus, c.capacitor))
                .collect(),
            installed_kvar: result.installed_kvar(),
            max_relaxation_gap: result.max_relaxation_gap(),
            best_bound: result.stats.best_bound,
            nodes: result.stats.nodes,
            iterations: result.stats.iterations,
            solve_time_seconds: result.stats.solve_time_seconds,
        }
    }
}

fn write_table(table: &VariableTable, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV writer for {}", path.display()))?;

    let mut header: Vec<&str> = table.index.iter().map(String::as_str).collect();
    header.push("level");
    wtr.write_record(&header).context("writing CSV header")?;

    for row in &table.rows {
        let mut record = row.key.clone();
        record.push(row.level.to_string());
        wtr.write_record(&record).context("writing CSV record")?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

fn write_installed(installed: &[InstalledCapacitor], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("creating CSV writer for {}", path.display()))?;
    wtr.write_record(["bus", "name", "capacitor", "type", "size_kvar", "annual_cost"])
        .context("writing CSV header")?;
    for cap in installed {
        wtr.write_record([
            cap.bus.to_string(),
            cap.bus_name.clone(),
            cap.capacitor.to_string(),
            cap.kind.clone(),
            cap.size_kvar.to_string(),
            cap.annual_cost.to_string(),
        ])
        .context("writing CSV record")?;
    }
    wtr.flush().context("flushing CSV writer")?;
    Ok(())
}

/// Write every table, the installed list and the summary into `out_dir`.
/// Returns the paths written.
pub fn export_result(result: &PlacementResult, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory '{}'", out_dir.display()))?;

    let mut written = Vec::with_capacity(result.tables.len() + 2);
    for table in &result.tables {
        let path = out_dir.join(format!("{}.csv", table.name));
        write_table(table, &path)?;
        written.push(path);
    }

    let installed = out_dir.join(INSTALLED_FILE);
    write_installed(&result.installed, &installed)?;
    written.push(installed);

    let summary = out_dir.join(SUMMARY_FILE);
    let json = serde_json::to_string_pretty(&ResultSummary::from_result(result))
        .context("serializing result summary to JSON")?;
    fs::write(&summary, json).with_context(|| format!("writing {}", summary.display()))?;
    written.push(summary);

    info!(dir = %out_dir.display(), files = written.len(), "exported placement result");
    Ok(written)
}

pub fn load_summary(path: &Path) -> Result<ResultSummary> {
    let file = fs::File::open(path)
        .with_context(|| format!("opening result summary '{}'", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("parsing result summary '{}'", path.display()))
}

//! Case directory loading: four tables plus a configuration → [`Feeder`].

use crate::config::PlannerConfig;
use crate::tables;
use anyhow::{Context, Result};
use capsite_core::{Feeder, FeederBuilder};
use std::path::{Path, PathBuf};
use tracing::info;

/// Locations of the case tables.
#[derive(Debug, Clone)]
pub struct CaseFiles {
    pub bus: PathBuf,
    pub line: PathBuf,
    pub load_profile: PathBuf,
    pub capacitor: PathBuf,
}

impl CaseFiles {
    /// Conventional file names inside a case directory
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            bus: dir.join("bus.csv"),
            line: dir.join("line.csv"),
            load_profile: dir.join("loadprofile.csv"),
            capacitor: dir.join("capacitor.csv"),
        }
    }
}

/// Read every table into a builder without validating it, so callers can
/// inspect [`FeederBuilder::diagnose`] before building.
pub fn case_builder(files: &CaseFiles, config: &PlannerConfig) -> Result<FeederBuilder> {
    let buses = tables::read_buses(&files.bus)?;
    let lines = tables::read_lines(&files.line)?;
    let periods = tables::read_load_profile(&files.load_profile)?;
    let capacitors = tables::read_capacitors(&files.capacitor)?;

    info!(
        buses = buses.len(),
        lines = lines.len(),
        periods = periods.len(),
        capacitors = capacitors.len(),
        "read case tables"
    );

    Ok(FeederBuilder::new(config.bases()?, config.voltage_limits(), config.economics())
        .load_filter(config.load_filter()?)
        .buses(buses)
        .lines(lines)
        .periods(periods)
        .capacitors(capacitors))
}

pub fn load_case(files: &CaseFiles, config: &PlannerConfig) -> Result<Feeder> {
    case_builder(files, config)?
        .build()
        .with_context(|| format!("building feeder from '{}'", files.bus.display()))
}

/// Convenience for a directory using the conventional file names.
pub fn load_case_dir(dir: &Path, config: &PlannerConfig) -> Result<Feeder> {
    load_case(&CaseFiles::in_dir(dir), config)
}

//! File adapters for capacitor placement studies.
//!
//! - [`config`] - planner configuration (JSON, TOML or YAML)
//! - [`tables`] - `bus.csv`, `line.csv`, `loadprofile.csv`, `capacitor.csv`
//! - [`case`] - case directory → [`capsite_core::Feeder`]
//! - [`export`] - variable tables, installed list and `summary.json`
//! - [`scenarios`] - scenario-set files for batch runs

pub mod case;
pub mod config;
pub mod export;
pub mod scenarios;
pub mod tables;

pub use case::{case_builder, load_case, load_case_dir, CaseFiles};
pub use config::{load_config, PlannerConfig};
pub use export::{export_result, load_summary, ResultSummary};
pub use scenarios::{load_scenario_set, resolve_scenarios, ScenarioSet, ScenarioSpec};

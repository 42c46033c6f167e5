//! Planner configuration document.
//!
//! Keys follow the planning tool's original layout:
//!
//! ```yaml
//! data: { type_load: All }
//! base: { s_base: 10.0, u_base: 12.66 }
//! volt_limit: { volt_lower: 0.95, volt_upper: 1.05 }
//! economic_parameters: { c_delta_a: 50.0, r: 0.1, M: 10, Y: 3 }
//! solver: clarabel-bnb
//! solver_options: { time_limit_seconds: 60 }
//! ```
//!
//! Physics and economics keys are required; only `solver` and
//! `solver_options` have defaults.

use anyhow::{Context, Result};
use capsite_algo::{SolveConfig, SolverChoice};
use capsite_core::{
    CapsiteError, CapsiteResult, EconomicParams, LoadTypeFilter, PerUnitBases, VoltageLimits,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

const CONFIG_ENTITY: &str = "config";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSection {
    /// `All`, `Residential`, `Commercial` or `Industrial`
    pub type_load: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseSection {
    /// MVA
    pub s_base: f64,
    /// kV
    pub u_base: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoltLimitSection {
    pub volt_lower: f64,
    pub volt_upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomicSection {
    /// Loss price per MWh
    pub c_delta_a: f64,
    /// Discount rate
    pub r: f64,
    /// Capacitor life in years
    #[serde(rename = "M")]
    pub m: u32,
    /// Network-wide placement cap
    #[serde(rename = "Y")]
    pub y: usize,
}

/// Optional overrides of [`SolveConfig`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverOptions {
    pub absolute_gap: Option<f64>,
    pub relative_gap: Option<f64>,
    pub time_limit_seconds: Option<f64>,
    pub max_nodes: Option<usize>,
    pub max_iterations: Option<u32>,
    pub integrality_tolerance: Option<f64>,
    pub verbose: Option<bool>,
}

fn default_solver() -> String {
    SolverChoice::default().id().to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    pub data: DataSection,
    pub base: BaseSection,
    pub volt_limit: VoltLimitSection,
    pub economic_parameters: EconomicSection,
    #[serde(default = "default_solver")]
    pub solver: String,
    #[serde(default)]
    pub solver_options: SolverOptions,
}

impl PlannerConfig {
    pub fn bases(&self) -> CapsiteResult<PerUnitBases> {
        PerUnitBases::new(self.base.s_base, self.base.u_base)
    }

    pub fn voltage_limits(&self) -> VoltageLimits {
        VoltageLimits::new(self.volt_limit.volt_lower, self.volt_limit.volt_upper)
    }

    pub fn economics(&self) -> EconomicParams {
        let e = &self.economic_parameters;
        EconomicParams::new(e.c_delta_a, e.r, e.m, e.y)
    }

    pub fn load_filter(&self) -> CapsiteResult<LoadTypeFilter> {
        self.data
            .type_load
            .parse()
            .map_err(|msg: String| CapsiteError::config(CONFIG_ENTITY, format!("data.type_load: {msg}")))
    }

    pub fn solver_choice(&self) -> CapsiteResult<SolverChoice> {
        self.solver.parse()
    }

    /// Solver settings with `solver_options` applied over the defaults.
    pub fn solve_config(&self) -> CapsiteResult<SolveConfig> {
        let opts = &self.solver_options;
        let mut config = SolveConfig::default();
        if let Some(gap) = opts.absolute_gap {
            config.absolute_gap = gap;
        }
        if let Some(gap) = opts.relative_gap {
            config.relative_gap = gap;
        }
        if let Some(seconds) = opts.time_limit_seconds {
            if !(seconds.is_finite() && seconds >= 0.0) {
                return Err(CapsiteError::config(
                    CONFIG_ENTITY,
                    format!("solver_options.time_limit_seconds must be non-negative, got {seconds}"),
                ));
            }
            config.time_limit = Some(Duration::from_secs_f64(seconds));
        }
        if let Some(n) = opts.max_nodes {
            config.max_nodes = n;
        }
        if let Some(n) = opts.max_iterations {
            config.max_iterations = n;
        }
        if let Some(tol) = opts.integrality_tolerance {
            config.integrality_tolerance = tol;
        }
        if let Some(verbose) = opts.verbose {
            config.verbose = verbose;
        }
        config.validate()?;
        Ok(config)
    }

    /// Check every value; the first violation is returned.
    pub fn validate(&self) -> CapsiteResult<()> {
        self.bases()?;

        let v = &self.volt_limit;
        if !(v.volt_lower > 0.0 && v.volt_lower.is_finite() && v.volt_upper.is_finite()) {
            return Err(CapsiteError::config(
                CONFIG_ENTITY,
                format!("volt_limit bounds must be positive, got [{}, {}]", v.volt_lower, v.volt_upper),
            ));
        }
        if v.volt_lower >= v.volt_upper {
            return Err(CapsiteError::config(
                CONFIG_ENTITY,
                format!(
                    "volt_limit.volt_lower ({}) must be below volt_limit.volt_upper ({})",
                    v.volt_lower, v.volt_upper
                ),
            ));
        }

        let e = &self.economic_parameters;
        if !(e.c_delta_a.is_finite() && e.c_delta_a >= 0.0) {
            return Err(CapsiteError::config(
                CONFIG_ENTITY,
                format!("economic_parameters.c_delta_a must be non-negative, got {}", e.c_delta_a),
            ));
        }
        if !(e.r.is_finite() && e.r >= 0.0) {
            return Err(CapsiteError::config(
                CONFIG_ENTITY,
                format!("economic_parameters.r must be non-negative, got {}", e.r),
            ));
        }
        if e.m == 0 {
            return Err(CapsiteError::config(
                CONFIG_ENTITY,
                "economic_parameters.M must be a positive number of years",
            ));
        }

        self.load_filter()?;
        self.solver_choice()?;
        self.solve_config()?;
        Ok(())
    }
}

/// Load and validate a configuration from `.json`, `.toml`, `.yaml` or `.yml`.
pub fn load_config(path: &Path) -> Result<PlannerConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading config '{}'", path.display()))?;
    let config: PlannerConfig = match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing config json")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("toml") => {
            toml::from_str(&data).context("parsing config toml")?
        }
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing config yaml")?
        }
        other => anyhow::bail!(
            "unsupported config format '{}' for '{}' (expected json, toml, yaml or yml)",
            other.unwrap_or(""),
            path.display()
        ),
    };
    config
        .validate()
        .with_context(|| format!("validating config '{}'", path.display()))?;
    debug!(path = %path.display(), solver = %config.solver, "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsite_core::LoadType;
    use std::io::Write;
    use tempfile::Builder;

    const JSON: &str = r#"{
        "data": {"type_load": "All"},
        "base": {"s_base": 10.0, "u_base": 12.66},
        "volt_limit": {"volt_lower": 0.95, "volt_upper": 1.05},
        "economic_parameters": {"c_delta_a": 50.0, "r": 0.1, "M": 10, "Y": 3},
        "solver": "cplex"
    }"#;

    fn write_temp(ext: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(ext).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    fn parsed() -> PlannerConfig {
        serde_json::from_str(JSON).unwrap()
    }

    #[test]
    fn source_solver_names_are_rejected() {
        let err = parsed().validate().unwrap_err();
        assert_eq!(err.entity(), Some("config"));
        assert!(err.to_string().contains("clarabel-bnb"), "{err}");
    }

    #[test]
    fn yaml_and_toml_load_the_same_keys() {
        let yaml = write_temp(
            ".yaml",
            "data:\n  type_load: Industrial\nbase:\n  s_base: 10.0\n  u_base: 12.66\n\
             volt_limit:\n  volt_lower: 0.95\n  volt_upper: 1.05\n\
             economic_parameters:\n  c_delta_a: 50.0\n  r: 0.1\n  M: 10\n  Y: 3\n",
        );
        let from_yaml = load_config(yaml.path()).unwrap();
        assert_eq!(
            from_yaml.load_filter().unwrap(),
            LoadTypeFilter::Only(LoadType::Industrial)
        );
        assert_eq!(from_yaml.solver_choice().unwrap(), SolverChoice::ClarabelBnb);

        let toml = write_temp(
            ".toml",
            "solver = \"bnb\"\n[data]\ntype_load = \"All\"\n[base]\ns_base = 10.0\nu_base = 12.66\n\
             [volt_limit]\nvolt_lower = 0.95\nvolt_upper = 1.05\n\
             [economic_parameters]\nc_delta_a = 50.0\nr = 0.1\nM = 10\nY = 3\n\
             [solver_options]\ntime_limit_seconds = 2.5\nrelative_gap = 0.01\n",
        );
        let from_toml = load_config(toml.path()).unwrap();
        let solve = from_toml.solve_config().unwrap();
        assert_eq!(solve.time_limit, Some(Duration::from_millis(2500)));
        assert_eq!(solve.relative_gap, 0.01);
        assert_eq!(from_toml.economics().max_placements, 3);
    }

    #[test]
    fn missing_economics_key_is_a_load_error() {
        let file = write_temp(
            ".json",
            r#"{"data": {"type_load": "All"}, "base": {"s_base": 10.0, "u_base": 12.66},
                "volt_limit": {"volt_lower": 0.95, "volt_upper": 1.05},
                "economic_parameters": {"c_delta_a": 50.0, "r": 0.1, "M": 10}}"#,
        );
        let err = load_config(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Y"), "{err:#}");
    }

    #[test]
    fn value_checks_name_the_offending_key() {
        let mut config = parsed();
        config.solver = "clarabel".into();
        assert!(config.validate().is_ok());

        let mut bad = config.clone();
        bad.volt_limit.volt_lower = 1.1;
        assert!(bad.validate().unwrap_err().to_string().contains("volt_lower"));

        let mut bad = config.clone();
        bad.economic_parameters.m = 0;
        assert!(bad.validate().unwrap_err().to_string().contains("M"));

        let mut bad = config.clone();
        bad.data.type_load = "Agricultural".into();
        assert!(bad.validate().unwrap_err().to_string().contains("type_load"));

        let mut bad = config;
        bad.solver_options.time_limit_seconds = Some(-1.0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let file = write_temp(".ini", "solver=clarabel");
        assert!(load_config(file.path()).is_err());
    }
}

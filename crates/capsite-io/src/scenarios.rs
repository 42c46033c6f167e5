//! Scenario-set files for batch runs.
//!
//! ```yaml
//! scenarios:
//!   - scenario_id: base
//!   - scenario_id: y1
//!     max_placements: 1
//!   - scenario_id: industrial
//!     type_load: Industrial
//! ```

use anyhow::{anyhow, Context, Result};
use capsite_algo::Scenario;
use capsite_core::LoadTypeFilter;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub scenario_id: String,
    #[serde(default)]
    pub max_placements: Option<usize>,
    #[serde(default)]
    pub type_load: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub scenarios: Vec<ScenarioSpec>,
}

pub fn load_scenario_set(path: &Path) -> Result<ScenarioSet> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading scenario set '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
            serde_yaml::from_str(&data).context("parsing scenario set yaml")
        }
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing scenario set json")
        }
        _ => serde_yaml::from_str(&data)
            .or_else(|_| serde_json::from_str(&data))
            .context("parsing scenario set"),
    }
}

/// Check ids and load-type tags, producing runnable scenarios.
pub fn resolve_scenarios(set: &ScenarioSet) -> Result<Vec<Scenario>> {
    if set.scenarios.is_empty() {
        return Err(anyhow!("scenario set contains no scenarios"));
    }
    let mut seen = HashSet::new();
    let mut resolved = Vec::with_capacity(set.scenarios.len());
    for spec in &set.scenarios {
        if spec.scenario_id.trim().is_empty() {
            return Err(anyhow!("scenario_id cannot be empty"));
        }
        if !seen.insert(spec.scenario_id.clone()) {
            return Err(anyhow!("duplicate scenario_id '{}' in set", spec.scenario_id));
        }

        let mut scenario = Scenario::new(spec.scenario_id.clone());
        if let Some(y) = spec.max_placements {
            scenario = scenario.with_max_placements(y);
        }
        if let Some(tag) = &spec.type_load {
            let filter: LoadTypeFilter = tag
                .parse()
                .map_err(|msg: String| anyhow!("scenario '{}': {msg}", spec.scenario_id))?;
            scenario = scenario.with_load_filter(filter);
        }
        resolved.push(scenario);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsite_core::LoadType;
    use std::io::Write;
    use tempfile::Builder;

    fn spec(id: &str) -> ScenarioSpec {
        ScenarioSpec {
            scenario_id: id.into(),
            max_placements: None,
            type_load: None,
        }
    }

    #[test]
    fn yaml_set_resolves_overrides() {
        let mut file = Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "scenarios:\n  - scenario_id: base\n  - scenario_id: y1\n    max_placements: 1\n  \
             - scenario_id: ind\n    type_load: industrial\n"
        )
        .unwrap();
        let set = load_scenario_set(file.path()).unwrap();
        let scenarios = resolve_scenarios(&set).unwrap();
        assert_eq!(scenarios.len(), 3);
        assert_eq!(scenarios[0], Scenario::new("base"));
        assert_eq!(scenarios[1].max_placements, Some(1));
        assert_eq!(
            scenarios[2].load_filter,
            Some(LoadTypeFilter::Only(LoadType::Industrial))
        );
    }

    #[test]
    fn duplicate_and_empty_ids_are_rejected() {
        let dup = ScenarioSet {
            scenarios: vec![spec("a"), spec("a")],
        };
        assert!(resolve_scenarios(&dup).unwrap_err().to_string().contains("duplicate"));

        let blank = ScenarioSet {
            scenarios: vec![spec("  ")],
        };
        assert!(resolve_scenarios(&blank).is_err());

        let empty = ScenarioSet { scenarios: vec![] };
        assert!(resolve_scenarios(&empty).is_err());
    }

    #[test]
    fn bad_type_load_names_the_scenario() {
        let mut s = spec("farm");
        s.type_load = Some("Agricultural".into());
        let err = resolve_scenarios(&ScenarioSet { scenarios: vec![s] }).unwrap_err();
        assert!(err.to_string().contains("farm"));
    }
}

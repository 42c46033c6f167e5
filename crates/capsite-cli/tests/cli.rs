//! Integration tests for the `capsite-cli` binary

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_case(dir: &Path, capacitor_cost: &str) {
    fs::write(
        dir.join("bus.csv"),
        "ID,Name,Type,Pload[kW],Qload[kVAr],Code,Vsch[pu]\n\
         1,Substation,,0,0,3,1.0\n\
         2,Midpoint,,0,0,1,\n\
         3,Lateral,Residential,500,300,1,\n",
    )
    .unwrap();
    fs::write(
        dir.join("line.csv"),
        "ID,FromBus,ToBus,R[Ohm],X[Ohm],rateA[kA]\n\
         1,1,2,0.02,0.02,1.0\n\
         2,3,2,0.02,0.02,1.0\n",
    )
    .unwrap();
    fs::write(
        dir.join("loadprofile.csv"),
        "Time,Residential,Commercial,Industrial\n1,1.0,1.0,1.0\n",
    )
    .unwrap();
    fs::write(
        dir.join("capacitor.csv"),
        format!("ID,Type,Size[kVAr],Cost[$/kVAr]\n1,fixed,300,{capacitor_cost}\n"),
    )
    .unwrap();
    fs::write(
        dir.join("config.yaml"),
        "data:\n  type_load: All\nbase:\n  s_base: 1.0\n  u_base: 1.0\n\
         volt_limit:\n  volt_lower: 0.9\n  volt_upper: 1.1\n\
         economic_parameters:\n  c_delta_a: 1000.0\n  r: 0.1\n  M: 10\n  Y: 1\n",
    )
    .unwrap();
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("solve"))
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("scenarios"));
}

#[test]
fn test_solve_help_mentions_case_inputs() {
    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.args(["solve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--case"))
        .stdout(predicate::str::contains("--config"))
        .stdout(predicate::str::contains("--time-limit"));
}

#[test]
fn test_solve_exports_results() {
    let tmp = TempDir::new().unwrap();
    write_case(tmp.path(), "1.0");
    let out = tmp.path().join("results");

    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.args(["--log-level", "warn", "solve", "--case"])
        .arg(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.yaml"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: optimal"))
        .stdout(predicate::str::contains("Capacitors Installed: 1"));

    assert!(out.join("summary.json").exists());
    assert!(out.join("voltage_sqr.csv").exists());
    let installed = fs::read_to_string(out.join("cap_installed.csv")).unwrap();
    assert!(installed.contains("Lateral"), "{installed}");
}

#[test]
fn test_solve_json_with_zero_placements() {
    let tmp = TempDir::new().unwrap();
    write_case(tmp.path(), "1.0");

    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.args(["--log-level", "warn", "solve", "--json", "--max-placements", "0", "--case"])
        .arg(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"optimal\""))
        .stdout(predicate::str::contains("\"installed\": []"));
}

#[test]
fn test_validate_reports_bad_catalog() {
    let tmp = TempDir::new().unwrap();
    write_case(tmp.path(), "-2.0");

    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.args(["validate", "--case"])
        .arg(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.yaml"))
        .assert()
        .failure()
        .stdout(predicate::str::contains("capacitor 1"));
}

#[test]
fn test_validate_accepts_radial_case() {
    let tmp = TempDir::new().unwrap();
    write_case(tmp.path(), "1.0");

    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.args(["validate", "--case"])
        .arg(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("Radial feeder: 3 buses, 2 branches"));
}

#[test]
fn test_scenarios_write_manifest() {
    let tmp = TempDir::new().unwrap();
    write_case(tmp.path(), "1.0");
    let spec = tmp.path().join("scenarios.yaml");
    fs::write(
        &spec,
        "scenarios:\n  - scenario_id: base\n  - scenario_id: none\n    max_placements: 0\n",
    )
    .unwrap();
    let manifest = tmp.path().join("batch").join("manifest.json");

    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.args(["--log-level", "warn", "scenarios", "--threads", "2", "--case"])
        .arg(tmp.path())
        .arg("--config")
        .arg(tmp.path().join("config.yaml"))
        .arg("--spec")
        .arg(&spec)
        .arg("--out")
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("2 succeeded, 0 failed"));

    let text = fs::read_to_string(&manifest).unwrap();
    assert!(text.contains("\"scenario_id\": \"none\""));
    assert!(text.contains("\"solver\": \"clarabel-bnb\""));
}

#[test]
fn test_unknown_solver_fails() {
    let tmp = TempDir::new().unwrap();
    write_case(tmp.path(), "1.0");
    let config = tmp.path().join("config.json");
    fs::write(
        &config,
        r#"{"data": {"type_load": "All"}, "base": {"s_base": 1.0, "u_base": 1.0},
            "volt_limit": {"volt_lower": 0.9, "volt_upper": 1.1},
            "economic_parameters": {"c_delta_a": 1000.0, "r": 0.1, "M": 10, "Y": 1},
            "solver": "gurobi"}"#,
    )
    .unwrap();

    let mut cmd = cargo_bin_cmd!("capsite-cli");
    cmd.args(["solve", "--case"])
        .arg(tmp.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("gurobi"));
}

use anyhow::{Context, Result};
use capsite_algo::solve_placement;
use capsite_cli::CaseArgs;
use capsite_io::{export_result, load_case_dir, load_config, ResultSummary};
use std::io::{self, Write};
use std::path::Path;
use std::time::Duration;
use tabwriter::TabWriter;
use tracing::{info, warn};

pub fn handle(
    case: &CaseArgs,
    out: Option<&Path>,
    time_limit: Option<f64>,
    max_placements: Option<usize>,
    json: bool,
) -> Result<()> {
    let config = load_config(&case.config)?;
    let mut feeder = load_case_dir(&case.case, &config)?;
    if let Some(y) = max_placements {
        feeder = feeder.with_max_placements(y);
    }

    let mut solve_config = config.solve_config()?;
    if let Some(seconds) = time_limit {
        anyhow::ensure!(
            seconds.is_finite() && seconds >= 0.0,
            "--time-limit must be a non-negative number of seconds, got {seconds}"
        );
        solve_config = solve_config.with_time_limit(Duration::from_secs_f64(seconds));
    }

    let stats = feeder.stats();
    info!(
        buses = stats.num_buses,
        branches = stats.num_branches,
        periods = stats.num_periods,
        capacitors = stats.num_capacitor_options,
        "feeder loaded"
    );

    let backend = config.solver_choice()?.backend();
    let result = solve_placement(&feeder, backend.as_ref(), &solve_config)
        .context("solving capacitor placement")?;
    if !result.has_solution() {
        warn!(status = %result.status, "no feasible placement found");
    }

    if let Some(dir) = out {
        export_result(&result, dir)?;
    }

    if json {
        let summary = ResultSummary::from_result(&result);
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serializing summary")?
        );
        return Ok(());
    }

    print!("{}", result.summary());
    if let Some(gap) = result.max_relaxation_gap() {
        info!(max_relaxation_gap = gap, "conic relaxation check");
    }
    if !result.installed.is_empty() {
        let mut writer = TabWriter::new(io::stdout());
        writeln!(writer, "\nBUS\tNAME\tCAPACITOR\tTYPE\tKVAR\tANNUAL COST")?;
        for cap in &result.installed {
            writeln!(
                writer,
                "{}\t{}\t{}\t{}\t{:.1}\t{:.2}",
                cap.bus, cap.bus_name, cap.capacitor, cap.kind, cap.size_kvar, cap.annual_cost
            )?;
        }
        writer.flush()?;
    }
    Ok(())
}

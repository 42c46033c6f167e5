use anyhow::Result;
use capsite_algo::batch::write_batch_manifest;
use capsite_algo::{run_scenarios, BatchManifest};
use capsite_cli::CaseArgs;
use capsite_io::{load_case_dir, load_config, load_scenario_set, resolve_scenarios};
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tracing::info;

pub fn handle(case: &CaseArgs, spec: &Path, out: &Path, threads: usize) -> Result<()> {
    let config = load_config(&case.config)?;
    let feeder = load_case_dir(&case.case, &config)?;
    let scenarios = resolve_scenarios(&load_scenario_set(spec)?)?;
    let solve_config = config.solve_config()?;
    let backend = config.solver_choice()?.backend();

    let summary = run_scenarios(&feeder, &scenarios, backend.as_ref(), &solve_config, threads)?;
    let manifest = BatchManifest::from_summary(backend.id(), &summary);
    write_batch_manifest(out, &manifest)?;
    info!(
        success = summary.success,
        failure = summary.failure,
        manifest = %out.display(),
        "scenario batch finished"
    );

    let mut writer = TabWriter::new(io::stdout());
    writeln!(writer, "SCENARIO\tY\tLOAD\tSTATUS\tTOTAL COST\tINSTALLED")?;
    for record in &manifest.scenarios {
        let status = match (&record.solve_status, &record.error) {
            (Some(status), _) => status.to_string(),
            (None, Some(_)) => "error".to_string(),
            (None, None) => record.status.clone(),
        };
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}",
            record.scenario_id,
            record.max_placements,
            record.type_load,
            status,
            record
                .objective
                .map_or_else(|| "-".to_string(), |v| format!("{v:.2}")),
            if record.installed.is_empty() {
                "-".to_string()
            } else {
                record.installed.join(" ")
            }
        )?;
    }
    writer.flush()?;
    println!(
        "{} succeeded, {} failed; manifest written to {}",
        summary.success,
        summary.failure,
        out.display()
    );
    Ok(())
}

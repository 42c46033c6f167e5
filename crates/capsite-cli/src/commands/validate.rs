use anyhow::{bail, Context, Result};
use capsite_cli::CaseArgs;
use capsite_core::diagnostics::Severity;
use capsite_core::TopologyIndex;
use capsite_io::{case_builder, load_config, CaseFiles};
use std::io::{self, Write};
use tabwriter::TabWriter;

pub fn handle(case: &CaseArgs) -> Result<()> {
    let config = load_config(&case.config)?;
    let builder = case_builder(&CaseFiles::in_dir(&case.case), &config)?;

    let diag = builder.diagnose();
    if !diag.is_empty() {
        let mut writer = TabWriter::new(io::stdout());
        writeln!(writer, "SEVERITY\tCATEGORY\tENTITY\tMESSAGE")?;
        for issue in &diag.issues {
            let severity = match issue.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
            };
            writeln!(
                writer,
                "{}\t{}\t{}\t{}",
                severity, issue.category, issue.entity, issue.message
            )?;
        }
        writer.flush()?;
    }
    println!("{}", diag.summary());
    if diag.has_errors() {
        bail!("case '{}' failed validation: {}", case.case.display(), diag.summary());
    }

    let feeder = builder.build().context("building feeder")?;
    let topology = TopologyIndex::build(&feeder).context("checking radial topology")?;
    let stats = feeder.stats();
    println!(
        "Radial feeder: {} buses, {} branches, {} periods, {} capacitor options (max depth {})",
        stats.num_buses,
        stats.num_branches,
        stats.num_periods,
        stats.num_capacitor_options,
        topology
            .bfs_order()
            .iter()
            .map(|&bus| topology.depth(bus))
            .max()
            .unwrap_or(0)
    );
    println!(
        "Peak load: {:.1} kW / {:.1} kVAr on {} load buses",
        stats.peak_load_kw, stats.peak_load_kvar, stats.num_load_buses
    );
    Ok(())
}

use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Shunt capacitor placement on radial distribution feeders", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info", global = true)]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

/// Case inputs shared by every command
#[derive(clap::Args, Debug, Clone)]
pub struct CaseArgs {
    /// Case directory holding bus.csv, line.csv, loadprofile.csv and capacitor.csv
    #[arg(long, value_hint = ValueHint::DirPath)]
    pub case: PathBuf,
    /// Planner configuration (.json, .toml, .yaml)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Solve the capacitor placement problem for one case
    Solve {
        #[command(flatten)]
        case: CaseArgs,
        /// Directory for the exported tables and summary.json
        #[arg(short, long, value_hint = ValueHint::DirPath)]
        out: Option<PathBuf>,
        /// Override solver_options.time_limit_seconds
        #[arg(long)]
        time_limit: Option<f64>,
        /// Override economic_parameters.Y (maximum number of placements)
        #[arg(long)]
        max_placements: Option<usize>,
        /// Print the summary as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Check case tables and configuration without solving
    Validate {
        #[command(flatten)]
        case: CaseArgs,
    },
    /// Solve a set of what-if scenarios in parallel
    Scenarios {
        #[command(flatten)]
        case: CaseArgs,
        /// Scenario-set file (.yaml or .json)
        #[arg(long, value_hint = ValueHint::FilePath)]
        spec: PathBuf,
        /// Path of the JSON batch manifest
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: PathBuf,
        /// Worker threads (0 = one per CPU)
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
}

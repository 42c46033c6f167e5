use capsite_cli::{Cli, Commands};
use clap::Parser;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

mod commands;

fn main() {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install log subscriber: {err}");
    }

    let result = match &cli.command {
        Commands::Solve {
            case,
            out,
            time_limit,
            max_placements,
            json,
        } => commands::solve::handle(case, out.as_deref(), *time_limit, *max_placements, *json),
        Commands::Validate { case } => commands::validate::handle(case),
        Commands::Scenarios {
            case,
            spec,
            out,
            threads,
        } => commands::scenarios::handle(case, spec, out, *threads),
    };

    if let Err(err) = result {
        error!("{:#}", err);
        std::process::exit(1);
    }
}

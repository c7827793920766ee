use anyhow::Result;
use clap::Parser;
use psa_cli::{Cli, Commands, PsaConfig};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

mod commands;

use commands::pf::PfArgs;
use commands::{inspect, pf, populate, validate};

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match PsaConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            return ExitCode::from(2);
        }
    };
    let level = match cli.log_level {
        Some(level) => level,
        None => match config.logging.tracing_level() {
            Ok(level) => level,
            Err(err) => {
                eprintln!("Error: {:#}", err);
                return ExitCode::from(2);
            }
        },
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("setting default subscriber failed: {}", err);
    }

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, config: &PsaConfig) -> Result<()> {
    let db = cli.db.as_path();
    match &cli.command {
        Commands::Populate { fixture } => {
            info!("Populating {}", db.display());
            populate::handle(db, fixture.as_deref())
        }
        Commands::Inspect { format } => inspect::handle(db, config, *format),
        Commands::Validate { format } => validate::handle(db, config, *format),
        Commands::Pf {
            accept_findings,
            format,
            out,
            linear_solver,
        } => pf::handle(
            db,
            config,
            PfArgs {
                accept_findings: *accept_findings,
                format: *format,
                out: out.as_deref(),
                linear_solver: linear_solver.as_deref(),
            },
        ),
    }
}

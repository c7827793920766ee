use clap::{Parser, Subcommand, ValueEnum, ValueHint};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "psa", author, version, about = "Transmission grid power-flow analysis", long_about = None)]
pub struct Cli {
    /// Set the logging level (overrides `[logging] level` in the config file)
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    /// Path to a psa.toml configuration file
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    /// SQLite database holding the grid
    #[arg(long, global = true, default_value = "power_grid.db", value_hint = ValueHint::FilePath)]
    pub db: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the schema and insert a grid description
    Populate {
        /// JSON fixture to insert instead of the built-in sample grid
        #[arg(long, value_hint = ValueHint::FilePath)]
        fixture: Option<PathBuf>,
    },
    /// Load the grid and print its composition
    Inspect {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Run the plausibility checks without solving
    Validate {
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Validate, initialize and solve the AC power flow
    Pf {
        /// Continue past plausibility findings without asking
        #[arg(long)]
        accept_findings: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        /// Also write the result tables as JSON to this file
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        out: Option<PathBuf>,
        /// Linear solver for the Newton steps (gauss, faer)
        #[arg(long)]
        linear_solver: Option<String>,
    },
}

/// How a command prints its result on stdout
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text tables
    #[default]
    Table,
    /// A single JSON document
    Json,
}

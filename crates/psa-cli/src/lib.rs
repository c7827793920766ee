pub mod cli;
pub mod config;

pub use cli::{Cli, Commands, OutputFormat};
pub use config::{AnalysisConfig, LoggingConfig, PsaConfig, SolverConfig};

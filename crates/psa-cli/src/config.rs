//! Configuration for the `psa` binary.
//!
//! Every section is optional; a missing file or section falls back to the
//! library defaults.

use anyhow::{Context, Result};
use psa_algo::{InitConfig, NewtonRaphsonSolver, ValidationLimits};
use psa_core::SolverKind;
use psa_io::LoaderOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PsaConfig {
    /// Constants used while building the network from the store
    #[serde(default)]
    pub loader: LoaderOptions,
    /// Plausibility thresholds
    #[serde(default)]
    pub validation: ValidationLimits,
    /// Starting operating point
    #[serde(default)]
    pub initialization: InitConfig,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Newton-Raphson settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverConfig {
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// System MVA base
    #[serde(default = "default_base_mva")]
    pub base_mva: f64,
    #[serde(default)]
    pub linear_solver: SolverKind,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            base_mva: default_base_mva(),
            linear_solver: SolverKind::default(),
        }
    }
}

fn default_tolerance() -> f64 {
    1e-6
}

fn default_max_iterations() -> usize {
    20
}

fn default_base_mva() -> f64 {
    100.0
}

impl SolverConfig {
    pub fn build_solver(&self) -> NewtonRaphsonSolver {
        NewtonRaphsonSolver::new()
            .with_tolerance(self.tolerance)
            .with_max_iterations(self.max_iterations)
            .with_base_mva(self.base_mva)
            .with_linear_solver(self.linear_solver)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    pub fn tracing_level(&self) -> Result<tracing::Level> {
        self.level
            .parse()
            .with_context(|| format!("invalid [logging] level '{}'", self.level))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Solve even when validation reports findings
    #[serde(default)]
    pub accept_findings: bool,
}

impl PsaConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read `path` when given; otherwise use the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::from_toml_str(&contents)
            .with_context(|| format!("invalid config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psa_core::Technology;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PsaConfig::from_toml_str("").unwrap();
        assert_eq!(config, PsaConfig::default());
        assert_eq!(config.loader.transformer_x_pu, 0.1);
        assert_eq!(config.solver.max_iterations, 20);
        assert!(!config.analysis.accept_findings);
    }

    #[test]
    fn sections_override_single_fields() {
        let config = PsaConfig::from_toml_str(
            r#"
            [solver]
            linear_solver = "faer"
            tolerance = 1e-8

            [initialization]
            slack_voltage_pu = 1.05

            [initialization.capacity_factors]
            solar = 0.2

            [validation]
            tap_max = 1.2

            [logging]
            level = "debug"

            [analysis]
            accept_findings = true
            "#,
        )
        .unwrap();

        assert_eq!(config.solver.linear_solver, SolverKind::Faer);
        assert_eq!(config.solver.tolerance, 1e-8);
        assert_eq!(config.solver.base_mva, 100.0);
        assert_eq!(config.initialization.slack_voltage_pu, 1.05);
        assert_eq!(config.initialization.bus_voltage_pu, 1.0);
        assert_eq!(
            config.initialization.capacity_factors.get(&Technology::Solar),
            Some(&0.2)
        );
        assert_eq!(config.validation.tap_max, 1.2);
        assert_eq!(config.validation.tap_min, 0.9);
        assert_eq!(config.logging.tracing_level().unwrap(), tracing::Level::DEBUG);
        assert!(config.analysis.accept_findings);
    }

    #[test]
    fn solver_settings_reach_the_solver() {
        let solver = SolverConfig {
            max_iterations: 7,
            ..SolverConfig::default()
        }
        .build_solver();
        assert_eq!(solver.max_iterations, 7);
        assert_eq!(solver.linear_solver, SolverKind::Gauss);
    }

    #[test]
    fn bad_level_is_reported() {
        let logging = LoggingConfig {
            level: "loud".into(),
        };
        assert!(logging.tracing_level().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(PsaConfig::load(Some(Path::new("/nonexistent/psa.toml"))).is_err());
        assert!(PsaConfig::load(None).is_ok());
    }
}

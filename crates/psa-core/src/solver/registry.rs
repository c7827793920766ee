use std::str::FromStr;
use std::sync::Arc;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use super::backend::{FaerSolver, GaussSolver, LinearSystemBackend};

/// Dense linear-system backends selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolverKind {
    #[default]
    Gauss,
    Faer,
}

impl SolverKind {
    pub fn build_backend(self) -> Arc<dyn LinearSystemBackend> {
        match self {
            SolverKind::Gauss => Arc::new(GaussSolver),
            SolverKind::Faer => Arc::new(FaerSolver),
        }
    }

    pub fn available() -> &'static [&'static str] {
        &["gauss", "faer"]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SolverKind::Gauss => "gauss",
            SolverKind::Faer => "faer",
        }
    }
}

impl FromStr for SolverKind {
    type Err = anyhow::Error;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_ascii_lowercase().as_str() {
            "gauss" | "default" => Ok(SolverKind::Gauss),
            "faer" => Ok(SolverKind::Faer),
            other => Err(anyhow!(
                "unknown linear solver '{}'; supported values: {}",
                other,
                SolverKind::available().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solver_kind_parsing_supports_all_engines() {
        assert_eq!("gauss".parse::<SolverKind>().unwrap(), SolverKind::Gauss);
        assert_eq!("FAER".parse::<SolverKind>().unwrap(), SolverKind::Faer);
        assert!("cholesky".parse::<SolverKind>().is_err());
    }

    #[test]
    fn both_backends_solve_the_same_system() {
        let matrix = vec![
            vec![4.0, -1.0, 0.0],
            vec![-1.0, 4.0, -1.0],
            vec![0.0, -1.0, 4.0],
        ];
        let rhs = vec![2.0, 4.0, 10.0];

        let gauss = SolverKind::Gauss.build_backend().solve(&matrix, &rhs).unwrap();
        let faer = SolverKind::Faer.build_backend().solve(&matrix, &rhs).unwrap();
        for (a, b) in gauss.iter().zip(faer.iter()) {
            assert!((a - b).abs() < 1e-10);
        }
        assert!((gauss[0] - 1.0).abs() < 1e-10);
        assert!((gauss[1] - 2.0).abs() < 1e-10);
        assert!((gauss[2] - 3.0).abs() < 1e-10);
    }
}

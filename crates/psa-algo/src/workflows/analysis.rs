//! Validate, decide, initialize, solve and extract in one call.
//!
//! ```ignore
//! let workflow = AnalysisWorkflow::new(Box::new(NewtonRaphsonSolver::new()));
//! match workflow.run(&mut network, |findings| findings.len() < 3)? {
//!     AnalysisOutcome::Completed { results, .. } => print(results),
//!     AnalysisOutcome::Declined { findings } => report(findings),
//! }
//! ```

use psa_core::{Findings, Network, PowerFlowSolver, PsaResult};
use tracing::info;

use crate::initializer::{InitConfig, InitReport, OperatingPointInitializer};
use crate::orchestrator::{PowerFlowResults, SolveOrchestrator};
use crate::validation::{validate, ValidationLimits};

/// How an analysis run ended
#[derive(Debug, Clone)]
pub enum AnalysisOutcome {
    Completed {
        findings: Findings,
        init: InitReport,
        results: PowerFlowResults,
    },
    /// The decision callback rejected the findings; the network is untouched
    Declined { findings: Findings },
}

impl AnalysisOutcome {
    pub fn findings(&self) -> &Findings {
        match self {
            AnalysisOutcome::Completed { findings, .. } => findings,
            AnalysisOutcome::Declined { findings } => findings,
        }
    }

    pub fn results(&self) -> Option<&PowerFlowResults> {
        match self {
            AnalysisOutcome::Completed { results, .. } => Some(results),
            AnalysisOutcome::Declined { .. } => None,
        }
    }
}

/// Fluent builder for a single-snapshot analysis run
pub struct AnalysisWorkflow {
    limits: ValidationLimits,
    initializer: OperatingPointInitializer,
    orchestrator: SolveOrchestrator,
}

impl AnalysisWorkflow {
    pub fn new(solver: Box<dyn PowerFlowSolver>) -> Self {
        Self {
            limits: ValidationLimits::default(),
            initializer: OperatingPointInitializer::default(),
            orchestrator: SolveOrchestrator::new(solver),
        }
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_init_config(mut self, config: InitConfig) -> Self {
        self.initializer = OperatingPointInitializer::new(config);
        self
    }

    /// Run every stage on `network`.
    ///
    /// `proceed` is asked only when validation produced findings; returning
    /// `false` stops the run before the network is modified.
    pub fn run<F>(&self, network: &mut Network, proceed: F) -> PsaResult<AnalysisOutcome>
    where
        F: FnOnce(&Findings) -> bool,
    {
        let findings = validate(network, &self.limits);
        if !findings.is_empty() && !proceed(&findings) {
            info!("analysis declined after {}", findings.summary().to_lowercase());
            return Ok(AnalysisOutcome::Declined { findings });
        }

        let init = self.initializer.initialize(network)?;
        let results = self.orchestrator.run(network)?;
        Ok(AnalysisOutcome::Completed {
            findings,
            init,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::power_flow::NewtonRaphsonSolver;
    use psa_core::{Bus, BusId, ControlMode, Gen, GenId, Line, LineId, Node, PsaError};

    fn network(v_nom_kv: f64) -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(1), "A", v_nom_kv)).unwrap();
        network.add_bus(Bus::new(BusId::new(2), "B", v_nom_kv)).unwrap();
        network
            .add_line(Line::from_per_km(
                LineId::new(0),
                "AB",
                BusId::new(1),
                BusId::new(2),
                10.0,
                0.1,
                0.3,
                100.0,
            ))
            .unwrap();
        network
            .add_injection(Node::Gen(Gen::new(
                GenId::new(0),
                "G",
                BusId::new(1),
                ControlMode::Slack,
            )))
            .unwrap();
        network
    }

    #[test]
    fn clean_network_never_asks() {
        let workflow = AnalysisWorkflow::new(Box::new(NewtonRaphsonSolver::new()));
        let mut net = network(110.0);
        let outcome = workflow
            .run(&mut net, |_| panic!("no findings expected"))
            .unwrap();
        assert!(outcome.findings().is_empty());
        assert!(outcome.results().is_some());
    }

    #[test]
    fn declining_leaves_network_untouched() {
        let workflow = AnalysisWorkflow::new(Box::new(NewtonRaphsonSolver::new()));
        let mut net = network(150.0);
        let outcome = workflow.run(&mut net, |_| false).unwrap();
        assert!(matches!(outcome, AnalysisOutcome::Declined { .. }));
        assert_eq!(outcome.findings().len(), 2);
        assert_eq!(net.generator("G").unwrap().v_mag_pu_set, None);
    }

    #[test]
    fn accepting_findings_runs_to_completion() {
        let workflow = AnalysisWorkflow::new(Box::new(NewtonRaphsonSolver::new()));
        let mut net = network(150.0);
        let outcome = workflow.run(&mut net, |_| true).unwrap();
        let results = outcome.results().unwrap();
        assert!((results.buses["A"].v_mag_pu - 1.02).abs() < 1e-9);
    }

    #[test]
    fn missing_slack_stops_before_solving() {
        let workflow = AnalysisWorkflow::new(Box::new(NewtonRaphsonSolver::new()));
        let mut net = network(110.0);
        for node in net.graph.node_weights_mut() {
            if let Node::Gen(gen) = node {
                gen.control = ControlMode::PQ;
            }
        }
        assert!(matches!(
            workflow.run(&mut net, |_| true),
            Err(PsaError::MissingSlack)
        ));
    }
}

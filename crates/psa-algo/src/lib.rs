//! Analysis stages run on a loaded [`psa_core::Network`].
//!
//! ```text
//! validate ──▶ (caller decides) ──▶ initialize ──▶ solve ──▶ extract
//! ```
//!
//! - [`validation`]: advisory plausibility findings, never fatal
//! - [`initializer`]: deterministic starting operating point
//! - [`power_flow`]: Newton-Raphson AC power flow
//! - [`orchestrator`]: solver invocation and result tables
//! - [`workflows`]: the full pipeline behind one call

pub mod initializer;
pub mod orchestrator;
pub mod power_flow;
pub mod validation;
pub mod workflows;

pub use initializer::{InitConfig, InitReport, OperatingPointInitializer};
pub use orchestrator::{PowerFlowResults, SolveOrchestrator};
pub use power_flow::NewtonRaphsonSolver;
pub use validation::{validate, ValidationLimits};
pub use workflows::{AnalysisOutcome, AnalysisWorkflow};

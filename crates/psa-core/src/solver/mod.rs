//! Power-flow solver boundary.
//!
//! The analysis pipeline only depends on [`PowerFlowSolver`]. A solver
//! receives the initialized network (which carries its snapshot) and returns
//! an [`OperatingPoint`], or an error carrying its diagnostic message.

use std::collections::BTreeMap;

use anyhow::Result;
use serde::Serialize;

use crate::{BusId, ComponentRef, GenId, Network};

pub mod backend;
pub mod registry;

pub use backend::{FaerSolver, GaussSolver, LinearSystemBackend};
pub use registry::SolverKind;

/// Steady-state AC power-flow solver.
pub trait PowerFlowSolver {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Solve the network at its snapshot.
    ///
    /// Returning `Ok` with `converged == false` is treated as divergence by
    /// the caller.
    fn solve(&self, network: &Network) -> Result<OperatingPoint>;
}

/// Complex bus voltage in polar form
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BusVoltage {
    pub v_mag_pu: f64,
    pub v_ang_rad: f64,
}

/// Active and reactive output of one generator or compensator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenDispatch {
    pub p_mw: f64,
    pub q_mvar: f64,
}

/// Power flow through an AC branch, measured at both terminals
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchFlow {
    pub component: ComponentRef,
    /// Flow leaving the from-bus
    pub p0_mw: f64,
    pub q0_mvar: f64,
    /// Flow leaving the to-bus
    pub p1_mw: f64,
    pub q1_mvar: f64,
}

impl BranchFlow {
    pub fn losses_mw(&self) -> f64 {
        self.p0_mw + self.p1_mw
    }
}

/// Solver output for one snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperatingPoint {
    pub converged: bool,
    pub iterations: usize,
    /// Largest absolute power mismatch at termination (p.u.)
    pub max_mismatch: f64,
    pub bus_voltages: BTreeMap<BusId, BusVoltage>,
    pub dispatch: BTreeMap<GenId, GenDispatch>,
    pub branch_flows: Vec<BranchFlow>,
}

//! Solver invocation and result extraction.

use std::collections::BTreeMap;

use psa_core::{
    ComponentKind, Network, OperatingPoint, PowerFlowSolver, PsaError, PsaResult, Snapshot,
    StorageUnit,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BusResult {
    pub v_mag_pu: f64,
    pub v_ang_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeneratorResult {
    pub p_mw: f64,
    pub q_mvar: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompensatorResult {
    pub q_mvar: f64,
}

/// Flow on a line or transformer; `p1_mw` is measured leaving the to-bus
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BranchResult {
    pub p0_mw: f64,
    pub q0_mvar: f64,
    pub p1_mw: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StorageResult {
    /// Positive when dispatching into the grid
    pub p_mw: f64,
    pub state_of_charge_mwh: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinkResult {
    /// Power withdrawn at the from-bus
    pub p0_mw: f64,
    /// Power withdrawn at the to-bus (negative when delivering)
    pub p1_mw: f64,
}

/// Per-component result tables for one snapshot, keyed by component name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PowerFlowResults {
    pub snapshot: Snapshot,
    pub iterations: usize,
    pub max_mismatch: f64,
    pub buses: BTreeMap<String, BusResult>,
    pub generators: BTreeMap<String, GeneratorResult>,
    pub compensators: BTreeMap<String, CompensatorResult>,
    pub lines: BTreeMap<String, BranchResult>,
    pub transformers: BTreeMap<String, BranchResult>,
    pub storage_units: BTreeMap<String, StorageResult>,
    pub links: BTreeMap<String, LinkResult>,
}

impl PowerFlowResults {
    pub fn total_generation_mw(&self) -> f64 {
        self.generators.values().map(|g| g.p_mw).sum()
    }

    /// Active losses on AC branches
    pub fn branch_losses_mw(&self) -> f64 {
        self.lines
            .values()
            .chain(self.transformers.values())
            .map(|b| b.p0_mw + b.p1_mw)
            .sum()
    }
}

/// State of charge after one hour at `p_mw`, clamped to the energy capacity.
pub fn state_of_charge_after(storage: &StorageUnit, p_mw: f64) -> f64 {
    let dispatched = p_mw.max(0.0);
    let charged = p_mw.min(0.0);
    let soc = storage.state_of_charge_initial_mwh - dispatched / storage.efficiency_dispatch
        - charged * storage.efficiency_store;
    soc.clamp(0.0, storage.energy_capacity_mwh().max(0.0))
}

/// Runs a solver on an initialized network and extracts result tables.
pub struct SolveOrchestrator {
    solver: Box<dyn PowerFlowSolver>,
}

impl SolveOrchestrator {
    pub fn new(solver: Box<dyn PowerFlowSolver>) -> Self {
        Self { solver }
    }

    pub fn solver_name(&self) -> &str {
        self.solver.name()
    }

    /// Solve once. A solver error or a non-converged result becomes
    /// [`PsaError::PowerFlowDiverged`] and nothing is extracted.
    pub fn run(&self, network: &Network) -> PsaResult<PowerFlowResults> {
        info!(
            "solving power flow with {} at {}",
            self.solver.name(),
            network.snapshot
        );
        let point = self.solver.solve(network).map_err(|err| {
            warn!("{} failed: {:#}", self.solver.name(), err);
            PsaError::PowerFlowDiverged(format!("{:#}", err))
        })?;
        if !point.converged {
            return Err(PsaError::PowerFlowDiverged(format!(
                "no convergence after {} iterations (max mismatch {:.3e} p.u.)",
                point.iterations, point.max_mismatch
            )));
        }
        info!(
            "power flow converged in {} iterations (max mismatch {:.3e} p.u.)",
            point.iterations, point.max_mismatch
        );
        extract(network, &point)
    }
}

fn extract(network: &Network, point: &OperatingPoint) -> PsaResult<PowerFlowResults> {
    let mut results = PowerFlowResults {
        snapshot: network.snapshot,
        iterations: point.iterations,
        max_mismatch: point.max_mismatch,
        buses: BTreeMap::new(),
        generators: BTreeMap::new(),
        compensators: BTreeMap::new(),
        lines: BTreeMap::new(),
        transformers: BTreeMap::new(),
        storage_units: BTreeMap::new(),
        links: BTreeMap::new(),
    };

    for bus in network.buses() {
        let voltage = point.bus_voltages.get(&bus.id).ok_or_else(|| {
            PsaError::PowerFlowDiverged(format!("solver returned no voltage for bus {}", bus.name))
        })?;
        results.buses.insert(
            bus.name.clone(),
            BusResult {
                v_mag_pu: voltage.v_mag_pu,
                v_ang_deg: voltage.v_ang_rad.to_degrees(),
            },
        );
    }

    for gen in network.generators() {
        let dispatch = point.dispatch.get(&gen.id).ok_or_else(|| {
            PsaError::PowerFlowDiverged(format!("solver returned no dispatch for {}", gen.name))
        })?;
        if gen.is_compensator() {
            results.compensators.insert(
                gen.name.clone(),
                CompensatorResult {
                    q_mvar: dispatch.q_mvar,
                },
            );
        } else {
            results.generators.insert(
                gen.name.clone(),
                GeneratorResult {
                    p_mw: dispatch.p_mw,
                    q_mvar: dispatch.q_mvar,
                },
            );
        }
    }

    for flow in &point.branch_flows {
        let row = BranchResult {
            p0_mw: flow.p0_mw,
            q0_mvar: flow.q0_mvar,
            p1_mw: flow.p1_mw,
        };
        match flow.component.kind {
            ComponentKind::Line => {
                results.lines.insert(flow.component.name.clone(), row);
            }
            ComponentKind::Transformer => {
                results.transformers.insert(flow.component.name.clone(), row);
            }
            _ => {}
        }
    }

    for storage in network.storage_units() {
        results.storage_units.insert(
            storage.name.clone(),
            StorageResult {
                p_mw: storage.p_set_mw,
                state_of_charge_mwh: state_of_charge_after(storage, storage.p_set_mw),
            },
        );
    }

    for link in network.links() {
        results.links.insert(
            link.name.clone(),
            LinkResult {
                p0_mw: link.p_set_mw,
                p1_mw: -link.p_set_mw * link.efficiency,
            },
        );
    }

    Ok(results)
}

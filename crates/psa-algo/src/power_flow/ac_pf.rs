//! # Newton-Raphson AC Power Flow
//!
//! Dense polar-form Newton-Raphson on the bus admittance matrix.
//!
//! ## Bus classification
//!
//! ```text
//! ┌───────────┬──────────────────┬──────────────┬──────────────────────────┐
//! │ BUS TYPE  │ SPECIFIED        │ CALCULATED   │ SOURCE                   │
//! │───────────│──────────────────│──────────────│──────────────────────────│
//! │ SLACK     │ |V|, θ = 0       │ P, Q         │ the Slack-mode generator │
//! │ PV        │ P, |V|           │ Q, θ         │ PV-mode generators       │
//! │ PQ        │ P, Q             │ |V|, θ       │ every other bus          │
//! └───────────┴──────────────────┴──────────────┴──────────────────────────┘
//! ```
//!
//! ## Per-unit conversion
//!
//! - Lines carry absolute impedance in Ω; they are divided by
//!   `Z_base = kV² / base_mva` using the from-bus nominal voltage.
//! - Transformers carry p.u. on their own rating; they are rescaled by
//!   `base_mva / s_nom`. The off-nominal tap and phase shift sit on the
//!   from side: `t = tap · e^{jφ}`.
//!
//! ## Injections
//!
//! Generators, loads, storage units and links are fixed P/Q injections.
//! A link withdraws `p_set` at its from-bus and delivers `p_set · η` at its
//! to-bus. Results for the slack generator (P and Q) and for PV generators
//! (Q) are the bus injection left after subtracting every fixed injection.

use std::collections::HashMap;

use anyhow::{anyhow, bail, Result};
use num_complex::Complex64;
use psa_core::{
    BranchFlow, BusId, BusVoltage, ComponentKind, ComponentRef, ControlMode, GenDispatch,
    LinearSystemBackend, Network, OperatingPoint, PowerFlowSolver, SolverKind,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusType {
    Slack,
    PV,
    PQ,
}

/// Series branch in per-unit on the system base
struct BranchModel {
    component: ComponentRef,
    from: usize,
    to: usize,
    /// `None` for zero-impedance branches, which are left out of the Y-bus
    y_series: Option<Complex64>,
    tap: Complex64,
}

/// Everything the iteration needs, indexed by bus position
struct SystemModel {
    bus_ids: Vec<BusId>,
    bus_types: Vec<BusType>,
    v_init: Vec<f64>,
    /// Fixed injections excluding voltage-controlling generator outputs (MW / Mvar)
    p_fixed_mw: Vec<f64>,
    q_fixed_mvar: Vec<f64>,
    branches: Vec<BranchModel>,
}

struct NrOutcome {
    converged: bool,
    iterations: usize,
    max_mismatch: f64,
}

/// Newton-Raphson AC power flow solver
#[derive(Debug, Clone)]
pub struct NewtonRaphsonSolver {
    /// Convergence tolerance on the largest power mismatch (p.u.)
    pub tolerance: f64,
    pub max_iterations: usize,
    /// System MVA base for per-unit conversion
    pub base_mva: f64,
    /// Linear solver used for each Newton step
    pub linear_solver: SolverKind,
}

impl Default for NewtonRaphsonSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl NewtonRaphsonSolver {
    pub fn new() -> Self {
        Self {
            tolerance: 1e-6,
            max_iterations: 20,
            base_mva: 100.0,
            linear_solver: SolverKind::default(),
        }
    }

    pub fn with_tolerance(mut self, tol: f64) -> Self {
        self.tolerance = tol;
        self
    }

    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    pub fn with_base_mva(mut self, base_mva: f64) -> Self {
        self.base_mva = base_mva;
        self
    }

    pub fn with_linear_solver(mut self, kind: SolverKind) -> Self {
        self.linear_solver = kind;
        self
    }

    fn build_model(&self, network: &Network) -> Result<SystemModel> {
        if self.base_mva <= 0.0 {
            bail!("system base must be positive, got {} MVA", self.base_mva);
        }
        let buses = network.buses();
        if buses.is_empty() {
            bail!("network has no buses");
        }
        let index: HashMap<BusId, usize> =
            buses.iter().enumerate().map(|(i, b)| (b.id, i)).collect();
        let position = |id: BusId| -> Result<usize> {
            index
                .get(&id)
                .copied()
                .ok_or_else(|| anyhow!("unknown bus id {}", id))
        };

        let n = buses.len();
        let mut bus_types = vec![BusType::PQ; n];
        let mut v_init: Vec<f64> = buses.iter().map(|b| b.v_mag_pu_set).collect();
        let mut p_fixed_mw = vec![0.0; n];
        let mut q_fixed_mvar = vec![0.0; n];

        let slacks: Vec<_> = network
            .generators()
            .into_iter()
            .filter(|g| g.control == ControlMode::Slack)
            .collect();
        match slacks.as_slice() {
            [] => bail!("no Slack-mode generator"),
            [slack] => {
                let i = position(slack.bus)?;
                bus_types[i] = BusType::Slack;
                v_init[i] = slack.v_mag_pu_set.unwrap_or(v_init[i]);
            }
            many => bail!("{} Slack-mode generators; exactly one is required", many.len()),
        }

        for gen in network.generators() {
            let i = position(gen.bus)?;
            match gen.control {
                ControlMode::Slack => {}
                ControlMode::PV => {
                    p_fixed_mw[i] += gen.p_set_mw;
                    if bus_types[i] == BusType::PQ {
                        bus_types[i] = BusType::PV;
                        v_init[i] = gen.v_mag_pu_set.unwrap_or(v_init[i]);
                    }
                }
                ControlMode::PQ => {
                    p_fixed_mw[i] += gen.p_set_mw;
                    q_fixed_mvar[i] += gen.q_set_mvar;
                }
            }
        }
        for load in network.loads() {
            let i = position(load.bus)?;
            p_fixed_mw[i] -= load.p_set_mw;
            q_fixed_mvar[i] -= load.q_set_mvar;
        }
        for storage in network.storage_units() {
            p_fixed_mw[position(storage.bus)?] += storage.p_set_mw;
        }
        for link in network.links() {
            p_fixed_mw[position(link.from_bus)?] -= link.p_set_mw;
            p_fixed_mw[position(link.to_bus)?] += link.p_set_mw * link.efficiency;
        }

        let mut branches = Vec::new();
        for line in network.lines() {
            let from = position(line.from_bus)?;
            let kv = buses[from].v_nom_kv;
            if kv <= 0.0 {
                bail!(
                    "line {} starts at bus {} with non-positive nominal voltage",
                    line.name,
                    buses[from].name
                );
            }
            let z_base = kv * kv / self.base_mva;
            branches.push(BranchModel {
                component: ComponentRef::new(ComponentKind::Line, line.name.as_str()),
                from,
                to: position(line.to_bus)?,
                y_series: admittance(line.r_ohm / z_base, line.x_ohm / z_base),
                tap: Complex64::new(1.0, 0.0),
            });
        }
        for tx in network.transformers() {
            if tx.s_nom_mva <= 0.0 {
                bail!("transformer {} has non-positive rating", tx.name);
            }
            let scale = self.base_mva / tx.s_nom_mva;
            let tap_mag = if tx.tap_ratio > 0.0 { tx.tap_ratio } else { 1.0 };
            branches.push(BranchModel {
                component: ComponentRef::new(ComponentKind::Transformer, tx.name.as_str()),
                from: position(tx.from_bus)?,
                to: position(tx.to_bus)?,
                y_series: admittance(tx.r_pu * scale, tx.x_pu * scale),
                tap: Complex64::from_polar(tap_mag, tx.phase_shift_deg.to_radians()),
            });
        }
        for branch in branches.iter().filter(|b| b.y_series.is_none()) {
            warn!("{} has zero impedance and is left out of the admittance matrix", branch.component);
        }

        Ok(SystemModel {
            bus_ids: buses.iter().map(|b| b.id).collect(),
            bus_types,
            v_init,
            p_fixed_mw,
            q_fixed_mvar,
            branches,
        })
    }

    /// Run the Newton iteration in place on `v_mag` / `v_ang`.
    #[allow(clippy::too_many_arguments)]
    fn newton_raphson(
        &self,
        backend: &dyn LinearSystemBackend,
        bus_types: &[BusType],
        y_bus: &[Vec<Complex64>],
        p_spec: &[f64],
        q_spec: &[f64],
        v_mag: &mut [f64],
        v_ang: &mut [f64],
    ) -> Result<NrOutcome> {
        let p_buses: Vec<usize> = (0..bus_types.len())
            .filter(|&i| bus_types[i] != BusType::Slack)
            .collect();
        let q_buses: Vec<usize> = (0..bus_types.len())
            .filter(|&i| bus_types[i] == BusType::PQ)
            .collect();
        let n_p = p_buses.len();

        if n_p + q_buses.len() == 0 {
            return Ok(NrOutcome {
                converged: true,
                iterations: 0,
                max_mismatch: 0.0,
            });
        }

        let mismatch_of = |p_calc: &[f64], q_calc: &[f64]| -> Vec<f64> {
            p_buses
                .iter()
                .map(|&i| p_spec[i] - p_calc[i])
                .chain(q_buses.iter().map(|&i| q_spec[i] - q_calc[i]))
                .collect()
        };
        let largest = |m: &[f64]| m.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));

        for iter in 0..self.max_iterations {
            let (p_calc, q_calc) = bus_injections(y_bus, v_mag, v_ang);
            let mismatch = mismatch_of(&p_calc, &q_calc);
            let max_mismatch = largest(&mismatch);
            debug!("iteration {}: max mismatch {:.3e} p.u.", iter, max_mismatch);

            if !max_mismatch.is_finite() {
                bail!("mismatch became non-finite at iteration {}", iter);
            }
            if max_mismatch < self.tolerance {
                return Ok(NrOutcome {
                    converged: true,
                    iterations: iter,
                    max_mismatch,
                });
            }

            let jacobian = jacobian(y_bus, v_mag, v_ang, &p_calc, &q_calc, &p_buses, &q_buses);
            let delta = backend
                .solve(&jacobian, &mismatch)
                .map_err(|err| anyhow!("Jacobian solve failed at iteration {}: {}", iter, err))?;

            for (k, &i) in p_buses.iter().enumerate() {
                v_ang[i] += delta[k];
            }
            for (k, &i) in q_buses.iter().enumerate() {
                v_mag[i] += delta[n_p + k];
            }
        }

        let (p_calc, q_calc) = bus_injections(y_bus, v_mag, v_ang);
        Ok(NrOutcome {
            converged: false,
            iterations: self.max_iterations,
            max_mismatch: largest(&mismatch_of(&p_calc, &q_calc)),
        })
    }
}

fn admittance(r_pu: f64, x_pu: f64) -> Option<Complex64> {
    let z = Complex64::new(r_pu, x_pu);
    if z.norm_sqr() < 1e-12 {
        None
    } else {
        Some(z.inv())
    }
}

fn build_y_bus(n: usize, branches: &[BranchModel]) -> Vec<Vec<Complex64>> {
    let mut y_bus = vec![vec![Complex64::new(0.0, 0.0); n]; n];
    for branch in branches {
        let Some(y) = branch.y_series else {
            continue;
        };
        let (i, j, t) = (branch.from, branch.to, branch.tap);
        y_bus[i][i] += y / t.norm_sqr();
        y_bus[j][j] += y;
        y_bus[i][j] -= y / t.conj();
        y_bus[j][i] -= y / t;
    }
    y_bus
}

/// P and Q injected at every bus for the given voltages (p.u.)
fn bus_injections(y_bus: &[Vec<Complex64>], v_mag: &[f64], v_ang: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = v_mag.len();
    let mut p = vec![0.0; n];
    let mut q = vec![0.0; n];
    for i in 0..n {
        for j in 0..n {
            let y = y_bus[i][j];
            if y.re == 0.0 && y.im == 0.0 {
                continue;
            }
            let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
            let vv = v_mag[i] * v_mag[j];
            p[i] += vv * (y.re * cos + y.im * sin);
            q[i] += vv * (y.re * sin - y.im * cos);
        }
    }
    (p, q)
}

/// Jacobian of the mismatch equations with respect to `[θ (non-slack), |V| (PQ)]`.
fn jacobian(
    y_bus: &[Vec<Complex64>],
    v_mag: &[f64],
    v_ang: &[f64],
    p_calc: &[f64],
    q_calc: &[f64],
    p_buses: &[usize],
    q_buses: &[usize],
) -> Vec<Vec<f64>> {
    let n_p = p_buses.len();
    let size = n_p + q_buses.len();
    let mut jac = vec![vec![0.0; size]; size];

    // Partial derivatives of P_i and Q_i, returned as (dP/dθj, dP/dVj, dQ/dθj, dQ/dVj)
    let partials = |i: usize, j: usize| -> (f64, f64, f64, f64) {
        let y = y_bus[i][j];
        let (g, b) = (y.re, y.im);
        if i == j {
            let v = v_mag[i];
            (
                -q_calc[i] - b * v * v,
                p_calc[i] / v + g * v,
                p_calc[i] - g * v * v,
                q_calc[i] / v - b * v,
            )
        } else {
            let (sin, cos) = (v_ang[i] - v_ang[j]).sin_cos();
            let along = g * cos + b * sin;
            let across = g * sin - b * cos;
            (
                v_mag[i] * v_mag[j] * across,
                v_mag[i] * along,
                -v_mag[i] * v_mag[j] * along,
                v_mag[i] * across,
            )
        }
    };

    for (row, &i) in p_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jac[row][col] = partials(i, j).0;
        }
        for (col, &j) in q_buses.iter().enumerate() {
            jac[row][n_p + col] = partials(i, j).1;
        }
    }
    for (row, &i) in q_buses.iter().enumerate() {
        for (col, &j) in p_buses.iter().enumerate() {
            jac[n_p + row][col] = partials(i, j).2;
        }
        for (col, &j) in q_buses.iter().enumerate() {
            jac[n_p + row][n_p + col] = partials(i, j).3;
        }
    }
    jac
}

/// Terminal flows of one branch in MW / Mvar
fn branch_flow(branch: &BranchModel, voltages: &[Complex64], base_mva: f64) -> BranchFlow {
    let Some(y) = branch.y_series else {
        return BranchFlow {
            component: branch.component.clone(),
            p0_mw: 0.0,
            q0_mvar: 0.0,
            p1_mw: 0.0,
            q1_mvar: 0.0,
        };
    };
    let (vi, vj, t) = (voltages[branch.from], voltages[branch.to], branch.tap);
    let i_from = y / t.norm_sqr() * vi - y / t.conj() * vj;
    let i_to = y * vj - y / t * vi;
    let s_from = vi * i_from.conj() * base_mva;
    let s_to = vj * i_to.conj() * base_mva;
    BranchFlow {
        component: branch.component.clone(),
        p0_mw: s_from.re,
        q0_mvar: s_from.im,
        p1_mw: s_to.re,
        q1_mvar: s_to.im,
    }
}

impl PowerFlowSolver for NewtonRaphsonSolver {
    fn name(&self) -> &str {
        "newton-raphson"
    }

    fn solve(&self, network: &Network) -> Result<OperatingPoint> {
        let model = self.build_model(network)?;
        let n = model.bus_ids.len();
        let y_bus = build_y_bus(n, &model.branches);

        let p_spec: Vec<f64> = model.p_fixed_mw.iter().map(|p| p / self.base_mva).collect();
        let q_spec: Vec<f64> = model.q_fixed_mvar.iter().map(|q| q / self.base_mva).collect();
        let mut v_mag = model.v_init.clone();
        let mut v_ang = vec![0.0; n];

        let backend = self.linear_solver.build_backend();
        let outcome = self.newton_raphson(
            backend.as_ref(),
            &model.bus_types,
            &y_bus,
            &p_spec,
            &q_spec,
            &mut v_mag,
            &mut v_ang,
        )?;
        if !outcome.converged {
            warn!(
                "Newton-Raphson stopped after {} iterations with mismatch {:.3e} p.u.",
                outcome.iterations, outcome.max_mismatch
            );
        }

        let (p_calc, q_calc) = bus_injections(&y_bus, &v_mag, &v_ang);
        let index: HashMap<BusId, usize> = model
            .bus_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut point = OperatingPoint {
            converged: outcome.converged,
            iterations: outcome.iterations,
            max_mismatch: outcome.max_mismatch,
            ..OperatingPoint::default()
        };
        for (i, id) in model.bus_ids.iter().enumerate() {
            point.bus_voltages.insert(
                *id,
                BusVoltage {
                    v_mag_pu: v_mag[i],
                    v_ang_rad: v_ang[i],
                },
            );
        }

        // Voltage-controlling generators share the residual Q of their bus.
        let mut controllers = vec![0usize; n];
        for gen in network.generators() {
            if gen.control != ControlMode::PQ {
                if let Some(&i) = index.get(&gen.bus) {
                    controllers[i] += 1;
                }
            }
        }
        for gen in network.generators() {
            let Some(&i) = index.get(&gen.bus) else {
                continue;
            };
            let residual_q =
                (q_calc[i] * self.base_mva - model.q_fixed_mvar[i]) / controllers[i].max(1) as f64;
            let dispatch = match gen.control {
                ControlMode::Slack => GenDispatch {
                    p_mw: p_calc[i] * self.base_mva - model.p_fixed_mw[i],
                    q_mvar: residual_q,
                },
                ControlMode::PV => GenDispatch {
                    p_mw: gen.p_set_mw,
                    q_mvar: residual_q,
                },
                ControlMode::PQ => GenDispatch {
                    p_mw: gen.p_set_mw,
                    q_mvar: gen.q_set_mvar,
                },
            };
            point.dispatch.insert(gen.id, dispatch);
        }

        let voltages: Vec<Complex64> = v_mag
            .iter()
            .zip(&v_ang)
            .map(|(&m, &a)| Complex64::from_polar(m, a))
            .collect();
        point.branch_flows = model
            .branches
            .iter()
            .map(|b| branch_flow(b, &voltages, self.base_mva))
            .collect();

        Ok(point)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psa_core::{
        Bus, BusId, Gen, GenId, Line, LineId, Load, LoadId, Node, Transformer, TransformerId,
    };

    /// Slack at bus 1, 50 MW / 10 Mvar load at bus 2, one line between them.
    fn two_bus(r_ohm_per_km: f64) -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(1), "Source", 110.0)).unwrap();
        network.add_bus(Bus::new(BusId::new(2), "Sink", 110.0)).unwrap();
        network
            .add_line(Line::from_per_km(
                LineId::new(0),
                "L12",
                BusId::new(1),
                BusId::new(2),
                10.0,
                r_ohm_per_km,
                0.4,
                200.0,
            ))
            .unwrap();
        let mut slack = Gen::new(GenId::new(0), "Grid", BusId::new(1), ControlMode::Slack);
        slack.v_mag_pu_set = Some(1.0);
        network.add_injection(Node::Gen(slack)).unwrap();
        network
            .add_injection(Node::Load(Load {
                id: LoadId::new(0),
                name: "Town".into(),
                bus: BusId::new(2),
                p_set_mw: 50.0,
                q_set_mvar: 10.0,
            }))
            .unwrap();
        network
    }

    #[test]
    fn lossless_line_balances_exactly() {
        let network = two_bus(0.0);
        let point = NewtonRaphsonSolver::new().solve(&network).unwrap();
        assert!(point.converged);

        let slack = point.dispatch[&GenId::new(0)];
        assert!((slack.p_mw - 50.0).abs() < 1e-3);

        let flow = &point.branch_flows[0];
        assert!((flow.p0_mw - 50.0).abs() < 1e-3);
        assert!((flow.p0_mw + flow.p1_mw).abs() < 1e-3);

        let sink = point.bus_voltages[&BusId::new(2)];
        assert!(sink.v_mag_pu < 1.0);
        assert!(sink.v_ang_rad < 0.0);
    }

    #[test]
    fn resistive_line_has_losses_covered_by_slack() {
        let network = two_bus(0.2);
        let point = NewtonRaphsonSolver::new().solve(&network).unwrap();
        assert!(point.converged);

        let slack = point.dispatch[&GenId::new(0)];
        let flow = &point.branch_flows[0];
        assert!(slack.p_mw > 50.0);
        assert!(flow.losses_mw() > 0.0);
        assert!((slack.p_mw - 50.0 - flow.losses_mw()).abs() < 1e-3);
    }

    #[test]
    fn gauss_and_faer_agree() {
        let network = two_bus(0.1);
        let gauss = NewtonRaphsonSolver::new().solve(&network).unwrap();
        let faer = NewtonRaphsonSolver::new()
            .with_linear_solver(SolverKind::Faer)
            .solve(&network)
            .unwrap();
        let a = gauss.bus_voltages[&BusId::new(2)];
        let b = faer.bus_voltages[&BusId::new(2)];
        assert!((a.v_mag_pu - b.v_mag_pu).abs() < 1e-8);
        assert!((a.v_ang_rad - b.v_ang_rad).abs() < 1e-8);
    }

    #[test]
    fn iteration_cap_reports_non_convergence() {
        let network = two_bus(0.1);
        let point = NewtonRaphsonSolver::new()
            .with_max_iterations(1)
            .with_tolerance(1e-12)
            .solve(&network)
            .unwrap();
        assert!(!point.converged);
        assert_eq!(point.iterations, 1);
    }

    #[test]
    fn isolated_bus_fails_the_linear_solve() {
        let mut network = two_bus(0.1);
        network.add_bus(Bus::new(BusId::new(3), "Island", 110.0)).unwrap();
        assert!(NewtonRaphsonSolver::new().solve(&network).is_err());
    }

    #[test]
    fn missing_slack_is_rejected() {
        let mut network = two_bus(0.1);
        for node in network.graph.node_weights_mut() {
            if let Node::Gen(gen) = node {
                gen.control = ControlMode::PQ;
            }
        }
        let err = NewtonRaphsonSolver::new().solve(&network).unwrap_err();
        assert!(err.to_string().contains("Slack"));
    }

    #[test]
    fn transformer_is_rescaled_to_system_base() {
        let mut network = two_bus(0.1);
        network
            .add_transformer(Transformer {
                id: TransformerId::new(0),
                name: "T".into(),
                from_bus: BusId::new(1),
                to_bus: BusId::new(2),
                s_nom_mva: 200.0,
                tap_ratio: 1.0,
                phase_shift_deg: 0.0,
                vector_group: String::new(),
                r_pu: 0.0,
                x_pu: 0.1,
            })
            .unwrap();
        let point = NewtonRaphsonSolver::new().solve(&network).unwrap();
        assert!(point.converged);
        let total: f64 = point.branch_flows.iter().map(|f| f.p0_mw).sum();
        let slack = point.dispatch[&GenId::new(0)];
        assert!((total - slack.p_mw).abs() < 1e-3);
        assert_eq!(point.branch_flows[1].component.kind, ComponentKind::Transformer);
    }
}

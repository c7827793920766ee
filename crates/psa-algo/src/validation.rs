//! Electrical plausibility checks.
//!
//! [`validate`] inspects a network without modifying it and returns every
//! finding in a fixed order: transformers, compensators, buses, lines, then
//! storage units and links. Out-of-range values are reported, never raised.

use psa_core::{
    Check, ComponentKind, ComponentRef, Finding, Findings, Gen, Line, Link, Network, StorageUnit,
    Transformer,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Thresholds applied by [`validate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
    /// Transformer reactance range (p.u.)
    pub transformer_x_min_pu: f64,
    pub transformer_x_max_pu: f64,
    /// Transformer resistance ceiling (p.u.)
    pub transformer_r_max_pu: f64,
    pub tap_min: f64,
    pub tap_max: f64,
    /// Largest admissible phase shift magnitude (degrees)
    pub phase_shift_max_deg: f64,
    /// Phase shifts must be multiples of this step (degrees)
    pub phase_shift_step_deg: f64,
    /// Compensator range may span at most this multiple of |q_nom|
    pub compensator_range_factor: f64,
    pub compensator_v_min_pu: f64,
    pub compensator_v_max_pu: f64,
    /// Standard nominal voltages (kV)
    pub standard_voltages_kv: Vec<f64>,
    pub line_rx_min: f64,
    pub line_rx_max: f64,
    /// Series impedance ceiling (Ω/km)
    pub line_z_max_ohm_per_km: f64,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            transformer_x_min_pu: 0.01,
            transformer_x_max_pu: 0.2,
            transformer_r_max_pu: 0.1,
            tap_min: 0.9,
            tap_max: 1.1,
            phase_shift_max_deg: 60.0,
            phase_shift_step_deg: 30.0,
            compensator_range_factor: 2.0,
            compensator_v_min_pu: 0.95,
            compensator_v_max_pu: 1.05,
            standard_voltages_kv: vec![11.0, 33.0, 66.0, 110.0, 132.0, 220.0, 275.0, 400.0],
            line_rx_min: 0.1,
            line_rx_max: 2.0,
            line_z_max_ohm_per_km: 1.0,
        }
    }
}

const EPS: f64 = 1e-9;

fn is_multiple_of(value: f64, step: f64) -> bool {
    step <= 0.0 || value % step == 0.0
}

/// Run every plausibility rule over `network`.
pub fn validate(network: &Network, limits: &ValidationLimits) -> Findings {
    let mut findings = Findings::new();

    for tx in network.transformers() {
        check_transformer(tx, limits, &mut findings);
    }
    for svc in network.compensators() {
        check_compensator(svc, limits, &mut findings);
    }
    for bus in network.buses() {
        let component = ComponentRef::new(ComponentKind::Bus, bus.name.as_str());
        if bus.v_nom_kv <= 0.0 {
            findings.push(Finding::new(
                component,
                Check::NominalVoltage,
                format!(
                    "Nominal voltage {:.1} kV is not positive. Per-unit conversion of connected lines is undefined.",
                    bus.v_nom_kv
                ),
            ));
        } else if !limits
            .standard_voltages_kv
            .iter()
            .any(|kv| (kv - bus.v_nom_kv).abs() < EPS)
        {
            findings.push(Finding::new(
                component,
                Check::NominalVoltage,
                format!(
                    "Unusual nominal voltage {:.1} kV. Consider using standard voltage levels for better compatibility.",
                    bus.v_nom_kv
                ),
            ));
        }
    }
    for line in network.lines() {
        check_line(line, limits, &mut findings);
    }
    for storage in network.storage_units() {
        check_storage(storage, &mut findings);
    }
    for link in network.links() {
        check_link(link, &mut findings);
    }

    for finding in &findings {
        warn!("{}", finding);
    }
    debug!("validation complete: {}", findings.summary());
    findings
}

fn check_transformer(tx: &Transformer, limits: &ValidationLimits, findings: &mut Findings) {
    let component = || ComponentRef::new(ComponentKind::Transformer, tx.name.as_str());

    if tx.x_pu < limits.transformer_x_min_pu || tx.x_pu > limits.transformer_x_max_pu {
        findings.push(Finding::new(
            component(),
            Check::TransformerReactance,
            format!(
                "Unusual reactance value {:.3} p.u. (typical range: {}-{} p.u.). This may cause convergence issues or unrealistic power flows.",
                tx.x_pu, limits.transformer_x_min_pu, limits.transformer_x_max_pu
            ),
        ));
    }
    if tx.r_pu > limits.transformer_r_max_pu {
        findings.push(Finding::new(
            component(),
            Check::TransformerResistance,
            format!(
                "High resistance value {:.3} p.u. (should be < {} p.u.). This may cause excessive losses in the simulation.",
                tx.r_pu, limits.transformer_r_max_pu
            ),
        ));
    }
    if tx.tap_ratio < limits.tap_min || tx.tap_ratio > limits.tap_max {
        findings.push(Finding::new(
            component(),
            Check::TapRatio,
            format!(
                "Unusual tap ratio {:.2} (typical range: {}-{}). This may cause extreme voltage transformations.",
                tx.tap_ratio, limits.tap_min, limits.tap_max
            ),
        ));
    }
    let shift = tx.phase_shift_deg;
    if shift.abs() > limits.phase_shift_max_deg
        || !is_multiple_of(shift, limits.phase_shift_step_deg)
    {
        findings.push(Finding::new(
            component(),
            Check::PhaseShift,
            format!(
                "Unusual phase shift {}° (typically multiples of {}° up to ±{}°). This may cause unexpected power flow patterns.",
                shift, limits.phase_shift_step_deg, limits.phase_shift_max_deg
            ),
        ));
    }
}

fn check_compensator(svc: &Gen, limits: &ValidationLimits, findings: &mut Findings) {
    let Some(rating) = svc.compensator_rating() else {
        return;
    };
    let component = || ComponentRef::new(ComponentKind::Compensator, svc.name.as_str());

    let span = (rating.q_max_mvar - rating.q_min_mvar).abs();
    if span > limits.compensator_range_factor * rating.q_nom_mvar.abs() {
        findings.push(Finding::new(
            component(),
            Check::CompensatorRange,
            format!(
                "Reactive power range ({:.1} to {:.1} MVAr) is more than {} times the nominal capacity ({:.1} MVAr). This may cause control instability.",
                rating.q_min_mvar, rating.q_max_mvar, limits.compensator_range_factor, rating.q_nom_mvar
            ),
        ));
    }
    if rating.v_set_pu < limits.compensator_v_min_pu || rating.v_set_pu > limits.compensator_v_max_pu {
        findings.push(Finding::new(
            component(),
            Check::CompensatorSetpoint,
            format!(
                "Unusual voltage setpoint {:.2} p.u. (typical range: {}-{} p.u.). This may cause voltage regulation problems.",
                rating.v_set_pu, limits.compensator_v_min_pu, limits.compensator_v_max_pu
            ),
        ));
    }
}

fn check_line(line: &Line, limits: &ValidationLimits, findings: &mut Findings) {
    let component = || ComponentRef::new(ComponentKind::Line, line.name.as_str());

    if line.r_ohm > 0.0 && line.x_ohm > 0.0 {
        let rx = line.r_ohm / line.x_ohm;
        if rx < limits.line_rx_min || rx > limits.line_rx_max {
            findings.push(Finding::new(
                component(),
                Check::LineRxRatio,
                format!(
                    "Unusual R/X ratio {:.2} (typical range: {}-{}). This may cause unrealistic power flows.",
                    rx, limits.line_rx_min, limits.line_rx_max
                ),
            ));
        }
    }
    if let Some(z_per_km) = line.impedance_per_km() {
        if z_per_km > limits.line_z_max_ohm_per_km {
            findings.push(Finding::new(
                component(),
                Check::LineImpedance,
                format!(
                    "High impedance per km: {:.2} ohm/km. This may cause excessive voltage drops.",
                    z_per_km
                ),
            ));
        }
    }
}

fn in_unit_interval(value: f64) -> bool {
    value > 0.0 && value <= 1.0
}

fn check_storage(storage: &StorageUnit, findings: &mut Findings) {
    for (label, value) in [
        ("store", storage.efficiency_store),
        ("dispatch", storage.efficiency_dispatch),
    ] {
        if !in_unit_interval(value) {
            findings.push(Finding::new(
                ComponentRef::new(ComponentKind::StorageUnit, storage.name.as_str()),
                Check::StorageEfficiency,
                format!(
                    "The {} efficiency {:.3} lies outside (0, 1]. State of charge bookkeeping will create or destroy energy.",
                    label, value
                ),
            ));
        }
    }
}

fn check_link(link: &Link, findings: &mut Findings) {
    let component = || ComponentRef::new(ComponentKind::Link, link.name.as_str());

    if !in_unit_interval(link.efficiency) {
        findings.push(Finding::new(
            component(),
            Check::LinkEfficiency,
            format!(
                "Efficiency {:.3} lies outside (0, 1]. The receiving end would get more power than is sent.",
                link.efficiency
            ),
        ));
    }
    if link.p_min_pu > link.p_max_pu {
        findings.push(Finding::new(
            component(),
            Check::LinkPowerRange,
            format!(
                "Minimum power {:.2} p.u. exceeds maximum {:.2} p.u. No set-point can satisfy both limits.",
                link.p_min_pu, link.p_max_pu
            ),
        ));
    }
}

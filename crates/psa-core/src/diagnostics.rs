//! Containers for plausibility findings and load statistics.
//!
//! Findings are advisory: a validation pass fills a [`Findings`] list and the
//! caller decides whether the run continues. Every finding names the
//! component it concerns, the check that fired, and a human-readable
//! explanation of the physical consequence.
//!
//! # Example
//!
//! ```
//! use psa_core::diagnostics::{Check, Finding, Findings};
//! use psa_core::{ComponentKind, ComponentRef};
//!
//! let mut findings = Findings::new();
//! findings.push(Finding::new(
//!     ComponentRef::new(ComponentKind::Bus, "Harbour"),
//!     Check::NominalVoltage,
//!     "Unusual nominal voltage 150.0 kV.",
//! ));
//!
//! assert_eq!(findings.len(), 1);
//! assert_eq!(findings.by_check(Check::NominalVoltage).count(), 1);
//! ```

use serde::Serialize;

use crate::{ComponentKind, ComponentRef};

/// The plausibility rule that produced a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Check {
    TransformerReactance,
    TransformerResistance,
    TapRatio,
    PhaseShift,
    CompensatorRange,
    CompensatorSetpoint,
    NominalVoltage,
    LineRxRatio,
    LineImpedance,
    StorageEfficiency,
    LinkEfficiency,
    LinkPowerRange,
}

impl Check {
    /// Short label used when printing findings grouped by rule
    pub fn label(&self) -> &'static str {
        match self {
            Check::TransformerReactance => "transformer reactance",
            Check::TransformerResistance => "transformer resistance",
            Check::TapRatio => "tap ratio",
            Check::PhaseShift => "phase shift",
            Check::CompensatorRange => "compensator range",
            Check::CompensatorSetpoint => "compensator setpoint",
            Check::NominalVoltage => "nominal voltage",
            Check::LineRxRatio => "line R/X ratio",
            Check::LineImpedance => "line impedance",
            Check::StorageEfficiency => "storage efficiency",
            Check::LinkEfficiency => "link efficiency",
            Check::LinkPowerRange => "link power range",
        }
    }
}

/// A single plausibility finding
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    /// Component the finding concerns (e.g. "Transformer T1")
    pub component: ComponentRef,
    /// Rule that fired
    pub check: Check,
    /// Human-readable explanation including the physical consequence
    pub message: String,
}

impl Finding {
    pub fn new(component: ComponentRef, check: Check, message: impl Into<String>) -> Self {
        Self {
            component,
            check,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Finding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.check.label(), self.component, self.message)
    }
}

/// Ordered collection of findings from one validation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Findings {
    pub items: Vec<Finding>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, finding: Finding) {
        self.items.push(finding);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Finding> {
        self.items.iter()
    }

    /// Findings produced by one rule
    pub fn by_check(&self, check: Check) -> impl Iterator<Item = &Finding> {
        self.items.iter().filter(move |f| f.check == check)
    }

    /// Findings attached to one component
    pub fn for_component<'a>(
        &'a self,
        kind: ComponentKind,
        name: &'a str,
    ) -> impl Iterator<Item = &'a Finding> {
        self.items
            .iter()
            .filter(move |f| f.component.kind == kind && f.component.name == name)
    }

    pub fn summary(&self) -> String {
        match self.items.len() {
            0 => "No findings".to_string(),
            1 => "1 finding".to_string(),
            n => format!("{} findings", n),
        }
    }
}

impl<'a> IntoIterator for &'a Findings {
    type Item = &'a Finding;
    type IntoIter = std::slice::Iter<'a, Finding>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl std::fmt::Display for Findings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Validation: {}", self.summary())?;
        for finding in &self.items {
            writeln!(f, "  {}", finding)?;
        }
        Ok(())
    }
}

// ============================================================================
// Load Statistics
// ============================================================================

/// Element counts recorded while materializing a network from the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub buses: usize,
    pub lines: usize,
    pub transformers: usize,
    pub generators: usize,
    pub compensators: usize,
    pub loads: usize,
    pub storage_units: usize,
    pub links: usize,
}

impl std::fmt::Display for LoadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} buses, {} lines, {} transformers, {} generators, {} compensators, {} loads, {} storage units, {} links",
            self.buses,
            self.lines,
            self.transformers,
            self.generators,
            self.compensators,
            self.loads,
            self.storage_units,
            self.links
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(kind: ComponentKind, name: &str, check: Check) -> Finding {
        Finding::new(ComponentRef::new(kind, name), check, "test message")
    }

    #[test]
    fn test_findings_preserve_insertion_order() {
        let mut findings = Findings::new();
        findings.push(finding(ComponentKind::Transformer, "T1", Check::PhaseShift));
        findings.push(finding(ComponentKind::Bus, "B1", Check::NominalVoltage));
        findings.push(finding(ComponentKind::Transformer, "T1", Check::TapRatio));

        let checks: Vec<Check> = findings.iter().map(|f| f.check).collect();
        assert_eq!(
            checks,
            vec![Check::PhaseShift, Check::NominalVoltage, Check::TapRatio]
        );
        assert_eq!(findings.for_component(ComponentKind::Transformer, "T1").count(), 2);
    }

    #[test]
    fn test_findings_summary() {
        let mut findings = Findings::new();
        assert_eq!(findings.summary(), "No findings");

        findings.push(finding(ComponentKind::Line, "L1", Check::LineRxRatio));
        assert_eq!(findings.summary(), "1 finding");

        findings.push(finding(ComponentKind::Line, "L1", Check::LineImpedance));
        assert_eq!(findings.summary(), "2 findings");
    }

    #[test]
    fn test_finding_display_names_component() {
        let display = finding(ComponentKind::Compensator, "SVC_North", Check::CompensatorSetpoint)
            .to_string();
        assert!(display.contains("compensator setpoint"));
        assert!(display.contains("SVC SVC_North"));
    }

    #[test]
    fn test_findings_serialization() {
        let mut findings = Findings::new();
        findings.push(finding(ComponentKind::Bus, "B1", Check::NominalVoltage));

        let json = serde_json::to_string_pretty(&findings).unwrap();
        assert!(json.contains("\"nominal_voltage\""));
        assert!(json.contains("\"B1\""));
    }

    #[test]
    fn test_load_stats_display() {
        let stats = LoadStats {
            buses: 5,
            lines: 4,
            ..LoadStats::default()
        };
        let text = stats.to_string();
        assert!(text.starts_with("5 buses, 4 lines"));
    }
}

use anyhow::{bail, Context, Result};
use psa_algo::{AnalysisOutcome, AnalysisWorkflow, InitReport, PowerFlowResults};
use psa_cli::{OutputFormat, PsaConfig};
use psa_core::{Findings, PowerFlowSolver, SolverKind};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tabwriter::TabWriter;
use tracing::{info, warn};

use super::validate::print_findings;
use super::{open_network, write_json};

pub struct PfArgs<'a> {
    pub accept_findings: bool,
    pub format: OutputFormat,
    pub out: Option<&'a Path>,
    pub linear_solver: Option<&'a str>,
}

#[derive(Serialize)]
struct PfReport<'a> {
    solver: &'a str,
    linear_solver: SolverKind,
    findings: &'a Findings,
    initialization: &'a InitReport,
    results: &'a PowerFlowResults,
}

pub fn handle(db: &Path, config: &PsaConfig, args: PfArgs<'_>) -> Result<()> {
    let mut solver_config = config.solver.clone();
    if let Some(kind) = args.linear_solver {
        solver_config.linear_solver = kind.parse::<SolverKind>()?;
    }
    let solver = solver_config.build_solver();
    let solver_name = solver.name().to_string();
    let accept = args.accept_findings || config.analysis.accept_findings;

    let mut network = open_network(db, config)?;
    let workflow = AnalysisWorkflow::new(Box::new(solver))
        .with_limits(config.validation.clone())
        .with_init_config(config.initialization.clone());

    // Findings go to stderr so stdout stays parseable
    let outcome = workflow.run(&mut network, |findings| {
        gate_on_findings(findings, io::stderr(), accept)
    })?;

    let (findings, init, results) = match &outcome {
        AnalysisOutcome::Completed {
            findings,
            init,
            results,
        } => (findings, init, results),
        AnalysisOutcome::Declined { findings } => bail!(
            "validation reported {}; rerun with --accept-findings to solve anyway",
            findings.summary().to_lowercase()
        ),
    };

    let report = PfReport {
        solver: &solver_name,
        linear_solver: solver_config.linear_solver,
        findings,
        initialization: init,
        results,
    };

    if let Some(path) = args.out {
        let file = File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        write_json(&report, &mut writer)?;
        writer.flush()?;
        info!("wrote power flow results to {}", path.display());
    }

    match args.format {
        OutputFormat::Json => write_json(&report, &mut io::stdout())?,
        OutputFormat::Table => print_results(&report, io::stdout())?,
    }
    Ok(())
}

fn print_results<W: Write>(report: &PfReport<'_>, out: W) -> io::Result<()> {
    let results = report.results;
    let mut writer = TabWriter::new(out);

    writeln!(
        writer,
        "Converged in {} iterations with {} ({}), max mismatch {:.2e} p.u., snapshot {}",
        results.iterations,
        report.solver,
        report.linear_solver.as_str(),
        results.max_mismatch,
        results.snapshot
    )?;
    writeln!(writer, "Slack generator: {}", report.initialization.slack)?;
    writeln!(writer)?;

    writeln!(writer, "BUS\tV (PU)\tANGLE (DEG)")?;
    for (name, bus) in &results.buses {
        writeln!(writer, "{}\t{:.4}\t{:.3}", name, bus.v_mag_pu, bus.v_ang_deg)?;
    }
    writeln!(writer)?;

    writeln!(writer, "GENERATOR\tP (MW)\tQ (MVAR)")?;
    for (name, gen) in &results.generators {
        writeln!(writer, "{}\t{:.2}\t{:.2}", name, gen.p_mw, gen.q_mvar)?;
    }
    for (name, svc) in &results.compensators {
        writeln!(writer, "{}\t-\t{:.2}", name, svc.q_mvar)?;
    }
    writeln!(writer)?;

    writeln!(writer, "BRANCH\tP0 (MW)\tQ0 (MVAR)\tP1 (MW)\tLOSS (MW)")?;
    for (name, flow) in results.lines.iter().chain(&results.transformers) {
        writeln!(
            writer,
            "{}\t{:.2}\t{:.2}\t{:.2}\t{:.3}",
            name,
            flow.p0_mw,
            flow.q0_mvar,
            flow.p1_mw,
            flow.p0_mw + flow.p1_mw
        )?;
    }

    if !results.storage_units.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "STORAGE\tP (MW)\tSOC (MWH)")?;
        for (name, storage) in &results.storage_units {
            writeln!(
                writer,
                "{}\t{:.2}\t{:.2}",
                name, storage.p_mw, storage.state_of_charge_mwh
            )?;
        }
    }
    if !results.links.is_empty() {
        writeln!(writer)?;
        writeln!(writer, "LINK\tP0 (MW)\tP1 (MW)")?;
        for (name, link) in &results.links {
            writeln!(writer, "{}\t{:.2}\t{:.2}", name, link.p0_mw, link.p1_mw)?;
        }
    }
    writeln!(writer)?;
    writeln!(
        writer,
        "Total generation {:.2} MW, branch losses {:.3} MW",
        results.total_generation_mw(),
        results.branch_losses_mw()
    )?;
    writer.flush()
}

/// Show the findings on `out` and decide whether the analysis goes on.
fn gate_on_findings<W: Write>(findings: &Findings, out: W, accept: bool) -> bool {
    if let Err(err) = print_findings(findings, out) {
        warn!("cannot print findings: {}", err);
    }
    if accept {
        warn!("continuing despite {}", findings.summary().to_lowercase());
    }
    accept
}

#[cfg(test)]
mod tests {
    use super::*;
    use psa_core::{Check, ComponentKind, ComponentRef, Finding};

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn one_finding() -> Findings {
        let mut findings = Findings::new();
        findings.push(Finding::new(
            ComponentRef::new(ComponentKind::Bus, "Odd"),
            Check::NominalVoltage,
            "Unusual nominal voltage 150.0 kV.",
        ));
        findings
    }

    #[test]
    fn unwritable_findings_do_not_change_the_decision() {
        assert!(gate_on_findings(&one_finding(), BrokenPipe, true));
        assert!(!gate_on_findings(&one_finding(), BrokenPipe, false));
    }

    #[test]
    fn findings_are_written_before_deciding() {
        let mut out = Vec::new();
        assert!(!gate_on_findings(&one_finding(), &mut out, false));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Validation: 1 finding"));
        assert!(text.contains("Bus Odd"));
    }
}

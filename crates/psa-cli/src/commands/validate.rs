use anyhow::Result;
use psa_algo::validate;
use psa_cli::{OutputFormat, PsaConfig};
use psa_core::Findings;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;

use super::{open_network, write_json};

pub fn handle(db: &Path, config: &PsaConfig, format: OutputFormat) -> Result<()> {
    let network = open_network(db, config)?;
    let findings = validate(&network, &config.validation);
    match format {
        OutputFormat::Json => write_json(&findings, &mut io::stdout())?,
        OutputFormat::Table => print_findings(&findings, io::stdout())?,
    }
    Ok(())
}

/// One row per finding, grouped in the order the checks ran.
pub fn print_findings<W: Write>(findings: &Findings, out: W) -> io::Result<()> {
    let mut writer = TabWriter::new(out);
    writeln!(writer, "Validation: {}", findings.summary())?;
    if !findings.is_empty() {
        writeln!(writer, "CHECK\tCOMPONENT\tMESSAGE")?;
        for finding in findings {
            writeln!(
                writer,
                "{}\t{}\t{}",
                finding.check.label(),
                finding.component,
                finding.message
            )?;
        }
    }
    writer.flush()
}

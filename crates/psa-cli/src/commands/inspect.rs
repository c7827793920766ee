use anyhow::Result;
use psa_cli::{OutputFormat, PsaConfig};
use psa_core::{Network, NetworkStats, Snapshot};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;
use tabwriter::TabWriter;

use super::{open_network, write_json};

#[derive(Serialize)]
struct BusRow<'a> {
    name: &'a str,
    v_nom_kv: f64,
    kind: &'static str,
}

#[derive(Serialize)]
struct GeneratorRow<'a> {
    name: &'a str,
    bus: &'a str,
    control: String,
    technology: &'static str,
    p_nom_mw: f64,
}

#[derive(Serialize)]
struct Inventory<'a> {
    snapshot: Snapshot,
    stats: NetworkStats,
    buses: Vec<BusRow<'a>>,
    generators: Vec<GeneratorRow<'a>>,
}

fn inventory(network: &Network) -> Inventory<'_> {
    let buses = network
        .buses()
        .into_iter()
        .map(|bus| BusRow {
            name: &bus.name,
            v_nom_kv: bus.v_nom_kv,
            kind: bus.kind.code(),
        })
        .collect();
    let generators = network
        .generators()
        .into_iter()
        .filter(|gen| !gen.is_compensator())
        .map(|gen| GeneratorRow {
            name: &gen.name,
            bus: network.bus_name(gen.bus).unwrap_or("?"),
            control: gen.control.to_string(),
            technology: gen.technology.as_str(),
            p_nom_mw: gen.p_nom_mw,
        })
        .collect();
    Inventory {
        snapshot: network.snapshot,
        stats: network.stats(),
        buses,
        generators,
    }
}

pub fn handle(db: &Path, config: &PsaConfig, format: OutputFormat) -> Result<()> {
    let network = open_network(db, config)?;
    let inventory = inventory(&network);

    match format {
        OutputFormat::Json => write_json(&inventory, &mut io::stdout())?,
        OutputFormat::Table => {
            let stats = &inventory.stats;
            println!("Grid in {} at {}:", db.display(), inventory.snapshot);
            let mut writer = TabWriter::new(io::stdout());
            writeln!(writer, "COMPONENT\tCOUNT")?;
            for (label, count) in [
                ("Buses", stats.num_buses),
                ("Lines", stats.num_lines),
                ("Transformers", stats.num_transformers),
                ("Generators", stats.num_generators),
                ("SVCs", stats.num_compensators),
                ("Loads", stats.num_loads),
                ("Storage units", stats.num_storage_units),
                ("Links", stats.num_links),
            ] {
                writeln!(writer, "{}\t{}", label, count)?;
            }
            writeln!(writer)?;
            writeln!(writer, "BUS\tV_NOM (KV)\tTYPE")?;
            for bus in &inventory.buses {
                writeln!(writer, "{}\t{:.1}\t{}", bus.name, bus.v_nom_kv, bus.kind)?;
            }
            writeln!(writer)?;
            writeln!(writer, "GENERATOR\tBUS\tCONTROL\tTECHNOLOGY\tP_NOM (MW)")?;
            for gen in &inventory.generators {
                writeln!(
                    writer,
                    "{}\t{}\t{}\t{}\t{:.1}",
                    gen.name, gen.bus, gen.control, gen.technology, gen.p_nom_mw
                )?;
            }
            writer.flush()?;
            println!(
                "Capacity {:.0} MW, load {:.0} MW / {:.0} Mvar, storage {:.0} MWh",
                stats.total_gen_capacity_mw,
                stats.total_load_mw,
                stats.total_load_mvar,
                stats.total_storage_mwh
            );
        }
    }
    Ok(())
}

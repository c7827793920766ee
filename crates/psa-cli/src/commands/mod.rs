pub mod inspect;
pub mod pf;
pub mod populate;
pub mod validate;

use anyhow::Result;
use psa_core::Network;
use psa_io::{load_network, SqliteStore};
use serde::Serialize;
use std::io::{self, Write};
use std::path::Path;

use psa_cli::PsaConfig;

/// Open an existing database and build the network with the configured loader options.
pub fn open_network(db: &Path, config: &PsaConfig) -> Result<Network> {
    let store = SqliteStore::open_existing(db)?;
    Ok(load_network(store, &config.loader)?)
}

pub fn write_json<W: Write, T: Serialize>(data: &T, writer: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *writer, data).map_err(io::Error::other)?;
    writeln!(writer)?;
    Ok(())
}

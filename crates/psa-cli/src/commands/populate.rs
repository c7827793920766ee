use anyhow::Result;
use psa_io::{NetworkFixture, SqliteStore};
use std::path::Path;
use tracing::info;

pub fn handle(db: &Path, fixture: Option<&Path>) -> Result<()> {
    let fixture = match fixture {
        Some(path) => {
            info!("reading grid description from {}", path.display());
            NetworkFixture::from_json_file(path)?
        }
        None => NetworkFixture::sample(),
    };

    let mut store = SqliteStore::open(db)?;
    let inserted = store.populate(&fixture)?;
    println!("Populated {}: inserted {}", db.display(), inserted);
    Ok(())
}

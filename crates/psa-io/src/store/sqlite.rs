use std::collections::HashMap;
use std::path::{Path, PathBuf};

use psa_core::{LoadStats, PsaError, PsaResult};
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

use super::SchemaStore;
use crate::fixture::{BusNames, NetworkFixture};
use crate::schema::{
    BusRow, GeneratorRow, LineRow, LinkRow, LoadRow, StorageUnitRow, SvcRow, TableSet,
    TransformerRow, BUSES, CREATE_TABLES, GENERATORS, LINES, LINKS, LOADS, STORAGE_UNITS, SVCS,
    TRANSFORMERS,
};

fn store_err(err: rusqlite::Error) -> PsaError {
    PsaError::StoreConnection(err.to_string())
}

/// SQLite-backed schema store
pub struct SqliteStore {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Open (or create) a database file.
    pub fn open(path: &Path) -> PsaResult<Self> {
        let conn = Connection::open(path).map_err(|err| {
            PsaError::StoreConnection(format!("cannot open {}: {}", path.display(), err))
        })?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(store_err)?;
        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Open an existing database file; a missing file is a connection error.
    pub fn open_existing(path: &Path) -> PsaResult<Self> {
        if !path.is_file() {
            return Err(PsaError::StoreConnection(format!(
                "database {} does not exist",
                path.display()
            )));
        }
        Self::open(path)
    }

    pub fn open_in_memory() -> PsaResult<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(store_err)?;
        Ok(Self { conn, path: None })
    }

    /// Create missing tables and add the `carrier` column to stores written
    /// before generators carried one.
    pub fn create_schema(&self) -> PsaResult<()> {
        self.conn.execute_batch(CREATE_TABLES).map_err(store_err)?;
        if !has_column(&self.conn, GENERATORS, "carrier")? {
            info!("adding carrier column to {}", GENERATORS);
            self.conn
                .execute_batch(&format!("ALTER TABLE {GENERATORS} ADD COLUMN carrier TEXT;"))
                .map_err(store_err)?;
        }
        Ok(())
    }

    /// Create the schema and insert every component of `fixture`.
    ///
    /// Rows are inserted with `INSERT OR IGNORE`, so populating twice leaves
    /// the store unchanged. Returns the number of rows actually inserted.
    pub fn populate(&mut self, fixture: &NetworkFixture) -> PsaResult<LoadStats> {
        self.create_schema()?;
        let tx = self.conn.transaction().map_err(store_err)?;
        let mut inserted = LoadStats::default();

        for bus in &fixture.buses {
            inserted.buses += tx
                .execute(
                    &format!("INSERT OR IGNORE INTO {BUSES} (name, v_nom_kv, type, x_coord, y_coord)
                     VALUES (?1, ?2, ?3, ?4, ?5)"),
                    params![bus.name, bus.v_nom_kv, bus.bus_type, bus.x_coord, bus.y_coord],
                )
                .map_err(store_err)?;
        }

        let ids = bus_ids(&tx)?;
        let mut rows = TableSet::default();
        fixture.dependent_rows(&BusNames::new(&ids), &mut rows)?;
        insert_dependents(&tx, &rows, &mut inserted)?;

        tx.commit().map_err(store_err)?;
        info!("populated {}: inserted {}", self.describe(), inserted);
        Ok(inserted)
    }
}

fn bus_ids(tx: &Transaction<'_>) -> PsaResult<HashMap<String, i64>> {
    let mut stmt = tx
        .prepare(&format!("SELECT id, name FROM {BUSES}"))
        .map_err(store_err)?;
    let pairs = stmt
        .query_map([], |row| Ok((row.get::<_, String>(1)?, row.get::<_, i64>(0)?)))
        .map_err(store_err)?
        .collect::<Result<HashMap<_, _>, _>>()
        .map_err(store_err)?;
    Ok(pairs)
}

fn insert_dependents(
    tx: &Transaction<'_>,
    rows: &TableSet,
    inserted: &mut LoadStats,
) -> PsaResult<()> {
    for r in &rows.lines {
        inserted.lines += tx
            .execute(
                &format!("INSERT OR IGNORE INTO {LINES} (name, from_bus_id, to_bus_id, length_km, r_ohm_per_km, x_ohm_per_km, s_nom_mva)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![r.name, r.from_bus_id, r.to_bus_id, r.length_km, r.r_ohm_per_km, r.x_ohm_per_km, r.s_nom_mva],
            )
            .map_err(store_err)?;
    }
    for r in &rows.transformers {
        inserted.transformers += tx
            .execute(
                &format!("INSERT OR IGNORE INTO {TRANSFORMERS} (name, from_bus_id, to_bus_id, s_nom_mva, tap_ratio, phase_shift, vector_group)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![r.name, r.from_bus_id, r.to_bus_id, r.s_nom_mva, r.tap_ratio, r.phase_shift, r.vector_group],
            )
            .map_err(store_err)?;
    }
    for r in &rows.generators {
        inserted.generators += tx
            .execute(
                &format!("INSERT OR IGNORE INTO {GENERATORS} (name, bus_id, p_nom_mw, marginal_cost_eur_per_mwh, control_type, carrier)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![r.name, r.bus_id, r.p_nom_mw, r.marginal_cost_eur_per_mwh, r.control_type, r.carrier],
            )
            .map_err(store_err)?;
    }
    for r in &rows.loads {
        inserted.loads += tx
            .execute(
                &format!("INSERT OR IGNORE INTO {LOADS} (name, bus_id, p_set_mw, q_set_mvar) VALUES (?1, ?2, ?3, ?4)"),
                params![r.name, r.bus_id, r.p_set_mw, r.q_set_mvar],
            )
            .map_err(store_err)?;
    }
    for r in &rows.storage_units {
        inserted.storage_units += tx
            .execute(
                &format!("INSERT OR IGNORE INTO {STORAGE_UNITS} (name, bus_id, p_nom_mw, max_hours, efficiency_store, efficiency_dispatch, cyclic_soc)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![r.name, r.bus_id, r.p_nom_mw, r.max_hours, r.efficiency_store, r.efficiency_dispatch, r.cyclic_soc],
            )
            .map_err(store_err)?;
    }
    for r in &rows.links {
        inserted.links += tx
            .execute(
                &format!("INSERT OR IGNORE INTO {LINKS} (name, from_bus_id, to_bus_id, p_nom_mw, efficiency, p_min_pu, p_max_pu)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                params![r.name, r.from_bus_id, r.to_bus_id, r.p_nom_mw, r.efficiency, r.p_min_pu, r.p_max_pu],
            )
            .map_err(store_err)?;
    }
    for r in &rows.svcs {
        inserted.compensators += tx
            .execute(
                &format!("INSERT OR IGNORE INTO {SVCS} (name, bus_id, q_nom_mvar, q_min_mvar, q_max_mvar, v_set_pu)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
                params![r.name, r.bus_id, r.q_nom_mvar, r.q_min_mvar, r.q_max_mvar, r.v_set_pu],
            )
            .map_err(store_err)?;
    }
    Ok(())
}

fn has_column(conn: &Connection, table: &str, column: &str) -> PsaResult<bool> {
    let columns = query_rows(conn, &format!("PRAGMA table_info({table})"), |row| {
        row.get::<_, String>(1)
    })?;
    Ok(columns.iter().any(|name| name == column))
}

fn query_rows<T, F>(conn: &Connection, sql: &str, map: F) -> PsaResult<Vec<T>>
where
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
{
    let mut stmt = conn.prepare(sql).map_err(store_err)?;
    let rows = stmt
        .query_map([], map)
        .map_err(store_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(store_err)?;
    Ok(rows)
}

impl SchemaStore for SqliteStore {
    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite::memory:".to_string(),
        }
    }

    fn read_tables(&mut self) -> PsaResult<TableSet> {
        let conn = &self.conn;
        let carrier = if has_column(conn, GENERATORS, "carrier")? {
            "carrier"
        } else {
            "NULL AS carrier"
        };
        let tables = TableSet {
            buses: query_rows(
                conn,
                &format!("SELECT id, name, v_nom_kv, type, x_coord, y_coord FROM {BUSES} ORDER BY id"),
                |row| {
                    Ok(BusRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        v_nom_kv: row.get(2)?,
                        bus_type: row.get(3)?,
                        x_coord: row.get(4)?,
                        y_coord: row.get(5)?,
                    })
                },
            )?,
            lines: query_rows(
                conn,
                &format!("SELECT id, name, from_bus_id, to_bus_id, length_km, r_ohm_per_km, x_ohm_per_km, s_nom_mva
                 FROM {LINES} ORDER BY id"),
                |row| {
                    Ok(LineRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        from_bus_id: row.get(2)?,
                        to_bus_id: row.get(3)?,
                        length_km: row.get(4)?,
                        r_ohm_per_km: row.get(5)?,
                        x_ohm_per_km: row.get(6)?,
                        s_nom_mva: row.get(7)?,
                    })
                },
            )?,
            transformers: query_rows(
                conn,
                &format!("SELECT id, name, from_bus_id, to_bus_id, s_nom_mva, tap_ratio, phase_shift, vector_group
                 FROM {TRANSFORMERS} ORDER BY id"),
                |row| {
                    Ok(TransformerRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        from_bus_id: row.get(2)?,
                        to_bus_id: row.get(3)?,
                        s_nom_mva: row.get(4)?,
                        tap_ratio: row.get(5)?,
                        phase_shift: row.get(6)?,
                        vector_group: row.get(7)?,
                    })
                },
            )?,
            generators: query_rows(
                conn,
                &format!("SELECT id, name, bus_id, p_nom_mw, marginal_cost_eur_per_mwh, control_type, {carrier}
                 FROM {GENERATORS} ORDER BY id"),
                |row| {
                    Ok(GeneratorRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        bus_id: row.get(2)?,
                        p_nom_mw: row.get(3)?,
                        marginal_cost_eur_per_mwh: row.get(4)?,
                        control_type: row.get(5)?,
                        carrier: row.get(6)?,
                    })
                },
            )?,
            loads: query_rows(
                conn,
                &format!("SELECT id, name, bus_id, p_set_mw, q_set_mvar FROM {LOADS} ORDER BY id"),
                |row| {
                    Ok(LoadRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        bus_id: row.get(2)?,
                        p_set_mw: row.get(3)?,
                        q_set_mvar: row.get(4)?,
                    })
                },
            )?,
            storage_units: query_rows(
                conn,
                &format!("SELECT id, name, bus_id, p_nom_mw, max_hours, efficiency_store, efficiency_dispatch, cyclic_soc
                 FROM {STORAGE_UNITS} ORDER BY id"),
                |row| {
                    Ok(StorageUnitRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        bus_id: row.get(2)?,
                        p_nom_mw: row.get(3)?,
                        max_hours: row.get(4)?,
                        efficiency_store: row.get(5)?,
                        efficiency_dispatch: row.get(6)?,
                        cyclic_soc: row.get(7)?,
                    })
                },
            )?,
            links: query_rows(
                conn,
                &format!("SELECT id, name, from_bus_id, to_bus_id, p_nom_mw, efficiency, p_min_pu, p_max_pu
                 FROM {LINKS} ORDER BY id"),
                |row| {
                    Ok(LinkRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        from_bus_id: row.get(2)?,
                        to_bus_id: row.get(3)?,
                        p_nom_mw: row.get(4)?,
                        efficiency: row.get(5)?,
                        p_min_pu: row.get(6)?,
                        p_max_pu: row.get(7)?,
                    })
                },
            )?,
            svcs: query_rows(
                conn,
                &format!("SELECT id, name, bus_id, q_nom_mvar, q_min_mvar, q_max_mvar, v_set_pu FROM {SVCS} ORDER BY id"),
                |row| {
                    Ok(SvcRow {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        bus_id: row.get(2)?,
                        q_nom_mvar: row.get(3)?,
                        q_min_mvar: row.get(4)?,
                        q_max_mvar: row.get(5)?,
                        v_set_pu: row.get(6)?,
                    })
                },
            )?,
        };
        debug!("read {} rows from {}", tables.row_count(), self.describe());
        Ok(tables)
    }

    fn close(self) -> PsaResult<()> {
        let location = self.describe();
        self.conn.close().map_err(|(_, err)| store_err(err))?;
        debug!("closed {}", location);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_in_memory_reads_back_sample() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let inserted = store.populate(&NetworkFixture::sample()).unwrap();
        assert_eq!(inserted.buses, 5);
        assert_eq!(inserted.compensators, 2);

        let tables = store.read_tables().unwrap();
        assert_eq!(tables.generators.len(), 3);
        assert_eq!(tables.generators[1].carrier.as_deref(), Some("solar"));
        assert!(tables.storage_units.iter().all(|s| s.cyclic_soc));
        assert_eq!(tables.buses[3].x_coord, Some(-3.0));
    }

    #[test]
    fn reading_without_schema_is_store_error() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert!(matches!(
            store.read_tables(),
            Err(PsaError::StoreConnection(_))
        ));
    }
}

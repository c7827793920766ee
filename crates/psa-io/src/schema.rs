//! Table layout of the schema store.
//!
//! Every component kind has its own table with an autoincrement integer `id`,
//! a unique `name` and integer foreign keys into `Buses.id`.

use serde::{Deserialize, Serialize};

pub const BUSES: &str = "Buses";
pub const LINES: &str = "Lines";
pub const TRANSFORMERS: &str = "Transformers";
pub const GENERATORS: &str = "Generators";
pub const LOADS: &str = "Loads";
pub const STORAGE_UNITS: &str = "StorageUnits";
pub const LINKS: &str = "HVDC_Links";
pub const SVCS: &str = "SVCs";

/// Statements creating every table; safe to run against an existing store.
pub const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS Buses (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    v_nom_kv REAL NOT NULL,
    type TEXT NOT NULL DEFAULT 'b',
    x_coord REAL,
    y_coord REAL
);

CREATE TABLE IF NOT EXISTS Lines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    from_bus_id INTEGER NOT NULL REFERENCES Buses(id),
    to_bus_id INTEGER NOT NULL REFERENCES Buses(id),
    length_km REAL NOT NULL,
    r_ohm_per_km REAL NOT NULL,
    x_ohm_per_km REAL NOT NULL,
    s_nom_mva REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS Transformers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    from_bus_id INTEGER NOT NULL REFERENCES Buses(id),
    to_bus_id INTEGER NOT NULL REFERENCES Buses(id),
    s_nom_mva REAL NOT NULL,
    tap_ratio REAL NOT NULL DEFAULT 1.0,
    phase_shift REAL NOT NULL DEFAULT 0.0,
    vector_group TEXT
);

CREATE TABLE IF NOT EXISTS Generators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    bus_id INTEGER NOT NULL REFERENCES Buses(id),
    p_nom_mw REAL NOT NULL,
    marginal_cost_eur_per_mwh REAL NOT NULL DEFAULT 0.0,
    control_type TEXT NOT NULL DEFAULT 'PQ',
    carrier TEXT
);

CREATE TABLE IF NOT EXISTS Loads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    bus_id INTEGER NOT NULL REFERENCES Buses(id),
    p_set_mw REAL NOT NULL DEFAULT 0.0,
    q_set_mvar REAL NOT NULL DEFAULT 0.0
);

CREATE TABLE IF NOT EXISTS StorageUnits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    bus_id INTEGER NOT NULL REFERENCES Buses(id),
    p_nom_mw REAL NOT NULL,
    max_hours REAL NOT NULL,
    efficiency_store REAL NOT NULL DEFAULT 1.0,
    efficiency_dispatch REAL NOT NULL DEFAULT 1.0,
    cyclic_soc INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS HVDC_Links (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    from_bus_id INTEGER NOT NULL REFERENCES Buses(id),
    to_bus_id INTEGER NOT NULL REFERENCES Buses(id),
    p_nom_mw REAL NOT NULL,
    efficiency REAL NOT NULL DEFAULT 1.0,
    p_min_pu REAL NOT NULL DEFAULT 0.0,
    p_max_pu REAL NOT NULL DEFAULT 1.0
);

CREATE TABLE IF NOT EXISTS SVCs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    bus_id INTEGER NOT NULL REFERENCES Buses(id),
    q_nom_mvar REAL NOT NULL,
    q_min_mvar REAL NOT NULL,
    q_max_mvar REAL NOT NULL,
    v_set_pu REAL NOT NULL DEFAULT 1.0
);
"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusRow {
    pub id: i64,
    pub name: String,
    pub v_nom_kv: f64,
    #[serde(rename = "type")]
    pub bus_type: String,
    pub x_coord: Option<f64>,
    pub y_coord: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineRow {
    pub id: i64,
    pub name: String,
    pub from_bus_id: i64,
    pub to_bus_id: i64,
    pub length_km: f64,
    pub r_ohm_per_km: f64,
    pub x_ohm_per_km: f64,
    pub s_nom_mva: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerRow {
    pub id: i64,
    pub name: String,
    pub from_bus_id: i64,
    pub to_bus_id: i64,
    pub s_nom_mva: f64,
    pub tap_ratio: f64,
    pub phase_shift: f64,
    pub vector_group: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorRow {
    pub id: i64,
    pub name: String,
    pub bus_id: i64,
    pub p_nom_mw: f64,
    pub marginal_cost_eur_per_mwh: f64,
    pub control_type: String,
    pub carrier: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadRow {
    pub id: i64,
    pub name: String,
    pub bus_id: i64,
    pub p_set_mw: f64,
    pub q_set_mvar: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageUnitRow {
    pub id: i64,
    pub name: String,
    pub bus_id: i64,
    pub p_nom_mw: f64,
    pub max_hours: f64,
    pub efficiency_store: f64,
    pub efficiency_dispatch: f64,
    pub cyclic_soc: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRow {
    pub id: i64,
    pub name: String,
    pub from_bus_id: i64,
    pub to_bus_id: i64,
    pub p_nom_mw: f64,
    pub efficiency: f64,
    pub p_min_pu: f64,
    pub p_max_pu: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvcRow {
    pub id: i64,
    pub name: String,
    pub bus_id: i64,
    pub q_nom_mvar: f64,
    pub q_min_mvar: f64,
    pub q_max_mvar: f64,
    pub v_set_pu: f64,
}

/// The rows of every table, in primary-key order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSet {
    pub buses: Vec<BusRow>,
    pub lines: Vec<LineRow>,
    pub transformers: Vec<TransformerRow>,
    pub generators: Vec<GeneratorRow>,
    pub loads: Vec<LoadRow>,
    pub storage_units: Vec<StorageUnitRow>,
    pub links: Vec<LinkRow>,
    pub svcs: Vec<SvcRow>,
}

impl TableSet {
    pub fn row_count(&self) -> usize {
        self.buses.len()
            + self.lines.len()
            + self.transformers.len()
            + self.generators.len()
            + self.loads.len()
            + self.storage_units.len()
            + self.links.len()
            + self.svcs.len()
    }
}

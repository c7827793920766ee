use psa_core::{BusRef, ComponentKind, PsaError};
use psa_io::{load_network, LoaderOptions, NetworkFixture, SchemaStore, SqliteStore};
use tempfile::tempdir;

#[test]
fn populate_then_load_from_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grid.db");

    let mut store = SqliteStore::open(&path).unwrap();
    store.populate(&NetworkFixture::sample()).unwrap();
    drop(store);

    let store = SqliteStore::open_existing(&path).unwrap();
    let network = load_network(store, &LoaderOptions::default()).unwrap();
    assert_eq!(network.buses().len(), 5);
    assert_eq!(network.lines().len(), 4);
    assert_eq!(network.transformers().len(), 2);
    assert_eq!(network.links().len(), 2);
    assert_eq!(network.storage_units().len(), 2);
    assert_eq!(network.compensators().len(), 2);
}

#[test]
fn populate_twice_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grid.db");

    let mut store = SqliteStore::open(&path).unwrap();
    let first = store.populate(&NetworkFixture::sample()).unwrap();
    let second = store.populate(&NetworkFixture::sample()).unwrap();
    assert_eq!(first.buses, 5);
    assert_eq!(second.buses, 0);
    assert_eq!(second.lines, 0);

    let tables = store.read_tables().unwrap();
    assert_eq!(tables.buses.len(), 5);
    assert_eq!(tables.generators.len(), 3);
}

#[test]
fn missing_database_is_connection_error() {
    let dir = tempdir().unwrap();
    let result = SqliteStore::open_existing(&dir.path().join("absent.db"));
    assert!(matches!(result, Err(PsaError::StoreConnection(_))));
}

#[test]
fn populate_rejects_unknown_bus_name() {
    let mut fixture = NetworkFixture::sample();
    fixture.transformers[0].to_bus = "Harbour".into();

    let mut store = SqliteStore::open_in_memory().unwrap();
    match store.populate(&fixture) {
        Err(PsaError::ReferentialIntegrity {
            kind,
            row,
            missing,
            ..
        }) => {
            assert_eq!(kind, ComponentKind::Transformer);
            assert_eq!(row, "MainSubstation_Transformer");
            assert_eq!(missing, BusRef::Name("Harbour".into()));
        }
        other => panic!("expected referential error, got {:?}", other),
    }
}

#[test]
fn dangling_foreign_key_in_store_fails_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grid.db");
    let mut store = SqliteStore::open(&path).unwrap();
    store.populate(&NetworkFixture::sample()).unwrap();
    drop(store);

    // Foreign keys are off by default on a fresh connection.
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn.execute(
        "INSERT INTO Loads (name, bus_id, p_set_mw, q_set_mvar) VALUES ('Orphan_Load', 99, 1.0, 0.0)",
        [],
    )
    .unwrap();
    drop(conn);

    let store = SqliteStore::open_existing(&path).unwrap();
    match load_network(store, &LoaderOptions::default()) {
        Err(PsaError::ReferentialIntegrity { kind, row, missing, .. }) => {
            assert_eq!(kind, ComponentKind::Load);
            assert_eq!(row, "Orphan_Load");
            assert_eq!(missing, BusRef::Id(99));
        }
        other => panic!("expected referential error, got {:?}", other.map(|n| n.stats())),
    }
}

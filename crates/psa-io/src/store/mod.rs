//! Read boundary of the relational schema store.

use psa_core::PsaResult;

use crate::fixture::NetworkFixture;
use crate::schema::TableSet;

#[cfg(feature = "sqlite")]
mod sqlite;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

/// A source of network rows.
///
/// The loader takes the store by value and calls [`SchemaStore::close`]
/// before building the graph, so the connection never outlives loading.
pub trait SchemaStore {
    /// Human-readable location, used in logs
    fn describe(&self) -> String;

    /// Read every table in primary-key order.
    fn read_tables(&mut self) -> PsaResult<TableSet>;

    /// Release the connection.
    fn close(self) -> PsaResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// Rows held in memory, for fixtures and tests
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: TableSet,
}

impl MemoryStore {
    pub fn new(tables: TableSet) -> Self {
        Self { tables }
    }

    pub fn from_fixture(fixture: &NetworkFixture) -> PsaResult<Self> {
        Ok(Self::new(fixture.into_table_set()?))
    }
}

impl SchemaStore for MemoryStore {
    fn describe(&self) -> String {
        format!("in-memory store ({} rows)", self.tables.row_count())
    }

    fn read_tables(&mut self) -> PsaResult<TableSet> {
        Ok(self.tables.clone())
    }
}

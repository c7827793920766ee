//! Relational storage format and network loading.
//!
//! - [`schema`]: one row type per table plus the SQL DDL
//! - [`store`]: the [`SchemaStore`] read boundary with SQLite and in-memory stores
//! - [`fixture`]: JSON network descriptions that reference buses by name
//! - [`loader`]: rows to [`psa_core::Network`] with referential checks

pub mod fixture;
pub mod loader;
pub mod schema;
pub mod store;

pub use fixture::NetworkFixture;
pub use loader::{build_network, load_network, LoaderOptions};
pub use schema::TableSet;
#[cfg(feature = "sqlite")]
pub use store::SqliteStore;
pub use store::{MemoryStore, SchemaStore};

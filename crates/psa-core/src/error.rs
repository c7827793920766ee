//! Error types shared by every stage of the analysis pipeline.
//!
//! [`PsaError`] covers the fatal outcomes of a run: an unreachable store, a
//! dangling bus reference, a missing or ambiguous slack generator, and a
//! diverged power flow. Plausibility findings are deliberately *not* errors;
//! they are collected in [`crate::Findings`] and handed to the caller.
//!
//! # Example
//!
//! ```ignore
//! use psa_core::{PsaError, PsaResult};
//!
//! fn run(store: SqliteStore) -> PsaResult<()> {
//!     let mut network = load_network(store, &LoaderOptions::default())?;
//!     initializer.initialize(&mut network)?;
//!     Ok(())
//! }
//! ```

use std::fmt;

use thiserror::Error;

use crate::ComponentKind;

/// How a dependent row pointed at a bus that does not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusRef {
    /// Integer foreign key from a store table
    Id(i64),
    /// Bus name from a fixture file
    Name(String),
}

impl fmt::Display for BusRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusRef::Id(id) => write!(f, "id {}", id),
            BusRef::Name(name) => write!(f, "name '{}'", name),
        }
    }
}

/// Unified error type for all analysis operations.
#[derive(Error, Debug)]
pub enum PsaError {
    /// The schema store could not be opened, read or written
    #[error("store connection error: {0}")]
    StoreConnection(String),

    /// A dependent row references a bus that is not in the Buses table
    #[error("{kind} '{row}' references unknown bus ({missing}) in column '{column}'")]
    ReferentialIntegrity {
        kind: ComponentKind,
        row: String,
        column: &'static str,
        missing: BusRef,
    },

    /// Two rows of the same component kind share a name
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName { kind: ComponentKind, name: String },

    /// No generator is in Slack control mode
    #[error("no Slack-mode generator found; exactly one is required before solving")]
    MissingSlack,

    /// More than one generator is in Slack control mode
    #[error("expected exactly one Slack-mode generator, found {}: {}", names.len(), names.join(", "))]
    AmbiguousSlack { names: Vec<String> },

    /// The power-flow solver failed to converge or raised internally
    #[error("power flow diverged: {0}")]
    PowerFlowDiverged(String),

    /// Structural problems found while building the graph
    #[error("network error: {0}")]
    Network(String),

    /// Invalid configuration values
    #[error("configuration error: {0}")]
    Config(String),

    /// Parsing/deserialization errors
    #[error("parse error: {0}")]
    Parse(String),

    /// I/O errors (fixture files, config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results using PsaError.
pub type PsaResult<T> = Result<T, PsaError>;

impl From<serde_json::Error> for PsaError {
    fn from(err: serde_json::Error) -> Self {
        PsaError::Parse(err.to_string())
    }
}

impl From<chrono::ParseError> for PsaError {
    fn from(err: chrono::ParseError) -> Self {
        PsaError::Parse(err.to_string())
    }
}

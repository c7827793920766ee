//! High-level entry points that chain the analysis stages.

pub mod analysis;

pub use analysis::{AnalysisOutcome, AnalysisWorkflow};

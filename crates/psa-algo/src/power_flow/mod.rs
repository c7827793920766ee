//! AC power-flow backends implementing [`psa_core::PowerFlowSolver`].

pub mod ac_pf;

pub use ac_pf::NewtonRaphsonSolver;

//! Analysis modules.
//!
//! Runs the external analyzers and folds their outcomes into a report.

pub mod aggregator;
pub mod runner;

pub use aggregator::analyze;

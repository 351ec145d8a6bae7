//! Report rendering and persistence.

pub mod generator;

pub use generator::{read_report, render_report, write_report};

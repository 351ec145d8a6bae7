//! Version-control access.

pub mod context;

pub use context::GitContext;

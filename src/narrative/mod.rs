//! AI narrative of the analysis report.
//!
//! This module provides the Gemini backend and the generator that walks
//! the prioritized model list.

pub mod gemini;
pub mod generator;

pub use gemini::{GeminiClient, GenerativeBackend};
pub use generator::NarrativeGenerator;

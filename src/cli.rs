//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::RunStatus;
use clap::Parser;
use std::path::PathBuf;

/// QualityGate - analyzers, AI narrative and mail for every commit
///
/// Runs the configured analysis tools, persists a report, asks Gemini to
/// explain it against the current git diff and mails the committer.
/// Exit code is 0 when every tool passed, 1 otherwise.
///
/// Examples:
///   qualitygate
///   qualitygate --origin pre-push --concurrency 4
///   qualitygate --no-notify
///   qualitygate --notify-only --status failure
///   qualitygate --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Path to configuration file
    ///
    /// If not specified, looks for .qualitygate.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Project root used as working directory for tools and git
    #[arg(long, value_name = "DIR", env = "QUALITYGATE_ROOT")]
    pub project_root: Option<PathBuf>,

    /// Where to persist the analysis report (relative to the project root)
    #[arg(long, value_name = "FILE")]
    pub report_path: Option<PathBuf>,

    /// Number of analysis tools run at the same time
    #[arg(long, value_name = "NUM")]
    pub concurrency: Option<usize>,

    /// Gemini model candidate, in priority order (repeatable)
    ///
    /// Replaces the candidate list from the config file.
    #[arg(short, long, value_name = "MODEL")]
    pub model: Vec<String>,

    /// Where this run was triggered from (pre-commit, pre-push, ci, ...)
    #[arg(long, default_value = "manual", value_name = "LABEL")]
    pub origin: String,

    /// Skip the AI narrative even if GEMINI_API_KEY is set
    #[arg(long)]
    pub no_ai: bool,

    /// Run the tools and persist the report, but send no mail
    #[arg(long, conflicts_with = "notify_only")]
    pub no_notify: bool,

    /// Skip the tools and report on the already persisted analysis
    #[arg(long, requires = "status", conflicts_with = "no_notify")]
    pub notify_only: bool,

    /// Verdict of the persisted analysis (with --notify-only)
    #[arg(long, value_name = "STATUS")]
    pub status: Option<RunStatus>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .qualitygate.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if self.concurrency == Some(0) {
            return Err("Concurrency must be at least 1".to_string());
        }

        if self.status.is_some() && !self.notify_only {
            return Err("--status is only meaningful with --notify-only".to_string());
        }

        if self.model.iter().any(|m| m.trim().is_empty()) {
            return Err("Model names must not be empty".to_string());
        }

        if let Some(ref root) = self.project_root {
            if !root.is_dir() {
                return Err(format!(
                    "Project root is not a directory: {}",
                    root.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

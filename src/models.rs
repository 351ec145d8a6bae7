//! Data models for the quality gate.
//!
//! This module contains the core data structures shared by the pipeline
//! stages: tool definitions, their outcomes and the overall run verdict.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One external analysis tool, as declared in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Display label used in the report (e.g. "Flake8 (lint)").
    pub name: String,
    /// Executable followed by its arguments.
    pub command: Vec<String>,
    /// Installation remedy shown when the executable cannot be found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_hint: Option<String>,
    /// Kill the tool after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

impl ToolSpec {
    /// Creates a tool spec from a label and a command line.
    pub fn new(name: impl Into<String>, command: &[&str]) -> Self {
        Self {
            name: name.into(),
            command: command.iter().map(|s| s.to_string()).collect(),
            install_hint: None,
            timeout_seconds: None,
        }
    }

    /// Sets the installation hint.
    pub fn with_install_hint(mut self, hint: impl Into<String>) -> Self {
        self.install_hint = Some(hint.into());
        self
    }

    /// The executable name, if the command is not empty.
    pub fn program(&self) -> Option<&str> {
        self.command.first().map(String::as_str)
    }

    /// Remedy suggested when the executable is missing.
    pub fn remedy(&self) -> String {
        match (&self.install_hint, self.program()) {
            (Some(hint), _) => hint.clone(),
            (None, Some(program)) => format!("installez '{}' et vérifiez qu'il est dans le PATH", program),
            (None, None) => "renseignez une commande dans la configuration".to_string(),
        }
    }
}

/// Why the runner itself could not produce a normal tool result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerFailure {
    /// The executable was not found on the PATH.
    NotFound,
    /// The tool ran longer than its configured timeout.
    TimedOut(u64),
    /// The command line in the configuration is empty.
    EmptyCommand,
    /// Any other spawn or wait error.
    Execution(String),
}

impl fmt::Display for RunnerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerFailure::NotFound => write!(f, "executable not found"),
            RunnerFailure::TimedOut(secs) => write!(f, "timed out after {}s", secs),
            RunnerFailure::EmptyCommand => write!(f, "empty command"),
            RunnerFailure::Execution(e) => write!(f, "execution error: {}", e),
        }
    }
}

/// Result of running one [`ToolSpec`] once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    /// True iff the process exited with status zero.
    pub success: bool,
    /// Standard output followed by standard error, trimmed. For runner
    /// failures this holds the operator-facing explanation instead.
    pub output: String,
    /// Set when the tool never produced a normal exit status.
    pub failure: Option<RunnerFailure>,
}

impl ToolOutcome {
    /// Outcome of a process that ran to completion.
    pub fn completed(success: bool, output: String) -> Self {
        Self {
            success,
            output,
            failure: None,
        }
    }

    /// Outcome of a tool the runner could not execute.
    pub fn runner_failure(failure: RunnerFailure, message: String) -> Self {
        Self {
            success: false,
            output: message,
            failure: Some(failure),
        }
    }
}

/// One tool's entry in the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSection {
    /// Tool display label.
    pub name: String,
    /// Whether the tool passed.
    pub success: bool,
    /// Captured text; the detail block is omitted when empty.
    pub detail: String,
}

impl ToolSection {
    pub fn new(name: impl Into<String>, success: bool, detail: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success,
            detail: detail.into(),
        }
    }
}

impl From<(&ToolSpec, ToolOutcome)> for ToolSection {
    fn from((spec, outcome): (&ToolSpec, ToolOutcome)) -> Self {
        Self {
            name: spec.name.clone(),
            success: outcome.success,
            detail: outcome.output,
        }
    }
}

/// The aggregated analysis report for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    /// Local time the run started.
    pub generated_at: NaiveDateTime,
    /// Sections in configured tool order.
    pub sections: Vec<ToolSection>,
}

impl Report {
    pub fn new(generated_at: NaiveDateTime, sections: Vec<ToolSection>) -> Self {
        Self {
            generated_at,
            sections,
        }
    }

    /// True iff every section passed. Derived, so it cannot drift from the sections.
    pub fn success(&self) -> bool {
        self.sections.iter().all(|s| s.success)
    }

    pub fn status(&self) -> RunStatus {
        RunStatus::from_success(self.success())
    }

    /// Names of the tools that failed.
    pub fn failed_tools(&self) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| !s.success)
            .map(|s| s.name.as_str())
            .collect()
    }
}

/// Overall verdict of a run, given on the command line in notify-only mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RunStatus {
    /// Every tool passed.
    #[default]
    Success,
    /// At least one tool failed.
    Failure,
}

impl RunStatus {
    /// Maps a success flag to a status.
    pub fn from_success(success: bool) -> Self {
        if success {
            RunStatus::Success
        } else {
            RunStatus::Failure
        }
    }

    /// Process exit code for this status.
    pub fn exit_code(self) -> i32 {
        match self {
            RunStatus::Success => 0,
            RunStatus::Failure => 1,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failure => write!(f, "failure"),
        }
    }
}

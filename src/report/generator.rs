//! Plain-text report generation.
//!
//! This module renders the aggregated [`Report`] in the fixed text layout
//! expected by hooks and log shipping, and persists it.

use crate::models::{Report, ToolSection};
use anyhow::{Context, Result};
use std::path::Path;

const DELIMITER_WIDTH: usize = 60;
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const SUCCESS_LABEL: &str = "Réussi";
pub const FAILURE_LABEL: &str = "Échec";
pub const DETAILS_MARKER: &str = "--- Détails ---";
pub const CLEAN_SUMMARY: &str = "Tout est propre ! Le code respecte les standards de qualité.";
pub const ISSUES_SUMMARY: &str =
    "Des problèmes ont été détectés. Corrigez-les avant de committer/pusher.";

fn delimiter() -> String {
    "=".repeat(DELIMITER_WIDTH)
}

/// Label printed next to a tool name.
pub fn status_label(success: bool) -> &'static str {
    if success {
        SUCCESS_LABEL
    } else {
        FAILURE_LABEL
    }
}

/// One-line verdict at the bottom of the report.
pub fn summary_line(success: bool) -> &'static str {
    if success {
        CLEAN_SUMMARY
    } else {
        ISSUES_SUMMARY
    }
}

/// Render the report as text.
pub fn render_report(report: &Report) -> String {
    let mut lines: Vec<String> = Vec::new();

    // Header
    lines.push(delimiter());
    lines.push(format!(
        "Rapport d'analyse du {}",
        report.generated_at.format(TIMESTAMP_FORMAT)
    ));
    lines.push(format!("{}\n", delimiter()));

    for section in &report.sections {
        push_section(&mut lines, section);
    }

    // Summary
    lines.push(delimiter());
    lines.push(format!("{}\n", summary_line(report.success())));
    lines.push(format!("{}\n", delimiter()));

    lines.join("\n")
}

fn push_section(lines: &mut Vec<String>, section: &ToolSection) {
    lines.push(format!("{} — {}", section.name, status_label(section.success)));
    if !section.detail.is_empty() {
        lines.push(DETAILS_MARKER.to_string());
        lines.push(section.detail.clone());
    }
    lines.push(String::new());
}

/// Write the rendered report, replacing any previous one.
pub fn write_report(content: &str, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

/// Read the persisted report, or a warning text standing in for it.
pub fn read_report(path: &Path) -> String {
    if !path.exists() {
        return format!(
            "Avertissement : aucun rapport d'analyse trouvé ({}).",
            path.display()
        );
    }

    match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => format!("Avertissement : erreur de lecture du rapport : {}", e),
    }
}

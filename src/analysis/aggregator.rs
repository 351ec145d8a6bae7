//! Running the configured tool battery and folding it into a report.

use crate::analysis::runner::run_tool;
use crate::models::{Report, ToolOutcome, ToolSection, ToolSpec};
use chrono::NaiveDateTime;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use std::path::Path;
use tracing::{info, warn};

/// Run every tool and return the outcomes in configured order.
///
/// Up to `concurrency` tools run at once; results are still yielded in
/// declaration order so the report stays diffable across runs.
pub async fn run_tools(
    tools: &[ToolSpec],
    project_root: &Path,
    concurrency: usize,
    progress: Option<&ProgressBar>,
) -> Vec<ToolOutcome> {
    stream::iter(tools)
        .map(|spec| async move {
            let outcome = run_tool(spec, project_root).await;
            match outcome.failure {
                Some(ref failure) => warn!("{}: could not run ({})", spec.name, failure),
                None => info!(
                    "{}: {}",
                    spec.name,
                    if outcome.success { "passed" } else { "failed" }
                ),
            }
            if let Some(pb) = progress {
                pb.set_message(spec.name.clone());
                pb.inc(1);
            }
            outcome
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Fold tool outcomes into a report. `outcomes[i]` belongs to `tools[i]`.
pub fn aggregate(
    generated_at: NaiveDateTime,
    tools: &[ToolSpec],
    outcomes: Vec<ToolOutcome>,
) -> Report {
    let sections = tools
        .iter()
        .zip(outcomes)
        .map(ToolSection::from)
        .collect();

    Report::new(generated_at, sections)
}

/// Run the tools and build the report in one step.
pub async fn analyze(
    generated_at: NaiveDateTime,
    tools: &[ToolSpec],
    project_root: &Path,
    concurrency: usize,
    progress: Option<&ProgressBar>,
) -> Report {
    let outcomes = run_tools(tools, project_root, concurrency, progress).await;
    aggregate(generated_at, tools, outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn now() -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }

    fn sh(name: &str, script: &str) -> ToolSpec {
        ToolSpec::new(name, &["sh", "-c", script])
    }

    #[tokio::test]
    async fn test_all_pass() {
        let dir = TempDir::new().unwrap();
        let tools = vec![sh("a", "true"), sh("b", "echo fine")];
        let report = analyze(now(), &tools, dir.path(), 1, None).await;

        assert!(report.success());
        assert_eq!(report.sections.len(), 2);
    }

    #[tokio::test]
    async fn test_mixed_fail() {
        let dir = TempDir::new().unwrap();
        let tools = vec![sh("ok", "true"), sh("ko", "echo bad; exit 3"), sh("ok2", "true")];
        let report = analyze(now(), &tools, dir.path(), 1, None).await;

        assert!(!report.success());
        assert_eq!(report.failed_tools(), vec!["ko"]);
    }

    #[tokio::test]
    async fn test_all_fail() {
        let dir = TempDir::new().unwrap();
        let tools = vec![sh("a", "exit 1"), sh("b", "exit 2")];
        let report = analyze(now(), &tools, dir.path(), 1, None).await;

        assert!(!report.success());
        assert_eq!(report.failed_tools(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_missing_binary_does_not_abort_run() {
        let dir = TempDir::new().unwrap();
        let tools = vec![
            ToolSpec::new("Ghost", &["qualitygate-ghost-tool"]),
            sh("Real", "echo real output"),
        ];
        let report = analyze(now(), &tools, dir.path(), 1, None).await;

        assert_eq!(report.sections.len(), 2);
        assert!(!report.sections[0].success);
        assert!(report.sections[0].detail.contains("Installe-le"));
        assert!(report.sections[1].success);
        assert_eq!(report.sections[1].detail, "real output");
        assert!(!report.success());
    }

    #[tokio::test]
    async fn test_parallel_runs_keep_configured_order() {
        let dir = TempDir::new().unwrap();
        let tools = vec![
            sh("slow", "sleep 1; echo slow"),
            sh("fast", "echo fast"),
            sh("medium", "sleep 0.3; echo medium"),
        ];
        let pb = ProgressBar::hidden();
        let report = analyze(now(), &tools, dir.path(), 3, Some(&pb)).await;

        let names: Vec<_> = report.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["slow", "fast", "medium"]);
        assert_eq!(report.sections[0].detail, "slow");
        assert_eq!(pb.position(), 3);
    }

    #[test]
    fn test_aggregate_pairs_by_position() {
        let tools = vec![ToolSpec::new("first", &["x"]), ToolSpec::new("second", &["y"])];
        let outcomes = vec![
            ToolOutcome::completed(true, String::new()),
            ToolOutcome::completed(false, "oops".to_string()),
        ];
        let report = aggregate(now(), &tools, outcomes);

        assert_eq!(report.sections[0].name, "first");
        assert!(report.sections[0].success);
        assert_eq!(report.sections[1].detail, "oops");
    }
}

//! Execution of a single analysis tool.
//!
//! Every fault is folded into a failed [`ToolOutcome`]; nothing here
//! returns an error to the caller.

use crate::models::{RunnerFailure, ToolOutcome, ToolSpec};
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Run `spec` once with `project_root` as working directory.
pub async fn run_tool(spec: &ToolSpec, project_root: &Path) -> ToolOutcome {
    let Some((program, args)) = spec.command.split_first() else {
        warn!("Tool {} has an empty command", spec.name);
        return ToolOutcome::runner_failure(
            RunnerFailure::EmptyCommand,
            format!("{} : aucune commande configurée.", spec.name),
        );
    };

    if !project_root.is_dir() {
        let reason = format!("répertoire de travail introuvable : {}", project_root.display());
        warn!("{}: {}", spec.name, reason);
        return ToolOutcome::runner_failure(
            RunnerFailure::Execution(reason.clone()),
            format!("Erreur inattendue : {}", reason),
        );
    }

    debug!("Running {}: {:?} in {}", spec.name, spec.command, project_root.display());

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(project_root)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match spec.timeout_seconds {
        Some(secs) => {
            match tokio::time::timeout(Duration::from_secs(secs), command.output()).await {
                Ok(result) => result,
                Err(_) => {
                    warn!("{} timed out after {}s", spec.name, secs);
                    return ToolOutcome::runner_failure(
                        RunnerFailure::TimedOut(secs),
                        format!("{} a dépassé le délai de {} s.", spec.name, secs),
                    );
                }
            }
        }
        None => command.output().await,
    };

    match output {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            let success = output.status.success();
            debug!("{} exited with {}", spec.name, output.status);
            ToolOutcome::completed(success, text.trim().to_string())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("{}: executable {} not found", spec.name, program);
            ToolOutcome::runner_failure(
                RunnerFailure::NotFound,
                format!("{} non trouvé. Installe-le : {}", spec.name, spec.remedy()),
            )
        }
        Err(e) => {
            warn!("{}: unexpected execution error: {}", spec.name, e);
            ToolOutcome::runner_failure(
                RunnerFailure::Execution(e.to_string()),
                format!("Erreur inattendue : {}", e),
            )
        }
    }
}

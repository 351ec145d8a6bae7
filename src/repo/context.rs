//! Git context extraction.
//!
//! Reads the committer email, the current diff and the changed-file list
//! with git2. The three reads open the repository independently and never
//! fail: a broken or history-less checkout yields soft defaults.

use git2::{Diff, DiffFormat, ErrorCode, Repository, Tree};
use std::path::Path;
use tracing::{debug, warn};

/// Marker used when neither the index nor the last commit has changes.
pub const NO_CHANGES: &str = "Aucun changement détecté.";

/// Version-control context of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitContext {
    /// `user.email` from git configuration, if any.
    pub committer_email: Option<String>,
    /// Staged diff, else diff against `HEAD~1`, else [`NO_CHANGES`].
    pub diff: String,
    /// Paths that differ from `HEAD~1`.
    pub changed_files: Vec<String>,
}

impl GitContext {
    /// Collect all three reads for the repository containing `root`.
    pub fn collect(root: &Path) -> Self {
        let context = Self {
            committer_email: committer_email(root),
            diff: diff_text(root),
            changed_files: changed_files(root),
        };
        debug!(
            "Git context: email={:?}, diff={} bytes, {} changed files",
            context.committer_email,
            context.diff.len(),
            context.changed_files.len()
        );
        context
    }
}

/// Configured `user.email`, looking at repository config first.
pub fn committer_email(root: &Path) -> Option<String> {
    let config = match Repository::discover(root) {
        Ok(repo) => repo.config(),
        Err(_) => git2::Config::open_default(),
    };

    match config.and_then(|c| c.get_string("user.email")) {
        Ok(email) => Some(email.trim().to_string()).filter(|e| !e.is_empty()),
        Err(e) => {
            debug!("No git user.email: {}", e.message());
            None
        }
    }
}

/// Diff text for the prompt. Faults become an explanatory text.
pub fn diff_text(root: &Path) -> String {
    match staged_or_previous_diff(root) {
        Ok(Some(text)) => text,
        Ok(None) => NO_CHANGES.to_string(),
        Err(e) => {
            warn!("git diff failed: {}", e.message());
            format!("Avertissement : erreur git diff : {}", e.message())
        }
    }
}

/// Files changed since `HEAD~1`. Faults yield an empty list.
pub fn changed_files(root: &Path) -> Vec<String> {
    match list_changed_files(root) {
        Ok(files) => files,
        Err(e) => {
            debug!("Could not list changed files: {}", e.message());
            Vec::new()
        }
    }
}

fn staged_or_previous_diff(root: &Path) -> Result<Option<String>, git2::Error> {
    let repo = Repository::discover(root)?;

    let head = head_tree(&repo)?;
    let staged = patch_text(&repo.diff_tree_to_index(head.as_ref(), None, None)?)?;
    if let Some(staged) = non_blank(&staged) {
        return Ok(Some(staged));
    }

    let previous = match previous_tree(&repo)? {
        Some(tree) => patch_text(&repo.diff_tree_to_workdir_with_index(Some(&tree), None)?)?,
        None => String::new(),
    };

    Ok(non_blank(&previous))
}

fn non_blank(text: &str) -> Option<String> {
    Some(text.trim().to_string()).filter(|t| !t.is_empty())
}

fn list_changed_files(root: &Path) -> Result<Vec<String>, git2::Error> {
    let repo = Repository::discover(root)?;
    let Some(tree) = previous_tree(&repo)? else {
        return Ok(Vec::new());
    };

    let diff = repo.diff_tree_to_workdir_with_index(Some(&tree), None)?;
    let files = diff
        .deltas()
        .filter_map(|delta| delta.new_file().path().or_else(|| delta.old_file().path()))
        .map(|path| path.to_string_lossy().into_owned())
        .filter(|path| !path.trim().is_empty())
        .collect();

    Ok(files)
}

fn is_unborn(e: &git2::Error) -> bool {
    matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}

/// Tree of `HEAD`, or `None` before the first commit.
fn head_tree(repo: &Repository) -> Result<Option<Tree<'_>>, git2::Error> {
    match repo.head() {
        Ok(head) => Ok(Some(head.peel_to_tree()?)),
        Err(e) if is_unborn(&e) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Tree of `HEAD~1`, or `None` when there is no such commit.
fn previous_tree(repo: &Repository) -> Result<Option<Tree<'_>>, git2::Error> {
    let head = match repo.head() {
        Ok(head) => head,
        Err(e) if is_unborn(&e) => return Ok(None),
        Err(e) => return Err(e),
    };

    let commit = head.peel_to_commit()?;
    if commit.parent_count() == 0 {
        return Ok(None);
    }

    Ok(Some(commit.parent(0)?.tree()?))
}

fn patch_text(diff: &Diff<'_>) -> Result<String, git2::Error> {
    let mut text = String::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            text.push(line.origin());
        }
        text.push_str(&String::from_utf8_lossy(line.content()));
        true
    })?;
    Ok(text)
}

//! Which WPT revision a run tests.

use std::path::Path;

use chrono::Utc;
use tracing::{debug, info};

use crate::error::{RunError, RunResult};
use crate::process::{CommandRunner, CommandSpec};

/// Length of the revision prefix used in artifact paths and registration.
pub const SHORT_REVISION_LEN: usize = 10;

/// Revision discovery against a WPT checkout.
pub trait ShaFinder {
    /// The revision designated for today's runs, if one exists yet.
    fn todays_sha(&self, repo: &Path) -> RunResult<Option<String>>;
    /// The checkout's current HEAD.
    fn head_sha(&self, repo: &Path) -> RunResult<String>;
}

/// Explicit override, else today's designated revision, else HEAD.
///
/// An explicit revision is passed through as given; `git checkout` is what
/// ultimately validates it.
pub fn resolve_revision(
    explicit: Option<&str>,
    finder: &dyn ShaFinder,
    repo: &Path,
) -> RunResult<String> {
    if let Some(sha) = explicit {
        info!(revision = %sha, "using explicit revision");
        return Ok(sha.to_string());
    }
    if let Some(sha) = finder.todays_sha(repo)? {
        info!(revision = %sha, "using today's revision");
        return Ok(sha);
    }
    let sha = finder.head_sha(repo)?;
    info!(revision = %sha, "no revision designated for today, using HEAD");
    Ok(sha)
}

/// First [`SHORT_REVISION_LEN`] characters of a revision.
pub fn short_revision(revision: &str) -> &str {
    match revision.char_indices().nth(SHORT_REVISION_LEN) {
        Some((idx, _)) => &revision[..idx],
        None => revision,
    }
}

/// [`ShaFinder`] backed by `git` in the checkout.
///
/// Today's revision is the first commit on `master` made at or after
/// 00:00 UTC today, so every run started on the same day tests the same
/// tree.
pub struct GitShaFinder<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> GitShaFinder<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }

    fn git_stdout(&self, repo: &Path, args: &[String]) -> RunResult<String> {
        let spec = CommandSpec::new("git", args.iter().cloned())
            .in_dir(repo)
            .capturing_stdout();
        debug!(command = %spec.display(), "querying revision");
        let output = self.runner.run(&spec).map_err(|e| RunError::Vcs {
            command: spec.display(),
            message: e.to_string(),
        })?;
        if !output.success() {
            return Err(RunError::Vcs {
                command: spec.display(),
                message: output.describe_exit(),
            });
        }
        Ok(output.stdout)
    }
}

impl ShaFinder for GitShaFinder<'_> {
    fn todays_sha(&self, repo: &Path) -> RunResult<Option<String>> {
        let since = format!("--since={}T00:00:00Z", Utc::now().format("%Y-%m-%d"));
        let args = [
            "log".to_string(),
            "master".to_string(),
            since,
            "--reverse".to_string(),
            "--format=%H".to_string(),
        ];
        let stdout = self.git_stdout(repo, &args)?;
        Ok(stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string))
    }

    fn head_sha(&self, repo: &Path) -> RunResult<String> {
        let args = ["rev-parse".to_string(), "HEAD".to_string()];
        let stdout = self.git_stdout(repo, &args)?;
        let sha = stdout.trim();
        if sha.is_empty() {
            return Err(RunError::Vcs {
                command: "git rev-parse HEAD".to_string(),
                message: "empty output".to_string(),
            });
        }
        Ok(sha.to_string())
    }
}

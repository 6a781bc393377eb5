use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use git2::Repository;

use crate::command::CommandRunner;
use crate::{xlog_debug, xlog_warn, Error, Result};

/// Format passed to `git log`: hash, strict ISO committer date, subject.
const LOG_FORMAT: &str = "--format=%H|%cI|%s";

/// A historical commit touching the snapshot file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub hash: String,
    pub date: DateTime<FixedOffset>,
    pub subject: String,
}

impl Revision {
    pub fn short_hash(&self) -> &str {
        let end = self.hash.len().min(7);
        &self.hash[..end]
    }

    /// Parse one `hash|date|subject` line. The subject may contain `|`.
    pub fn parse_log_line(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, '|');
        let hash = parts.next()?.trim();
        let date = parts.next()?.trim();
        let subject = parts.next().unwrap_or("").trim();
        if hash.is_empty() {
            return None;
        }
        let date = DateTime::parse_from_rfc3339(date).ok()?;
        Some(Self {
            hash: hash.to_string(),
            date,
            subject: subject.to_string(),
        })
    }
}

/// Check that `path` exists and lives inside a git repository.
pub fn validate_repository(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(Error::InvalidRepository(path.display().to_string()));
    }
    Repository::discover(path).map_err(|e| {
        xlog_debug!("Repository::discover {} failed: {}", path.display(), e);
        Error::InvalidRepository(path.display().to_string())
    })?;
    Ok(())
}

/// Clone `url` into `target` with the git CLI.
pub fn clone_repository(runner: &dyn CommandRunner, url: &str, target: &Path) -> Result<()> {
    xlog_debug!("clone_repository url={} target={}", url, target.display());
    let target = target.display().to_string();
    runner.run("git", &["clone", url, &target], None)?;
    Ok(())
}

/// Git CLI operations on the snapshot repository.
pub struct GitOps {
    repo_path: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl GitOps {
    pub fn new(repo_path: &Path, runner: Arc<dyn CommandRunner>) -> Self {
        xlog_debug!("GitOps::new path={}", repo_path.display());
        Self {
            repo_path: repo_path.to_path_buf(),
            runner,
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        Ok(self.runner.run("git", args, Some(&self.repo_path))?.stdout)
    }

    pub fn add(&self, path: &str) -> Result<()> {
        self.git(&["add", path])?;
        Ok(())
    }

    /// `git status --porcelain` restricted to `path`. Empty output means the
    /// working tree and index match HEAD for that path.
    pub fn has_changes(&self, path: &str) -> Result<bool> {
        let status = self.git(&["status", "--porcelain", "--", path])?;
        Ok(!status.trim().is_empty())
    }

    pub fn commit(&self, message: &str, path: &str) -> Result<()> {
        xlog_debug!("GitOps::commit message={}", message);
        self.git(&["commit", "-m", message, "--", path])?;
        Ok(())
    }

    pub fn push(&self) -> Result<()> {
        self.git(&["push"])?;
        Ok(())
    }

    /// Revisions touching `path`, newest first as emitted by `git log`.
    ///
    /// A repository without any commits yet has no history.
    pub fn log(&self, path: &str) -> Result<Vec<Revision>> {
        let output = match self.git(&["log", LOG_FORMAT, "--", path]) {
            Ok(out) => out,
            Err(Error::CommandFailed { stderr, .. })
                if stderr.contains("does not have any commits") =>
            {
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        let mut revisions = Vec::new();
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            match Revision::parse_log_line(line) {
                Some(rev) => revisions.push(rev),
                None => xlog_warn!("Skipping unparseable log line: {}", line),
            }
        }
        xlog_debug!("GitOps::log path={} revisions={}", path, revisions.len());
        Ok(revisions)
    }

    /// Content of `path` as of `revision` (not the working copy).
    pub fn show(&self, revision: &str, path: &str) -> Result<String> {
        let object = format!("{}:{}", revision, path);
        self.git(&["show", &object])
    }
}

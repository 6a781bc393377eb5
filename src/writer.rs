//! Snapshot writer: persists the live extension set and commits it.

use std::fs;
use std::path::PathBuf;

use crate::diff::{CommitMessage, SnapshotDiff};
use crate::git::GitOps;
use crate::snapshot::{ExtensionId, SnapshotDocument, SNAPSHOT_FILE};
use crate::{xlog, xlog_debug, xlog_warn, Error, Result};

/// Result of a sync that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The serialized snapshot matched what is already committed.
    Unchanged,
    Committed { message: String, pushed: bool },
}

pub struct SnapshotWriter {
    git: GitOps,
    push: bool,
}

impl SnapshotWriter {
    pub fn new(git: GitOps) -> Self {
        Self { git, push: true }
    }

    pub fn with_push(mut self, push: bool) -> Self {
        self.push = push;
        self
    }

    pub fn git(&self) -> &GitOps {
        &self.git
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.git.repo_path().join(SNAPSHOT_FILE)
    }

    /// Snapshot currently on disk, if any. Unreadable or corrupt files yield
    /// `None` so they only cost the diff-based commit message.
    pub fn load_previous(&self) -> Option<SnapshotDocument> {
        let path = self.snapshot_path();
        if !path.exists() {
            return None;
        }
        let parsed = fs::read_to_string(&path)
            .map_err(Error::from)
            .and_then(|content| SnapshotDocument::from_json(&content));
        match parsed {
            Ok(doc) => Some(doc),
            Err(e) => {
                xlog_warn!("Ignoring unreadable snapshot {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write the snapshot for `live`, then commit and push it if git reports
    /// a change.
    ///
    /// The file is written before any git command runs, so a failing commit
    /// leaves the new content on disk.
    pub fn sync(&self, live: &[ExtensionId]) -> Result<SyncOutcome> {
        let current = SnapshotDocument::from_ids(live.iter().cloned());
        let diff = self
            .load_previous()
            .map(|previous| SnapshotDiff::between(&previous, &current));
        let message = CommitMessage::select(diff.as_ref()).to_string();
        xlog_debug!(
            "SnapshotWriter::sync total={} diff={:?}",
            current.total(),
            diff
        );

        fs::write(self.snapshot_path(), current.to_json()?)?;
        self.git.add(SNAPSHOT_FILE)?;

        if !self.git.has_changes(SNAPSHOT_FILE)? {
            xlog_debug!("Snapshot unchanged, skipping commit");
            return Ok(SyncOutcome::Unchanged);
        }

        self.git.commit(&message, SNAPSHOT_FILE)?;
        if self.push {
            self.git.push()?;
        }
        xlog!("Committed snapshot: {} (pushed={})", message, self.push);

        Ok(SyncOutcome::Committed {
            message,
            pushed: self.push,
        })
    }
}

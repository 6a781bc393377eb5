//! List diffing for commit messages and restore plans.

use std::collections::HashSet;
use std::fmt;

use crate::snapshot::{ExtensionId, SnapshotDocument};

/// Difference between two snapshots produced by the writer.
///
/// Matching is case-sensitive: both sides come from the same writer and
/// therefore share the stored spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<ExtensionId>,
    pub removed: Vec<ExtensionId>,
}

impl SnapshotDiff {
    pub fn between(previous: &SnapshotDocument, current: &SnapshotDocument) -> Self {
        let prev: HashSet<&ExtensionId> = previous.extensions().iter().collect();
        let curr: HashSet<&ExtensionId> = current.extensions().iter().collect();

        Self {
            added: current
                .extensions()
                .iter()
                .filter(|id| !prev.contains(id))
                .cloned()
                .collect(),
            removed: previous
                .extensions()
                .iter()
                .filter(|id| !curr.contains(id))
                .cloned()
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Commit message chosen from a snapshot diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitMessage {
    /// Both additions and removals: counts only.
    Summary { added: usize, removed: usize },
    Installed(Vec<ExtensionId>),
    Uninstalled(Vec<ExtensionId>),
    /// No diff data (nothing changed, or the previous snapshot was unreadable).
    Default { timestamp: String },
}

impl CommitMessage {
    /// Pick a message in priority order: summary, installed, uninstalled, default.
    pub fn select(diff: Option<&SnapshotDiff>) -> Self {
        match diff {
            Some(d) if !d.added.is_empty() && !d.removed.is_empty() => CommitMessage::Summary {
                added: d.added.len(),
                removed: d.removed.len(),
            },
            Some(d) if !d.added.is_empty() => CommitMessage::Installed(d.added.clone()),
            Some(d) if !d.removed.is_empty() => CommitMessage::Uninstalled(d.removed.clone()),
            _ => CommitMessage::default_now(),
        }
    }

    pub fn default_now() -> Self {
        CommitMessage::Default {
            timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for CommitMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitMessage::Summary { added, removed } => {
                write!(f, "Update extensions: +{} added, -{} removed", added, removed)
            }
            CommitMessage::Installed(ids) => write!(f, "Installed: {}", join_ids(ids)),
            CommitMessage::Uninstalled(ids) => write!(f, "Uninstalled: {}", join_ids(ids)),
            CommitMessage::Default { timestamp } => write!(f, "Update extensions: {}", timestamp),
        }
    }
}

fn join_ids(ids: &[ExtensionId]) -> String {
    ids.iter()
        .map(ExtensionId::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// What a restore has to do to converge live state onto a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestorePlan {
    pub to_install: Vec<ExtensionId>,
    pub to_uninstall: Vec<ExtensionId>,
}

impl RestorePlan {
    /// Case-insensitive set differences. Each list keeps the order of its
    /// source list.
    pub fn compute(snapshot: &[ExtensionId], current: &[ExtensionId]) -> Self {
        let snapshot_keys: HashSet<String> = snapshot.iter().map(ExtensionId::key).collect();
        let current_keys: HashSet<String> = current.iter().map(ExtensionId::key).collect();

        Self {
            to_install: difference(snapshot, &current_keys),
            to_uninstall: difference(current, &snapshot_keys),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_install.is_empty() && self.to_uninstall.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} to install, {} to uninstall",
            self.to_install.len(),
            self.to_uninstall.len()
        )
    }
}

fn difference(source: &[ExtensionId], exclude: &HashSet<String>) -> Vec<ExtensionId> {
    let mut seen = HashSet::new();
    source
        .iter()
        .filter(|id| {
            let key = id.key();
            !exclude.contains(&key) && seen.insert(key)
        })
        .cloned()
        .collect()
}

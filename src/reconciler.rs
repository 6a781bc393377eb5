//! Snapshot reconciler: converges the live extension set onto a snapshot
//! taken from history.

use std::fmt;

use crate::diff::RestorePlan;
use crate::extensions::ExtensionManager;
use crate::git::{GitOps, Revision};
use crate::snapshot::{ExtensionId, SnapshotDocument, SNAPSHOT_FILE};
use crate::{xlog, xlog_debug, xlog_warn, Error, Result};

/// Phases of one restore invocation. Nothing here is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestorePhase {
    Idle,
    HistoryLoaded,
    RevisionSelected,
    DiffComputed,
    Cancelled,
    Confirmed,
    /// The only phase during which the restore flag is held.
    Applying,
}

impl RestorePhase {
    pub fn can_transition_to(self, next: RestorePhase) -> bool {
        use RestorePhase::*;
        matches!(
            (self, next),
            (Idle, HistoryLoaded)
                | (HistoryLoaded, RevisionSelected)
                | (RevisionSelected, DiffComputed)
                | (HistoryLoaded, Cancelled)
                | (DiffComputed, Cancelled)
                | (DiffComputed, Confirmed)
                | (Confirmed, Applying)
                | (Applying, Idle)
                | (Cancelled, Idle)
                // Early exits: empty history, empty plan.
                | (HistoryLoaded, Idle)
                | (DiffComputed, Idle)
        )
    }

    /// Move to `next`, logging the transition.
    pub fn advance(&mut self, next: RestorePhase) {
        debug_assert!(
            self.can_transition_to(next),
            "invalid restore transition {:?} -> {:?}",
            self,
            next
        );
        xlog_debug!("restore phase {:?} -> {:?}", self, next);
        *self = next;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Install,
    Uninstall,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Install => f.write_str("install"),
            Action::Uninstall => f.write_str("uninstall"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedAction {
    pub action: Action,
    pub id: ExtensionId,
    pub error: String,
}

/// Per-item results of applying a plan. Failed items do not stop the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub uninstalled: Vec<ExtensionId>,
    pub installed: Vec<ExtensionId>,
    pub failed: Vec<FailedAction>,
}

impl ApplyReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} installed, {} uninstalled",
            self.installed.len(),
            self.uninstalled.len()
        );
        if !self.failed.is_empty() {
            s.push_str(&format!(", {} failed", self.failed.len()));
        }
        s
    }
}

pub struct Reconciler<'a> {
    git: &'a GitOps,
    manager: &'a dyn ExtensionManager,
}

impl<'a> Reconciler<'a> {
    pub fn new(git: &'a GitOps, manager: &'a dyn ExtensionManager) -> Self {
        Self { git, manager }
    }

    /// Revisions of the snapshot file, newest first.
    pub fn history(&self) -> Result<Vec<Revision>> {
        self.git.log(SNAPSHOT_FILE)
    }

    /// Find a revision by full hash or unique prefix.
    pub fn find<'r>(&self, history: &'r [Revision], prefix: &str) -> Result<&'r Revision> {
        let prefix = prefix.trim();
        let mut matches = history.iter().filter(|r| r.hash.starts_with(prefix));
        match (matches.next(), matches.next()) {
            (Some(rev), None) if !prefix.is_empty() => Ok(rev),
            _ => Err(Error::RevisionNotFound(prefix.to_string())),
        }
    }

    /// Snapshot document as recorded at `revision`.
    pub fn load(&self, revision: &Revision) -> Result<SnapshotDocument> {
        let content = self.git.show(&revision.hash, SNAPSHOT_FILE)?;
        SnapshotDocument::from_json(&content)
    }

    pub fn plan(&self, snapshot: &SnapshotDocument) -> Result<RestorePlan> {
        let current = self.manager.list_installed()?;
        Ok(RestorePlan::compute(snapshot.extensions(), &current))
    }

    /// Run all uninstalls, then all installs, in plan order.
    ///
    /// `progress` receives the 1-based step, the step count, and the item.
    pub fn apply(
        &self,
        plan: &RestorePlan,
        mut progress: impl FnMut(usize, usize, Action, &ExtensionId),
    ) -> ApplyReport {
        let total = plan.to_uninstall.len() + plan.to_install.len();
        let steps = plan
            .to_uninstall
            .iter()
            .map(|id| (Action::Uninstall, id))
            .chain(plan.to_install.iter().map(|id| (Action::Install, id)));

        let mut report = ApplyReport::default();
        for (idx, (action, id)) in steps.enumerate() {
            progress(idx + 1, total, action, id);
            let result = match action {
                Action::Uninstall => self.manager.uninstall(id),
                Action::Install => self.manager.install(id),
            };
            match (result, action) {
                (Ok(()), Action::Uninstall) => report.uninstalled.push(id.clone()),
                (Ok(()), Action::Install) => report.installed.push(id.clone()),
                (Err(e), _) => {
                    xlog_warn!("Failed to {} {}: {}", action, id, e);
                    report.failed.push(FailedAction {
                        action,
                        id: id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        xlog!("Restore applied: {}", report.summary());
        report
    }
}

//! Sync controller: runs the writer for manual and automatic triggers and
//! drives restores. Owns the flag that keeps automatic syncs from racing a
//! restore's own install/uninstall side effects.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::diff::RestorePlan;
use crate::extensions::ExtensionManager;
use crate::git::Revision;
use crate::prompt::Prompter;
use crate::reconciler::{ApplyReport, Reconciler, RestorePhase};
use crate::writer::{SnapshotWriter, SyncOutcome};
use crate::{xlog, xlog_debug, xlog_error, xlog_warn, Result};

/// Marker file a restoring process keeps in the app directory.
pub const RESTORE_MARKER: &str = "restoring.lock";

/// A marker older than this is left over from a crashed restore.
pub const STALE_MARKER_AGE: Duration = Duration::from_secs(30 * 60);

/// Suppression flag shared by the automatic and manual sync paths.
///
/// The in-memory bit covers this process. With a marker path the flag is
/// also visible to other processes, so a `watch` running beside a `restore`
/// stays quiet. Best-effort only: it does not serialize manual invocations.
#[derive(Debug, Clone, Default)]
pub struct RestoreFlag {
    local: Arc<AtomicBool>,
    marker: Option<PathBuf>,
}

impl RestoreFlag {
    /// Flag private to this process.
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag shared through `dir/restoring.lock`.
    pub fn shared(dir: &Path) -> Self {
        Self {
            local: Arc::default(),
            marker: Some(dir.join(RESTORE_MARKER)),
        }
    }

    pub fn is_set(&self) -> bool {
        self.local.load(Ordering::SeqCst) || self.marker_is_live()
    }

    /// Set the flag until the returned guard is dropped.
    pub fn hold(&self) -> RestoreGuard {
        self.local.store(true, Ordering::SeqCst);
        if let Some(marker) = &self.marker {
            if let Err(e) = write_marker(marker) {
                xlog_warn!("Could not create {}: {}", marker.display(), e);
            }
        }
        RestoreGuard { flag: self.clone() }
    }

    fn marker_is_live(&self) -> bool {
        let Some(marker) = &self.marker else {
            return false;
        };
        let Ok(meta) = fs::metadata(marker) else {
            return false;
        };
        let age = meta
            .modified()
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok())
            .unwrap_or_default();
        if age > STALE_MARKER_AGE {
            xlog_warn!("Ignoring stale restore marker {}", marker.display());
            return false;
        }
        true
    }
}

fn write_marker(marker: &Path) -> std::io::Result<()> {
    if let Some(dir) = marker.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(marker, std::process::id().to_string())
}

pub struct RestoreGuard {
    flag: RestoreFlag,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        self.flag.local.store(false, Ordering::SeqCst);
        if let Some(marker) = &self.flag.marker {
            let _ = fs::remove_file(marker);
        }
    }
}

/// Automatic sync sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The installed extension set changed on disk.
    LiveChange,
    Timer,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::LiveChange => f.write_str("live change"),
            Trigger::Timer => f.write_str("timer"),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RestoreOptions {
    /// Hash or unique hash prefix; skips the revision picker.
    pub revision: Option<String>,
    /// Skip the confirmation prompt.
    pub assume_yes: bool,
}

#[derive(Debug)]
pub enum RestoreOutcome {
    NoHistory,
    /// No revision was picked.
    Cancelled,
    NoChanges {
        revision: Revision,
    },
    Declined {
        revision: Revision,
        plan: RestorePlan,
    },
    Applied {
        revision: Revision,
        report: ApplyReport,
        /// Post-restore capture of the converged state.
        resync: std::result::Result<SyncOutcome, String>,
    },
}

pub struct SyncController {
    writer: SnapshotWriter,
    manager: Arc<dyn ExtensionManager>,
    restoring: RestoreFlag,
}

impl SyncController {
    pub fn new(writer: SnapshotWriter, manager: Arc<dyn ExtensionManager>) -> Self {
        Self {
            writer,
            manager,
            restoring: RestoreFlag::new(),
        }
    }

    /// Use `flag` instead of a process-private one.
    pub fn with_restore_flag(mut self, flag: RestoreFlag) -> Self {
        self.restoring = flag;
        self
    }

    pub fn restore_flag(&self) -> &RestoreFlag {
        &self.restoring
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring.is_set()
    }

    /// Capture the live set and run the writer. Manual path: always runs.
    pub fn sync_now(&self) -> Result<SyncOutcome> {
        let live = self.manager.list_installed()?;
        self.writer.sync(&live)
    }

    /// Automatic path. Returns `Ok(None)` without touching anything while a
    /// restore is in progress.
    pub fn handle_trigger(&self, trigger: Trigger) -> Result<Option<SyncOutcome>> {
        if self.is_restoring() {
            xlog_debug!("Ignoring {} trigger during restore", trigger);
            return Ok(None);
        }
        xlog_debug!("Sync triggered by {}", trigger);
        self.sync_now().map(Some)
    }

    pub fn reconciler(&self) -> Reconciler<'_> {
        Reconciler::new(self.writer.git(), self.manager.as_ref())
    }

    /// Restore the live extension set to a snapshot from history.
    ///
    /// Errors while loading history, the chosen document, or the live set
    /// abort the restore. Changes already applied are never rolled back.
    pub fn restore(
        &self,
        prompter: &dyn Prompter,
        options: &RestoreOptions,
    ) -> Result<RestoreOutcome> {
        let reconciler = self.reconciler();
        let mut phase = RestorePhase::Idle;

        let history = reconciler.history()?;
        phase.advance(RestorePhase::HistoryLoaded);
        if history.is_empty() {
            phase.advance(RestorePhase::Idle);
            return Ok(RestoreOutcome::NoHistory);
        }

        let revision = match &options.revision {
            Some(prefix) => reconciler.find(&history, prefix)?.clone(),
            None => match prompter.select_revision(&history)? {
                Some(idx) if idx < history.len() => history[idx].clone(),
                _ => {
                    phase.advance(RestorePhase::Cancelled);
                    phase.advance(RestorePhase::Idle);
                    return Ok(RestoreOutcome::Cancelled);
                }
            },
        };
        phase.advance(RestorePhase::RevisionSelected);

        let snapshot = reconciler.load(&revision)?;
        let plan = reconciler.plan(&snapshot)?;
        phase.advance(RestorePhase::DiffComputed);

        if plan.is_empty() {
            phase.advance(RestorePhase::Idle);
            return Ok(RestoreOutcome::NoChanges { revision });
        }

        let question = format!(
            "Restore snapshot {} ({})? {}.",
            revision.short_hash(),
            revision.subject,
            plan.summary()
        );
        if !options.assume_yes && !prompter.confirm(&question)? {
            phase.advance(RestorePhase::Cancelled);
            phase.advance(RestorePhase::Idle);
            return Ok(RestoreOutcome::Declined { revision, plan });
        }
        phase.advance(RestorePhase::Confirmed);

        let report = {
            let _guard = self.restoring.hold();
            phase.advance(RestorePhase::Applying);
            reconciler.apply(&plan, |step, total, action, id| {
                prompter.notify(&format!("[{}/{}] {} {}", step, total, action, id));
            })
        };
        phase.advance(RestorePhase::Idle);

        let resync = self.sync_now().map_err(|e| {
            xlog_error!("Post-restore sync failed: {}", e);
            e.to_string()
        });
        xlog!("Restore of {} finished: {}", revision.short_hash(), report.summary());

        Ok(RestoreOutcome::Applied {
            revision,
            report,
            resync,
        })
    }
}

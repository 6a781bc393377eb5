//! Watch loop: syncs automatically when the extensions directory changes and
//! on a fixed interval.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::controller::{SyncController, Trigger};
use crate::util::blocking;
use crate::writer::SyncOutcome;
use crate::{xlog, xlog_debug, xlog_error, xlog_warn, Result};

/// Quiet period after the last filesystem event before syncing. Installing
/// one extension produces a burst of events.
pub const DEBOUNCE: Duration = Duration::from_secs(2);

pub struct WatchLoop {
    controller: Arc<SyncController>,
    interval: Duration,
    extensions_dir: Option<PathBuf>,
    debounce: Duration,
}

impl WatchLoop {
    pub fn new(controller: Arc<SyncController>, interval: Duration) -> Self {
        Self {
            controller,
            interval,
            extensions_dir: None,
            debounce: DEBOUNCE,
        }
    }

    pub fn with_extensions_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.extensions_dir = dir;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Run until `cancel` fires. The first timer tick is immediate, so the
    /// loop starts with a sync.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel::<()>();

        let _watcher = match &self.extensions_dir {
            Some(dir) if dir.is_dir() => {
                xlog!("Watching {}", dir.display());
                Some(start_watcher(dir, event_tx.clone())?)
            }
            Some(dir) => {
                xlog_warn!(
                    "Extensions directory {} not found; timer only",
                    dir.display()
                );
                None
            }
            None => None,
        };

        let mut ticker = sync_timer(self.interval);
        let mut pending: Option<Instant> = None;

        loop {
            let deadline = pending;
            let debounce_elapsed = async move {
                match deadline {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => {
                    xlog_debug!("WatchLoop cancelled");
                    break;
                }
                _ = ticker.tick() => {
                    self.fire(Trigger::Timer).await;
                }
                Some(()) = event_rx.recv() => {
                    pending = Some(Instant::now() + self.debounce);
                }
                _ = debounce_elapsed => {
                    pending = None;
                    self.fire(Trigger::LiveChange).await;
                }
            }
        }

        drop(event_tx);
        Ok(())
    }

    /// Run one trigger on the blocking pool. No failure stops the loop.
    async fn fire(&self, trigger: Trigger) {
        let controller = self.controller.clone();
        match blocking(move || controller.handle_trigger(trigger)).await {
            Ok(Some(SyncOutcome::Committed { message, .. })) => {
                println!("Synced ({}): {}", trigger, message);
            }
            Ok(Some(SyncOutcome::Unchanged)) => {
                xlog_debug!("{} sync: no changes", trigger);
            }
            Ok(None) => {}
            Err(e) => {
                xlog_error!("{} sync failed: {}", trigger, e);
                eprintln!("Sync failed: {}", e);
            }
        }
    }
}

/// Interval whose first tick is immediate. A sync that overruns the period
/// delays the next tick instead of queueing catch-up ticks.
fn sync_timer(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

fn start_watcher(dir: &Path, tx: mpsc::UnboundedSender<()>) -> Result<RecommendedWatcher> {
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                match event.kind {
                    EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_) => {
                        let _ = tx.send(());
                    }
                    _ => {}
                }
            }
        },
        NotifyConfig::default(),
    )?;
    watcher.watch(dir, RecursiveMode::NonRecursive)?;
    Ok(watcher)
}

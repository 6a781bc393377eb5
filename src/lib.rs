pub mod command;
pub mod config;
pub mod controller;
pub mod diff;
pub mod error;
pub mod extensions;
pub mod git;
pub mod log;
pub mod prompt;
pub mod reconciler;
pub mod repo;
pub mod snapshot;
pub mod util;
pub mod watch;
pub mod writer;

pub use controller::{RestoreOptions, RestoreOutcome, SyncController, Trigger};
pub use error::{Error, Result};
pub use extensions::{EditorCli, ExtensionManager, FallbackManager};
pub use git::{GitOps, Revision};
pub use snapshot::{ExtensionId, SnapshotDocument};
pub use writer::{SnapshotWriter, SyncOutcome};

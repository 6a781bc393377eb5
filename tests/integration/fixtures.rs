//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Creating temporary git repositories with a bare remote
//! - A fake extension manager with scripted failures
//! - A prompter with canned answers

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use exthistory::command::SystemRunner;
use exthistory::controller::RestoreFlag;
use exthistory::git::Revision;
use exthistory::prompt::Prompter;
use exthistory::{
    Error, ExtensionId, ExtensionManager, GitOps, Result, SnapshotWriter, SyncController,
};

/// A working repository cloned from a bare remote in one temp directory.
pub struct TestRepo {
    /// Keeps the directory alive for the test's duration.
    pub temp_dir: TempDir,
    /// Path to the working copy.
    pub path: PathBuf,
    /// Path to the bare remote, if any.
    pub remote: Option<PathBuf>,
}

impl TestRepo {
    /// Working copy with one initial commit pushed to a bare remote, so the
    /// branch has an upstream and a bare `git push` succeeds.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let remote = temp_dir.path().join("remote.git");
        let path = temp_dir.path().join("work");
        std::fs::create_dir_all(&path).expect("Failed to create work dir");

        run_git(temp_dir.path(), &["init", "--bare", "remote.git"]);
        init_working_copy(&path);

        std::fs::write(path.join("README.md"), "# Extension history\n")
            .expect("Failed to write README");
        run_git(&path, &["add", "README.md"]);
        run_git(&path, &["commit", "-m", "Initial commit"]);
        run_git(
            &path,
            &["remote", "add", "origin", remote.to_str().expect("utf-8 path")],
        );
        run_git(&path, &["push", "-u", "origin", "HEAD"]);

        Self {
            temp_dir,
            path,
            remote: Some(remote),
        }
    }

    /// Freshly initialized repository without commits or remote.
    pub fn without_commits() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().to_path_buf();
        init_working_copy(&path);
        Self {
            temp_dir,
            path,
            remote: None,
        }
    }

    /// Run git in the working copy and return trimmed stdout.
    pub fn git(&self, args: &[&str]) -> String {
        run_git(&self.path, args)
    }

    /// Run git against the bare remote.
    pub fn remote_git(&self, args: &[&str]) -> String {
        let remote = self.remote.as_ref().expect("repository has no remote");
        run_git(remote, args)
    }

    /// Subjects of commits touching the snapshot file, newest first.
    pub fn snapshot_subjects(&self) -> Vec<String> {
        self.git(&["log", "--format=%s", "--", "extensions.json"])
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn read_snapshot(&self) -> String {
        std::fs::read_to_string(self.path.join("extensions.json"))
            .expect("Failed to read snapshot")
    }

    pub fn writer(&self) -> SnapshotWriter {
        SnapshotWriter::new(GitOps::new(&self.path, Arc::new(SystemRunner)))
            .with_push(self.remote.is_some())
    }

    pub fn controller(&self, manager: Arc<FakeEditor>) -> SyncController {
        SyncController::new(self.writer(), manager)
    }

    /// Controller whose restore flag lives in `app_dir`, as the binary sets
    /// it up for each process.
    pub fn shared_controller(&self, manager: Arc<FakeEditor>, app_dir: &Path) -> SyncController {
        self.controller(manager).with_restore_flag(RestoreFlag::shared(app_dir))
    }
}

fn init_working_copy(path: &Path) {
    run_git(path, &["init"]);
    run_git(path, &["config", "user.email", "test@test.com"]);
    run_git(path, &["config", "user.name", "Test User"]);
    run_git(path, &["config", "commit.gpgsign", "false"]);
}

fn run_git(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// In-memory extension manager.
#[derive(Default)]
pub struct FakeEditor {
    installed: Mutex<Vec<ExtensionId>>,
    failing: Mutex<HashSet<String>>,
    listing_broken: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeEditor {
    pub fn with(ids: &[&str]) -> Arc<Self> {
        let editor = Self::default();
        *editor.installed.lock().unwrap() = ids.iter().map(|s| ExtensionId::from(*s)).collect();
        Arc::new(editor)
    }

    /// Make install and uninstall of `id` fail.
    pub fn fail_on(&self, id: &str) {
        self.failing.lock().unwrap().insert(id.to_string());
    }

    /// Make `list_installed` fail.
    pub fn break_listing(&self) {
        self.listing_broken.store(true, Ordering::SeqCst);
    }

    pub fn set_installed(&self, ids: &[&str]) {
        *self.installed.lock().unwrap() = ids.iter().map(|s| ExtensionId::from(*s)).collect();
    }

    /// Installed ids, sorted, as plain strings.
    pub fn installed(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .installed
            .lock()
            .unwrap()
            .iter()
            .map(|id| id.as_str().to_string())
            .collect();
        ids.sort();
        ids
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, what: &str, id: &ExtensionId) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{} {}", what, id));
        if self.failing.lock().unwrap().contains(id.as_str()) {
            return Err(Error::CommandFailed {
                command: format!("code --{}-extension {}", what, id),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

impl ExtensionManager for FakeEditor {
    fn list_installed(&self) -> Result<Vec<ExtensionId>> {
        if self.listing_broken.load(Ordering::SeqCst) {
            return Err(Error::CommandFailed {
                command: "code --list-extensions".to_string(),
                code: Some(1),
                stderr: "simulated failure".to_string(),
            });
        }
        Ok(self.installed.lock().unwrap().clone())
    }

    fn install(&self, id: &ExtensionId) -> Result<()> {
        self.check("install", id)?;
        let mut installed = self.installed.lock().unwrap();
        if !installed.iter().any(|x| x.eq_ignore_case(id)) {
            installed.push(id.clone());
        }
        Ok(())
    }

    fn uninstall(&self, id: &ExtensionId) -> Result<()> {
        self.check("uninstall", id)?;
        self.installed
            .lock()
            .unwrap()
            .retain(|x| !x.eq_ignore_case(id));
        Ok(())
    }
}

/// Forwards to a shared `FakeEditor` so one instance can sit inside a
/// `FallbackManager` while the test keeps a handle to it.
pub struct SharedEditor(pub Arc<FakeEditor>);

impl ExtensionManager for SharedEditor {
    fn list_installed(&self) -> Result<Vec<ExtensionId>> {
        self.0.list_installed()
    }
    fn install(&self, id: &ExtensionId) -> Result<()> {
        self.0.install(id)
    }
    fn uninstall(&self, id: &ExtensionId) -> Result<()> {
        self.0.uninstall(id)
    }
}

/// Picks a fixed history index and answers every confirmation the same way.
pub struct CannedPrompter {
    pub pick: Option<usize>,
    pub confirm: bool,
}

impl Prompter for CannedPrompter {
    fn input(&self, _: &str, _: &str) -> Result<Option<String>> {
        Ok(None)
    }
    fn pick_folder(&self, _: &str) -> Result<Option<PathBuf>> {
        Ok(None)
    }
    fn select_revision(&self, revisions: &[Revision]) -> Result<Option<usize>> {
        Ok(self.pick.filter(|idx| *idx < revisions.len()))
    }
    fn confirm(&self, _: &str) -> Result<bool> {
        Ok(self.confirm)
    }
    fn notify(&self, _: &str) {}
}

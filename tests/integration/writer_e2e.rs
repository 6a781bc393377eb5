//! Snapshot writer tests against a real repository and remote.

use std::sync::Arc;

use exthistory::{
    ExtensionId, ExtensionManager, FallbackManager, SnapshotDocument, SyncController, SyncOutcome,
};

use crate::fixtures::{FakeEditor, SharedEditor, TestRepo};

/// Test: First sync commits and pushes
/// Given a repository with no snapshot yet
/// When the live set is synced
/// Then a timestamped commit lands locally and on the remote
#[test]
fn test_first_sync_commits_and_pushes() {
    let repo = TestRepo::new();
    let editor = FakeEditor::with(&["ms-python.python", "esbenp.prettier-vscode"]);
    let controller = repo.controller(editor);

    let outcome = controller.sync_now().unwrap();
    let SyncOutcome::Committed { message, pushed } = outcome else {
        panic!("expected a commit");
    };
    assert!(message.starts_with("Update extensions: "));
    assert!(pushed);

    assert_eq!(repo.snapshot_subjects(), vec![message.clone()]);
    let remote_subject = repo.remote_git(&["log", "-1", "--format=%s"]);
    assert_eq!(remote_subject, message);
}

/// Test: Sync is idempotent
/// Given a synced live set
/// When sync runs again with no change
/// Then no new commit is created
#[test]
fn test_second_sync_without_changes_is_noop() {
    let repo = TestRepo::new();
    let controller = repo.controller(FakeEditor::with(&["a.one", "b.two"]));

    controller.sync_now().unwrap();
    let head = repo.git(&["rev-parse", "HEAD"]);

    assert_eq!(controller.sync_now().unwrap(), SyncOutcome::Unchanged);
    assert_eq!(repo.git(&["rev-parse", "HEAD"]), head);
    assert_eq!(repo.snapshot_subjects().len(), 1);
}

/// Test: Commit messages follow the diff
/// Given a prior snapshot
/// When extensions are installed, uninstalled, or both
/// Then the commit subject names the change
#[test]
fn test_commit_messages_follow_diff() {
    let repo = TestRepo::new();
    let editor = FakeEditor::with(&["a.one"]);
    let controller = repo.controller(editor.clone());
    controller.sync_now().unwrap();

    editor.set_installed(&["a.one", "c.three", "b.two"]);
    controller.sync_now().unwrap();

    editor.set_installed(&["a.one", "c.three"]);
    controller.sync_now().unwrap();

    editor.set_installed(&["a.one", "d.four"]);
    controller.sync_now().unwrap();

    let subjects = repo.snapshot_subjects();
    assert_eq!(subjects.len(), 4);
    assert_eq!(subjects[0], "Update extensions: +1 added, -1 removed");
    assert_eq!(subjects[1], "Uninstalled: b.two");
    assert_eq!(subjects[2], "Installed: b.two, c.three");
    assert!(subjects[3].starts_with("Update extensions: "));
}

/// Test: Snapshot file is sorted, deduplicated and stable
#[test]
fn test_snapshot_file_is_sorted_and_deduplicated() {
    let repo = TestRepo::new();
    let controller = repo.controller(FakeEditor::with(&["b.b", "A.a", "a.a", "b.b"]));
    controller.sync_now().unwrap();

    let content = repo.read_snapshot();
    assert_eq!(
        content,
        "{\n  \"total\": 3,\n  \"extensions\": [\n    \"A.a\",\n    \"a.a\",\n    \"b.b\"\n  ]\n}"
    );
    let doc = SnapshotDocument::from_json(&content).unwrap();
    assert_eq!(doc.total(), doc.extensions().len());
}

/// Test: A legacy document with a timestamp still yields a diff message
#[test]
fn test_legacy_snapshot_is_diffed() {
    let repo = TestRepo::new();
    std::fs::write(
        repo.path.join("extensions.json"),
        "{\"timestamp\":\"2023-01-01T00:00:00Z\",\"total\":1,\"extensions\":[\"a.one\"]}",
    )
    .unwrap();
    repo.git(&["add", "extensions.json"]);
    repo.git(&["commit", "-m", "legacy"]);

    let controller = repo.controller(FakeEditor::with(&["a.one", "b.two"]));
    let outcome = controller.sync_now().unwrap();
    assert_eq!(
        outcome,
        SyncOutcome::Committed {
            message: "Installed: b.two".to_string(),
            pushed: true,
        }
    );
}

/// Test: Push can be disabled
#[test]
fn test_sync_without_push_leaves_remote_untouched() {
    let repo = TestRepo::new();
    let remote_head = repo.remote_git(&["rev-parse", "HEAD"]);
    let writer = repo.writer().with_push(false);

    let outcome = writer.sync(&[ExtensionId::from("x.y")]).unwrap();
    assert!(matches!(outcome, SyncOutcome::Committed { pushed: false, .. }));
    assert_eq!(repo.remote_git(&["rev-parse", "HEAD"]), remote_head);
}

/// Test: The very first commit of a repository can be a snapshot
#[test]
fn test_repository_without_commits_accepts_first_snapshot() {
    let repo = TestRepo::without_commits();
    let controller = repo.controller(FakeEditor::with(&["a.one"]));

    let outcome = controller.sync_now().unwrap();
    assert!(matches!(outcome, SyncOutcome::Committed { pushed: false, .. }));
    assert_eq!(repo.snapshot_subjects().len(), 1);
}

/// Test: A listing failure never snapshots another editor's set
/// Given a primary editor whose listing fails and a fallback with other extensions
/// When sync runs
/// Then the error surfaces and the recorded snapshot is untouched
#[test]
fn test_listing_failure_does_not_fall_back() {
    let repo = TestRepo::new();
    let primary = FakeEditor::with(&["a.one"]);
    repo.controller(primary.clone()).sync_now().unwrap();
    let before = repo.read_snapshot();
    let head = repo.git(&["rev-parse", "HEAD"]);

    primary.break_listing();
    let other = FakeEditor::with(&["only.in-other-editor"]);
    let manager: Arc<dyn ExtensionManager> = Arc::new(
        FallbackManager::new(Box::new(SharedEditor(primary.clone())))
            .with_fallback(Box::new(SharedEditor(other.clone()))),
    );
    let controller = SyncController::new(repo.writer(), manager);

    assert!(controller.sync_now().is_err());
    assert_eq!(repo.read_snapshot(), before);
    assert_eq!(repo.git(&["rev-parse", "HEAD"]), head);
}

//! Integration test suite for exthistory.
//!
//! These tests drive the writer and the restore flow against real git
//! repositories (a working copy plus a bare remote) with a fake extension
//! manager standing in for the editor CLI.
//!
//! # Test Categories
//!
//! - `writer_e2e`: snapshot, commit and push behavior
//! - `restore_e2e`: history lookup and convergence of the live set
//!
//! # CI Compatibility
//!
//! Only the `git` binary is required. No editor is invoked.

mod fixtures;

mod writer_e2e;

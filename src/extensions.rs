//! Extension manager: drives the editor CLI to list, install and uninstall
//! extensions.

use std::sync::Arc;

use crate::command::CommandRunner;
use crate::snapshot::{parse_id_lines, ExtensionId};
use crate::{xlog_debug, xlog_warn, Result};

pub trait ExtensionManager: Send + Sync {
    /// Installed non-built-in extensions.
    fn list_installed(&self) -> Result<Vec<ExtensionId>>;
    fn install(&self, id: &ExtensionId) -> Result<()>;
    fn uninstall(&self, id: &ExtensionId) -> Result<()>;
}

/// An editor command line such as `code`.
///
/// `--list-extensions` never reports built-in extensions, so its output is
/// exactly the set a snapshot records.
pub struct EditorCli {
    binary: String,
    runner: Arc<dyn CommandRunner>,
}

impl EditorCli {
    pub fn new(binary: impl Into<String>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            binary: binary.into(),
            runner,
        }
    }

    pub fn binary(&self) -> &str {
        &self.binary
    }

    pub fn is_available(&self) -> bool {
        which::which(&self.binary).is_ok()
    }
}

impl ExtensionManager for EditorCli {
    fn list_installed(&self) -> Result<Vec<ExtensionId>> {
        let out = self.runner.run(&self.binary, &["--list-extensions"], None)?;
        Ok(parse_id_lines(&out.stdout))
    }

    fn install(&self, id: &ExtensionId) -> Result<()> {
        self.runner.run(
            &self.binary,
            &["--install-extension", id.as_str(), "--force"],
            None,
        )?;
        Ok(())
    }

    fn uninstall(&self, id: &ExtensionId) -> Result<()> {
        self.runner
            .run(&self.binary, &["--uninstall-extension", id.as_str()], None)?;
        Ok(())
    }
}

/// Tries the primary manager and, if that fails, the secondary one.
///
/// Only install and uninstall fall back. Both managers must drive the same
/// editor installation. Listing always comes from the primary, since a
/// snapshot or restore plan built from another install would be wrong.
pub struct FallbackManager {
    primary: Box<dyn ExtensionManager>,
    secondary: Option<Box<dyn ExtensionManager>>,
}

impl FallbackManager {
    pub fn new(primary: Box<dyn ExtensionManager>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_fallback(mut self, secondary: Box<dyn ExtensionManager>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    pub fn has_fallback(&self) -> bool {
        self.secondary.is_some()
    }

    fn attempt<T>(
        &self,
        what: &str,
        op: impl Fn(&dyn ExtensionManager) -> Result<T>,
    ) -> Result<T> {
        match op(self.primary.as_ref()) {
            Ok(value) => Ok(value),
            Err(primary_err) => match &self.secondary {
                Some(secondary) => {
                    xlog_warn!("{} failed ({}), trying fallback", what, primary_err);
                    op(secondary.as_ref())
                }
                None => Err(primary_err),
            },
        }
    }
}

impl ExtensionManager for FallbackManager {
    fn list_installed(&self) -> Result<Vec<ExtensionId>> {
        self.primary.list_installed()
    }

    fn install(&self, id: &ExtensionId) -> Result<()> {
        xlog_debug!("install {}", id);
        self.attempt(&format!("install {}", id), |m| m.install(id))
    }

    fn uninstall(&self, id: &ExtensionId) -> Result<()> {
        xlog_debug!("uninstall {}", id);
        self.attempt(&format!("uninstall {}", id), |m| m.uninstall(id))
    }
}

/// Pick an alternate invocation of the primary editor: the configured
/// `fallback_editor`, or the real CLI the primary resolves to on `PATH` when
/// that is a different file (a launcher symlink pointing into the editor's
/// bundle, for example). Never a different editor.
pub fn resolve_fallback_binary(primary: &str, configured: Option<&str>) -> Option<String> {
    if let Some(bin) = configured.map(str::trim).filter(|b| !b.is_empty()) {
        return Some(bin.to_string());
    }
    let found = which::which(primary).ok()?;
    let resolved = std::fs::canonicalize(&found).ok()?;
    if resolved == found {
        return None;
    }
    Some(resolved.display().to_string())
}

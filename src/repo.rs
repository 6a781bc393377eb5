//! Resolve the configured history repository to a local working copy,
//! prompting and cloning when needed.

use std::path::{Path, PathBuf};

use crate::command::CommandRunner;
use crate::config::{expand_tilde, Config};
use crate::git::{clone_repository, validate_repository};
use crate::prompt::Prompter;
use crate::{xlog, xlog_debug, xlog_warn, Error, Result};

/// Folder name a remote repository is cloned into.
pub const CLONE_DIR_NAME: &str = "vscode-extension-history";

/// Whether `value` names a remote rather than a local path.
pub fn is_remote(value: &str) -> bool {
    value.starts_with("http") || value.starts_with("git@")
}

pub struct RepoResolver<'a> {
    runner: &'a dyn CommandRunner,
    prompter: &'a dyn Prompter,
    config_path: PathBuf,
}

impl<'a> RepoResolver<'a> {
    pub fn new(
        runner: &'a dyn CommandRunner,
        prompter: &'a dyn Prompter,
        config_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            prompter,
            config_path: config_path.into(),
        }
    }

    /// Local repository path for `config`, persisting whatever the user
    /// supplied along the way.
    pub fn resolve(&self, config: &mut Config) -> Result<PathBuf> {
        let value = match config.repo_path.clone() {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                let value = self
                    .prompter
                    .input(
                        "Enter a git URL or local path to store your extension history.",
                        "https://github.com/you/ext-history.git or ~/ext-history",
                    )?
                    .ok_or_else(|| Error::Config("no repository path provided".to_string()))?;
                config.repo_path = Some(value.clone());
                config.save_to(&self.config_path)?;
                value
            }
        };

        let local = if is_remote(&value) {
            self.ensure_clone(&value, config)?
        } else {
            expand_tilde(&value)
        };

        validate_repository(&local).map_err(|e| {
            xlog_warn!("Configured repository is invalid: {}", local.display());
            e
        })?;
        xlog_debug!("Resolved repository {}", local.display());
        Ok(local)
    }

    fn ensure_clone(&self, url: &str, config: &mut Config) -> Result<PathBuf> {
        let parent = self
            .prompter
            .pick_folder("Folder to clone the history repository into:")?
            .ok_or_else(|| Error::Config("no clone folder selected".to_string()))?;
        if !parent.is_dir() {
            return Err(Error::Config(format!(
                "clone folder does not exist: {}",
                parent.display()
            )));
        }

        let target = parent.join(CLONE_DIR_NAME);
        if !target.exists() {
            self.prompter.notify("Cloning repository...");
            xlog!("Cloning {} into {}", url, target.display());
            clone_repository(self.runner, url, &target)?;
        }

        config.repo_path = Some(path_to_setting(&target));
        config.save_to(&self.config_path)?;
        Ok(target)
    }
}

fn path_to_setting(path: &Path) -> String {
    path.display().to_string()
}

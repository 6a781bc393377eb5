use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{xlog_debug, Error, Result};

pub const DEFAULT_EDITOR: &str = "code";
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

fn default_push() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Local history repository, or a remote URL not yet cloned.
    pub repo_path: Option<String>,
    pub editor: Option<String>,
    pub fallback_editor: Option<String>,
    pub extensions_dir: Option<String>,
    pub sync_interval_secs: Option<u64>,
    #[serde(default = "default_push")]
    pub push: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_path: None,
            editor: None,
            fallback_editor: None,
            extensions_dir: None,
            sync_interval_secs: None,
            push: true,
        }
    }
}

impl Config {
    pub fn app_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".exthistory"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::app_dir()?.join("config.toml"))
    }

    pub fn effective_editor(&self) -> &str {
        self.editor.as_deref().unwrap_or(DEFAULT_EDITOR)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(
            self.sync_interval_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_SYNC_INTERVAL_SECS),
        )
    }

    /// Directory the editor installs extensions into.
    pub fn extensions_dir(&self) -> Option<PathBuf> {
        match &self.extensions_dir {
            Some(dir) => Some(expand_tilde(dir)),
            None => dirs::home_dir().map(|h| h.join(".vscode").join("extensions")),
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        xlog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            xlog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        xlog_debug!(
            "Config loaded: repo_path={:?}, editor={:?}, push={}",
            config.repo_path,
            config.editor,
            config.push
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                xlog_debug!("Creating config directory: {}", dir.display());
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        xlog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

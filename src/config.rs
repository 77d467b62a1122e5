//! Dossier configuration.
//!
//! Loaded from `~/.dossier/config.toml`. Every key is optional and a
//! missing file just means defaults: the database, notes, and
//! workspaces all live under `~/.dossier/`. Command-line flags override
//! whatever the file says.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

/// Dossier configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Job store database file.
    pub db_path: Option<PathBuf>,

    /// Directory holding tracker notes.
    pub notes_dir: Option<PathBuf>,

    /// Directory holding per-job workspaces.
    pub workspace_root: Option<PathBuf>,
}

impl Config {
    /// Load config from `~/.dossier/config.toml`.
    ///
    /// A missing file yields defaults; an unreadable or invalid file is
    /// an error (silently ignoring a broken config hides typos).
    pub fn load() -> Result<Self, String> {
        let Some(path) = Self::path() else {
            return Ok(Self::default());
        };
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
        toml::from_str(&contents).map_err(|e| format!("invalid config at {}: {e}", path.display()))
    }

    /// The config file path: `~/.dossier/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".dossier").join("config.toml"))
    }

    /// Default notes directory: `~/.dossier/notes/`.
    pub fn default_notes_dir() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".dossier").join("notes"))
    }

    /// Default workspace root: `~/.dossier/work/`.
    pub fn default_workspace_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".dossier").join("work"))
    }
}

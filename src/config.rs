//! # Configuration Module
//!
//! Handles user configuration persistence and resolves where the recent
//! history lives on disk.
//!
//! ## Configuration Storage
//! User preferences are stored as JSON in:
//! `~/.config/recent-history/config.json`
//!
//! ## Backing File Location
//! The history itself defaults to `~/.config/recent-history/recenthistory.json`.
//! It can be moved with the `history_file` setting, or per process with the
//! `RECENT_HISTORY_FILE` environment variable (handy for tests and scripts).
//!
//! Older versions kept the file in `~/.cache/recent-history/recentHistory.json`;
//! [`migrate_config_file_from_cache`] moves it over once.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory name under the XDG config and cache directories
pub const APP_DIR_NAME: &str = "recent-history";

/// Environment variable overriding the backing file path
pub const HISTORY_FILE_ENV: &str = "RECENT_HISTORY_FILE";

/// Maps a logical store name to the file backing it.
pub trait ConfigPathResolver {
    /// Absolute path of the file for `name`, or `None` if no location can
    /// be determined on this system.
    fn config_path(&self, name: &str) -> Option<PathBuf>;
}

/// Returns `~/.config/recent-history`
pub fn app_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR_NAME))
}

/// Returns `~/.cache/recent-history`
pub fn app_cache_dir() -> Option<PathBuf> {
    dirs::cache_dir().map(|p| p.join(APP_DIR_NAME))
}

/// User configuration for the application.
///
/// Persisted to `~/.config/recent-history/config.json` as JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Overrides where the recent history is stored.
    #[serde(default)]
    pub history_file: Option<String>,
    /// Log filter used when `RUST_LOG` is not set (e.g. "info", "debug").
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_file: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Returns the path to the configuration file.
    fn config_path() -> Option<PathBuf> {
        app_config_dir().map(|p| p.join("config.json"))
    }

    /// Loads the configuration from disk.
    ///
    /// If the config file doesn't exist or cannot be parsed, returns default values.
    pub fn load() -> Self {
        Self::config_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Loads the configuration from a specific file, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default()
    }

    /// Persists the current configuration to disk.
    ///
    /// # Errors
    /// Returns an error message if the config directory cannot be determined
    /// or the file cannot be written.
    pub fn save(&self) -> Result<(), String> {
        let path = Self::config_path()
            .ok_or("Could not determine config path")?;
        self.save_to(&path)
    }

    /// Persists the configuration to a specific file.
    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write config: {}", e))?;

        Ok(())
    }
}

/// Resolves store files under the XDG config directory, honoring the
/// user's `history_file` setting and the `RECENT_HISTORY_FILE` variable.
#[derive(Debug, Clone)]
pub struct XdgConfigPaths {
    base_dir: Option<PathBuf>,
    history_file: Option<PathBuf>,
}

impl XdgConfigPaths {
    pub fn new(config: &Config) -> Self {
        let history_file = std::env::var_os(HISTORY_FILE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| config.history_file.as_ref().map(PathBuf::from));

        Self {
            base_dir: app_config_dir(),
            history_file,
        }
    }
}

impl ConfigPathResolver for XdgConfigPaths {
    fn config_path(&self, name: &str) -> Option<PathBuf> {
        if name == crate::store::STORE_NAME {
            if let Some(path) = &self.history_file {
                return Some(path.clone());
            }
        }
        self.base_dir.as_ref().map(|dir| dir.join(format!("{name}.json")))
    }
}

/// Moves `~/.cache/recent-history/<legacy_name>.json` to `destination`.
///
/// Best-effort: nothing happens if the legacy file is absent or the
/// destination already exists, and failures are only logged.
pub fn migrate_config_file_from_cache(legacy_name: &str, destination: &Path) -> bool {
    let Some(legacy) = app_cache_dir().map(|dir| dir.join(format!("{legacy_name}.json"))) else {
        return false;
    };

    match migrate_file(&legacy, destination) {
        Ok(moved) => {
            if moved {
                tracing::info!(
                    "Migrated {} to {}",
                    legacy.display(),
                    destination.display()
                );
            }
            moved
        }
        Err(e) => {
            tracing::warn!("Failed to migrate {}: {}", legacy.display(), e);
            false
        }
    }
}

fn migrate_file(legacy: &Path, destination: &Path) -> std::io::Result<bool> {
    if !legacy.is_file() || destination.exists() {
        return Ok(false);
    }

    if let Some(parent) = destination.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // rename fails across filesystems (cache on tmpfs), fall back to copy
    if std::fs::rename(legacy, destination).is_err() {
        std::fs::copy(legacy, destination)?;
        std::fs::remove_file(legacy)?;
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.history_file.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sub/config.json");
        let config = Config {
            history_file: Some("/tmp/history.json".to_string()),
            log_level: "debug".to_string(),
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path), config);
    }

    #[test]
    fn test_config_corrupt_or_partial() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, "not json").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());

        std::fs::write(&path, "{}").unwrap();
        assert_eq!(Config::load_from(&path), Config::default());

        assert_eq!(Config::load_from(&dir.path().join("missing.json")), Config::default());
    }

    #[test]
    fn test_resolver_paths() {
        let resolver = XdgConfigPaths {
            base_dir: Some(PathBuf::from("/tmp/cfg")),
            history_file: None,
        };
        assert_eq!(
            resolver.config_path("recenthistory"),
            Some(PathBuf::from("/tmp/cfg/recenthistory.json"))
        );
        assert_eq!(
            resolver.config_path("other"),
            Some(PathBuf::from("/tmp/cfg/other.json"))
        );
    }

    #[test]
    fn test_resolver_history_override() {
        let resolver = XdgConfigPaths {
            base_dir: Some(PathBuf::from("/tmp/cfg")),
            history_file: Some(PathBuf::from("/data/history.json")),
        };
        assert_eq!(
            resolver.config_path("recenthistory"),
            Some(PathBuf::from("/data/history.json"))
        );
        assert_eq!(
            resolver.config_path("other"),
            Some(PathBuf::from("/tmp/cfg/other.json"))
        );
    }

    #[test]
    fn test_migrate_moves_legacy_file() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("cache/recentHistory.json");
        let destination = dir.path().join("config/recenthistory.json");
        std::fs::create_dir_all(legacy.parent().unwrap()).unwrap();
        std::fs::write(&legacy, r#"{"RecentHistory":[]}"#).unwrap();

        assert!(migrate_file(&legacy, &destination).unwrap());
        assert!(!legacy.exists());
        assert_eq!(
            std::fs::read_to_string(&destination).unwrap(),
            r#"{"RecentHistory":[]}"#
        );
    }

    #[test]
    fn test_migrate_keeps_existing_destination() {
        let dir = tempdir().unwrap();
        let legacy = dir.path().join("recentHistory.json");
        let destination = dir.path().join("recenthistory.json");
        std::fs::write(&legacy, "old").unwrap();
        std::fs::write(&destination, "new").unwrap();

        assert!(!migrate_file(&legacy, &destination).unwrap());
        assert!(legacy.exists());
        assert_eq!(std::fs::read_to_string(&destination).unwrap(), "new");
    }

    #[test]
    fn test_migrate_without_legacy_file() {
        let dir = tempdir().unwrap();
        let destination = dir.path().join("recenthistory.json");
        assert!(!migrate_file(&dir.path().join("absent.json"), &destination).unwrap());
        assert!(!destination.exists());
    }
}

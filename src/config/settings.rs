use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SafekeepError};

/// Deployment-level configuration, loaded from `safekeep.toml`.
///
/// Every field has a sensible default so the subsystem works
/// out-of-the-box without any config file at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory (relative to the deployment root) holding the databases.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// File name of the main database inside `data_dir`.
    #[serde(default = "default_database_file")]
    pub database_file: String,

    /// Whether to keep the SQLite audit trail of secret operations.
    #[serde(default = "default_audit_log")]
    pub audit_log: bool,
}

// ── Serde default helpers ────────────────────────────────────────────

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_database_file() -> String {
    "safekeep.db".to_string()
}

fn default_audit_log() -> bool {
    true
}

// ── Implementation ───────────────────────────────────────────────────

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database_file: default_database_file(),
            audit_log: default_audit_log(),
        }
    }
}

impl Settings {
    /// Name of the config file we look for in the deployment root.
    const FILE_NAME: &'static str = "safekeep.toml";

    /// Load settings from `<root_dir>/safekeep.toml`.
    ///
    /// If the file does not exist, sensible defaults are returned.
    /// If the file exists but cannot be parsed, an error is returned.
    pub fn load(root_dir: &Path) -> Result<Self> {
        let config_path = root_dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)?;

        let settings: Settings = toml::from_str(&contents).map_err(|e| {
            SafekeepError::ConfigError(format!("Failed to parse {}: {e}", config_path.display()))
        })?;

        Ok(settings)
    }

    /// Full path to the main database.
    pub fn database_path(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(&self.data_dir).join(&self.database_file)
    }

    /// Directory the audit trail lives in, or `None` when auditing is
    /// turned off.
    pub fn audit_dir(&self, root_dir: &Path) -> Option<PathBuf> {
        self.audit_log.then(|| root_dir.join(&self.data_dir))
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_settings_are_sensible() {
        let s = Settings::default();
        assert_eq!(s.data_dir, "data");
        assert_eq!(s.database_file, "safekeep.db");
        assert!(s.audit_log);
    }

    #[test]
    fn load_returns_defaults_when_no_config_file() {
        let tmp = TempDir::new().unwrap();
        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.database_file, "safekeep.db");
    }

    #[test]
    fn load_parses_toml_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("safekeep.toml"),
            "data_dir = \"var\"\naudit_log = false\n",
        )
        .unwrap();

        let settings = Settings::load(tmp.path()).unwrap();
        assert_eq!(settings.data_dir, "var");
        assert!(!settings.audit_log);
        // Unspecified fields keep their defaults.
        assert_eq!(settings.database_file, "safekeep.db");
    }

    #[test]
    fn load_rejects_invalid_toml() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("safekeep.toml"), "data_dir = [broken").unwrap();

        assert!(matches!(
            Settings::load(tmp.path()),
            Err(SafekeepError::ConfigError(_))
        ));
    }

    #[test]
    fn paths_are_built_from_data_dir() {
        let s = Settings::default();
        let root = Path::new("/srv/app");
        assert_eq!(
            s.database_path(root),
            Path::new("/srv/app/data/safekeep.db")
        );
        assert_eq!(s.audit_dir(root), Some(PathBuf::from("/srv/app/data")));

        let mut quiet = s.clone();
        quiet.audit_log = false;
        assert_eq!(quiet.audit_dir(root), None);
    }
}

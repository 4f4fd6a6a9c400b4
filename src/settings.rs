//! User settings loaded from a JSON file.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::batch::BatchOptions;
use crate::discover::Exclusions;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "SNIPER_CRYPT_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Worker threads for directory runs; defaults to the CPU count.
    pub concurrency: Option<usize>,
    /// Securely delete inputs after success.
    pub shred: bool,
    /// Extra file name suffixes never encrypted.
    pub exclude: Vec<String>,
}

impl Settings {
    /// Loads settings from `path`. A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("invalid settings file {}", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => {
                Err(e).with_context(|| format!("failed to read settings file {}", path.display()))
            }
        }
    }

    pub fn batch_options(&self) -> BatchOptions {
        let default = BatchOptions::default();
        BatchOptions {
            concurrency: self.concurrency.unwrap_or(default.concurrency).max(1),
            shred: self.shred,
            ..default
        }
    }

    pub fn exclusions(&self) -> Exclusions {
        let mut exclusions = Exclusions::default();
        exclusions.extend(self.exclude.iter().cloned());
        exclusions
    }
}

/// `<platform config dir>/sniper-crypt/config.json`
pub fn default_settings_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("", "", "sniper-crypt")
        .context("could not determine platform directories")?;

    Ok(project_dirs.config_dir().join("config.json"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let settings = Settings::load(&dir.path().join("config.json")).unwrap();

        assert_eq!(settings, Settings::default());
        assert!(settings.batch_options().concurrency >= 1);
        assert!(!settings.batch_options().shred);
    }

    #[test]
    fn file_values_are_applied() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "concurrency": 3, "shred": true, "exclude": [".bak"] }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        let options = settings.batch_options();

        assert_eq!(options.concurrency, 3);
        assert!(options.shred);
        assert!(settings.exclusions().matches("notes.bak"));
        assert!(settings.exclusions().matches("sniper-config.log"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "shred": true }"#).unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.concurrency, None);
        assert!(settings.exclude.is_empty());
    }

    #[test]
    fn zero_concurrency_is_clamped() {
        let settings = Settings {
            concurrency: Some(0),
            ..Settings::default()
        };
        assert_eq!(settings.batch_options().concurrency, 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("invalid settings file"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "threads": 2 }"#).unwrap();

        assert!(Settings::load(&path).is_err());
    }
}

//! Database configuration via `kdb.toml`
//!
//! On first open a commented default `kdb.toml` is written into the data
//! directory. To change settings, edit the file and reopen.

use serde::{Deserialize, Serialize};
use std::path::Path;

use kdb_core::{KdbError, KdbResult};

use super::transactions::RetryConfig;

/// Config file name placed in the database data directory.
pub const CONFIG_FILE_NAME: &str = "kdb.toml";

/// How committed state survives a restart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistenceMode {
    /// Whole-store checkpoint written on flush, close and every N commits
    Checkpoint,
    /// Nothing is written; state lives as long as the process
    Memory,
}

/// Database configuration loaded from `kdb.toml`.
///
/// # Example
///
/// ```toml
/// persistence = "checkpoint"
/// checkpoint_every_commits = 0
///
/// [retry]
/// max_retries = 5
/// base_delay_ms = 1
/// max_delay_ms = 50
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KdbConfig {
    /// Persistence mode: `"checkpoint"` or `"memory"`.
    #[serde(default = "default_persistence_str")]
    pub persistence: String,
    /// Write a checkpoint after this many write commits (0 disables).
    #[serde(default)]
    pub checkpoint_every_commits: u64,
    /// Conflict retry policy used by standalone collection operations.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_persistence_str() -> String {
    "checkpoint".to_string()
}

impl Default for KdbConfig {
    fn default() -> Self {
        Self {
            persistence: default_persistence_str(),
            checkpoint_every_commits: 0,
            retry: RetryConfig::default(),
        }
    }
}

impl KdbConfig {
    /// Defaults for a database that never touches the filesystem
    pub fn in_memory() -> Self {
        Self {
            persistence: "memory".to_string(),
            ..Self::default()
        }
    }

    /// Parse the persistence string into a `PersistenceMode`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"checkpoint"` or `"memory"`.
    pub fn persistence_mode(&self) -> KdbResult<PersistenceMode> {
        match self.persistence.as_str() {
            "checkpoint" => Ok(PersistenceMode::Checkpoint),
            "memory" => Ok(PersistenceMode::Memory),
            other => Err(KdbError::invalid_input(format!(
                "Invalid persistence mode '{}' in kdb.toml. Expected \"checkpoint\" or \"memory\".",
                other
            ))),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# kdb database configuration
#
# Persistence: "checkpoint" (default) or "memory"
#   "checkpoint" = whole-store image written to kdb.chk on flush and close
#   "memory"     = nothing is written, state is lost when the process exits
persistence = "checkpoint"

# Write a checkpoint automatically every N commits (0 disables)
checkpoint_every_commits = 0

# Conflict retry policy for standalone collection operations.
# Delays grow exponentially from base_delay_ms up to max_delay_ms.
[retry]
max_retries = 5
base_delay_ms = 1
max_delay_ms = 50
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> KdbResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            KdbError::internal(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: KdbConfig = toml::from_str(&content).map_err(|e| {
            KdbError::invalid_input(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        // Validate the persistence value eagerly
        config.persistence_mode()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> KdbResult<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| {
                KdbError::internal(format!(
                    "Failed to write default config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> KdbResult<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| KdbError::internal(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            KdbError::internal(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_checkpoint() {
        let config = KdbConfig::default();
        assert_eq!(config.persistence, "checkpoint");
        assert_eq!(config.persistence_mode().unwrap(), PersistenceMode::Checkpoint);
        assert_eq!(config.checkpoint_every_commits, 0);
    }

    #[test]
    fn in_memory_config() {
        let config = KdbConfig::in_memory();
        assert_eq!(config.persistence_mode().unwrap(), PersistenceMode::Memory);
    }

    #[test]
    fn parse_memory() {
        let config: KdbConfig = toml::from_str("persistence = \"memory\"").unwrap();
        assert_eq!(config.persistence_mode().unwrap(), PersistenceMode::Memory);
        assert_eq!(config.retry, RetryConfig::default());
    }

    #[test]
    fn parse_invalid_mode_returns_error() {
        let config: KdbConfig = toml::from_str("persistence = \"tape\"").unwrap();
        let err = config.persistence_mode().unwrap_err();
        assert!(matches!(err, KdbError::InvalidInput { .. }));
    }

    #[test]
    fn parse_partial_retry_section() {
        let config: KdbConfig = toml::from_str("[retry]\nmax_retries = 9\n").unwrap();
        assert_eq!(config.retry.max_retries, 9);
        assert_eq!(config.retry.base_delay_ms, RetryConfig::default().base_delay_ms);
    }

    #[test]
    fn default_toml_parses_correctly() {
        let config: KdbConfig = toml::from_str(KdbConfig::default_toml()).unwrap();
        assert_eq!(config, KdbConfig::default());
    }

    #[test]
    fn write_default_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        assert!(!path.exists());

        KdbConfig::write_default_if_missing(&path).unwrap();
        assert!(path.exists());

        let config = KdbConfig::from_file(&path).unwrap();
        assert_eq!(config.persistence, "checkpoint");
    }

    #[test]
    fn write_default_does_not_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "persistence = \"memory\"\n").unwrap();

        KdbConfig::write_default_if_missing(&path).unwrap();

        let config = KdbConfig::from_file(&path).unwrap();
        assert_eq!(config.persistence, "memory");
    }

    #[test]
    fn write_to_file_round_trips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = KdbConfig {
            checkpoint_every_commits: 100,
            retry: RetryConfig::no_retry(),
            ..KdbConfig::default()
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(KdbConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn from_file_rejects_bad_mode() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "persistence = \"tape\"\n").unwrap();
        assert!(KdbConfig::from_file(&path).is_err());
    }
}

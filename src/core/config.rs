//! Persisted panel settings.
//!
//! Mode flags survive process restarts so the panel reopens the way the user
//! left it. The file lives in the platform config directory and is replaced
//! atomically on every save.

use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::warn;

#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct Config {
    /// Start with agent mode active.
    pub agent_mode: Option<bool>,
    /// Start in act mode (plan steps auto-apply). Only meaningful while the
    /// plan/act toggle is visible.
    pub act_mode: Option<bool>,
    /// Whether workspace retrieval/indexing is turned on.
    pub indexing_enabled: Option<bool>,
    /// Render assistant responses as markdown.
    pub markdown: Option<bool>,
    /// Syntax-highlight fenced code blocks in finished responses.
    pub syntax: Option<bool>,
    /// Context budget shown by the usage gauge.
    pub token_limit: Option<usize>,
}

/// Errors that can occur when loading configuration from disk.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to parse the configuration file as valid TOML.
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "Failed to read config at {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse config at {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl StdError for ConfigError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Where the config lives on this platform, if a home directory exists.
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("org", "permacommons", "codepane")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Loads the config from the default location. A missing file is the
    /// default config; a broken file is reported and treated as default so a
    /// bad edit never keeps the panel from starting.
    pub fn load() -> Config {
        let Some(path) = default_config_path() else {
            return Config::default();
        };
        match Config::load_from_path(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!("{e}");
                Config::default()
            }
        }
    }

    pub fn load_from_path(config_path: &Path) -> Result<Config, ConfigError> {
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = fs::read_to_string(config_path).map_err(|source| ConfigError::Read {
            path: config_path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: config_path.to_path_buf(),
            source,
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), Box<dyn StdError>> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let contents = toml::to_string_pretty(self)?;

        // Write to a temp file in the same directory, then rename into place
        // so a crash mid-write never leaves a truncated config behind.
        let mut temp_file = NamedTempFile::new_in(parent)?;
        temp_file.write_all(contents.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(path)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_all_flags_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let config = Config {
            agent_mode: Some(true),
            act_mode: Some(false),
            indexing_enabled: Some(true),
            markdown: Some(true),
            syntax: Some(false),
            token_limit: Some(24_000),
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.agent_mode, Some(true));
        assert_eq!(loaded.act_mode, Some(false));
        assert_eq!(loaded.indexing_enabled, Some(true));
        assert_eq!(loaded.markdown, Some(true));
        assert_eq!(loaded.syntax, Some(false));
        assert_eq!(loaded.token_limit, Some(24_000));
    }

    #[test]
    fn missing_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = Config::load_from_path(&dir.path().join("absent.toml")).unwrap();
        assert!(loaded.agent_mode.is_none());
        assert!(loaded.token_limit.is_none());
    }

    #[test]
    fn malformed_file_reports_parse_error_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "agent_mode = [not toml").unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.toml"));
    }
}

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::MitsukeError;

const DEFAULT_CONFIG: &str = include_str!("../../../config/default.toml");

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub backend: EndpointConfig,
    pub catalog: EndpointConfig,
    pub fetch: FetchConfig,
    pub messages: MessagesConfig,
    pub cache: CacheConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub base_url: String,
}

/// Batching and retry knobs for catalog calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    pub batch_size: usize,
    pub inter_batch_delay_ms: u64,
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagesConfig {
    pub display_ms: u64,
}

impl MessagesConfig {
    pub fn display_duration(&self) -> Duration {
        Duration::from_millis(self.display_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Drop a user's cached slot when they log out.
    pub evict_on_logout: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub db_file: String,
}

impl AppConfig {
    /// Load config: user file (if exists) merged over built-in defaults.
    pub fn load() -> Result<Self, MitsukeError> {
        let user_path = Self::config_path();
        if user_path.exists() {
            let user_str = std::fs::read_to_string(&user_path)?;
            Self::from_overrides(&user_str)
        } else {
            Self::from_overrides("")
        }
    }

    /// Parse `overrides` and lay it over the built-in defaults, key by key.
    pub fn from_overrides(overrides: &str) -> Result<Self, MitsukeError> {
        let mut merged: toml::Table =
            toml::from_str(DEFAULT_CONFIG).map_err(|e| MitsukeError::Config(e.to_string()))?;
        let user: toml::Table =
            toml::from_str(overrides).map_err(|e| MitsukeError::Config(e.to_string()))?;
        merge_tables(&mut merged, user);
        toml::Value::Table(merged)
            .try_into()
            .map_err(|e: toml::de::Error| MitsukeError::Config(e.to_string()))
    }

    /// Save current config to the user config file.
    pub fn save(&self) -> Result<PathBuf, MitsukeError> {
        let path = Self::config_path();
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), MitsukeError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| MitsukeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Path to user config file (XDG on Linux, AppData on Windows).
    pub fn config_path() -> PathBuf {
        Self::project_dirs()
            .map(|d| d.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Path to the durable session database.
    pub fn session_db_path(&self) -> PathBuf {
        Self::project_dirs()
            .map(|d| d.data_dir().join(&self.session.db_file))
            .unwrap_or_else(|| PathBuf::from(&self.session.db_file))
    }

    /// Ensure the data directory exists and return the session DB path.
    pub fn ensure_session_db_path(&self) -> Result<PathBuf, MitsukeError> {
        let path = self.session_db_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(path)
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("", "", "mitsuke")
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("built-in default config is valid TOML")
    }
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = AppConfig::default();
        assert_eq!(config.fetch.batch_size, 5);
        assert_eq!(config.fetch.inter_batch_delay_ms, 400);
        assert_eq!(config.messages.display_ms, 3000);
        assert!(!config.cache.evict_on_logout);
        assert_eq!(config.catalog.base_url, "https://api.jikan.moe/v4");
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = AppConfig::from_overrides(
            "[fetch]\nbatch_size = 2\n\n[cache]\nevict_on_logout = true\n",
        )
        .unwrap();
        assert_eq!(config.fetch.batch_size, 2);
        assert_eq!(config.fetch.max_attempts, 3);
        assert!(config.cache.evict_on_logout);
        assert_eq!(config.backend.base_url, "http://localhost:8080/api/v1");
    }

    #[test]
    fn test_bad_override_is_config_error() {
        let err = AppConfig::from_overrides("[fetch]\nbatch_size = \"many\"\n").unwrap_err();
        assert!(matches!(err, MitsukeError::Config(_)));
    }

    #[test]
    fn test_saved_file_loads_back_as_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = AppConfig::default();
        config.fetch.batch_size = 3;
        config.cache.evict_on_logout = true;

        config.save_to(&path).unwrap();

        let saved = std::fs::read_to_string(&path).unwrap();
        let reloaded = AppConfig::from_overrides(&saved).unwrap();
        assert_eq!(reloaded.fetch.batch_size, 3);
        assert!(reloaded.cache.evict_on_logout);
        assert_eq!(reloaded.messages.display_ms, 3000);
    }

    #[test]
    fn test_roundtrip() {
        let config = AppConfig::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.fetch.max_attempts, config.fetch.max_attempts);
    }
}

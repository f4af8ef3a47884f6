//! Configuration discovery and loading
//!
//! This module handles the configuration discovery hierarchy:
//! 1. Current directory: ./liftsync.toml or ./.liftsync/config.toml
//! 2. User config: ~/.liftsync/config.toml
//! 3. System config: /etc/liftsync/config.toml
//! 4. Built-in defaults

use crate::env;
use crate::session::{ReaperConfig, SessionStore, TableStore};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env as std_env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which row store backs the session core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local tables, lost on exit
    Memory,
    /// Tables persisted as a JSON snapshot
    #[default]
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Defaults to `<workspace>/.liftsync/data`
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

impl ServiceConfig {
    /// Load from TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save to TOML file
    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let reaper = &self.reaper;
        if !(1..=env::reaper::MAX_INTERVAL_HOURS).contains(&reaper.interval_hours) {
            anyhow::bail!(
                "reaper.interval_hours must be between 1 and {}",
                env::reaper::MAX_INTERVAL_HOURS
            );
        }
        if !(0..=env::reaper::MAX_RETENTION_DAYS).contains(&reaper.retention_days) {
            anyhow::bail!(
                "reaper.retention_days must be between 0 and {}",
                env::reaper::MAX_RETENTION_DAYS
            );
        }
        Ok(())
    }

    /// Data directory for the JSON backend
    pub fn data_dir(&self, workspace: &Path) -> PathBuf {
        self.store
            .data_dir
            .clone()
            .unwrap_or_else(|| env::data_dir_path(workspace))
    }

    /// Open the configured row store and wrap it in a [`SessionStore`]
    pub async fn open_store(&self, workspace: &Path) -> Result<SessionStore> {
        let store = match self.store.backend {
            StoreBackend::Memory => {
                info!("Using in-memory session store");
                SessionStore::in_memory()
            }
            StoreBackend::Json => {
                let data_dir = self.data_dir(workspace);
                let tables = TableStore::open(&data_dir)
                    .await
                    .with_context(|| format!("Failed to open store in {}", data_dir.display()))?;
                if let Some(snapshot) = tables.snapshot_path() {
                    info!("Using JSON session store at {:?}", snapshot);
                }
                SessionStore::new(Arc::new(tables))
            }
        };
        Ok(store)
    }
}

/// Configuration discovery system
pub struct ConfigDiscovery;

impl ConfigDiscovery {
    /// Discover and load configuration using the hierarchy
    pub fn discover_config() -> Result<ServiceConfig> {
        if let Some(config_path) = Self::find_config_file() {
            info!("Loading configuration from: {:?}", config_path);
            return ServiceConfig::from_toml_file(config_path);
        }

        info!("No configuration file found, using defaults");
        Ok(ServiceConfig::default())
    }

    /// Load `override_path` if given, otherwise discover
    pub fn load(override_path: Option<&Path>) -> Result<ServiceConfig> {
        match override_path {
            Some(path) => {
                info!("Loading configuration override from: {:?}", path);
                ServiceConfig::from_toml_file(path)
            }
            None => Self::discover_config(),
        }
    }

    /// Find configuration file using discovery hierarchy
    pub fn find_config_file() -> Option<PathBuf> {
        for candidate in Self::get_config_candidates() {
            debug!("Checking for config file: {:?}", candidate);
            if candidate.is_file() {
                debug!("Found config file: {:?}", candidate);
                return Some(candidate);
            }
        }

        debug!("No config file found in discovery hierarchy");
        None
    }

    /// Get list of configuration file candidates in priority order
    fn get_config_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(current_dir) = std_env::current_dir() {
            candidates.push(current_dir.join(env::LOCAL_CONFIG_FILE_NAME));
            candidates.push(env::local_config_file_path(&current_dir));
        }

        if let Some(home_dir) = Self::get_home_dir() {
            candidates.push(env::user_config_file_path(&home_dir));
        }

        #[cfg(unix)]
        candidates.push(PathBuf::from("/etc/liftsync/config.toml"));

        #[cfg(windows)]
        if let Ok(program_data) = std_env::var("PROGRAMDATA") {
            candidates.push(
                PathBuf::from(program_data)
                    .join("liftsync")
                    .join(env::CONFIG_FILE_NAME),
            );
        }

        candidates
    }

    fn get_home_dir() -> Option<PathBuf> {
        std_env::var("HOME")
            .ok()
            .or_else(|| std_env::var("USERPROFILE").ok())
            .map(PathBuf::from)
    }

    /// Create a default config file in the user's home directory
    pub fn create_default_user_config() -> Result<PathBuf> {
        let home_dir = Self::get_home_dir().context("Could not determine home directory")?;

        let config_dir = env::user_config_dir_path(&home_dir);
        let config_path = env::user_config_file_path(&home_dir);

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)?;
            info!("Created configuration directory: {:?}", config_dir);
        }

        if !config_path.exists() {
            ServiceConfig::default().to_toml_file(&config_path)?;
            info!("Created default configuration file: {:?}", config_path);
        } else {
            warn!("Configuration file already exists: {:?}", config_path);
        }

        Ok(config_path)
    }

    /// Show configuration discovery information for debugging
    pub fn show_discovery_info() {
        println!("Configuration Discovery Hierarchy:");
        println!();

        for (i, candidate) in Self::get_config_candidates().iter().enumerate() {
            let status = if candidate.exists() {
                if candidate.is_file() {
                    "✓ EXISTS"
                } else {
                    "✗ NOT A FILE"
                }
            } else {
                "✗ NOT FOUND"
            };

            println!("  {}. {:?} - {}", i + 1, candidate, status);
        }

        println!();
        match Self::find_config_file() {
            Some(found) => println!("Active configuration: {:?}", found),
            None => println!("Active configuration: Built-in defaults"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_service_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.store.backend, StoreBackend::Json);
        assert_eq!(config.reaper.interval_hours, 24);
        assert_eq!(config.reaper.retention_days, 7);

        let workspace = Path::new("/srv/lift");
        assert_eq!(
            config.data_dir(workspace),
            Path::new("/srv/lift/.liftsync/data")
        );
    }

    #[test]
    fn test_config_serialization() {
        let config = ServiceConfig::default();
        let toml_string = toml::to_string(&config).unwrap();

        let deserialized = ServiceConfig::from_toml_str(&toml_string).unwrap();
        assert_eq!(deserialized.store.backend, config.store.backend);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = ServiceConfig::from_toml_str(
            r#"
            [store]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert!(config.reaper.enabled);
        assert_eq!(config.reaper.retention_days, 7);
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let result = ServiceConfig::from_toml_str(
            r#"
            [reaper]
            enabled = true
            interval_hours = 0
            retention_days = 7
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_reaper_values_rejected() {
        let too_long = ServiceConfig::from_toml_str("[reaper]\nretention_days = 100000000\n");
        assert!(too_long.is_err());

        let too_slow = ServiceConfig::from_toml_str(&format!(
            "[reaper]\ninterval_hours = {}\n",
            env::reaper::MAX_INTERVAL_HOURS + 1
        ));
        assert!(too_slow.is_err());

        let edge = ServiceConfig::from_toml_str(&format!(
            "[reaper]\ninterval_hours = {}\nretention_days = {}\n",
            env::reaper::MAX_INTERVAL_HOURS,
            env::reaper::MAX_RETENTION_DAYS
        ))
        .unwrap();
        assert_eq!(edge.reaper.retention_days, env::reaper::MAX_RETENTION_DAYS);
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.toml");

        let mut original = ServiceConfig::default();
        original.reaper.retention_days = 14;
        original.store.data_dir = Some(temp_dir.path().join("data"));

        original.to_toml_file(&config_path).unwrap();
        assert!(config_path.exists());

        let loaded = ServiceConfig::from_toml_file(&config_path).unwrap();
        assert_eq!(loaded.reaper.retention_days, 14);
        assert_eq!(loaded.store.data_dir, original.store.data_dir);
    }

    #[test]
    fn test_config_candidates() {
        let candidates = ConfigDiscovery::get_config_candidates();

        assert!(!candidates.is_empty());
        assert!(candidates[0].file_name().unwrap() == "liftsync.toml");
    }
}

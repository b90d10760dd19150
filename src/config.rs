//! Configuration for a records node

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::did::DidResolverConfig;

/// Default storage directory
pub fn default_storage_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dwn-records")
}

/// Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DwnConfig {
    /// Storage directory for the message index and payloads
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// Log level used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// How long resolved DID documents are cached
    #[serde(default = "default_did_cache_ttl")]
    pub did_cache_ttl_secs: u64,

    /// Maximum cached DID documents
    #[serde(default = "default_did_cache_max_entries")]
    pub did_cache_max_entries: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_did_cache_ttl() -> u64 {
    300
}

fn default_did_cache_max_entries() -> usize {
    1000
}

impl Default for DwnConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            log_level: default_log_level(),
            did_cache_ttl_secs: default_did_cache_ttl(),
            did_cache_max_entries: default_did_cache_max_entries(),
        }
    }
}

impl DwnConfig {
    /// Config rooted at `storage_dir`, other settings default
    pub fn with_storage_dir<P: AsRef<Path>>(storage_dir: P) -> Self {
        Self {
            storage_dir: storage_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get message index database path
    pub fn message_store_path(&self) -> PathBuf {
        self.storage_dir.join("messages.sled")
    }

    /// Get payload directory
    pub fn data_store_path(&self) -> PathBuf {
        self.storage_dir.join("data")
    }

    /// Get the config file path inside the storage directory
    pub fn config_path(&self) -> PathBuf {
        self.storage_dir.join("config.toml")
    }

    pub fn did_resolver_config(&self) -> DidResolverConfig {
        DidResolverConfig {
            cache_ttl: Duration::from_secs(self.did_cache_ttl_secs),
            max_cache_entries: self.did_cache_max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config: DwnConfig = toml::from_str("log_level = \"debug\"").unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.did_cache_ttl_secs, 300);
        assert_eq!(config.did_cache_max_entries, 1000);
        assert!(config.storage_dir.ends_with("dwn-records"));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config = DwnConfig {
            did_cache_ttl_secs: 60,
            ..DwnConfig::with_storage_dir(temp_dir.path())
        };
        config.save(config.config_path()).unwrap();

        let loaded = DwnConfig::load(config.config_path()).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.message_store_path(), temp_dir.path().join("messages.sled"));
        assert_eq!(loaded.did_resolver_config().cache_ttl, Duration::from_secs(60));
    }
}

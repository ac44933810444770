use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scoring::ScoringConfig;
use crate::sources::Settings;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub scan: ScanConfig,

    #[serde(default)]
    pub scoring: ScoringConfig,

    #[serde(default)]
    pub whitelist: WhitelistConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Load config from default locations or create default
    pub fn load_or_default() -> Result<Self> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load(path);
            }
        }

        Ok(Self::default())
    }

    fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("/etc/apsentry/config.toml")];
        if let Some(dir) = dirs_next::config_dir() {
            paths.push(dir.join("apsentry/config.toml"));
        }
        paths.push(PathBuf::from("config.toml"));
        paths
    }

    /// Save configuration to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Get the database path
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.general.db_path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Path to SQLite database
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Move suspicious access points straight to `blocked`
    #[serde(default)]
    pub auto_block_suspicious: bool,
}

impl Settings for ScanConfig {
    fn auto_block_suspicious(&self) -> bool {
        self.auto_block_suspicious
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhitelistConfig {
    /// JSON file of verified networks
    #[serde(default)]
    pub path: Option<String>,

    /// Minimum seconds between whitelist fetches
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Refresh as soon as the whitelist file changes
    #[serde(default)]
    pub watch: bool,
}

impl WhitelistConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for WhitelistConfig {
    fn default() -> Self {
        Self {
            path: None,
            cache_ttl_secs: default_cache_ttl(),
            watch: false,
        }
    }
}

fn default_db_path() -> String {
    dirs_next::data_dir()
        .map(|p| p.join("apsentry/apsentry.db"))
        .unwrap_or_else(|| PathBuf::from("/var/lib/apsentry/apsentry.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_cache_ttl() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.scan.auto_block_suspicious);
        assert_eq!(config.scoring.threshold, 3);
        assert_eq!(config.whitelist.cache_ttl(), Duration::from_secs(300));
        assert!(config.general.db_path.ends_with("apsentry.db"));
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.scan.auto_block_suspicious = true;
        config.scoring.whitelist_mimicry = 4;

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[scan]\nauto_block_suspicious = true\n\n[scoring]\nthreshold = 5\n",
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.scan.auto_block_suspicious());
        assert_eq!(config.scoring.threshold, 5);
        assert_eq!(config.scoring.different_bssid, 2);
        assert_eq!(config.general.log_level, "info");
        assert!(config.whitelist.path.is_none());
    }

    #[test]
    fn test_load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scan\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}

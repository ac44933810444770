//! Scan and settings collaborators consumed by a scan pass

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::AccessPointObservation;

/// Supplier of radio scan results
#[async_trait]
pub trait ScanSource: Send + Sync {
    /// One scan's observations; `ScanUnavailable` when the radio cannot be read
    async fn scan(&self) -> Result<Vec<AccessPointObservation>>;
}

/// Policy switches read once per scan pass
pub trait Settings: Send + Sync {
    fn auto_block_suspicious(&self) -> bool;
}

/// Replays a JSON array of observations from a file
#[derive(Debug, Clone)]
pub struct JsonScanSource {
    path: PathBuf,
}

impl JsonScanSource {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ScanSource for JsonScanSource {
    async fn scan(&self) -> Result<Vec<AccessPointObservation>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| Error::ScanUnavailable(format!("{}: {}", self.path.display(), e)))?;

        let observations: Vec<AccessPointObservation> = serde_json::from_str(&content)
            .map_err(|e| Error::ScanUnavailable(format!("{}: {}", self.path.display(), e)))?;

        let malformed = observations
            .iter()
            .filter(|o| !o.bssid.is_well_formed())
            .count();
        if malformed > 0 {
            debug!("{} observations have malformed bssids", malformed);
        }

        info!(
            "Read {} observations from {}",
            observations.len(),
            self.path.display()
        );
        Ok(observations)
    }
}

/// Fixed observation set, mostly for tests and replay tooling
#[derive(Debug, Clone, Default)]
pub struct StaticScanSource {
    observations: Vec<AccessPointObservation>,
}

impl StaticScanSource {
    pub fn new(observations: Vec<AccessPointObservation>) -> Self {
        Self { observations }
    }
}

#[async_trait]
impl ScanSource for StaticScanSource {
    async fn scan(&self) -> Result<Vec<AccessPointObservation>> {
        Ok(self.observations.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScanConfig;
    use crate::models::SecurityType;

    #[tokio::test]
    async fn test_json_scan_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(
            &path,
            r#"[
                {"ssid":"Cafe","bssid":"AA:00:00:00:00:01","signal_strength":-50,
                 "security_type":"wpa2","observed_at":"2024-01-01T00:00:00Z"},
                {"ssid":"Cafe Free","bssid":"ff:00:00:00:00:01","signal_strength":-45,
                 "security_type":"open","latitude":52.5,"longitude":13.4,
                 "observed_at":"2024-01-01T00:01:00Z"}
            ]"#,
        )
        .unwrap();

        let observations = JsonScanSource::new(&path).scan().await.unwrap();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].bssid.as_str(), "aa:00:00:00:00:01");
        assert_eq!(observations[1].security_type, SecurityType::Open);
        assert_eq!(observations[1].coordinates(), Some((52.5, 13.4)));
    }

    #[tokio::test]
    async fn test_missing_file_is_scan_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonScanSource::new(dir.path().join("missing.json"));
        assert!(matches!(source.scan().await, Err(Error::ScanUnavailable(_))));
    }

    #[tokio::test]
    async fn test_garbage_is_scan_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(
            JsonScanSource::new(&path).scan().await,
            Err(Error::ScanUnavailable(_))
        ));
    }

    #[test]
    fn test_scan_config_settings() {
        let settings: Box<dyn Settings> = Box::new(ScanConfig {
            auto_block_suspicious: true,
        });
        assert!(settings.auto_block_suspicious());
    }
}

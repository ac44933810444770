//! Verified-network whitelist
//!
//! Holds the externally maintained list of legitimate access points and answers
//! cross-reference queries against it:
//! - exact, case-insensitive bssid membership (promotion to `verified`)
//! - SSID collisions with a different bssid (input to scoring)
//!
//! The remote transport is out of scope; any `WhitelistSource` can feed the cache, which
//! keeps serving the last known snapshot when a refresh fails.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::models::{AccessPointObservation, Bssid, NetworkStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WhitelistStatus {
    #[default]
    Active,
    Inactive,
}

/// One verified network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub ssid: String,
    pub bssid: Bssid,
    #[serde(default)]
    pub status: WhitelistStatus,
}

impl WhitelistEntry {
    pub fn active(ssid: &str, bssid: &str) -> Self {
        Self {
            ssid: ssid.to_string(),
            bssid: Bssid::new(bssid),
            status: WhitelistStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == WhitelistStatus::Active
    }
}

/// Point-in-time copy of the whitelist used for one scan pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhitelistSnapshot {
    entries: Vec<WhitelistEntry>,
    fetched_at: Option<DateTime<Utc>>,
}

impl WhitelistSnapshot {
    pub fn new(entries: Vec<WhitelistEntry>) -> Self {
        Self {
            entries,
            fetched_at: Some(Utc::now()),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    pub fn active_entries(&self) -> impl Iterator<Item = &WhitelistEntry> {
        self.entries.iter().filter(|e| e.is_active())
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        self.fetched_at
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_whitelisted(&self, bssid: &Bssid) -> bool {
        is_whitelisted(bssid, self)
    }

    /// Active entry whose SSID the observation copies while using another radio.
    ///
    /// No collision if any active entry lists this exact `(ssid, bssid)` pair, since
    /// one verified SSID is commonly served by several radios.
    pub fn mimicked_entry(&self, ssid: &str, bssid: &Bssid) -> Option<&WhitelistEntry> {
        let same_ssid: Vec<&WhitelistEntry> =
            self.active_entries().filter(|e| e.ssid == ssid).collect();

        if same_ssid.iter().any(|e| e.bssid == *bssid) {
            return None;
        }
        same_ssid.into_iter().next()
    }
}

/// Exact bssid match against active entries. `Bssid` is stored lower-cased, so this is
/// case-insensitive with respect to the original strings.
pub fn is_whitelisted(bssid: &Bssid, snapshot: &WhitelistSnapshot) -> bool {
    snapshot.active_entries().any(|e| e.bssid == *bssid)
}

/// Whitelisted bssids among a scan pass's observations
pub fn cross_reference(
    observations: &[AccessPointObservation],
    snapshot: &WhitelistSnapshot,
) -> HashSet<Bssid> {
    observations
        .iter()
        .filter(|o| is_whitelisted(&o.bssid, snapshot))
        .map(|o| o.bssid.clone())
        .collect()
}

/// Apply whitelist promotion to a status. User intent always wins over membership.
pub fn promoted_status(current: NetworkStatus, whitelisted: bool) -> NetworkStatus {
    if whitelisted && !current.is_user_override() {
        NetworkStatus::Verified
    } else {
        current
    }
}

/// Supplier of the verified-network list
#[async_trait]
pub trait WhitelistSource: Send + Sync {
    async fn current_whitelist(&self) -> Result<Vec<WhitelistEntry>>;
}

/// JSON file of whitelist entries (`[{"ssid": .., "bssid": .., "status": "active"}]`)
#[derive(Debug, Clone)]
pub struct FileWhitelistSource {
    path: PathBuf,
}

impl FileWhitelistSource {
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
impl WhitelistSource for FileWhitelistSource {
    async fn current_whitelist(&self) -> Result<Vec<WhitelistEntry>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::WhitelistUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let entries: Vec<WhitelistEntry> = serde_json::from_str(&content).map_err(|e| {
            Error::WhitelistUnavailable(format!("{}: {}", self.path.display(), e))
        })?;

        let malformed = entries.iter().filter(|e| !e.bssid.is_well_formed()).count();
        if malformed > 0 {
            debug!("{} whitelist entries have malformed bssids", malformed);
        }

        info!("Loaded {} whitelist entries from {}", entries.len(), self.path.display());
        Ok(entries)
    }
}

/// Last-known whitelist with TTL-based refresh
pub struct WhitelistCache {
    ttl: Duration,
    snapshot: RwLock<Option<WhitelistSnapshot>>,
    last_refresh: RwLock<Option<Instant>>,
}

impl WhitelistCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            snapshot: RwLock::new(None),
            last_refresh: RwLock::new(None),
        }
    }

    /// Current snapshot, empty if nothing was ever fetched
    pub async fn snapshot(&self) -> WhitelistSnapshot {
        self.snapshot.read().await.clone().unwrap_or_default()
    }

    /// Fetch from the source if the TTL has lapsed (or `force`), falling back to the
    /// stale snapshot when the source fails.
    pub async fn refresh(&self, source: &dyn WhitelistSource, force: bool) -> WhitelistSnapshot {
        if !force {
            let last = self.last_refresh.read().await;
            if let Some(at) = *last {
                if at.elapsed() < self.ttl {
                    return self.snapshot().await;
                }
            }
        }

        match source.current_whitelist().await {
            Ok(entries) => {
                let snapshot = WhitelistSnapshot::new(entries);
                info!("Whitelist refreshed with {} entries", snapshot.len());
                *self.snapshot.write().await = Some(snapshot.clone());
                *self.last_refresh.write().await = Some(Instant::now());
                snapshot
            }
            Err(e) => {
                let stale = self.snapshot().await;
                warn!(
                    "Whitelist refresh failed ({}), using last known snapshot ({} entries)",
                    e,
                    stale.len()
                );
                stale
            }
        }
    }

    /// Replace the snapshot directly
    pub async fn set(&self, snapshot: WhitelistSnapshot) {
        *self.snapshot.write().await = Some(snapshot);
        *self.last_refresh.write().await = Some(Instant::now());
    }
}

/// Refresh the cache whenever the whitelist file changes
pub async fn watch_whitelist_file(
    source: Arc<FileWhitelistSource>,
    cache: Arc<WhitelistCache>,
) -> anyhow::Result<()> {
    use notify::{RecommendedWatcher, RecursiveMode, Watcher};

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    let mut watcher = RecommendedWatcher::new(
        move |res| {
            let _ = tx.send(res);
        },
        notify::Config::default(),
    )?;

    watcher.watch(source.path(), RecursiveMode::NonRecursive)?;

    info!("Watching whitelist file: {}", source.path().display());

    while let Some(res) = rx.recv().await {
        match res {
            Ok(_event) => {
                info!("Whitelist file changed, refreshing...");
                cache.refresh(source.as_ref(), true).await;
            }
            Err(e) => {
                error!("Watch error: {}", e);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlakySource {
        fail: AtomicBool,
    }

    #[async_trait]
    impl WhitelistSource for FlakySource {
        async fn current_whitelist(&self) -> Result<Vec<WhitelistEntry>> {
            if self.fail.load(Ordering::SeqCst) {
                Err(Error::WhitelistUnavailable("offline".to_string()))
            } else {
                Ok(vec![WhitelistEntry::active("GovWiFi", "22:22:22:22:22:22")])
            }
        }
    }

    #[test]
    fn test_whitelist_match_is_case_insensitive() {
        let snapshot = WhitelistSnapshot::new(vec![WhitelistEntry::active("GovWiFi", "AA:BB:CC:DD:EE:FF")]);
        assert!(snapshot.is_whitelisted(&Bssid::new("aa:bb:cc:dd:ee:ff")));
        assert!(!snapshot.is_whitelisted(&Bssid::new("aa:bb:cc:dd:ee:00")));
    }

    #[test]
    fn test_inactive_entries_ignored() {
        let mut entry = WhitelistEntry::active("GovWiFi", "aa:bb:cc:dd:ee:ff");
        entry.status = WhitelistStatus::Inactive;
        let snapshot = WhitelistSnapshot::new(vec![entry]);

        assert!(!snapshot.is_whitelisted(&Bssid::new("aa:bb:cc:dd:ee:ff")));
        assert!(snapshot.mimicked_entry("GovWiFi", &Bssid::new("11:11:11:11:11:11")).is_none());
    }

    #[test]
    fn test_mimicked_entry() {
        let snapshot = WhitelistSnapshot::new(vec![
            WhitelistEntry::active("GovWiFi", "22:22:22:22:22:22"),
            WhitelistEntry::active("GovWiFi", "33:33:33:33:33:33"),
        ]);

        let rogue = snapshot.mimicked_entry("GovWiFi", &Bssid::new("11:11:11:11:11:11"));
        assert_eq!(rogue.map(|e| e.bssid.as_str()), Some("22:22:22:22:22:22"));

        // Second legitimate radio for the same SSID
        assert!(snapshot.mimicked_entry("GovWiFi", &Bssid::new("33:33:33:33:33:33")).is_none());
        // SSID match is exact
        assert!(snapshot.mimicked_entry("govwifi", &Bssid::new("11:11:11:11:11:11")).is_none());
    }

    #[test]
    fn test_promotion_respects_user_intent() {
        assert_eq!(promoted_status(NetworkStatus::Unknown, true), NetworkStatus::Verified);
        assert_eq!(promoted_status(NetworkStatus::Suspicious, true), NetworkStatus::Verified);
        assert_eq!(promoted_status(NetworkStatus::Flagged, true), NetworkStatus::Flagged);
        assert_eq!(promoted_status(NetworkStatus::Blocked, true), NetworkStatus::Blocked);
        assert_eq!(promoted_status(NetworkStatus::Trusted, true), NetworkStatus::Trusted);
        assert_eq!(promoted_status(NetworkStatus::Unknown, false), NetworkStatus::Unknown);
    }

    #[test]
    fn test_cross_reference() {
        let snapshot = WhitelistSnapshot::new(vec![WhitelistEntry::active("Office", "aa:aa:aa:aa:aa:aa")]);
        let observations = vec![
            AccessPointObservation::new("Office", "AA:AA:AA:AA:AA:AA", -40, crate::models::SecurityType::Wpa2),
            AccessPointObservation::new("Office", "bb:bb:bb:bb:bb:bb", -40, crate::models::SecurityType::Wpa2),
        ];

        let verified = cross_reference(&observations, &snapshot);
        assert_eq!(verified.len(), 1);
        assert!(verified.contains(&Bssid::new("aa:aa:aa:aa:aa:aa")));
    }

    #[tokio::test]
    async fn test_cache_keeps_stale_snapshot_on_failure() {
        let cache = WhitelistCache::new(Duration::from_secs(0));
        let source = FlakySource {
            fail: AtomicBool::new(true),
        };

        // Nothing fetched yet: failure degrades to empty
        assert!(cache.refresh(&source, false).await.is_empty());

        source.fail.store(false, Ordering::SeqCst);
        assert_eq!(cache.refresh(&source, false).await.len(), 1);

        source.fail.store(true, Ordering::SeqCst);
        let stale = cache.refresh(&source, true).await;
        assert_eq!(stale.len(), 1);
        assert!(stale.is_whitelisted(&Bssid::new("22:22:22:22:22:22")));
    }

    #[tokio::test]
    async fn test_cache_honors_ttl() {
        let cache = WhitelistCache::new(Duration::from_secs(3600));
        let source = FlakySource {
            fail: AtomicBool::new(false),
        };

        cache.set(WhitelistSnapshot::empty()).await;
        assert!(cache.refresh(&source, false).await.is_empty());
        assert_eq!(cache.refresh(&source, true).await.len(), 1);
    }

    #[tokio::test]
    async fn test_file_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"ssid":"GovWiFi","bssid":"22:22:22:22:22:22","status":"active"}},
               {{"ssid":"Old","bssid":"33:33:33:33:33:33","status":"inactive"}}]"#
        )
        .unwrap();

        let source = FileWhitelistSource::new(file.path());
        let entries = source.current_whitelist().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(!entries[1].is_active());
    }

    #[tokio::test]
    async fn test_file_source_missing_file() {
        let source = FileWhitelistSource::new("/nonexistent/whitelist.json");
        let err = source.current_whitelist().await.unwrap_err();
        assert!(matches!(err, Error::WhitelistUnavailable(_)));
    }
}

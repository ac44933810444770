use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// SSID the scan driver reports for networks that do not broadcast a name
pub const HIDDEN_SSID: &str = "Hidden Network";

/// Hardware address of a radio, the stable identity of an access point.
///
/// Stored lower-cased and colon-separated so that `AA-BB-..` and `aa:bb:..` compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Bssid(String);

impl Bssid {
    pub fn new(s: &str) -> Self {
        Self(s.trim().to_ascii_lowercase().replace('-', ":"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Six hex octets
    pub fn is_well_formed(&self) -> bool {
        let octets: Vec<&str> = self.0.split(':').collect();
        octets.len() == 6
            && octets
                .iter()
                .all(|o| o.len() == 2 && o.chars().all(|c| c.is_ascii_hexdigit()))
    }
}

impl From<String> for Bssid {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<&str> for Bssid {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<Bssid> for String {
    fn from(b: Bssid) -> Self {
        b.0
    }
}

impl std::fmt::Display for Bssid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Bssid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bssid = Bssid::new(s);
        if bssid.is_well_formed() {
            Ok(bssid)
        } else {
            Err(Error::InvalidBssid(s.to_string()))
        }
    }
}

/// Link-layer security advertised by an access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Open,
    Wep,
    Wpa2,
    Wpa3,
}

impl SecurityType {
    /// Strength rank used when choosing a legitimate reference
    pub fn rank(&self) -> u8 {
        match self {
            SecurityType::Open => 1,
            SecurityType::Wep => 2,
            SecurityType::Wpa2 => 3,
            SecurityType::Wpa3 => 4,
        }
    }
}

impl std::fmt::Display for SecurityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecurityType::Open => write!(f, "open"),
            SecurityType::Wep => write!(f, "wep"),
            SecurityType::Wpa2 => write!(f, "wpa2"),
            SecurityType::Wpa3 => write!(f, "wpa3"),
        }
    }
}

/// Authoritative status of one access point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    #[default]
    Unknown,
    Verified,
    Trusted,
    Flagged,
    Suspicious,
    Blocked,
}

impl NetworkStatus {
    /// Blocked access points never appear in active lists
    pub fn is_displayable(&self) -> bool {
        *self != NetworkStatus::Blocked
    }

    /// Statuses that only a user override can produce
    pub fn is_user_override(&self) -> bool {
        matches!(
            self,
            NetworkStatus::Trusted | NetworkStatus::Flagged | NetworkStatus::Blocked
        )
    }
}

impl std::fmt::Display for NetworkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkStatus::Unknown => write!(f, "unknown"),
            NetworkStatus::Verified => write!(f, "verified"),
            NetworkStatus::Trusted => write!(f, "trusted"),
            NetworkStatus::Flagged => write!(f, "flagged"),
            NetworkStatus::Suspicious => write!(f, "suspicious"),
            NetworkStatus::Blocked => write!(f, "blocked"),
        }
    }
}

impl std::str::FromStr for NetworkStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(NetworkStatus::Unknown),
            "verified" => Ok(NetworkStatus::Verified),
            "trusted" => Ok(NetworkStatus::Trusted),
            "flagged" => Ok(NetworkStatus::Flagged),
            "suspicious" => Ok(NetworkStatus::Suspicious),
            "blocked" => Ok(NetworkStatus::Blocked),
            _ => Err(format!("Unknown network status: {}", s)),
        }
    }
}

/// User-initiated binding held in the override store.
///
/// Variant order is precedence order: `Blocked` outranks `Trusted` outranks `Flagged`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverrideKind {
    Flagged,
    Trusted,
    Blocked,
}

impl OverrideKind {
    pub fn status(&self) -> NetworkStatus {
        match self {
            OverrideKind::Flagged => NetworkStatus::Flagged,
            OverrideKind::Trusted => NetworkStatus::Trusted,
            OverrideKind::Blocked => NetworkStatus::Blocked,
        }
    }
}

impl std::fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.status().fmt(f)
    }
}

impl std::str::FromStr for OverrideKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "flagged" => Ok(OverrideKind::Flagged),
            "trusted" => Ok(OverrideKind::Trusted),
            "blocked" => Ok(OverrideKind::Blocked),
            _ => Err(format!("Unknown override kind: {}", s)),
        }
    }
}

/// One network as seen in a single scan pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPointObservation {
    #[serde(default)]
    pub ssid: String,
    pub bssid: Bssid,
    pub signal_strength: i32,
    pub security_type: SecurityType,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub is_connected: bool,
}

impl AccessPointObservation {
    pub fn new(ssid: &str, bssid: &str, signal_strength: i32, security_type: SecurityType) -> Self {
        Self {
            ssid: ssid.to_string(),
            bssid: Bssid::new(bssid),
            signal_strength,
            security_type,
            latitude: None,
            longitude: None,
            observed_at: Utc::now(),
            is_connected: false,
        }
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    pub fn observed_at(mut self, at: DateTime<Utc>) -> Self {
        self.observed_at = at;
        self
    }

    /// Hidden networks carry no usable name and are never scored or alerted
    pub fn is_hidden(&self) -> bool {
        let ssid = self.ssid.trim();
        ssid.is_empty() || ssid.eq_ignore_ascii_case(HIDDEN_SSID)
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Collapse repeated sightings of one bssid, keeping the strongest signal.
///
/// Output order follows first appearance so downstream stages stay deterministic.
pub fn dedupe_observations(observations: Vec<AccessPointObservation>) -> Vec<AccessPointObservation> {
    let mut out: Vec<AccessPointObservation> = Vec::with_capacity(observations.len());
    let mut index: std::collections::HashMap<Bssid, usize> = std::collections::HashMap::new();

    for obs in observations {
        match index.get(&obs.bssid) {
            Some(&i) => {
                if obs.signal_strength > out[i].signal_strength {
                    out[i] = obs;
                }
            }
            None => {
                index.insert(obs.bssid.clone(), out.len());
                out.push(obs);
            }
        }
    }

    out
}

/// Scoring output for one observation relative to a legitimate reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspicionAssessment {
    pub bssid: Bssid,
    pub score: i32,
    pub reference_bssid: Bssid,
    /// Human-readable contributors, in rule order
    pub reasons: Vec<String>,
    /// Score reached the classification threshold
    pub suspicious: bool,
    /// Reference is a verified network or the member collides with a whitelist entry
    pub impersonates_verified: bool,
}

/// Reconciled, addressable access point for one scan pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessPointRecord {
    pub observation: AccessPointObservation,
    pub status: NetworkStatus,
    pub is_user_managed: bool,
    pub last_action_at: Option<DateTime<Utc>>,
    pub origin_status: Option<NetworkStatus>,
    #[serde(default)]
    pub assessment: Option<SuspicionAssessment>,
}

impl AccessPointRecord {
    pub fn new(observation: AccessPointObservation) -> Self {
        Self {
            observation,
            status: NetworkStatus::Unknown,
            is_user_managed: false,
            last_action_at: None,
            origin_status: None,
            assessment: None,
        }
    }

    pub fn bssid(&self) -> &Bssid {
        &self.observation.bssid
    }

    pub fn ssid(&self) -> &str {
        &self.observation.ssid
    }
}

/// Activity log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityLog {
    pub id: Option<i64>,
    pub timestamp: DateTime<Utc>,
    pub action: ActivityAction,
    pub bssid: Option<Bssid>,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityAction {
    Trust,
    Flag,
    Block,
    Untrust,
    Unflag,
    Unblock,
    AutoBlock,
    ScanCompleted,
    ScanFailed,
}

impl ActivityAction {
    pub fn applied(kind: OverrideKind) -> Self {
        match kind {
            OverrideKind::Trusted => ActivityAction::Trust,
            OverrideKind::Flagged => ActivityAction::Flag,
            OverrideKind::Blocked => ActivityAction::Block,
        }
    }

    pub fn revoked(kind: OverrideKind) -> Self {
        match kind {
            OverrideKind::Trusted => ActivityAction::Untrust,
            OverrideKind::Flagged => ActivityAction::Unflag,
            OverrideKind::Blocked => ActivityAction::Unblock,
        }
    }
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActivityAction::Trust => write!(f, "TRUST"),
            ActivityAction::Flag => write!(f, "FLAG"),
            ActivityAction::Block => write!(f, "BLOCK"),
            ActivityAction::Untrust => write!(f, "UNTRUST"),
            ActivityAction::Unflag => write!(f, "UNFLAG"),
            ActivityAction::Unblock => write!(f, "UNBLOCK"),
            ActivityAction::AutoBlock => write!(f, "AUTOBLOCK"),
            ActivityAction::ScanCompleted => write!(f, "SCAN"),
            ActivityAction::ScanFailed => write!(f, "SCAN_FAILED"),
        }
    }
}

impl std::str::FromStr for ActivityAction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "TRUST" => Ok(ActivityAction::Trust),
            "FLAG" => Ok(ActivityAction::Flag),
            "BLOCK" => Ok(ActivityAction::Block),
            "UNTRUST" => Ok(ActivityAction::Untrust),
            "UNFLAG" => Ok(ActivityAction::Unflag),
            "UNBLOCK" => Ok(ActivityAction::Unblock),
            "AUTOBLOCK" => Ok(ActivityAction::AutoBlock),
            "SCAN" => Ok(ActivityAction::ScanCompleted),
            "SCAN_FAILED" => Ok(ActivityAction::ScanFailed),
            _ => Err(format!("Unknown activity action: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bssid_case_insensitive() {
        assert_eq!(Bssid::new("AA:BB:CC:DD:EE:FF"), Bssid::new("aa:bb:cc:dd:ee:ff"));
        assert_eq!(Bssid::new(" AA:bb:CC:dd:EE:ff ").as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn test_bssid_parse() {
        assert!("aa:bb:cc:dd:ee:ff".parse::<Bssid>().is_ok());
        assert_eq!("AA-BB-CC-DD-EE-FF".parse::<Bssid>().unwrap(), Bssid::new("aa:bb:cc:dd:ee:ff"));
        assert!("not-a-mac".parse::<Bssid>().is_err());
        assert!("aa:bb:cc:dd:ee".parse::<Bssid>().is_err());
    }

    #[test]
    fn test_security_rank_order() {
        assert!(SecurityType::Wpa3.rank() > SecurityType::Wpa2.rank());
        assert!(SecurityType::Wpa2.rank() > SecurityType::Wep.rank());
        assert!(SecurityType::Wep.rank() > SecurityType::Open.rank());
    }

    #[test]
    fn test_override_precedence() {
        assert!(OverrideKind::Blocked > OverrideKind::Trusted);
        assert!(OverrideKind::Trusted > OverrideKind::Flagged);
    }

    #[test]
    fn test_status_roundtrip_strings() {
        for status in [
            NetworkStatus::Unknown,
            NetworkStatus::Verified,
            NetworkStatus::Trusted,
            NetworkStatus::Flagged,
            NetworkStatus::Suspicious,
            NetworkStatus::Blocked,
        ] {
            assert_eq!(status.to_string().parse::<NetworkStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_hidden_detection() {
        let hidden = AccessPointObservation::new(HIDDEN_SSID, "aa:aa:aa:aa:aa:aa", -50, SecurityType::Wpa2);
        let empty = AccessPointObservation::new("  ", "aa:aa:aa:aa:aa:ab", -50, SecurityType::Wpa2);
        let named = AccessPointObservation::new("Cafe", "aa:aa:aa:aa:aa:ac", -50, SecurityType::Wpa2);
        assert!(hidden.is_hidden());
        assert!(empty.is_hidden());
        assert!(!named.is_hidden());
    }

    #[test]
    fn test_dedupe_keeps_strongest() {
        let weak = AccessPointObservation::new("Cafe", "AA:AA:AA:AA:AA:AA", -80, SecurityType::Wpa2);
        let strong = AccessPointObservation::new("Cafe", "aa:aa:aa:aa:aa:aa", -40, SecurityType::Wpa2);
        let other = AccessPointObservation::new("Shop", "bb:bb:bb:bb:bb:bb", -60, SecurityType::Open);

        let out = dedupe_observations(vec![weak, other.clone(), strong]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].signal_strength, -40);
        assert_eq!(out[1], other);
    }

    #[test]
    fn test_observation_json() {
        let json = r#"{"ssid":"Cafe","bssid":"AA:BB:CC:DD:EE:FF","signal_strength":-55,
            "security_type":"wpa2","observed_at":"2024-01-01T00:00:00Z"}"#;
        let obs: AccessPointObservation = serde_json::from_str(json).unwrap();
        assert_eq!(obs.bssid.as_str(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(obs.coordinates(), None);
        assert!(!obs.is_connected);
    }
}

//! Alert Deduplication & Lifecycle
//!
//! Turns status changes into alert actions while keeping at most one live (non-archived)
//! alert per `(ssid, bssid)` identity. Re-detections update the live alert in place and
//! keep the user's read/report state unless the classification itself changes.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{AccessPointRecord, Bssid, NetworkStatus};
use crate::session::{ScanTicket, ScanTrigger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    EvilTwin,
    Suspicious,
    Blocked,
    Flagged,
    Trusted,
    Info,
}

impl AlertKind {
    /// Threat alerts are the ones a user may report
    pub fn is_threat(&self) -> bool {
        matches!(self, AlertKind::EvilTwin | AlertKind::Suspicious)
    }

    pub fn severity(&self) -> Severity {
        match self {
            AlertKind::EvilTwin => Severity::Critical,
            AlertKind::Suspicious => Severity::High,
            AlertKind::Flagged => Severity::Medium,
            AlertKind::Blocked => Severity::Low,
            AlertKind::Trusted | AlertKind::Info => Severity::Info,
        }
    }
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::EvilTwin => write!(f, "evil_twin"),
            AlertKind::Suspicious => write!(f, "suspicious"),
            AlertKind::Blocked => write!(f, "blocked"),
            AlertKind::Flagged => write!(f, "flagged"),
            AlertKind::Trusted => write!(f, "trusted"),
            AlertKind::Info => write!(f, "info"),
        }
    }
}

impl std::str::FromStr for AlertKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "evil_twin" => Ok(AlertKind::EvilTwin),
            "suspicious" => Ok(AlertKind::Suspicious),
            "blocked" => Ok(AlertKind::Blocked),
            "flagged" => Ok(AlertKind::Flagged),
            "trusted" => Ok(AlertKind::Trusted),
            "info" => Ok(AlertKind::Info),
            _ => Err(format!("Unknown alert kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info = 0,
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "INFO" => Ok(Severity::Info),
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    NotApplicable,
    Pending,
    Reported,
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportStatus::NotApplicable => write!(f, "not_applicable"),
            ReportStatus::Pending => write!(f, "pending"),
            ReportStatus::Reported => write!(f, "reported"),
        }
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "not_applicable" => Ok(ReportStatus::NotApplicable),
            "pending" => Ok(ReportStatus::Pending),
            "reported" => Ok(ReportStatus::Reported),
            _ => Err(format!("Unknown report status: {}", s)),
        }
    }
}

/// Who an alert is about
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertIdentity {
    pub ssid: String,
    pub bssid: Bssid,
}

impl AlertIdentity {
    pub fn of(record: &AccessPointRecord) -> Self {
        Self {
            ssid: record.ssid().to_string(),
            bssid: record.bssid().clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub id: Uuid,
    pub kind: AlertKind,
    /// `None` for scan summaries, which are not about one access point
    pub identity: Option<AlertIdentity>,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub is_archived: bool,
    pub report_status: ReportStatus,
    pub scan_session_id: u64,
}

/// Fields rewritten when a live alert is re-detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPatch {
    pub kind: AlertKind,
    pub severity: Severity,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub is_read: bool,
    pub report_status: ReportStatus,
    pub scan_session_id: u64,
}

impl AlertPatch {
    pub fn apply_to(&self, alert: &mut AlertRecord) {
        alert.kind = self.kind;
        alert.severity = self.severity;
        alert.message = self.message.clone();
        alert.created_at = self.created_at;
        alert.is_read = self.is_read;
        alert.report_status = self.report_status;
        alert.scan_session_id = self.scan_session_id;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlertAction {
    Insert(AlertRecord),
    UpdateInPlace { id: Uuid, patch: AlertPatch },
}

/// Durable alert storage
pub trait AlertSink: Send + Sync {
    /// Live (non-archived) alert for an identity, read or unread
    fn find_active(&self, identity: &AlertIdentity) -> Result<Option<AlertRecord>>;

    /// Whether an archived alert for this identity was already reported
    fn was_reported(&self, identity: &AlertIdentity) -> Result<bool>;

    fn apply(&self, action: &AlertAction) -> Result<()>;

    fn get_alert(&self, id: &Uuid) -> Result<Option<AlertRecord>>;

    /// Newest first
    fn list_alerts(&self, include_archived: bool) -> Result<Vec<AlertRecord>>;

    fn mark_read(&self, id: &Uuid) -> Result<bool>;

    fn archive(&self, id: &Uuid) -> Result<bool>;

    fn set_report_status(&self, id: &Uuid, status: ReportStatus) -> Result<bool>;
}

/// Decides which status changes become alerts and how
#[derive(Debug, Default)]
pub struct AlertPolicy {
    last_summary_session: Mutex<u64>,
}

impl AlertPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_status_change(
        &self,
        record: &AccessPointRecord,
        previous: Option<NetworkStatus>,
        scan_session_id: u64,
        sink: &dyn AlertSink,
    ) -> Result<Option<AlertAction>> {
        if record.observation.is_hidden() {
            return Ok(None);
        }

        let kind = match alert_kind(record) {
            Some(kind) => kind,
            None => return Ok(None),
        };

        // Suspicion is re-detected every pass; other statuses alert only on change
        if previous == Some(record.status) && record.status != NetworkStatus::Suspicious {
            return Ok(None);
        }

        let identity = AlertIdentity::of(record);
        let severity = kind.severity();
        let message = alert_message(kind, record);
        let now = Utc::now();

        if let Some(existing) = sink.find_active(&identity)? {
            let reclassified = existing.kind != kind || existing.severity != severity;
            let report_status =
                if kind.is_threat() && existing.report_status == ReportStatus::NotApplicable {
                    ReportStatus::Pending
                } else {
                    existing.report_status
                };

            debug!("Updating alert {} for {} ({})", existing.id, identity.bssid, kind);

            return Ok(Some(AlertAction::UpdateInPlace {
                id: existing.id,
                patch: AlertPatch {
                    kind,
                    severity,
                    message,
                    created_at: now,
                    is_read: existing.is_read && !reclassified,
                    report_status,
                    scan_session_id,
                },
            }));
        }

        let report_status = if !kind.is_threat() {
            ReportStatus::NotApplicable
        } else if sink.was_reported(&identity)? {
            ReportStatus::Reported
        } else {
            ReportStatus::Pending
        };

        debug!("New {} alert for {}", kind, identity.bssid);

        Ok(Some(AlertAction::Insert(AlertRecord {
            id: Uuid::new_v4(),
            kind,
            identity: Some(identity),
            severity,
            message,
            created_at: now,
            is_read: false,
            is_archived: false,
            report_status,
            scan_session_id,
        })))
    }

    /// Scan summary, at most once per user-initiated pass and never for background passes
    pub fn summary_alert(
        &self,
        ticket: &ScanTicket,
        networks_found: usize,
        threats_found: usize,
    ) -> Option<AlertRecord> {
        if ticket.trigger != ScanTrigger::User {
            return None;
        }

        let mut last = self.last_summary_session.lock();
        if *last >= ticket.session_id {
            return None;
        }
        *last = ticket.session_id;

        Some(AlertRecord {
            id: Uuid::new_v4(),
            kind: AlertKind::Info,
            identity: None,
            severity: Severity::Info,
            message: format!(
                "Scan complete: {} networks found, {} threats detected",
                networks_found, threats_found
            ),
            created_at: Utc::now(),
            is_read: false,
            is_archived: false,
            report_status: ReportStatus::NotApplicable,
            scan_session_id: ticket.session_id,
        })
    }
}

fn alert_kind(record: &AccessPointRecord) -> Option<AlertKind> {
    match record.status {
        NetworkStatus::Suspicious => {
            let impersonates = record
                .assessment
                .as_ref()
                .map(|a| a.impersonates_verified)
                .unwrap_or(false);
            Some(if impersonates {
                AlertKind::EvilTwin
            } else {
                AlertKind::Suspicious
            })
        }
        NetworkStatus::Blocked => Some(AlertKind::Blocked),
        NetworkStatus::Flagged => Some(AlertKind::Flagged),
        NetworkStatus::Trusted => Some(AlertKind::Trusted),
        NetworkStatus::Unknown | NetworkStatus::Verified => None,
    }
}

fn alert_message(kind: AlertKind, record: &AccessPointRecord) -> String {
    let ssid = record.ssid();
    let bssid = record.bssid();

    match kind {
        AlertKind::EvilTwin | AlertKind::Suspicious => {
            let detail = record
                .assessment
                .as_ref()
                .map(|a| format!(" (score {}: {})", a.score, a.reasons.join("; ")))
                .unwrap_or_default();
            let label = if kind == AlertKind::EvilTwin {
                "Possible evil twin"
            } else {
                "Suspicious network"
            };
            format!("{} '{}' [{}]{}", label, ssid, bssid, detail)
        }
        AlertKind::Blocked => format!("Network '{}' [{}] blocked", ssid, bssid),
        AlertKind::Flagged => format!("Network '{}' [{}] flagged for review", ssid, bssid),
        AlertKind::Trusted => format!("Network '{}' [{}] marked as trusted", ssid, bssid),
        AlertKind::Info => format!("Network '{}' [{}]", ssid, bssid),
    }
}

/// Alert storage that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryAlertSink {
    alerts: Mutex<Vec<AlertRecord>>,
}

impl MemoryAlertSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlertSink for MemoryAlertSink {
    fn find_active(&self, identity: &AlertIdentity) -> Result<Option<AlertRecord>> {
        Ok(self
            .alerts
            .lock()
            .iter()
            .find(|a| !a.is_archived && a.identity.as_ref() == Some(identity))
            .cloned())
    }

    fn was_reported(&self, identity: &AlertIdentity) -> Result<bool> {
        Ok(self.alerts.lock().iter().any(|a| {
            a.is_archived
                && a.report_status == ReportStatus::Reported
                && a.identity.as_ref() == Some(identity)
        }))
    }

    fn apply(&self, action: &AlertAction) -> Result<()> {
        let mut alerts = self.alerts.lock();
        match action {
            AlertAction::Insert(alert) => {
                let duplicate = alert.identity.is_some()
                    && alerts
                        .iter()
                        .any(|a| !a.is_archived && a.identity == alert.identity);
                if duplicate {
                    return Err(Error::PersistenceFailure(format!(
                        "live alert already exists for {:?}",
                        alert.identity
                    )));
                }
                alerts.push(alert.clone());
            }
            AlertAction::UpdateInPlace { id, patch } => {
                let alert = alerts
                    .iter_mut()
                    .find(|a| a.id == *id)
                    .ok_or_else(|| Error::PersistenceFailure(format!("no alert {}", id)))?;
                patch.apply_to(alert);
            }
        }
        Ok(())
    }

    fn get_alert(&self, id: &Uuid) -> Result<Option<AlertRecord>> {
        Ok(self.alerts.lock().iter().find(|a| a.id == *id).cloned())
    }

    fn list_alerts(&self, include_archived: bool) -> Result<Vec<AlertRecord>> {
        let mut alerts: Vec<AlertRecord> = self
            .alerts
            .lock()
            .iter()
            .filter(|a| include_archived || !a.is_archived)
            .cloned()
            .collect();
        alerts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(alerts)
    }

    fn mark_read(&self, id: &Uuid) -> Result<bool> {
        Ok(self.update(id, |a| a.is_read = true))
    }

    fn archive(&self, id: &Uuid) -> Result<bool> {
        Ok(self.update(id, |a| a.is_archived = true))
    }

    fn set_report_status(&self, id: &Uuid, status: ReportStatus) -> Result<bool> {
        Ok(self.update(id, |a| a.report_status = status))
    }
}

impl MemoryAlertSink {
    fn update<F: FnOnce(&mut AlertRecord)>(&self, id: &Uuid, f: F) -> bool {
        match self.alerts.lock().iter_mut().find(|a| a.id == *id) {
            Some(alert) => {
                f(alert);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessPointObservation, SecurityType, SuspicionAssessment, HIDDEN_SSID};

    fn record(ssid: &str, bssid: &str, status: NetworkStatus) -> AccessPointRecord {
        let mut record = AccessPointRecord::new(AccessPointObservation::new(
            ssid,
            bssid,
            -50,
            SecurityType::Open,
        ));
        record.status = status;
        record
    }

    fn suspicious(ssid: &str, bssid: &str, impersonates: bool) -> AccessPointRecord {
        let mut r = record(ssid, bssid, NetworkStatus::Suspicious);
        r.assessment = Some(SuspicionAssessment {
            bssid: Bssid::new(bssid),
            score: 4,
            reference_bssid: Bssid::new("aa:00:00:00:00:01"),
            reasons: vec!["different BSSID".to_string(), "weaker security".to_string()],
            suspicious: true,
            impersonates_verified: impersonates,
        });
        r
    }

    fn dispatch(policy: &AlertPolicy, sink: &MemoryAlertSink, r: &AccessPointRecord, prev: Option<NetworkStatus>) -> Option<AlertAction> {
        let action = policy.on_status_change(r, prev, 1, sink).unwrap();
        if let Some(ref a) = action {
            sink.apply(a).unwrap();
        }
        action
    }

    #[test]
    fn test_new_threat_inserts_pending() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();
        let r = suspicious("DICT-OFFICIAL-FREE", "ff:00:00:00:00:01", false);

        let action = dispatch(&policy, &sink, &r, None).unwrap();
        match action {
            AlertAction::Insert(alert) => {
                assert_eq!(alert.kind, AlertKind::Suspicious);
                assert_eq!(alert.report_status, ReportStatus::Pending);
                assert_eq!(alert.identity, Some(AlertIdentity::of(&r)));
                assert!(alert.message.contains("score 4"));
            }
            other => panic!("expected insert, got {:?}", other),
        }
    }

    #[test]
    fn test_impersonation_is_evil_twin() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();
        let r = suspicious("GovWiFi", "11:00:00:00:00:01", true);

        let action = dispatch(&policy, &sink, &r, None).unwrap();
        assert!(matches!(action, AlertAction::Insert(ref a) if a.kind == AlertKind::EvilTwin));
    }

    #[test]
    fn test_redetection_updates_in_place() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();
        let r = suspicious("Cafe", "ff:00:00:00:00:01", false);

        dispatch(&policy, &sink, &r, None);
        let id = sink.list_alerts(false).unwrap()[0].id;
        sink.mark_read(&id).unwrap();
        let first_created = sink.get_alert(&id).unwrap().unwrap().created_at;

        let action = dispatch(&policy, &sink, &r, Some(NetworkStatus::Suspicious)).unwrap();
        assert!(matches!(action, AlertAction::UpdateInPlace { id: updated, .. } if updated == id));

        let alerts = sink.list_alerts(false).unwrap();
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].is_read);
        assert_eq!(alerts[0].report_status, ReportStatus::Pending);
        assert!(alerts[0].created_at >= first_created);
    }

    #[test]
    fn test_reclassification_resets_read() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();

        dispatch(&policy, &sink, &suspicious("Cafe", "ff:00:00:00:00:01", false), None);
        let id = sink.list_alerts(false).unwrap()[0].id;
        sink.mark_read(&id).unwrap();
        sink.set_report_status(&id, ReportStatus::Reported).unwrap();

        dispatch(
            &policy,
            &sink,
            &record("Cafe", "ff:00:00:00:00:01", NetworkStatus::Blocked),
            Some(NetworkStatus::Suspicious),
        );

        let alert = sink.get_alert(&id).unwrap().unwrap();
        assert_eq!(alert.kind, AlertKind::Blocked);
        assert!(!alert.is_read);
        assert_eq!(alert.report_status, ReportStatus::Reported);
    }

    #[test]
    fn test_escalation_to_threat_sets_pending() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();

        dispatch(&policy, &sink, &record("Cafe", "ff:00:00:00:00:01", NetworkStatus::Flagged), None);
        assert_eq!(sink.list_alerts(false).unwrap()[0].report_status, ReportStatus::NotApplicable);

        dispatch(
            &policy,
            &sink,
            &suspicious("Cafe", "ff:00:00:00:00:01", false),
            Some(NetworkStatus::Flagged),
        );
        let alerts = sink.list_alerts(false).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].report_status, ReportStatus::Pending);
    }

    #[test]
    fn test_reported_archive_carries_over() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();
        let r = suspicious("Cafe", "ff:00:00:00:00:01", false);

        dispatch(&policy, &sink, &r, None);
        let id = sink.list_alerts(false).unwrap()[0].id;
        sink.set_report_status(&id, ReportStatus::Reported).unwrap();
        sink.archive(&id).unwrap();

        let action = dispatch(&policy, &sink, &r, None).unwrap();
        match action {
            AlertAction::Insert(alert) => assert_eq!(alert.report_status, ReportStatus::Reported),
            other => panic!("expected insert, got {:?}", other),
        }
        assert_eq!(sink.list_alerts(false).unwrap().len(), 1);
        assert_eq!(sink.list_alerts(true).unwrap().len(), 2);
    }

    #[test]
    fn test_no_alert_for_hidden_or_benign() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();

        assert!(dispatch(&policy, &sink, &suspicious(HIDDEN_SSID, "ff:00:00:00:00:01", true), None).is_none());
        assert!(dispatch(&policy, &sink, &record("Cafe", "aa:00:00:00:00:01", NetworkStatus::Unknown), None).is_none());
        assert!(dispatch(&policy, &sink, &record("Cafe", "aa:00:00:00:00:02", NetworkStatus::Verified), None).is_none());
        assert!(dispatch(
            &policy,
            &sink,
            &record("Cafe", "aa:00:00:00:00:03", NetworkStatus::Trusted),
            Some(NetworkStatus::Trusted)
        )
        .is_none());
        assert!(sink.list_alerts(true).unwrap().is_empty());
    }

    #[test]
    fn test_demotion_leaves_alert() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();

        dispatch(&policy, &sink, &suspicious("Cafe", "ff:00:00:00:00:01", false), None);
        let demoted = dispatch(
            &policy,
            &sink,
            &record("Cafe", "ff:00:00:00:00:01", NetworkStatus::Unknown),
            Some(NetworkStatus::Suspicious),
        );
        assert!(demoted.is_none());
        assert_eq!(sink.list_alerts(false).unwrap().len(), 1);
    }

    #[test]
    fn test_sink_rejects_duplicate_live_identity() {
        let policy = AlertPolicy::new();
        let sink = MemoryAlertSink::new();
        let r = suspicious("Cafe", "ff:00:00:00:00:01", false);

        let first = policy.on_status_change(&r, None, 1, &sink).unwrap().unwrap();
        let second = policy.on_status_change(&r, None, 1, &sink).unwrap().unwrap();
        sink.apply(&first).unwrap();
        assert!(sink.apply(&second).is_err());
    }

    #[test]
    fn test_summary_once_per_user_scan() {
        let policy = AlertPolicy::new();
        let user = ScanTicket {
            session_id: 4,
            trigger: ScanTrigger::User,
        };
        let background = ScanTicket {
            session_id: 5,
            trigger: ScanTrigger::Background,
        };

        let summary = policy.summary_alert(&user, 12, 1).unwrap();
        assert_eq!(summary.kind, AlertKind::Info);
        assert!(summary.identity.is_none());
        assert!(summary.message.contains("12 networks"));

        assert!(policy.summary_alert(&user, 12, 1).is_none());
        assert!(policy.summary_alert(&background, 3, 0).is_none());
    }
}

//! Evil-twin detection and status reconciliation for Wi-Fi access points.
//!
//! A scan pass runs dedupe, normalization and scoring, whitelist cross-reference,
//! reconciliation and alerting, in that order. [`ApSentry`] drives passes and user overrides
//! against durable collaborators.

pub mod alerts;
pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod scoring;
pub mod session;
pub mod sources;
pub mod store;
pub mod whitelist;

use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use alerts::{AlertAction, AlertPolicy, AlertRecord, AlertSink, ReportStatus};
use config::Config;
use database::Database;
use models::{AccessPointRecord, ActivityAction, ActivityLog, Bssid, NetworkStatus, OverrideKind};
use reconcile::{OverrideChange, PassResult, StatusEngine};
use scoring::ThreatScorer;
use session::{ScanSessions, ScanTicket, ScanTrigger};
use sources::{ScanSource, Settings};
use store::{OverrideBinding, OverrideStore};
use whitelist::{WhitelistCache, WhitelistSource};

pub use error::{Error, Result};

/// How a scan pass ended
#[derive(Debug, Clone, PartialEq)]
pub enum ScanOutcome {
    Completed,
    /// The scan source failed; the previous record set is still in place
    ScanFailed(String),
    /// A newer pass started before this one could commit
    Superseded { latest: u64 },
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub session_id: u64,
    pub outcome: ScanOutcome,
    /// Active (non-blocked) records after the pass
    pub records: Vec<AccessPointRecord>,
    pub alerts_emitted: usize,
    pub threats: usize,
}

impl ScanReport {
    pub fn is_completed(&self) -> bool {
        self.outcome == ScanOutcome::Completed
    }
}

/// Core apsentry instance
pub struct ApSentry {
    config: Config,
    store: Arc<dyn OverrideStore>,
    alerts: Arc<dyn AlertSink>,
    activity: Option<Database>,
    engine: RwLock<StatusEngine>,
    policy: AlertPolicy,
    sessions: ScanSessions,
    whitelist: Arc<WhitelistCache>,
}

impl ApSentry {
    pub fn new(config: Config, store: Arc<dyn OverrideStore>, alerts: Arc<dyn AlertSink>) -> Self {
        let engine = StatusEngine::new(ThreatScorer::new(config.scoring.clone()));
        let whitelist = Arc::new(WhitelistCache::new(config.whitelist.cache_ttl()));

        Self {
            config,
            store,
            alerts,
            activity: None,
            engine: RwLock::new(engine),
            policy: AlertPolicy::new(),
            sessions: ScanSessions::new(),
            whitelist,
        }
    }

    /// Use one database for overrides, alerts and the activity log
    pub fn with_database(config: Config, db: Database) -> Self {
        let store: Arc<dyn OverrideStore> = Arc::new(db.clone());
        let alerts: Arc<dyn AlertSink> = Arc::new(db.clone());
        Self::new(config, store, alerts).with_activity_log(db)
    }

    /// Open the database named by the config
    pub fn open(config: Config) -> Result<Self> {
        let db = Database::open(config.db_path())?;
        Ok(Self::with_database(config, db))
    }

    pub fn with_activity_log(mut self, db: Database) -> Self {
        self.activity = Some(db);
        self
    }

    /// Run one scan pass.
    ///
    /// Awaits the scan and the whitelist refresh, then scores, reconciles and commits in one
    /// synchronous step. The pass is discarded if a newer one started in the meantime.
    pub async fn run_scan(
        &self,
        trigger: ScanTrigger,
        scan_source: &dyn ScanSource,
        whitelist_source: Option<&dyn WhitelistSource>,
    ) -> Result<ScanReport> {
        let ticket = self.sessions.begin(trigger);
        info!("Scan pass {} started ({})", ticket.session_id, trigger);

        let observations = match scan_source.scan().await {
            Ok(observations) => observations,
            Err(e) => {
                warn!("Scan pass {} failed: {}", ticket.session_id, e);
                self.log_activity(ActivityAction::ScanFailed, None, &e.to_string());
                return Ok(ScanReport {
                    session_id: ticket.session_id,
                    outcome: ScanOutcome::ScanFailed(e.to_string()),
                    records: self.active_records(),
                    alerts_emitted: 0,
                    threats: 0,
                });
            }
        };

        let whitelist = match whitelist_source {
            Some(source) => self.whitelist.refresh(source, false).await,
            None => self.whitelist.snapshot().await,
        };

        let settings: &dyn Settings = &self.config.scan;
        let auto_block = settings.auto_block_suspicious();

        let pass = {
            let mut engine = self.engine.write();

            if let Err(e) = self.sessions.ensure_current(&ticket) {
                info!("Discarding scan pass: {}", e);
                return Ok(ScanReport {
                    session_id: ticket.session_id,
                    outcome: ScanOutcome::Superseded {
                        latest: self.sessions.latest(),
                    },
                    records: engine.active_records(),
                    alerts_emitted: 0,
                    threats: 0,
                });
            }

            // Read under the engine lock so no override lands between snapshot and commit
            let overrides = self.store.snapshot()?;
            let mut pass = engine.reconcile(observations, &overrides, &whitelist, auto_block);
            self.persist_auto_blocks(&mut pass);
            self.persist_pass_state(&pass);
            engine.commit(pass.clone());
            pass
        };

        let threats = pass.threat_count();
        let mut alerts_emitted = 0;
        for transition in &pass.transitions {
            if let Some(record) = pass.record(&transition.bssid) {
                if self.dispatch_alert(record, transition.previous, ticket.session_id) {
                    alerts_emitted += 1;
                }
            }
        }

        if self.emit_summary(&ticket, pass.records.len(), threats) {
            alerts_emitted += 1;
        }

        if trigger == ScanTrigger::User {
            self.log_activity(
                ActivityAction::ScanCompleted,
                None,
                &format!("{} networks, {} threats", pass.records.len(), threats),
            );
        }

        info!(
            "Scan pass {} committed: {} networks, {} threats, {} alerts",
            ticket.session_id,
            pass.records.len(),
            threats,
            alerts_emitted
        );

        Ok(ScanReport {
            session_id: ticket.session_id,
            outcome: ScanOutcome::Completed,
            records: self.active_records(),
            alerts_emitted,
            threats,
        })
    }

    /// Trust, flag or block a bssid; takes effect before the next pass
    pub fn apply_override(
        &self,
        bssid: &Bssid,
        kind: OverrideKind,
        ssid: Option<&str>,
    ) -> Result<OverrideChange> {
        let change = self
            .engine
            .write()
            .apply_override(self.store.as_ref(), bssid, kind, ssid)?;

        let name = change
            .record
            .as_ref()
            .map(|r| r.ssid().to_string())
            .or_else(|| ssid.map(str::to_string))
            .unwrap_or_default();
        self.log_activity(ActivityAction::applied(kind), Some(bssid), &name);

        // Stored status moves only once the alert policy has seen the change; otherwise the
        // next pass, possibly in another process, raises the alert
        if let Some(record) = &change.record {
            self.dispatch_alert(record, Some(change.previous), self.sessions.latest());
            if let Err(e) = self.store.save_statuses(&[(bssid.clone(), record.status)]) {
                warn!("Failed to remember status of {}: {}", bssid, e);
            }
        }

        Ok(change)
    }

    /// Lift an override of the given kind. `Ok(None)` when the bssid holds no such binding.
    pub fn revoke_override(&self, bssid: &Bssid, kind: OverrideKind) -> Result<Option<OverrideChange>> {
        let change = self
            .engine
            .write()
            .revoke_override(self.store.as_ref(), bssid, Some(kind))?;

        if let Some(change) = &change {
            self.log_activity(
                ActivityAction::revoked(kind),
                Some(bssid),
                &format!("restored {}", change.current),
            );

            if let Some(record) = &change.record {
                self.dispatch_alert(record, Some(change.previous), self.sessions.latest());
            }
        }

        Ok(change)
    }

    /// Records shown to the user; blocked access points are excluded
    pub fn active_records(&self) -> Vec<AccessPointRecord> {
        self.engine.read().active_records()
    }

    /// Any record from the last committed pass, blocked ones included
    pub fn record(&self, bssid: &Bssid) -> Option<AccessPointRecord> {
        self.engine.read().record(bssid).cloned()
    }

    /// All override bindings, most recent first
    pub fn overrides(&self) -> Result<Vec<OverrideBinding>> {
        let mut bindings: Vec<OverrideBinding> =
            self.store.snapshot()?.bindings.into_values().collect();
        bindings.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
        Ok(bindings)
    }

    pub fn alerts(&self, include_archived: bool) -> Result<Vec<AlertRecord>> {
        self.alerts.list_alerts(include_archived)
    }

    pub fn mark_alert_read(&self, id: &Uuid) -> Result<bool> {
        self.alerts.mark_read(id)
    }

    pub fn archive_alert(&self, id: &Uuid) -> Result<bool> {
        self.alerts.archive(id)
    }

    /// Mark a threat alert as reported; other alert kinds are not reportable
    pub fn report_alert(&self, id: &Uuid) -> Result<bool> {
        match self.alerts.get_alert(id)? {
            Some(alert) if alert.kind.is_threat() => {
                self.alerts.set_report_status(id, ReportStatus::Reported)
            }
            Some(alert) => {
                debug!("Alert {} is {}, not reportable", id, alert.kind);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    /// Recent activity, newest first; empty without an activity log
    pub fn activity(&self, limit: u32) -> Result<Vec<ActivityLog>> {
        match &self.activity {
            Some(db) => db.get_recent_activity(limit),
            None => Ok(Vec::new()),
        }
    }

    /// Shared whitelist cache, e.g. for `whitelist::watch_whitelist_file`
    pub fn whitelist_cache(&self) -> Arc<WhitelistCache> {
        Arc::clone(&self.whitelist)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn persist_auto_blocks(&self, pass: &mut PassResult) {
        for bssid in pass.auto_blocked.clone() {
            let ssid = pass
                .record(&bssid)
                .map(|r| r.ssid().to_string())
                .unwrap_or_default();
            let binding = OverrideBinding::new(bssid.clone(), &ssid, OverrideKind::Blocked);

            let persisted = self
                .store
                .set_binding_with_origin(&binding, Some(NetworkStatus::Suspicious));

            match persisted {
                Ok(()) => {
                    info!("Auto-blocked suspicious network {} ({})", ssid, bssid);
                    self.log_activity(ActivityAction::AutoBlock, Some(&bssid), &ssid);
                }
                Err(e) => {
                    error!("Failed to persist auto-block of {}: {}", bssid, e);
                    pass.revert_auto_block(&bssid);
                }
            }
        }
    }

    /// Remember final statuses for the next process and drop stale auto-block suppressions
    fn persist_pass_state(&self, pass: &PassResult) {
        if let Err(e) = self.store.save_statuses(&pass.statuses()) {
            warn!("Failed to remember statuses of scan pass: {}", e);
        }

        for bssid in &pass.suppression_lifted {
            match self.store.set_auto_block_suppressed(bssid, false) {
                Ok(()) => debug!("{} no longer suspicious; auto-block may apply again", bssid),
                Err(e) => warn!("Failed to lift auto-block suppression of {}: {}", bssid, e),
            }
        }
    }

    fn dispatch_alert(
        &self,
        record: &AccessPointRecord,
        previous: Option<NetworkStatus>,
        session_id: u64,
    ) -> bool {
        let applied = self
            .policy
            .on_status_change(record, previous, session_id, self.alerts.as_ref())
            .and_then(|action| match action {
                Some(action) => self.alerts.apply(&action).map(|_| Some(action)),
                None => Ok(None),
            });

        match applied {
            Ok(Some(AlertAction::Insert(alert))) => {
                info!("{} alert for {} ({})", alert.kind, record.bssid(), alert.severity);
                true
            }
            Ok(Some(AlertAction::UpdateInPlace { id, .. })) => {
                debug!("Alert {} refreshed for {}", id, record.bssid());
                true
            }
            Ok(None) => false,
            Err(e) => {
                error!("Failed to record alert for {}: {}", record.bssid(), e);
                false
            }
        }
    }

    fn emit_summary(&self, ticket: &ScanTicket, networks: usize, threats: usize) -> bool {
        let summary = match self.policy.summary_alert(ticket, networks, threats) {
            Some(summary) => summary,
            None => return false,
        };

        match self.alerts.apply(&AlertAction::Insert(summary)) {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to record scan summary: {}", e);
                false
            }
        }
    }

    fn log_activity(&self, action: ActivityAction, bssid: Option<&Bssid>, details: &str) {
        if let Some(db) = &self.activity {
            if let Err(e) = db.log_activity(action, bssid, details) {
                warn!("Failed to log {} activity: {}", action, e);
            }
        }
    }
}

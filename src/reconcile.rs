//! Status Reconciliation
//!
//! The single merge site for a scan pass. Per access point, exactly one source decides the
//! final status, highest first:
//! 1. override-store binding (`blocked` > `trusted` > `flagged`, one per bssid)
//! 2. whitelist promotion to `verified`
//! 3. scoring classification as `suspicious`
//! 4. fallback: a previously `suspicious` radio stays suspicious, else `unknown`
//!
//! The engine also owns user overrides and their revocation, including restoring the
//! status an access point had before its first override.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::models::{
    dedupe_observations, AccessPointObservation, AccessPointRecord, Bssid, NetworkStatus,
    OverrideKind,
};
use crate::scoring::{ScoringReport, ThreatScorer};
use crate::store::{OverrideBinding, OverrideSnapshot, OverrideStore};
use crate::whitelist::{cross_reference, promoted_status, WhitelistSnapshot};

/// Total precedence function over the four status sources
pub fn resolve_status(
    binding: Option<OverrideKind>,
    whitelisted: bool,
    suspicious: bool,
    fallback: NetworkStatus,
) -> NetworkStatus {
    match binding {
        Some(kind) => kind.status(),
        None => {
            let automated = if suspicious {
                NetworkStatus::Suspicious
            } else {
                fallback
            };
            promoted_status(automated, whitelisted)
        }
    }
}

/// Status change of one access point
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub bssid: Bssid,
    pub previous: Option<NetworkStatus>,
    pub current: NetworkStatus,
}

/// Everything one reconciliation pass produced, not yet committed
#[derive(Debug, Clone)]
pub struct PassResult {
    pub records: Vec<AccessPointRecord>,
    pub transitions: Vec<StatusTransition>,
    /// Suspicious radios moved to `blocked` by the auto-block policy; the caller persists them
    pub auto_blocked: Vec<Bssid>,
    /// Unblocked radios that are no longer suspicious; their auto-block suppression can go
    pub suppression_lifted: Vec<Bssid>,
    pub scoring: ScoringReport,
    observations: Vec<AccessPointObservation>,
    whitelist: WhitelistSnapshot,
}

impl PassResult {
    pub fn record(&self, bssid: &Bssid) -> Option<&AccessPointRecord> {
        self.records.iter().find(|r| r.bssid() == bssid)
    }

    /// Radios that ended the pass suspicious, auto-blocked ones included
    pub fn threat_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| {
                r.status == NetworkStatus::Suspicious || self.auto_blocked.contains(r.bssid())
            })
            .count()
    }

    /// Final status of every record, as the store keeps it between processes
    pub fn statuses(&self) -> Vec<(Bssid, NetworkStatus)> {
        self.records
            .iter()
            .map(|r| (r.bssid().clone(), r.status))
            .collect()
    }

    /// Undo an auto-block whose binding could not be persisted
    pub fn revert_auto_block(&mut self, bssid: &Bssid) {
        self.auto_blocked.retain(|b| b != bssid);
        if let Some(record) = self.records.iter_mut().find(|r| r.bssid() == bssid) {
            record.status = NetworkStatus::Suspicious;
            record.is_user_managed = false;
            record.last_action_at = None;
            record.origin_status = None;
        }
        if let Some(t) = self.transitions.iter_mut().find(|t| t.bssid == *bssid) {
            t.current = NetworkStatus::Suspicious;
        }
    }
}

/// Result of applying or lifting a user override
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideChange {
    pub bssid: Bssid,
    pub previous: NetworkStatus,
    pub current: NetworkStatus,
    pub origin_status: Option<NetworkStatus>,
    /// Updated record, if the access point was seen in the last committed pass
    pub record: Option<AccessPointRecord>,
}

/// Holds the last committed record set and reconciles new passes against it
#[derive(Debug, Default)]
pub struct StatusEngine {
    scorer: ThreatScorer,
    records: Vec<AccessPointRecord>,
    observations: Vec<AccessPointObservation>,
    whitelist: WhitelistSnapshot,
    /// Revoked bssids whose cached status must not feed the next pass
    force_reassess: HashSet<Bssid>,
}

impl StatusEngine {
    pub fn new(scorer: ThreatScorer) -> Self {
        Self {
            scorer,
            ..Default::default()
        }
    }

    pub fn records(&self) -> &[AccessPointRecord] {
        &self.records
    }

    /// Records shown in active lists (never blocked ones)
    pub fn active_records(&self) -> Vec<AccessPointRecord> {
        self.records
            .iter()
            .filter(|r| r.status.is_displayable())
            .cloned()
            .collect()
    }

    pub fn record(&self, bssid: &Bssid) -> Option<&AccessPointRecord> {
        self.records.iter().find(|r| r.bssid() == bssid)
    }

    pub fn needs_reassessment(&self, bssid: &Bssid) -> bool {
        self.force_reassess.contains(bssid)
    }

    /// Status before this pass: the cached record, else what the store remembers
    fn previous_status(&self, bssid: &Bssid, overrides: &OverrideSnapshot) -> Option<NetworkStatus> {
        if self.force_reassess.contains(bssid) {
            return None;
        }
        self.record(bssid)
            .map(|r| r.status)
            .or_else(|| overrides.last_status(bssid))
    }

    /// Reconcile one pass. Pure with respect to the engine; call `commit` to keep it.
    pub fn reconcile(
        &self,
        observations: Vec<AccessPointObservation>,
        overrides: &OverrideSnapshot,
        whitelist: &WhitelistSnapshot,
        auto_block: bool,
    ) -> PassResult {
        let observations = dedupe_observations(observations);
        let scoring = self.scorer.assess(&observations, overrides, whitelist);
        let verified = cross_reference(&observations, whitelist);
        let now = Utc::now();

        let mut records = Vec::with_capacity(observations.len());
        let mut transitions = Vec::with_capacity(observations.len());
        let mut auto_blocked = Vec::new();
        let mut suppression_lifted = Vec::new();

        for obs in &observations {
            let bssid = &obs.bssid;
            let previous = self.previous_status(bssid, overrides);
            let binding = overrides.binding(bssid);

            let fallback = if previous == Some(NetworkStatus::Suspicious) && !obs.is_hidden() {
                NetworkStatus::Suspicious
            } else {
                NetworkStatus::Unknown
            };

            let mut status = resolve_status(
                binding.map(|b| b.kind),
                verified.contains(bssid),
                scoring.is_suspicious(bssid),
                fallback,
            );

            let mut record = AccessPointRecord::new(obs.clone());
            record.assessment = scoring.get(bssid).cloned();

            if let Some(binding) = binding {
                record.is_user_managed = true;
                record.last_action_at = Some(binding.applied_at);
                record.origin_status = overrides.origin(bssid);
            } else if overrides.is_auto_block_suppressed(bssid) {
                if status != NetworkStatus::Suspicious {
                    suppression_lifted.push(bssid.clone());
                }
            } else if auto_block && status == NetworkStatus::Suspicious {
                debug!("Auto-blocking suspicious network {} ({})", obs.ssid, bssid);
                status = NetworkStatus::Blocked;
                record.is_user_managed = true;
                record.last_action_at = Some(now);
                record.origin_status = Some(NetworkStatus::Suspicious);
                auto_blocked.push(bssid.clone());
            }

            record.status = status;
            transitions.push(StatusTransition {
                bssid: bssid.clone(),
                previous,
                current: status,
            });
            records.push(record);
        }

        PassResult {
            records,
            transitions,
            auto_blocked,
            suppression_lifted,
            scoring,
            observations,
            whitelist: whitelist.clone(),
        }
    }

    /// Replace the cached record set with a completed pass
    pub fn commit(&mut self, result: PassResult) {
        for record in &result.records {
            self.force_reassess.remove(record.bssid());
        }
        self.records = result.records;
        self.observations = result.observations;
        self.whitelist = result.whitelist;
    }

    /// Status the access point would have with no override, computed fresh from the last
    /// committed pass's observations and whitelist
    pub fn natural_status(&self, bssid: &Bssid, overrides: &OverrideSnapshot) -> NetworkStatus {
        if !self.observations.iter().any(|o| o.bssid == *bssid) {
            return NetworkStatus::Unknown;
        }

        let mut overrides = overrides.clone();
        overrides.bindings.remove(bssid);

        let scoring = self.scorer.assess(&self.observations, &overrides, &self.whitelist);
        resolve_status(
            None,
            self.whitelist.is_whitelisted(bssid),
            scoring.is_suspicious(bssid),
            NetworkStatus::Unknown,
        )
    }

    /// Bind a user override. Persistence happens first; on failure partial writes are
    /// rolled back and the in-memory record is left untouched.
    pub fn apply_override(
        &mut self,
        store: &dyn OverrideStore,
        bssid: &Bssid,
        kind: OverrideKind,
        ssid_hint: Option<&str>,
    ) -> Result<OverrideChange> {
        let overrides = store.snapshot()?;
        let prev_binding = overrides.binding(bssid).cloned();
        let prev_origin = overrides.origin(bssid);

        let current = self
            .record(bssid)
            .map(|r| r.status)
            .or_else(|| prev_binding.as_ref().map(|b| b.kind.status()))
            .or_else(|| overrides.last_status(bssid))
            .unwrap_or(NetworkStatus::Unknown);

        // Written once: switching between override kinds keeps the first origin
        let origin = match prev_origin {
            Some(origin) => origin,
            None if current.is_user_override() => self.natural_status(bssid, &overrides),
            None => current,
        };

        let ssid = self
            .record(bssid)
            .map(|r| r.ssid().to_string())
            .or_else(|| ssid_hint.map(str::to_string))
            .or_else(|| prev_binding.as_ref().map(|b| b.ssid.clone()))
            .unwrap_or_default();
        let binding = OverrideBinding::new(bssid.clone(), &ssid, kind);

        let new_origin = if prev_origin.is_none() { Some(origin) } else { None };
        if let Err(e) = store.set_binding_with_origin(&binding, new_origin) {
            error!("Failed to persist {} override for {}: {}", kind, bssid, e);
            return Err(persistence(e));
        }

        let record = self.update_record(bssid, |record| {
            record.status = kind.status();
            record.is_user_managed = true;
            record.last_action_at = Some(binding.applied_at);
            record.origin_status = Some(origin);
        });

        info!("Applied {} override to {} (origin {})", kind, bssid, origin);

        Ok(OverrideChange {
            bssid: bssid.clone(),
            previous: current,
            current: kind.status(),
            origin_status: Some(origin),
            record,
        })
    }

    /// Lift a user override. With `expected` set, only a binding of that kind is lifted.
    ///
    /// The recorded origin status is restored (or a natural status recomputed) and the
    /// bssid is marked for a full reassessment on the next pass. Lifting a block also keeps
    /// auto-block off the radio until it stops being suspicious.
    pub fn revoke_override(
        &mut self,
        store: &dyn OverrideStore,
        bssid: &Bssid,
        expected: Option<OverrideKind>,
    ) -> Result<Option<OverrideChange>> {
        let overrides = store.snapshot()?;
        let binding = match overrides.binding(bssid) {
            Some(b) => b.clone(),
            None => {
                debug!("No override to revoke for {}", bssid);
                return Ok(None);
            }
        };

        if let Some(kind) = expected {
            if binding.kind != kind {
                debug!("{} is {}, not {}; nothing revoked", bssid, binding.kind, kind);
                return Ok(None);
            }
        }

        let origin = overrides.origin(bssid);

        let suppress_auto_block = binding.kind == OverrideKind::Blocked;
        if let Err(e) = store.clear_binding_and_origin(bssid, suppress_auto_block) {
            error!("Failed to lift {} override on {}: {}", binding.kind, bssid, e);
            return Err(persistence(e));
        }

        let restored = match origin {
            Some(status) if !status.is_user_override() => status,
            _ => self.natural_status(bssid, &overrides),
        };

        let now = Utc::now();
        let record = self.update_record(bssid, |record| {
            record.status = restored;
            record.is_user_managed = false;
            record.last_action_at = Some(now);
            record.origin_status = None;
        });
        self.force_reassess.insert(bssid.clone());

        info!("Revoked {} override on {}, restored {}", binding.kind, bssid, restored);

        Ok(Some(OverrideChange {
            bssid: bssid.clone(),
            previous: binding.kind.status(),
            current: restored,
            origin_status: None,
            record,
        }))
    }

    fn update_record<F>(&mut self, bssid: &Bssid, f: F) -> Option<AccessPointRecord>
    where
        F: FnOnce(&mut AccessPointRecord),
    {
        let record = self.records.iter_mut().find(|r| r.bssid() == bssid)?;
        f(record);
        Some(record.clone())
    }

    /// Cached records keyed by bssid
    pub fn status_map(&self) -> HashMap<Bssid, NetworkStatus> {
        self.records
            .iter()
            .map(|r| (r.bssid().clone(), r.status))
            .collect()
    }
}

fn persistence(e: Error) -> Error {
    match e {
        Error::PersistenceFailure(_) => e,
        other => Error::PersistenceFailure(other.to_string()),
    }
}

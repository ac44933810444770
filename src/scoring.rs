//! Evil Twin Scoring
//!
//! Groups a scan pass's observations by normalized SSID, nominates a legitimate reference
//! per group and scores every other member against it. Independently, any observation that
//! copies the SSID of an active whitelist entry from a different radio is penalized, even
//! when it has no local look-alike.
//!
//! Scoring is pure: it never touches status, it only produces assessments.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

use crate::models::{AccessPointObservation, Bssid, OverrideKind, SuspicionAssessment};
use crate::normalize::normalize;
use crate::store::OverrideSnapshot;
use crate::whitelist::WhitelistSnapshot;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Weights and thresholds. The defaults are empirical, not derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Score at or above which a member is classified suspicious
    #[serde(default = "default_threshold")]
    pub threshold: i32,

    #[serde(default = "default_two")]
    pub different_bssid: i32,

    #[serde(default = "default_two")]
    pub weaker_security: i32,

    #[serde(default = "default_one")]
    pub weak_signal: i32,

    /// dBm below the reference that counts as weak
    #[serde(default = "default_weak_signal_gap")]
    pub weak_signal_gap: i32,

    #[serde(default = "default_one")]
    pub competitive_signal: i32,

    /// dBm window around the reference that counts as suspiciously competitive
    #[serde(default = "default_competitive_window")]
    pub competitive_signal_window: i32,

    #[serde(default = "default_one")]
    pub late_appearance: i32,

    #[serde(default = "default_late_appearance_secs")]
    pub late_appearance_secs: i64,

    #[serde(default = "default_one")]
    pub proximity: i32,

    #[serde(default = "default_proximity_meters")]
    pub proximity_meters: f64,

    #[serde(default = "default_whitelist_mimicry")]
    pub whitelist_mimicry: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            different_bssid: 2,
            weaker_security: 2,
            weak_signal: 1,
            weak_signal_gap: default_weak_signal_gap(),
            competitive_signal: 1,
            competitive_signal_window: default_competitive_window(),
            late_appearance: 1,
            late_appearance_secs: default_late_appearance_secs(),
            proximity: 1,
            proximity_meters: default_proximity_meters(),
            whitelist_mimicry: default_whitelist_mimicry(),
        }
    }
}

fn default_threshold() -> i32 {
    3
}

fn default_one() -> i32 {
    1
}

fn default_two() -> i32 {
    2
}

fn default_weak_signal_gap() -> i32 {
    30
}

fn default_competitive_window() -> i32 {
    5
}

fn default_late_appearance_secs() -> i64 {
    300 // 5 minutes
}

fn default_proximity_meters() -> f64 {
    100.0
}

fn default_whitelist_mimicry() -> i32 {
    3
}

/// All assessments produced for one scan pass, ordered by bssid
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoringReport {
    pub assessments: Vec<SuspicionAssessment>,
}

impl ScoringReport {
    pub fn get(&self, bssid: &Bssid) -> Option<&SuspicionAssessment> {
        self.assessments.iter().find(|a| a.bssid == *bssid)
    }

    pub fn is_suspicious(&self, bssid: &Bssid) -> bool {
        self.get(bssid).map(|a| a.suspicious).unwrap_or(false)
    }

    pub fn suspicious_count(&self) -> usize {
        self.assessments.iter().filter(|a| a.suspicious).count()
    }
}

/// Scores observations against their legitimate reference
#[derive(Debug, Clone, Default)]
pub struct ThreatScorer {
    config: ScoringConfig,
}

impl ThreatScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score one pass. Observations must already be unique per bssid.
    pub fn assess(
        &self,
        observations: &[AccessPointObservation],
        overrides: &OverrideSnapshot,
        whitelist: &WhitelistSnapshot,
    ) -> ScoringReport {
        let candidates: Vec<&AccessPointObservation> =
            observations.iter().filter(|o| !o.is_hidden()).collect();

        let mut groups: BTreeMap<String, Vec<&AccessPointObservation>> = BTreeMap::new();
        for &obs in &candidates {
            groups.entry(normalize(&obs.ssid)).or_default().push(obs);
        }

        let mut assessments = Vec::new();
        let mut scored: HashSet<&Bssid> = HashSet::new();

        for (key, members) in &groups {
            if members.len() < 2 {
                continue;
            }

            let reference = select_reference(members, overrides, whitelist);
            let reference_verified = is_verified(reference, overrides, whitelist);
            debug!(
                "Group '{}' ({} members) reference {}",
                key,
                members.len(),
                reference.bssid
            );

            // Trusted radios are never scored, but may still anchor their group
            for member in members {
                if member.bssid == reference.bssid || overrides.is_trusted(&member.bssid) {
                    continue;
                }
                assessments.push(self.score_member(member, reference, reference_verified, whitelist));
                scored.insert(&member.bssid);
            }
        }

        // Whitelist mimicry applies regardless of group size
        for &obs in &candidates {
            if overrides.is_trusted(&obs.bssid) || scored.contains(&obs.bssid) {
                continue;
            }
            if let Some(entry) = whitelist.mimicked_entry(&obs.ssid, &obs.bssid) {
                let score = self.config.whitelist_mimicry;
                assessments.push(SuspicionAssessment {
                    bssid: obs.bssid.clone(),
                    score,
                    reference_bssid: entry.bssid.clone(),
                    reasons: vec![mimicry_reason(&entry.ssid, &entry.bssid)],
                    suspicious: score >= self.config.threshold,
                    impersonates_verified: true,
                });
            }
        }

        assessments.sort_by(|a, b| a.bssid.cmp(&b.bssid));

        ScoringReport { assessments }
    }

    /// Sum every independently triggered condition, recording each in rule order
    fn score_member(
        &self,
        member: &AccessPointObservation,
        reference: &AccessPointObservation,
        reference_verified: bool,
        whitelist: &WhitelistSnapshot,
    ) -> SuspicionAssessment {
        let cfg = &self.config;
        let mut score = 0;
        let mut reasons = Vec::new();

        if member.bssid != reference.bssid {
            score += cfg.different_bssid;
            reasons.push(format!("different BSSID than reference {}", reference.bssid));
        }

        if member.security_type.rank() < reference.security_type.rank() {
            score += cfg.weaker_security;
            reasons.push(format!(
                "weaker security ({} vs {})",
                member.security_type, reference.security_type
            ));
        }

        let gap = reference.signal_strength - member.signal_strength;
        if gap > cfg.weak_signal_gap {
            score += cfg.weak_signal;
            reasons.push(format!("signal {} dBm below reference", gap));
        }

        if gap.abs() <= cfg.competitive_signal_window {
            score += cfg.competitive_signal;
            reasons.push(format!(
                "signal within {} dBm of reference",
                cfg.competitive_signal_window
            ));
        }

        let delay = member.observed_at - reference.observed_at;
        if delay > Duration::seconds(cfg.late_appearance_secs) {
            score += cfg.late_appearance;
            reasons.push(format!("appeared {}s after reference", delay.num_seconds()));
        }

        if let (Some(a), Some(b)) = (member.coordinates(), reference.coordinates()) {
            let distance = haversine_meters(a, b);
            if distance < cfg.proximity_meters && member.bssid != reference.bssid {
                score += cfg.proximity;
                reasons.push(format!("{:.0} m from reference", distance));
            }
        }

        let mimicked = whitelist.mimicked_entry(&member.ssid, &member.bssid);
        if let Some(entry) = mimicked {
            score += cfg.whitelist_mimicry;
            reasons.push(mimicry_reason(&entry.ssid, &entry.bssid));
        }

        SuspicionAssessment {
            bssid: member.bssid.clone(),
            score,
            reference_bssid: reference.bssid.clone(),
            reasons,
            suspicious: score >= cfg.threshold,
            impersonates_verified: reference_verified || mimicked.is_some(),
        }
    }
}

fn mimicry_reason(ssid: &str, bssid: &Bssid) -> String {
    format!("copies verified network '{}' ({})", ssid, bssid)
}

/// Pick the legitimate member of a group.
///
/// First difference wins: verified, user-trusted, stronger security, stronger signal,
/// earlier sighting. Lowest bssid breaks any remaining tie.
pub fn select_reference<'a>(
    members: &[&'a AccessPointObservation],
    overrides: &OverrideSnapshot,
    whitelist: &WhitelistSnapshot,
) -> &'a AccessPointObservation {
    let mut best = members[0];
    for &candidate in &members[1..] {
        if compare_legitimacy(candidate, best, overrides, whitelist) == Ordering::Greater {
            best = candidate;
        }
    }
    best
}

/// Whitelisted and not flagged or blocked by the user
fn is_verified(
    obs: &AccessPointObservation,
    overrides: &OverrideSnapshot,
    whitelist: &WhitelistSnapshot,
) -> bool {
    let distrusted = matches!(
        overrides.kind(&obs.bssid),
        Some(OverrideKind::Flagged | OverrideKind::Blocked)
    );
    whitelist.is_whitelisted(&obs.bssid) && !distrusted
}

fn compare_legitimacy(
    a: &AccessPointObservation,
    b: &AccessPointObservation,
    overrides: &OverrideSnapshot,
    whitelist: &WhitelistSnapshot,
) -> Ordering {
    is_verified(a, overrides, whitelist)
        .cmp(&is_verified(b, overrides, whitelist))
        .then_with(|| overrides.is_trusted(&a.bssid).cmp(&overrides.is_trusted(&b.bssid)))
        .then_with(|| a.security_type.rank().cmp(&b.security_type.rank()))
        .then_with(|| a.signal_strength.cmp(&b.signal_strength))
        .then_with(|| b.observed_at.cmp(&a.observed_at))
        .then_with(|| b.bssid.cmp(&a.bssid))
}

/// Great-circle distance between two (lat, lon) points in degrees
pub fn haversine_meters(a: (f64, f64), b: (f64, f64)) -> f64 {
    let (lat1, lon1) = (a.0.to_radians(), a.1.to_radians());
    let (lat2, lon2) = (b.0.to_radians(), b.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

//! Override store
//!
//! One authoritative mapping `bssid -> OverrideKind` plus a parallel `bssid -> origin status`
//! map. A bssid can hold at most one binding, so setting trust implicitly clears a flag or
//! block for the same radio.
//!
//! The store also keeps the status each radio had after the last committed pass, so a new
//! process starts from what the previous one saw, and the radios the user unblocked, so
//! auto-block leaves them alone.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::models::{Bssid, NetworkStatus, OverrideKind};

/// User override held for one bssid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverrideBinding {
    pub bssid: Bssid,
    pub ssid: String,
    pub kind: OverrideKind,
    pub applied_at: DateTime<Utc>,
}

impl OverrideBinding {
    pub fn new(bssid: Bssid, ssid: &str, kind: OverrideKind) -> Self {
        Self {
            bssid,
            ssid: ssid.to_string(),
            kind,
            applied_at: Utc::now(),
        }
    }
}

/// Consistent read of the whole store, taken once per scan pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSnapshot {
    pub bindings: HashMap<Bssid, OverrideBinding>,
    pub origins: HashMap<Bssid, NetworkStatus>,
    /// Status after the last committed pass that saw the radio
    pub last_statuses: HashMap<Bssid, NetworkStatus>,
    /// Radios the user unblocked; auto-block skips them while they stay suspicious
    pub auto_block_suppressed: HashSet<Bssid>,
}

impl OverrideSnapshot {
    pub fn kind(&self, bssid: &Bssid) -> Option<OverrideKind> {
        self.bindings.get(bssid).map(|b| b.kind)
    }

    pub fn binding(&self, bssid: &Bssid) -> Option<&OverrideBinding> {
        self.bindings.get(bssid)
    }

    pub fn is_trusted(&self, bssid: &Bssid) -> bool {
        self.kind(bssid) == Some(OverrideKind::Trusted)
    }

    pub fn origin(&self, bssid: &Bssid) -> Option<NetworkStatus> {
        self.origins.get(bssid).copied()
    }

    pub fn last_status(&self, bssid: &Bssid) -> Option<NetworkStatus> {
        self.last_statuses.get(bssid).copied()
    }

    pub fn is_auto_block_suppressed(&self, bssid: &Bssid) -> bool {
        self.auto_block_suppressed.contains(bssid)
    }
}

/// Durable `bssid`-keyed override storage. Every write is all-or-nothing.
pub trait OverrideStore: Send + Sync {
    fn get_binding(&self, bssid: &Bssid) -> Result<Option<OverrideBinding>>;

    /// Bind, replacing any other kind held by the same bssid, and record `origin` when
    /// given. Lifts any auto-block suppression for the bssid.
    fn set_binding_with_origin(
        &self,
        binding: &OverrideBinding,
        origin: Option<NetworkStatus>,
    ) -> Result<()>;

    /// Drop the binding, its origin and the cached last status; optionally suppress
    /// auto-block for the bssid. Returns whether a binding existed.
    fn clear_binding_and_origin(&self, bssid: &Bssid, suppress_auto_block: bool) -> Result<bool>;

    fn get_origin_status(&self, bssid: &Bssid) -> Result<Option<NetworkStatus>>;

    /// Remember the status of each radio a pass (or override) settled
    fn save_statuses(&self, statuses: &[(Bssid, NetworkStatus)]) -> Result<()>;

    fn set_auto_block_suppressed(&self, bssid: &Bssid, suppressed: bool) -> Result<()>;

    fn snapshot(&self) -> Result<OverrideSnapshot>;
}

/// Non-durable store for tests and one-shot runs
#[derive(Debug, Default)]
pub struct MemoryOverrideStore {
    inner: RwLock<OverrideSnapshot>,
}

impl MemoryOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OverrideStore for MemoryOverrideStore {
    fn get_binding(&self, bssid: &Bssid) -> Result<Option<OverrideBinding>> {
        Ok(self.inner.read().bindings.get(bssid).cloned())
    }

    fn set_binding_with_origin(
        &self,
        binding: &OverrideBinding,
        origin: Option<NetworkStatus>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        inner
            .bindings
            .insert(binding.bssid.clone(), binding.clone());
        if let Some(origin) = origin {
            inner.origins.insert(binding.bssid.clone(), origin);
        }
        inner.auto_block_suppressed.remove(&binding.bssid);
        Ok(())
    }

    fn clear_binding_and_origin(&self, bssid: &Bssid, suppress_auto_block: bool) -> Result<bool> {
        let mut inner = self.inner.write();
        let existed = inner.bindings.remove(bssid).is_some();
        inner.origins.remove(bssid);
        inner.last_statuses.remove(bssid);
        if suppress_auto_block {
            inner.auto_block_suppressed.insert(bssid.clone());
        }
        Ok(existed)
    }

    fn get_origin_status(&self, bssid: &Bssid) -> Result<Option<NetworkStatus>> {
        Ok(self.inner.read().origins.get(bssid).copied())
    }

    fn save_statuses(&self, statuses: &[(Bssid, NetworkStatus)]) -> Result<()> {
        let mut inner = self.inner.write();
        for (bssid, status) in statuses {
            inner.last_statuses.insert(bssid.clone(), *status);
        }
        Ok(())
    }

    fn set_auto_block_suppressed(&self, bssid: &Bssid, suppressed: bool) -> Result<()> {
        let mut inner = self.inner.write();
        if suppressed {
            inner.auto_block_suppressed.insert(bssid.clone());
        } else {
            inner.auto_block_suppressed.remove(bssid);
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<OverrideSnapshot> {
        Ok(self.inner.read().clone())
    }
}

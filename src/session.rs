//! Scan session tracking
//!
//! Every scan pass takes a ticket with a monotonically increasing id. A pass may only commit
//! while its ticket is still the latest; anything older has been superseded.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

/// What started a scan pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanTrigger {
    User,
    Background,
}

impl std::fmt::Display for ScanTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanTrigger::User => write!(f, "user"),
            ScanTrigger::Background => write!(f, "background"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanTicket {
    pub session_id: u64,
    pub trigger: ScanTrigger,
}

#[derive(Debug, Default)]
pub struct ScanSessions {
    latest: AtomicU64,
}

impl ScanSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&self, trigger: ScanTrigger) -> ScanTicket {
        let session_id = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        ScanTicket {
            session_id,
            trigger,
        }
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: &ScanTicket) -> bool {
        self.latest() == ticket.session_id
    }

    /// `Error::Superseded` once a newer pass has started
    pub fn ensure_current(&self, ticket: &ScanTicket) -> Result<()> {
        let latest = self.latest();
        if latest != ticket.session_id {
            return Err(Error::Superseded {
                session: ticket.session_id,
                latest,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_ticket_supersedes() {
        let sessions = ScanSessions::new();
        let first = sessions.begin(ScanTrigger::User);
        assert!(sessions.is_current(&first));

        let second = sessions.begin(ScanTrigger::Background);
        assert!(second.session_id > first.session_id);
        assert!(!sessions.is_current(&first));
        assert!(sessions.is_current(&second));
        assert_eq!(sessions.latest(), second.session_id);
        assert!(sessions.ensure_current(&second).is_ok());
        assert!(matches!(
            sessions.ensure_current(&first),
            Err(Error::Superseded { session: 1, latest: 2 })
        ));
    }
}

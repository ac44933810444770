use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::alerts::{AlertAction, AlertIdentity, AlertRecord, AlertSink, ReportStatus};
use crate::error::{Error, Result};
use crate::models::{ActivityAction, ActivityLog, Bssid, NetworkStatus};
use crate::store::{OverrideBinding, OverrideSnapshot, OverrideStore};

/// Thread-safe database wrapper
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path).map_err(|e| {
            Error::PersistenceFailure(format!(
                "failed to open database {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            -- One binding per bssid
            CREATE TABLE IF NOT EXISTS overrides (
                bssid TEXT PRIMARY KEY,
                ssid TEXT NOT NULL,
                kind TEXT NOT NULL,
                applied_at TEXT NOT NULL
            );

            -- Status held before the first override was applied
            CREATE TABLE IF NOT EXISTS origin_status (
                bssid TEXT PRIMARY KEY,
                status TEXT NOT NULL
            );

            -- Status after the last committed pass that saw the radio
            CREATE TABLE IF NOT EXISTS last_status (
                bssid TEXT PRIMARY KEY,
                status TEXT NOT NULL
            );

            -- Radios the user unblocked; auto-block skips them
            CREATE TABLE IF NOT EXISTS auto_block_suppressed (
                bssid TEXT PRIMARY KEY
            );

            CREATE TABLE IF NOT EXISTS alerts (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                ssid TEXT,
                bssid TEXT,
                severity TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                is_archived INTEGER NOT NULL DEFAULT 0,
                report_status TEXT NOT NULL,
                scan_session_id INTEGER NOT NULL
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_live_identity
                ON alerts(ssid, bssid) WHERE is_archived = 0 AND bssid IS NOT NULL;
            CREATE INDEX IF NOT EXISTS idx_alerts_created ON alerts(created_at);

            CREATE TABLE IF NOT EXISTS activity_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                action TEXT NOT NULL,
                bssid TEXT,
                details TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_log(timestamp);
            "#,
        )?;

        Ok(())
    }

    // ==================== Activity Log ====================

    pub fn log_activity(
        &self,
        action: ActivityAction,
        bssid: Option<&Bssid>,
        details: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO activity_log (timestamp, action, bssid, details) VALUES (?1, ?2, ?3, ?4)",
            params![
                Utc::now().to_rfc3339(),
                action.to_string(),
                bssid.map(|b| b.to_string()),
                details,
            ],
        )?;
        Ok(())
    }

    pub fn get_recent_activity(&self, limit: u32) -> Result<Vec<ActivityLog>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, action, bssid, details FROM activity_log
             ORDER BY id DESC LIMIT ?1",
        )?;

        let logs = stmt
            .query_map([limit], |row| {
                let action: String = row.get(2)?;
                Ok(ActivityLog {
                    id: Some(row.get(0)?),
                    timestamp: parse_time(row, 1)?,
                    action: action.parse().map_err(|e: String| conversion_err(2, e))?,
                    bssid: row.get::<_, Option<String>>(3)?.map(Bssid::from),
                    details: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(logs)
    }
}

impl OverrideStore for Database {
    fn get_binding(&self, bssid: &Bssid) -> Result<Option<OverrideBinding>> {
        let conn = self.conn.lock();
        let binding = conn
            .query_row(
                "SELECT bssid, ssid, kind, applied_at FROM overrides WHERE bssid = ?1",
                [bssid.as_str()],
                binding_from_row,
            )
            .optional()?;
        Ok(binding)
    }

    fn set_binding_with_origin(
        &self,
        binding: &OverrideBinding,
        origin: Option<NetworkStatus>,
    ) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR REPLACE INTO overrides (bssid, ssid, kind, applied_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                binding.bssid.as_str(),
                binding.ssid,
                binding.kind.to_string(),
                binding.applied_at.to_rfc3339(),
            ],
        )?;
        if let Some(origin) = origin {
            tx.execute(
                "INSERT OR REPLACE INTO origin_status (bssid, status) VALUES (?1, ?2)",
                params![binding.bssid.as_str(), origin.to_string()],
            )?;
        }
        tx.execute(
            "DELETE FROM auto_block_suppressed WHERE bssid = ?1",
            [binding.bssid.as_str()],
        )?;

        tx.commit()?;
        Ok(())
    }

    fn clear_binding_and_origin(&self, bssid: &Bssid, suppress_auto_block: bool) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let rows = tx.execute("DELETE FROM overrides WHERE bssid = ?1", [bssid.as_str()])?;
        tx.execute("DELETE FROM origin_status WHERE bssid = ?1", [bssid.as_str()])?;
        tx.execute("DELETE FROM last_status WHERE bssid = ?1", [bssid.as_str()])?;
        if suppress_auto_block {
            tx.execute(
                "INSERT OR IGNORE INTO auto_block_suppressed (bssid) VALUES (?1)",
                [bssid.as_str()],
            )?;
        }

        tx.commit()?;
        Ok(rows > 0)
    }

    fn get_origin_status(&self, bssid: &Bssid) -> Result<Option<NetworkStatus>> {
        let conn = self.conn.lock();
        let status = conn
            .query_row(
                "SELECT status FROM origin_status WHERE bssid = ?1",
                [bssid.as_str()],
                |row| parse_text::<NetworkStatus>(row, 0),
            )
            .optional()?;
        Ok(status)
    }

    fn save_statuses(&self, statuses: &[(Bssid, NetworkStatus)]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT OR REPLACE INTO last_status (bssid, status) VALUES (?1, ?2)")?;
            for (bssid, status) in statuses {
                stmt.execute(params![bssid.as_str(), status.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn set_auto_block_suppressed(&self, bssid: &Bssid, suppressed: bool) -> Result<()> {
        let conn = self.conn.lock();
        if suppressed {
            conn.execute(
                "INSERT OR IGNORE INTO auto_block_suppressed (bssid) VALUES (?1)",
                [bssid.as_str()],
            )?;
        } else {
            conn.execute(
                "DELETE FROM auto_block_suppressed WHERE bssid = ?1",
                [bssid.as_str()],
            )?;
        }
        Ok(())
    }

    fn snapshot(&self) -> Result<OverrideSnapshot> {
        let mut conn = self.conn.lock();
        // One read transaction so another writer cannot land between the tables
        let tx = conn.transaction()?;
        let mut snapshot = OverrideSnapshot::default();

        {
            let mut stmt = tx.prepare("SELECT bssid, ssid, kind, applied_at FROM overrides")?;
            for binding in stmt.query_map([], binding_from_row)? {
                let binding = binding?;
                snapshot.bindings.insert(binding.bssid.clone(), binding);
            }

            let mut stmt = tx.prepare("SELECT bssid, status FROM origin_status")?;
            for origin in stmt.query_map([], status_from_row)? {
                let (bssid, status) = origin?;
                snapshot.origins.insert(bssid, status);
            }

            let mut stmt = tx.prepare("SELECT bssid, status FROM last_status")?;
            for last in stmt.query_map([], status_from_row)? {
                let (bssid, status) = last?;
                snapshot.last_statuses.insert(bssid, status);
            }

            let mut stmt = tx.prepare("SELECT bssid FROM auto_block_suppressed")?;
            for bssid in stmt.query_map([], |row| row.get::<_, String>(0))? {
                snapshot.auto_block_suppressed.insert(Bssid::from(bssid?));
            }
        }

        tx.commit()?;
        Ok(snapshot)
    }
}

const ALERT_COLUMNS: &str = "id, kind, ssid, bssid, severity, message, created_at, is_read, \
                             is_archived, report_status, scan_session_id";

impl AlertSink for Database {
    fn find_active(&self, identity: &AlertIdentity) -> Result<Option<AlertRecord>> {
        let conn = self.conn.lock();
        let alert = conn
            .query_row(
                &format!(
                    "SELECT {} FROM alerts WHERE ssid = ?1 AND bssid = ?2 AND is_archived = 0",
                    ALERT_COLUMNS
                ),
                params![identity.ssid, identity.bssid.as_str()],
                alert_from_row,
            )
            .optional()?;
        Ok(alert)
    }

    fn was_reported(&self, identity: &AlertIdentity) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM alerts
             WHERE ssid = ?1 AND bssid = ?2 AND is_archived = 1 AND report_status = ?3",
            params![
                identity.ssid,
                identity.bssid.as_str(),
                ReportStatus::Reported.to_string()
            ],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn apply(&self, action: &AlertAction) -> Result<()> {
        let conn = self.conn.lock();
        match action {
            AlertAction::Insert(alert) => {
                conn.execute(
                    &format!(
                        "INSERT INTO alerts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        ALERT_COLUMNS
                    ),
                    params![
                        alert.id.to_string(),
                        alert.kind.to_string(),
                        alert.identity.as_ref().map(|i| i.ssid.clone()),
                        alert.identity.as_ref().map(|i| i.bssid.to_string()),
                        alert.severity.to_string(),
                        alert.message,
                        alert.created_at.to_rfc3339(),
                        alert.is_read,
                        alert.is_archived,
                        alert.report_status.to_string(),
                        alert.scan_session_id as i64,
                    ],
                )?;
            }
            AlertAction::UpdateInPlace { id, patch } => {
                let rows = conn.execute(
                    "UPDATE alerts SET kind = ?1, severity = ?2, message = ?3, created_at = ?4,
                     is_read = ?5, report_status = ?6, scan_session_id = ?7 WHERE id = ?8",
                    params![
                        patch.kind.to_string(),
                        patch.severity.to_string(),
                        patch.message,
                        patch.created_at.to_rfc3339(),
                        patch.is_read,
                        patch.report_status.to_string(),
                        patch.scan_session_id as i64,
                        id.to_string(),
                    ],
                )?;
                if rows == 0 {
                    return Err(Error::PersistenceFailure(format!("no alert {}", id)));
                }
            }
        }
        Ok(())
    }

    fn get_alert(&self, id: &Uuid) -> Result<Option<AlertRecord>> {
        let conn = self.conn.lock();
        let alert = conn
            .query_row(
                &format!("SELECT {} FROM alerts WHERE id = ?1", ALERT_COLUMNS),
                [id.to_string()],
                alert_from_row,
            )
            .optional()?;
        Ok(alert)
    }

    fn list_alerts(&self, include_archived: bool) -> Result<Vec<AlertRecord>> {
        let conn = self.conn.lock();
        let sql = if include_archived {
            format!("SELECT {} FROM alerts ORDER BY created_at DESC", ALERT_COLUMNS)
        } else {
            format!(
                "SELECT {} FROM alerts WHERE is_archived = 0 ORDER BY created_at DESC",
                ALERT_COLUMNS
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let alerts = stmt
            .query_map([], alert_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(alerts)
    }

    fn mark_read(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE alerts SET is_read = 1 WHERE id = ?1",
            [id.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn archive(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE alerts SET is_archived = 1 WHERE id = ?1",
            [id.to_string()],
        )?;
        Ok(rows > 0)
    }

    fn set_report_status(&self, id: &Uuid, status: ReportStatus) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE alerts SET report_status = ?1 WHERE id = ?2",
            params![status.to_string(), id.to_string()],
        )?;
        Ok(rows > 0)
    }
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, msg.into())
}

fn parse_text<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_err(idx, e))
}

fn parse_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e.to_string()))
}

fn binding_from_row(row: &Row<'_>) -> rusqlite::Result<OverrideBinding> {
    Ok(OverrideBinding {
        bssid: Bssid::from(row.get::<_, String>(0)?),
        ssid: row.get(1)?,
        kind: parse_text(row, 2)?,
        applied_at: parse_time(row, 3)?,
    })
}

fn status_from_row(row: &Row<'_>) -> rusqlite::Result<(Bssid, NetworkStatus)> {
    Ok((Bssid::from(row.get::<_, String>(0)?), parse_text(row, 1)?))
}

fn alert_from_row(row: &Row<'_>) -> rusqlite::Result<AlertRecord> {
    let id: String = row.get(0)?;
    let ssid: Option<String> = row.get(2)?;
    let bssid: Option<String> = row.get(3)?;
    let identity = match (ssid, bssid) {
        (Some(ssid), Some(bssid)) => Some(AlertIdentity {
            ssid,
            bssid: Bssid::from(bssid),
        }),
        _ => None,
    };

    Ok(AlertRecord {
        id: Uuid::parse_str(&id).map_err(|e| conversion_err(0, e.to_string()))?,
        kind: parse_text(row, 1)?,
        identity,
        severity: parse_text(row, 4)?,
        message: row.get(5)?,
        created_at: parse_time(row, 6)?,
        is_read: row.get(7)?,
        is_archived: row.get(8)?,
        report_status: parse_text(row, 9)?,
        scan_session_id: row.get::<_, i64>(10)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{AlertKind, AlertPolicy, Severity};
    use crate::models::{AccessPointObservation, AccessPointRecord, OverrideKind, SecurityType};

    fn alert(ssid: &str, bssid: &str) -> AlertRecord {
        AlertRecord {
            id: Uuid::new_v4(),
            kind: AlertKind::Suspicious,
            identity: Some(AlertIdentity {
                ssid: ssid.to_string(),
                bssid: Bssid::new(bssid),
            }),
            severity: Severity::High,
            message: format!("Suspicious network '{}'", ssid),
            created_at: Utc::now(),
            is_read: false,
            is_archived: false,
            report_status: ReportStatus::Pending,
            scan_session_id: 1,
        }
    }

    #[test]
    fn test_override_operations() {
        let db = Database::open_memory().unwrap();
        let bssid = Bssid::new("AA:00:00:00:00:01");

        db.set_binding_with_origin(
            &OverrideBinding::new(bssid.clone(), "Cafe", OverrideKind::Trusted),
            Some(NetworkStatus::Unknown),
        )
        .unwrap();
        db.set_binding_with_origin(
            &OverrideBinding::new(bssid.clone(), "Cafe", OverrideKind::Blocked),
            None,
        )
        .unwrap();

        let binding = db.get_binding(&bssid).unwrap().unwrap();
        assert_eq!(binding.kind, OverrideKind::Blocked);
        assert_eq!(db.snapshot().unwrap().bindings.len(), 1);
        assert_eq!(db.get_origin_status(&bssid).unwrap(), Some(NetworkStatus::Unknown));

        assert!(db.clear_binding_and_origin(&bssid, true).unwrap());
        assert!(!db.clear_binding_and_origin(&bssid, false).unwrap());
        assert!(db.get_binding(&bssid).unwrap().is_none());
        assert_eq!(db.get_origin_status(&bssid).unwrap(), None);
        assert!(db.snapshot().unwrap().is_auto_block_suppressed(&bssid));
    }

    #[test]
    fn test_snapshot_reads_every_table() {
        let db = Database::open_memory().unwrap();
        let bssid = Bssid::new("aa:00:00:00:00:01");
        let other = Bssid::new("bb:00:00:00:00:01");

        db.set_binding_with_origin(
            &OverrideBinding::new(bssid.clone(), "Cafe", OverrideKind::Flagged),
            Some(NetworkStatus::Suspicious),
        )
        .unwrap();
        db.save_statuses(&[
            (bssid.clone(), NetworkStatus::Flagged),
            (other.clone(), NetworkStatus::Suspicious),
        ])
        .unwrap();
        db.set_auto_block_suppressed(&other, true).unwrap();

        let snapshot = db.snapshot().unwrap();
        assert_eq!(snapshot.kind(&bssid), Some(OverrideKind::Flagged));
        assert_eq!(snapshot.origin(&bssid), Some(NetworkStatus::Suspicious));
        assert_eq!(snapshot.last_status(&bssid), Some(NetworkStatus::Flagged));
        assert_eq!(snapshot.last_status(&other), Some(NetworkStatus::Suspicious));
        assert!(snapshot.is_auto_block_suppressed(&other));

        db.set_auto_block_suppressed(&other, false).unwrap();
        assert!(!db.snapshot().unwrap().is_auto_block_suppressed(&other));
    }

    #[test]
    fn test_binding_write_is_atomic() {
        let db = Database::open_memory().unwrap();
        let bssid = Bssid::new("aa:00:00:00:00:01");

        // Origin insert fails once the table is gone; the binding must not land alone
        db.conn.lock().execute_batch("DROP TABLE origin_status").unwrap();
        let result = db.set_binding_with_origin(
            &OverrideBinding::new(bssid.clone(), "Cafe", OverrideKind::Blocked),
            Some(NetworkStatus::Suspicious),
        );

        assert!(matches!(result, Err(Error::PersistenceFailure(_))));
        assert!(db.get_binding(&bssid).unwrap().is_none());
    }

    #[test]
    fn test_overrides_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("apsentry.db");
        let bssid = Bssid::new("aa:00:00:00:00:01");

        {
            let db = Database::open(&path).unwrap();
            db.set_binding_with_origin(
                &OverrideBinding::new(bssid.clone(), "Cafe", OverrideKind::Trusted),
                Some(NetworkStatus::Suspicious),
            )
            .unwrap();
            db.save_statuses(&[(bssid.clone(), NetworkStatus::Trusted)]).unwrap();
        }

        let snapshot = Database::open(&path).unwrap().snapshot().unwrap();
        assert!(snapshot.is_trusted(&bssid));
        assert_eq!(snapshot.origin(&bssid), Some(NetworkStatus::Suspicious));
        assert_eq!(snapshot.last_status(&bssid), Some(NetworkStatus::Trusted));
    }

    #[test]
    fn test_one_live_alert_per_identity() {
        let db = Database::open_memory().unwrap();
        let first = alert("Cafe", "ff:00:00:00:00:01");
        db.apply(&AlertAction::Insert(first.clone())).unwrap();

        let duplicate = alert("Cafe", "ff:00:00:00:00:01");
        assert!(matches!(
            db.apply(&AlertAction::Insert(duplicate.clone())),
            Err(Error::PersistenceFailure(_))
        ));

        // archiving frees the identity
        assert!(db.archive(&first.id).unwrap());
        db.apply(&AlertAction::Insert(duplicate)).unwrap();
        assert_eq!(db.list_alerts(false).unwrap().len(), 1);
        assert_eq!(db.list_alerts(true).unwrap().len(), 2);
    }

    #[test]
    fn test_alert_state_changes() {
        let db = Database::open_memory().unwrap();
        let a = alert("Cafe", "ff:00:00:00:00:01");
        db.apply(&AlertAction::Insert(a.clone())).unwrap();

        assert!(db.mark_read(&a.id).unwrap());
        assert!(db.set_report_status(&a.id, ReportStatus::Reported).unwrap());

        let stored = db.get_alert(&a.id).unwrap().unwrap();
        assert!(stored.is_read);
        assert_eq!(stored.report_status, ReportStatus::Reported);
        assert_eq!(stored.identity, a.identity);

        let identity = a.identity.clone().unwrap();
        assert!(!db.was_reported(&identity).unwrap());
        db.archive(&a.id).unwrap();
        assert!(db.was_reported(&identity).unwrap());
        assert!(db.find_active(&identity).unwrap().is_none());

        assert!(!db.mark_read(&Uuid::new_v4()).unwrap());
    }

    #[test]
    fn test_policy_updates_stored_alert() {
        let db = Database::open_memory().unwrap();
        let policy = AlertPolicy::new();

        let mut record = AccessPointRecord::new(AccessPointObservation::new(
            "Cafe",
            "ff:00:00:00:00:01",
            -45,
            SecurityType::Open,
        ));
        record.status = NetworkStatus::Flagged;

        let action = policy.on_status_change(&record, None, 1, &db).unwrap().unwrap();
        db.apply(&action).unwrap();

        record.status = NetworkStatus::Blocked;
        let action = policy
            .on_status_change(&record, Some(NetworkStatus::Flagged), 2, &db)
            .unwrap()
            .unwrap();
        assert!(matches!(action, AlertAction::UpdateInPlace { .. }));
        db.apply(&action).unwrap();

        let alerts = db.list_alerts(true).unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::Blocked);
        assert_eq!(alerts[0].scan_session_id, 2);
    }

    #[test]
    fn test_summary_alerts_have_no_identity_constraint() {
        let db = Database::open_memory().unwrap();
        let mut first = alert("Cafe", "ff:00:00:00:00:01");
        first.identity = None;
        let mut second = first.clone();
        second.id = Uuid::new_v4();

        db.apply(&AlertAction::Insert(first)).unwrap();
        db.apply(&AlertAction::Insert(second)).unwrap();
        assert_eq!(db.list_alerts(false).unwrap().len(), 2);
    }

    #[test]
    fn test_activity_log() {
        let db = Database::open_memory().unwrap();
        let bssid = Bssid::new("aa:00:00:00:00:01");

        db.log_activity(ActivityAction::Trust, Some(&bssid), "Cafe").unwrap();
        db.log_activity(ActivityAction::ScanCompleted, None, "3 networks").unwrap();

        let logs = db.get_recent_activity(10).unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].action, ActivityAction::ScanCompleted);
        assert_eq!(logs[1].bssid, Some(bssid));
    }
}

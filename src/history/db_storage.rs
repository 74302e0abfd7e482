//! SQLite-backed snapshot history
//!
//! - WAL mode so API readers never block the ingest writer
//! - Append-only: inserts only, no UPDATE/DELETE statements
//! - Capture times stored as fixed-width RFC 3339 UTC text, so ordering by
//!   the column is chronological

use crate::history::storage::SnapshotStore;
use crate::models::{Probabilities, Snapshot};
use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex; // Faster than std::sync::Mutex
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;
PRAGMA temp_store = MEMORY;

CREATE TABLE IF NOT EXISTS playoff_probabilities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    team_name TEXT NOT NULL,
    make_playoffs REAL NOT NULL,
    win_division REAL NOT NULL,
    first_round_bye REAL NOT NULL,
    win_conference REAL NOT NULL,
    win_super_bowl REAL NOT NULL,
    captured_at TEXT NOT NULL,
    UNIQUE (team_name, captured_at)
);

-- The UNIQUE constraint's index serves per-team lookups
DROP INDEX IF EXISTS idx_probabilities_team_time;

CREATE INDEX IF NOT EXISTS idx_probabilities_time
    ON playoff_probabilities(captured_at);
"#;

const SELECT_COLUMNS: &str = "team_name, make_playoffs, win_division, first_round_bye, \
                              win_conference, win_super_bowl, captured_at";

pub struct DbSnapshotStore {
    conn: Arc<Mutex<Connection>>,
}

impl DbSnapshotStore {
    /// Open (or create) the history database. `":memory:"` gives a private
    /// in-memory database.
    pub fn new(db_path: &str) -> Result<Self> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX; // We handle our own locking

        let conn = Connection::open_with_flags(db_path, flags)
            .with_context(|| format!("Failed to open database at {}", db_path))?;

        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize database schema")?;

        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap_or_default();
        if journal_mode.to_lowercase() != "wal" && db_path != ":memory:" {
            warn!("WAL mode not active, journal_mode = {}", journal_mode);
        }

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM playoff_probabilities", [], |row| row.get(0))
            .unwrap_or(0);
        info!("📊 Snapshot history at {} ({} rows)", db_path, count);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of distinct teams with at least one snapshot
    pub fn team_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT team_name) FROM playoff_probabilities",
            [],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Capture time of the newest row across all teams
    pub fn latest_capture(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn.query_row(
            "SELECT MAX(captured_at) FROM playoff_probabilities",
            [],
            |row| row.get(0),
        )?;
        raw.map(|s| parse_timestamp(&s)).transpose()
    }

    #[inline]
    fn row_to_snapshot(row: &rusqlite::Row) -> rusqlite::Result<Snapshot> {
        let team_name: String = row.get(0)?;
        let probabilities = Probabilities {
            make_playoffs: row.get(1)?,
            win_division: row.get(2)?,
            first_round_bye: row.get(3)?,
            win_conference: row.get(4)?,
            win_super_bowl: row.get(5)?,
        };
        let captured_at: String = row.get(6)?;
        let captured_at = parse_timestamp(&captured_at).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, e.into())
        })?;

        Ok(Snapshot {
            team_name,
            probabilities,
            captured_at,
        })
    }

    fn insert(conn: &Connection, verb: &str, snapshot: &Snapshot) -> rusqlite::Result<usize> {
        let p = &snapshot.probabilities;
        let sql = format!(
            "{} INTO playoff_probabilities ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            verb, SELECT_COLUMNS
        );
        conn.prepare_cached(&sql)?.execute(params![
            &snapshot.team_name,
            p.make_playoffs,
            p.win_division,
            p.first_round_bye,
            p.win_conference,
            p.win_super_bowl,
            format_timestamp(&snapshot.captured_at),
        ])
    }
}

impl SnapshotStore for DbSnapshotStore {
    fn append(&self, snapshot: &Snapshot) -> Result<()> {
        let conn = self.conn.lock();
        Self::insert(&conn, "INSERT", snapshot).with_context(|| {
            format!(
                "Failed to append snapshot for {} at {}",
                snapshot.team_name, snapshot.captured_at
            )
        })?;
        Ok(())
    }

    fn append_batch(&self, snapshots: &[Snapshot]) -> Result<usize> {
        if snapshots.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let mut inserted = 0usize;
        for snapshot in snapshots {
            inserted += Self::insert(&tx, "INSERT OR IGNORE", snapshot)?;
        }

        tx.commit()?;

        debug!("📦 Batch inserted {} of {} snapshots", inserted, snapshots.len());
        Ok(inserted)
    }

    fn most_recent(&self, team_name: &str) -> Result<Option<Snapshot>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM playoff_probabilities
             WHERE team_name = ?1
             ORDER BY captured_at DESC, id DESC
             LIMIT 1",
            SELECT_COLUMNS
        ))?;

        let snapshot = stmt
            .query_row([team_name], Self::row_to_snapshot)
            .optional()
            .with_context(|| format!("Failed to read latest snapshot for {}", team_name))?;
        Ok(snapshot)
    }

    fn all(&self) -> Result<Vec<Snapshot>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {} FROM playoff_probabilities
             ORDER BY team_name, captured_at, id",
            SELECT_COLUMNS
        ))?;

        let snapshots = stmt
            .query_map([], Self::row_to_snapshot)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to read snapshot history")?;
        Ok(snapshots)
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let n: i64 =
            conn.query_row("SELECT COUNT(*) FROM playoff_probabilities", [], |row| row.get(0))?;
        Ok(n as usize)
    }
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Invalid stored timestamp {:?}", raw))?
        .with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tempfile::NamedTempFile;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 11, 3, 18, 0, 0).unwrap()
    }

    fn snapshot(team: &str, minutes: i64, make_playoffs: f64) -> Snapshot {
        Snapshot::new(
            team,
            Probabilities::new(make_playoffs, 0.5, 0.3, 0.2, 0.1),
            base_time() + Duration::minutes(minutes),
        )
    }

    #[test]
    fn test_db_storage_create() {
        let store = DbSnapshotStore::new(":memory:").expect("Failed to create database");
        assert_eq!(store.len().unwrap(), 0);
        assert!(store.latest_capture().unwrap().is_none());
    }

    #[test]
    fn test_single_index_per_team_and_time() {
        let store = DbSnapshotStore::new(":memory:").unwrap();
        let conn = store.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'index' AND tbl_name = 'playoff_probabilities' ORDER BY name",
            )
            .unwrap();
        let names: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();

        assert!(!names.iter().any(|n| n == "idx_probabilities_team_time"));
        assert!(names.iter().any(|n| n.starts_with("sqlite_autoindex_playoff_probabilities")));
        assert!(names.iter().any(|n| n == "idx_probabilities_time"));
    }

    #[test]
    fn test_append_and_most_recent() {
        let store = DbSnapshotStore::new(":memory:").unwrap();
        store.append(&snapshot("Chiefs", 0, 0.90)).unwrap();
        store.append(&snapshot("Chiefs", 120, 0.95)).unwrap();
        store.append(&snapshot("Bills", 240, 0.70)).unwrap();

        let latest = store.most_recent("Chiefs").unwrap().unwrap();
        assert_eq!(latest.probabilities.make_playoffs, 0.95);
        assert_eq!(latest.captured_at, base_time() + Duration::minutes(120));
        assert!(store.most_recent("Jets").unwrap().is_none());
        assert_eq!(store.team_count().unwrap(), 2);
        assert_eq!(
            store.latest_capture().unwrap(),
            Some(base_time() + Duration::minutes(240))
        );
    }

    #[test]
    fn test_duplicate_identity_rejected() {
        let store = DbSnapshotStore::new(":memory:").unwrap();
        store.append(&snapshot("Chiefs", 0, 0.90)).unwrap();
        assert!(store.append(&snapshot("Chiefs", 0, 0.91)).is_err());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_all_ordered_by_team_then_time() {
        let store = DbSnapshotStore::new(":memory:").unwrap();
        store.append(&snapshot("Chiefs", 60, 0.95)).unwrap();
        store.append(&snapshot("Bills", 0, 0.70)).unwrap();
        store.append(&snapshot("Chiefs", 0, 0.90)).unwrap();
        store.append(&snapshot("Bills", 60, 0.72)).unwrap();

        let all = store.all().unwrap();
        let keys: Vec<(String, i64)> = all
            .iter()
            .map(|s| (s.team_name.clone(), (s.captured_at - base_time()).num_minutes()))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Bills".to_string(), 0),
                ("Bills".to_string(), 60),
                ("Chiefs".to_string(), 0),
                ("Chiefs".to_string(), 60),
            ]
        );
    }

    #[test]
    fn test_subsecond_ordering_survives_text_storage() {
        let store = DbSnapshotStore::new(":memory:").unwrap();
        let early = Snapshot::new(
            "Chiefs",
            Probabilities::new(0.9, 0.5, 0.3, 0.2, 0.1),
            base_time() + Duration::microseconds(900_000),
        );
        let late = Snapshot::new(
            "Chiefs",
            Probabilities::new(0.8, 0.5, 0.3, 0.2, 0.1),
            base_time() + Duration::seconds(1) + Duration::microseconds(5),
        );
        store.append(&late).unwrap();
        store.append(&early).unwrap();

        assert_eq!(store.most_recent("Chiefs").unwrap().unwrap(), late);
        assert_eq!(store.all().unwrap(), vec![early, late]);
    }

    #[test]
    fn test_batch_insert_ignores_existing() {
        let store = DbSnapshotStore::new(":memory:").unwrap();
        store.append(&snapshot("Chiefs", 0, 0.90)).unwrap();

        let inserted = store
            .append_batch(&[
                snapshot("Chiefs", 0, 0.90),
                snapshot("Chiefs", 60, 0.92),
                snapshot("Bills", 60, 0.70),
            ])
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(store.len().unwrap(), 3);
        assert_eq!(store.append_batch(&[]).unwrap(), 0);
    }

    #[test]
    fn test_history_persists_across_reopen() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_str().unwrap();

        {
            let store = DbSnapshotStore::new(path).unwrap();
            store.append(&snapshot("Chiefs", 0, 0.90)).unwrap();
        }

        let reopened = DbSnapshotStore::new(path).unwrap();
        assert_eq!(reopened.len().unwrap(), 1);
        assert_eq!(
            reopened.most_recent("Chiefs").unwrap().unwrap().probabilities.make_playoffs,
            0.90
        );
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let ts = base_time();
        assert_eq!(format_timestamp(&ts), "2024-11-03T18:00:00.000000Z");
        assert_eq!(parse_timestamp("2024-11-03T18:00:00.000000Z").unwrap(), ts);
    }
}

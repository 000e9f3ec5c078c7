//! Clip status persistence.

use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use tracing::debug;

use ego_models::{ClipRecord, ClipStatus};

use crate::error::{StateStoreError, StateStoreResult};

/// One committed `clip_status` row.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipState {
    pub clip_id: String,
    pub video_id: String,
    pub status: ClipStatus,
    pub last_error: String,
    pub retry_count: u32,
    /// Wall-clock seconds since epoch; monotonically non-decreasing per clip
    pub updated_at: f64,
}

/// One appended `dead_letter` row.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadLetter {
    pub clip_id: String,
    pub video_id: String,
    pub error: String,
    pub updated_at: f64,
}

/// Embedded relational store for per-clip progress.
///
/// Single writer (the driver); readers only ever see committed state since
/// every method runs as its own autocommitted statement.
pub struct StateStore {
    conn: Mutex<Connection>,
}

impl StateStore {
    /// Open the store, creating parent directories and both tables if
    /// absent. Idempotent over an existing database file.
    pub fn open(path: impl AsRef<Path>) -> StateStoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        debug!(path = %path.display(), "opened state store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for tests.
    pub fn open_in_memory() -> StateStoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert a Pending row for every clip that does not already have one.
    ///
    /// Existing rows are left untouched; this is the resume hook — a prior
    /// Done row survives a rerun byte for byte.
    pub fn bulk_insert_pending(&self, clips: &[ClipRecord]) -> StateStoreResult<()> {
        let now = now_s();
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "INSERT OR IGNORE INTO clip_status
             (clip_id, video_id, status, last_error, retry_count, updated_at)
             VALUES (?1, ?2, 'Pending', '', 0, ?3)",
        )?;
        for clip in clips {
            stmt.execute(params![clip.clip_id, clip.video_id, now])?;
        }
        Ok(())
    }

    /// Insert or replace the mutable columns of a clip's row, stamping the
    /// current wall-clock time.
    pub fn upsert_clip_status(
        &self,
        clip_id: &str,
        video_id: &str,
        status: ClipStatus,
        last_error: &str,
        retry_count: u32,
    ) -> StateStoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO clip_status (clip_id, video_id, status, last_error, retry_count, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(clip_id) DO UPDATE SET
                 status = excluded.status,
                 last_error = excluded.last_error,
                 retry_count = excluded.retry_count,
                 updated_at = excluded.updated_at",
            params![clip_id, video_id, status.as_str(), last_error, retry_count, now_s()],
        )?;
        Ok(())
    }

    /// Append one row to the dead-letter log. Independent of `clip_status`.
    pub fn mark_dead_letter(
        &self,
        clip_id: &str,
        video_id: &str,
        error: &str,
    ) -> StateStoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO dead_letter (clip_id, video_id, error, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![clip_id, video_id, error, now_s()],
        )?;
        Ok(())
    }

    /// Committed state for one clip, if any.
    pub fn get_clip_state(&self, clip_id: &str) -> StateStoreResult<Option<ClipState>> {
        let conn = self.lock();
        let row = conn
            .query_row(
                "SELECT clip_id, video_id, status, last_error, retry_count, updated_at
                 FROM clip_status WHERE clip_id = ?1",
                params![clip_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, u32>(4)?,
                        row.get::<_, f64>(5)?,
                    ))
                },
            )
            .optional()?;
        row.map(|(clip_id, video_id, status, last_error, retry_count, updated_at)| {
            let status = status
                .parse::<ClipStatus>()
                .map_err(StateStoreError::CorruptRow)?;
            Ok(ClipState {
                clip_id,
                video_id,
                status,
                last_error,
                retry_count,
                updated_at,
            })
        })
        .transpose()
    }

    /// Clip ids whose status is in `statuses`. Pass
    /// [`ClipStatus::resumable()`] to enumerate everything except Done.
    pub fn get_resumable_clips(&self, statuses: &[ClipStatus]) -> StateStoreResult<Vec<String>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; statuses.len()].join(",");
        let sql =
            format!("SELECT clip_id FROM clip_status WHERE status IN ({placeholders}) ORDER BY clip_id");
        let conn = self.lock();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params_from_iter(statuses.iter().map(|s| s.as_str())),
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Narrow filter view kept for compatibility: clips that are Pending or
    /// already Failed. Resume logic wants [`Self::get_resumable_clips`].
    pub fn get_pending_clips(&self, limit: usize) -> StateStoreResult<Vec<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT clip_id FROM clip_status
             WHERE status IN ('Pending','Failed') ORDER BY clip_id LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All dead-letter rows for a clip, in append order.
    pub fn list_dead_letters(&self, clip_id: &str) -> StateStoreResult<Vec<DeadLetter>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT clip_id, video_id, error, updated_at FROM dead_letter
             WHERE clip_id = ?1 ORDER BY updated_at",
        )?;
        let rows = stmt.query_map(params![clip_id], |row| {
            Ok(DeadLetter {
                clip_id: row.get(0)?,
                video_id: row.get(1)?,
                error: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Connection> {
        // Poisoning only happens after a panic elsewhere; the connection
        // itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn init_schema(conn: &Connection) -> StateStoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS clip_status (
             clip_id TEXT PRIMARY KEY,
             video_id TEXT,
             status TEXT,
             last_error TEXT,
             retry_count INTEGER,
             updated_at REAL
         );
         CREATE TABLE IF NOT EXISTS dead_letter (
             clip_id TEXT,
             video_id TEXT,
             error TEXT,
             updated_at REAL
         );",
    )?;
    Ok(())
}

fn now_s() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(clip_id: &str, video_id: &str) -> ClipRecord {
        ClipRecord {
            clip_id: clip_id.to_string(),
            video_id: video_id.to_string(),
            start_s: 0.0,
            end_s: 1.0,
            frame_start: 0,
            frame_end: 30,
            overlap_s: 0.0,
            scenedetect_failed: false,
            status: ClipStatus::Pending,
            last_error: String::new(),
            retry_count: 0,
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::open(dir.path().join("state").join("pipeline.db")).unwrap();
        store
            .bulk_insert_pending(&[record("c1", "v1"), record("c2", "v1")])
            .unwrap();

        store
            .upsert_clip_status("c1", "v1", ClipStatus::Running, "", 0)
            .unwrap();
        let state = store.get_clip_state("c1").unwrap().unwrap();
        assert_eq!(state.status, ClipStatus::Running);
        assert_eq!(state.retry_count, 0);

        store.mark_dead_letter("c2", "v1", "bad").unwrap();
        let letters = store.list_dead_letters("c2").unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].error, "bad");
    }

    #[test]
    fn test_open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.db");
        {
            let store = StateStore::open(&path).unwrap();
            store.bulk_insert_pending(&[record("c1", "v1")]).unwrap();
        }
        let store = StateStore::open(&path).unwrap();
        assert!(store.get_clip_state("c1").unwrap().is_some());
    }

    #[test]
    fn test_bulk_insert_preserves_existing_rows() {
        let store = StateStore::open_in_memory().unwrap();
        store.bulk_insert_pending(&[record("c1", "v1")]).unwrap();
        store
            .upsert_clip_status("c1", "v1", ClipStatus::Done, "", 2)
            .unwrap();
        let before = store.get_clip_state("c1").unwrap().unwrap();

        // Re-inserting the same clip must not clobber the Done row.
        store.bulk_insert_pending(&[record("c1", "v1")]).unwrap();
        let after = store.get_clip_state("c1").unwrap().unwrap();
        assert_eq!(after.status, ClipStatus::Done);
        assert_eq!(after.retry_count, 2);
        assert_eq!(after.updated_at, before.updated_at);
    }

    #[test]
    fn test_resumable_filter_skips_done() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .bulk_insert_pending(&[record("a", "v"), record("b", "v"), record("c", "v")])
            .unwrap();
        store
            .upsert_clip_status("a", "v", ClipStatus::Done, "", 0)
            .unwrap();
        store
            .upsert_clip_status("b", "v", ClipStatus::Failed, "boom", 3)
            .unwrap();

        let resumable = store.get_resumable_clips(ClipStatus::resumable()).unwrap();
        assert_eq!(resumable, vec!["b".to_string(), "c".to_string()]);

        let pending = store.get_pending_clips(1000).unwrap();
        assert_eq!(pending, vec!["b".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_updated_at_monotonic() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .upsert_clip_status("c1", "v1", ClipStatus::Running, "", 0)
            .unwrap();
        let first = store.get_clip_state("c1").unwrap().unwrap().updated_at;
        store
            .upsert_clip_status("c1", "v1", ClipStatus::Done, "", 0)
            .unwrap();
        let second = store.get_clip_state("c1").unwrap().unwrap().updated_at;
        assert!(second >= first);
    }
}

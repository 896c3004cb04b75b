//! Session registry: per-client liveness records.
//!
//! Session rows are mutated only by their owning account's heartbeat and
//! deactivate calls. Liveness is a read-side property: a stale row is dead
//! to every read path long before the sweep physically deletes it.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use parley_shared::token;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Session;

impl Database {
    // ------------------------------------------------------------------
    // Register / heartbeat / deactivate
    // ------------------------------------------------------------------

    /// Register a fresh session for an account.
    ///
    /// The handle is drawn from a large enough random space that no
    /// collision handling is needed.
    pub fn register_session(&self, account_id: Uuid) -> Result<Session> {
        let now = Utc::now();
        let session = Session {
            handle: token::generate(),
            account_id,
            created_at: now,
            last_heartbeat: now,
            active: true,
        };

        self.conn().execute(
            "INSERT INTO sessions (handle, account_id, created_at, last_heartbeat, active)
             VALUES (?1, ?2, ?3, ?4, 1)",
            params![
                session.handle,
                session.account_id.to_string(),
                session.created_at.to_rfc3339(),
                session.last_heartbeat.to_rfc3339(),
            ],
        )?;

        tracing::debug!(handle = %session.handle, "session registered");
        Ok(session)
    }

    /// Refresh a session's heartbeat.
    ///
    /// Fails `NotFound` if the session does not exist and `Unauthorized` if
    /// it is owned by a different account; neither failure mutates the row.
    pub fn heartbeat(&mut self, handle: &str, account_id: Uuid) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let session = get_session(&tx, handle)?.ok_or(StoreError::NotFound)?;
        if session.account_id != account_id {
            return Err(StoreError::Unauthorized);
        }

        tx.execute(
            "UPDATE sessions SET last_heartbeat = ?1, active = 1 WHERE handle = ?2",
            params![Utc::now().to_rfc3339(), handle],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Delete a session.
    ///
    /// Idempotent: succeeds as a no-op when the session is already gone.
    /// Fails `Unauthorized` on owner mismatch.
    pub fn deactivate_session(&mut self, handle: &str, account_id: Uuid) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let Some(session) = get_session(&tx, handle)? else {
            return Ok(());
        };
        if session.account_id != account_id {
            return Err(StoreError::Unauthorized);
        }

        tx.execute("DELETE FROM sessions WHERE handle = ?1", params![handle])?;
        tx.commit()?;

        tracing::debug!(handle = %handle, "session deactivated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single session by handle, live or not.
    pub fn session_by_handle(&self, handle: &str) -> Result<Option<Session>> {
        get_session(self.conn(), handle)
    }

    /// List an account's sessions that are live within the staleness
    /// window.
    pub fn list_live_sessions(
        &self,
        account_id: Uuid,
        staleness: Duration,
    ) -> Result<Vec<Session>> {
        let mut stmt = self.conn().prepare(
            "SELECT handle, account_id, created_at, last_heartbeat, active
             FROM sessions
             WHERE account_id = ?1
             ORDER BY created_at ASC",
        )?;

        let rows = stmt.query_map(params![account_id.to_string()], row_to_session)?;

        let now = Utc::now();
        let mut sessions = Vec::new();
        for row in rows {
            let session = row?;
            if session.is_live(now, staleness) {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    /// Total number of session rows, live or not (admin surface).
    pub fn count_sessions(&self) -> Result<u64> {
        let n: u64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(n)
    }

    // ------------------------------------------------------------------
    // Sweep
    // ------------------------------------------------------------------

    /// Physically delete sessions whose heartbeat age exceeds `max_age`.
    ///
    /// Staleness already hides them from every read path; this only bounds
    /// storage. Returns the number of rows deleted.
    pub fn sweep_sessions(&mut self, max_age: Duration) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let now = Utc::now();

        let stale: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT handle, account_id, created_at, last_heartbeat, active FROM sessions",
            )?;
            let rows = stmt.query_map([], row_to_session)?;
            let mut stale = Vec::new();
            for row in rows {
                let session = row?;
                if now - session.last_heartbeat > max_age {
                    stale.push(session.handle);
                }
            }
            stale
        };

        for handle in &stale {
            tx.execute("DELETE FROM sessions WHERE handle = ?1", params![handle])?;
        }
        tx.commit()?;

        if !stale.is_empty() {
            tracing::info!(count = stale.len(), "swept stale sessions");
        }
        Ok(stale.len())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a session by handle on any connection (used inside transactions by
/// the coordinator and the prober).
pub(crate) fn get_session(conn: &Connection, handle: &str) -> Result<Option<Session>> {
    match conn.query_row(
        "SELECT handle, account_id, created_at, last_heartbeat, active
         FROM sessions
         WHERE handle = ?1",
        params![handle],
        row_to_session,
    ) {
        Ok(session) => Ok(Some(session)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

/// Map a `rusqlite::Row` to a [`Session`].
fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let handle: String = row.get(0)?;
    let account_str: String = row.get(1)?;
    let created_str: String = row.get(2)?;
    let heartbeat_str: String = row.get(3)?;
    let active: bool = row.get(4)?;

    let account_id = Uuid::parse_str(&account_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let last_heartbeat: DateTime<Utc> = DateTime::parse_from_rfc3339(&heartbeat_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Session {
        handle,
        account_id,
        created_at,
        last_heartbeat,
        active,
    })
}

/// Backdate a session's heartbeat (test helper).
#[cfg(test)]
pub(crate) fn backdate_heartbeat(db: &Database, handle: &str, age: Duration) {
    let when = Utc::now() - age;
    db.conn()
        .execute(
            "UPDATE sessions SET last_heartbeat = ?1 WHERE handle = ?2",
            params![when.to_rfc3339(), handle],
        )
        .unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn staleness() -> Duration {
        Duration::seconds(60)
    }

    #[test]
    fn test_register_and_list_live() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();

        let s1 = db.register_session(alice.id).unwrap();
        let s2 = db.register_session(alice.id).unwrap();
        assert_ne!(s1.handle, s2.handle);

        let live = db.list_live_sessions(alice.id, staleness()).unwrap();
        assert_eq!(live.len(), 2);

        db.deactivate_session(&s1.handle, alice.id).unwrap();
        let live = db.list_live_sessions(alice.id, staleness()).unwrap();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].handle, s2.handle);
    }

    #[test]
    fn test_heartbeat_owner_mismatch_does_not_mutate() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();
        let bob = db.create_account("bob").unwrap();

        let session = db.register_session(alice.id).unwrap();
        backdate_heartbeat(&db, &session.handle, Duration::seconds(10));
        let before = db.session_by_handle(&session.handle).unwrap().unwrap();

        let err = db.heartbeat(&session.handle, bob.id).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));

        let after = db.session_by_handle(&session.handle).unwrap().unwrap();
        assert_eq!(after.last_heartbeat, before.last_heartbeat);
    }

    #[test]
    fn test_heartbeat_unknown_session() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();
        let err = db.heartbeat("no-such-handle", alice.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn test_staleness_hides_without_delete() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();
        let session = db.register_session(alice.id).unwrap();

        backdate_heartbeat(&db, &session.handle, Duration::seconds(61));

        // Row still exists...
        assert!(db.session_by_handle(&session.handle).unwrap().is_some());
        // ...but is gone from the live read path.
        assert!(db.list_live_sessions(alice.id, staleness()).unwrap().is_empty());

        // A heartbeat brings it straight back.
        db.heartbeat(&session.handle, alice.id).unwrap();
        assert_eq!(db.list_live_sessions(alice.id, staleness()).unwrap().len(), 1);
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();
        let session = db.register_session(alice.id).unwrap();

        db.deactivate_session(&session.handle, alice.id).unwrap();
        // Second call: the row is gone, still Ok.
        db.deactivate_session(&session.handle, alice.id).unwrap();
    }

    #[test]
    fn test_deactivate_owner_mismatch() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();
        let bob = db.create_account("bob").unwrap();
        let session = db.register_session(alice.id).unwrap();

        let err = db.deactivate_session(&session.handle, bob.id).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
        assert!(db.session_by_handle(&session.handle).unwrap().is_some());
    }

    #[test]
    fn test_sweep_deletes_only_old_rows() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();

        let fresh = db.register_session(alice.id).unwrap();
        let old = db.register_session(alice.id).unwrap();
        backdate_heartbeat(&db, &old.handle, Duration::hours(2));

        let deleted = db.sweep_sessions(Duration::hours(1)).unwrap();
        assert_eq!(deleted, 1);
        assert!(db.session_by_handle(&old.handle).unwrap().is_none());
        assert!(db.session_by_handle(&fresh.handle).unwrap().is_some());
    }
}

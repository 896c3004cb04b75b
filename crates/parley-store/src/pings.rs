//! Liveness prober: short-lived request/response pings.
//!
//! Heartbeat recency proves a session's client was alive recently; it does
//! not prove the session can participate in a new handshake right now. A
//! ping is an active round trip the pinger runs before initiating
//! signaling. Only the newest probe per (pinger, target) pair matters:
//! sending a new one supersedes (deletes) the old.

use chrono::{DateTime, Duration, Utc};
use rusqlite::params;
use uuid::Uuid;

use parley_shared::types::PingStatus;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::LivenessPing;
use crate::sessions::get_session;

impl Database {
    // ------------------------------------------------------------------
    // Send / respond / poll
    // ------------------------------------------------------------------

    /// Probe `target_session` from `pinger_session`.
    ///
    /// Supersession and insert are one transaction: any older ping from the
    /// same pinger to the same target is deleted with the new one's
    /// creation.
    pub fn send_ping(
        &mut self,
        pinger_session: &str,
        target_session: &str,
        acting_account: Uuid,
    ) -> Result<LivenessPing> {
        let tx = self.conn_mut().transaction()?;

        let pinger = get_session(&tx, pinger_session)?.ok_or(StoreError::Unauthorized)?;
        if pinger.account_id != acting_account {
            return Err(StoreError::Unauthorized);
        }

        // A probe toward a session that no longer exists would only ever
        // time out; reject it immediately instead.
        let target = get_session(&tx, target_session)?.ok_or(StoreError::NotFound)?;

        tx.execute(
            "DELETE FROM liveness_pings WHERE pinger_session = ?1 AND target_session = ?2",
            params![pinger_session, target_session],
        )?;

        let ping = LivenessPing {
            id: Uuid::new_v4(),
            pinger_session: pinger_session.to_string(),
            target_session: target_session.to_string(),
            target_account: target.account_id,
            status: PingStatus::Sent,
            created_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO liveness_pings
                 (id, pinger_session, target_session, target_account, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                ping.id.to_string(),
                ping.pinger_session,
                ping.target_session,
                ping.target_account.to_string(),
                ping.status.as_str(),
                ping.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        tracing::debug!(ping = %ping.id, target = %target_session, "liveness ping sent");
        Ok(ping)
    }

    /// Mark a ping responded.
    ///
    /// A late or duplicate response against a ping that no longer exists is
    /// a harmless no-op.
    pub fn respond_ping(&mut self, ping_id: Uuid, acting_account: Uuid) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let Some(ping) = get_ping(&tx, ping_id)? else {
            return Ok(());
        };
        if ping.target_account != acting_account {
            return Err(StoreError::Unauthorized);
        }

        tx.execute(
            "UPDATE liveness_pings SET status = 'responded' WHERE id = ?1",
            params![ping_id.to_string()],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Read a ping's status. `None` means the ping no longer exists
    /// (superseded or swept); callers treat that like an unanswered probe.
    pub fn poll_ping(&self, ping_id: Uuid) -> Result<Option<PingStatus>> {
        Ok(get_ping(self.conn(), ping_id)?.map(|ping| ping.status))
    }

    /// Unanswered pings addressed to `target_session`, oldest first.
    ///
    /// The target's poll loop reads these to learn which probes to answer.
    pub fn list_incoming_pings(
        &self,
        target_session: &str,
        acting_account: Uuid,
    ) -> Result<Vec<LivenessPing>> {
        match get_session(self.conn(), target_session)? {
            Some(session) if session.account_id == acting_account => {}
            _ => return Err(StoreError::Unauthorized),
        }

        let mut stmt = self.conn().prepare(
            "SELECT id, pinger_session, target_session, target_account, status, created_at
             FROM liveness_pings
             WHERE target_session = ?1 AND status = 'sent'
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![target_session], row_to_ping)?;

        let mut pings = Vec::new();
        for row in rows {
            pings.push(row?);
        }
        Ok(pings)
    }

    /// Total number of ping rows (admin surface).
    pub fn count_pings(&self) -> Result<u64> {
        let n: u64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM liveness_pings", [], |row| row.get(0))?;
        Ok(n)
    }

    // ------------------------------------------------------------------
    // Sweep
    // ------------------------------------------------------------------

    /// Delete pings older than `max_age`, answered or not.
    ///
    /// Responded pings have been consumed by their pinger well within this
    /// window (the probe timeout is seconds); unanswered ones are dead
    /// weight. Returns rows deleted.
    pub fn sweep_pings(&mut self, max_age: Duration) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let now = Utc::now();

        let doomed: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT id, pinger_session, target_session, target_account, status, created_at
                 FROM liveness_pings",
            )?;
            let rows = stmt.query_map([], row_to_ping)?;
            let mut doomed = Vec::new();
            for row in rows {
                let ping = row?;
                if now - ping.created_at > max_age {
                    doomed.push(ping.id.to_string());
                }
            }
            doomed
        };

        for id in &doomed {
            tx.execute("DELETE FROM liveness_pings WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        Ok(doomed.len())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_ping(conn: &rusqlite::Connection, id: Uuid) -> Result<Option<LivenessPing>> {
    match conn.query_row(
        "SELECT id, pinger_session, target_session, target_account, status, created_at
         FROM liveness_pings
         WHERE id = ?1",
        params![id.to_string()],
        row_to_ping,
    ) {
        Ok(ping) => Ok(Some(ping)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

/// Map a `rusqlite::Row` to a [`LivenessPing`].
fn row_to_ping(row: &rusqlite::Row<'_>) -> rusqlite::Result<LivenessPing> {
    let id_str: String = row.get(0)?;
    let pinger_session: String = row.get(1)?;
    let target_session: String = row.get(2)?;
    let target_account_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_str: String = row.get(5)?;

    let parse_uuid = |idx: usize, s: &str| {
        Uuid::parse_str(s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    };

    let status = PingStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown ping status: {status_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(LivenessPing {
        id: parse_uuid(0, &id_str)?,
        pinger_session,
        target_session,
        target_account: parse_uuid(3, &target_account_str)?,
        status,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::models::{Account, Session};

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn fixture(db: &Database) -> (Account, Session, Account, Session) {
        let alice = db.create_account("alice").unwrap();
        let bob = db.create_account("bob").unwrap();
        let s1 = db.register_session(alice.id).unwrap();
        let s2 = db.register_session(bob.id).unwrap();
        (alice, s1, bob, s2)
    }

    #[test]
    fn test_ping_round_trip() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = fixture(&db);

        let ping = db.send_ping(&s1.handle, &s2.handle, alice.id).unwrap();
        assert_eq!(db.poll_ping(ping.id).unwrap(), Some(PingStatus::Sent));

        // bob's session discovers and answers it.
        let incoming = db.list_incoming_pings(&s2.handle, bob.id).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, ping.id);

        db.respond_ping(ping.id, bob.id).unwrap();
        assert_eq!(db.poll_ping(ping.id).unwrap(), Some(PingStatus::Responded));

        // Answered pings no longer show up as incoming.
        assert!(db.list_incoming_pings(&s2.handle, bob.id).unwrap().is_empty());
    }

    #[test]
    fn test_supersession_leaves_one_row() {
        let (_dir, mut db) = open_db();
        let (alice, s1, _bob, s2) = fixture(&db);

        let first = db.send_ping(&s1.handle, &s2.handle, alice.id).unwrap();
        let second = db.send_ping(&s1.handle, &s2.handle, alice.id).unwrap();

        assert_eq!(db.count_pings().unwrap(), 1);
        assert!(db.poll_ping(first.id).unwrap().is_none());
        assert_eq!(db.poll_ping(second.id).unwrap(), Some(PingStatus::Sent));
    }

    #[test]
    fn test_respond_to_superseded_ping_is_noop() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = fixture(&db);

        let first = db.send_ping(&s1.handle, &s2.handle, alice.id).unwrap();
        db.send_ping(&s1.handle, &s2.handle, alice.id).unwrap();

        // The superseded id is gone; responding to it is harmless.
        db.respond_ping(first.id, bob.id).unwrap();
    }

    #[test]
    fn test_ping_authorization() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = fixture(&db);

        // Sending from a session you do not own.
        let err = db.send_ping(&s1.handle, &s2.handle, bob.id).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));

        // Responding to a ping addressed to someone else's session.
        let ping = db.send_ping(&s1.handle, &s2.handle, alice.id).unwrap();
        let err = db.respond_ping(ping.id, alice.id).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));

        // Listing another account's incoming pings.
        let err = db.list_incoming_pings(&s2.handle, alice.id).unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
    }

    #[test]
    fn test_ping_unknown_target() {
        let (_dir, mut db) = open_db();
        let (alice, s1, _bob, _s2) = fixture(&db);

        let err = db.send_ping(&s1.handle, "no-such-session", alice.id).unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn test_sweep_reclaims_old_pings() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = fixture(&db);

        let old = db.send_ping(&s1.handle, &s2.handle, alice.id).unwrap();
        db.respond_ping(old.id, bob.id).unwrap();
        db.conn()
            .execute(
                "UPDATE liveness_pings SET created_at = ?1 WHERE id = ?2",
                params![(Utc::now() - Duration::seconds(60)).to_rfc3339(), old.id.to_string()],
            )
            .unwrap();

        let fresh = db.send_ping(&s2.handle, &s1.handle, bob.id).unwrap();

        let deleted = db.sweep_pings(Duration::seconds(30)).unwrap();
        assert_eq!(deleted, 1);
        assert!(db.poll_ping(old.id).unwrap().is_none());
        assert_eq!(db.poll_ping(fresh.id).unwrap(), Some(PingStatus::Sent));
    }
}

//! Connection request coordinator: the signaling state machine.
//!
//! A request moves `sent -> replied -> completed`; `sent`/`replied` can also
//! vanish via expiry. Opening a request runs four ordered precondition
//! checks, each with its own failure kind, and commits the duplicate check
//! together with the insert so concurrent opens cannot both pass.
//!
//! Simultaneous bidirectional opens (both peers dialing each other) are
//! intentionally left standing as two independent requests; the client
//! applies a deterministic tie-break.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use parley_shared::types::ConnectionStatus;

use crate::accounts::username_of;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::friends::edge_exists;
use crate::models::ConnectionRequest;
use crate::sessions::get_session;

impl Database {
    // ------------------------------------------------------------------
    // sent
    // ------------------------------------------------------------------

    /// Open a connection request from `from_session` toward `to_session`,
    /// carrying the opaque handshake payload.
    ///
    /// Precondition order (each failure kind is distinct):
    /// 1. `acting_account` owns a live `from_session` (`Unauthorized` /
    ///    `NotFound`),
    /// 2. `to_session` exists and is live (`TargetUnavailable`),
    /// 3. the owning accounts are friends (`NotFriends`),
    /// 4. no outstanding request exists for this ordered session pair
    ///    (`DuplicateRequest`).
    pub fn open_connection_request(
        &mut self,
        from_session: &str,
        to_session: &str,
        acting_account: Uuid,
        offer: &str,
        staleness: Duration,
        expiry: Duration,
    ) -> Result<ConnectionRequest> {
        let tx = self.conn_mut().transaction()?;
        let now = Utc::now();

        // 1. The initiator must own a live session.
        let from = get_session(&tx, from_session)?.ok_or(StoreError::NotFound)?;
        if from.account_id != acting_account {
            return Err(StoreError::Unauthorized);
        }
        if !from.is_live(now, staleness) {
            return Err(StoreError::NotFound);
        }

        // 2. The target must be live. A stale target is indistinguishable
        //    from a gone one at this layer.
        let to = match get_session(&tx, to_session)? {
            Some(s) if s.is_live(now, staleness) => s,
            _ => return Err(StoreError::TargetUnavailable),
        };

        // 3. Signaling is friends-only, unlike presence browsing.
        if !edge_exists(&tx, from.account_id, to.account_id)? {
            return Err(StoreError::NotFriends);
        }

        // 4. One outstanding request per ordered pair. Logically expired
        //    leftovers do not count and are reclaimed here rather than
        //    waiting for the sweep.
        let outstanding = list_for_pair(&tx, from_session, to_session)?;
        for existing in outstanding {
            if existing.is_expired(now, expiry) {
                tx.execute(
                    "DELETE FROM connection_requests WHERE id = ?1",
                    params![existing.id.to_string()],
                )?;
            } else {
                return Err(StoreError::DuplicateRequest);
            }
        }

        let request = ConnectionRequest {
            id: Uuid::new_v4(),
            from_session: from_session.to_string(),
            to_session: to_session.to_string(),
            from_account: from.account_id,
            to_account: to.account_id,
            from_display_name: username_of(&tx, from.account_id)?,
            offer: offer.to_string(),
            answer: None,
            status: ConnectionStatus::Sent,
            created_at: now,
            updated_at: now,
        };

        tx.execute(
            "INSERT INTO connection_requests
                 (id, from_session, to_session, from_account, to_account,
                  from_display_name, offer, answer, status, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, ?8, ?9, ?10)",
            params![
                request.id.to_string(),
                request.from_session,
                request.to_session,
                request.from_account.to_string(),
                request.to_account.to_string(),
                request.from_display_name,
                request.offer,
                request.status.as_str(),
                request.created_at.to_rfc3339(),
                request.updated_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        tracing::info!(request = %request.id, "connection request opened");
        Ok(request)
    }

    // ------------------------------------------------------------------
    // replied
    // ------------------------------------------------------------------

    /// Store the counter-payload and transition `sent -> replied`.
    ///
    /// Only the owner of the target session may reply, and only once: a
    /// second reply fails `InvalidState` and leaves the stored answer
    /// intact.
    pub fn reply_connection_request(
        &mut self,
        request_id: Uuid,
        acting_account: Uuid,
        answer: &str,
        expiry: Duration,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        let now = Utc::now();

        let request = get_live_request(&tx, request_id, now, expiry)?;
        if request.to_account != acting_account {
            return Err(StoreError::Unauthorized);
        }
        if request.status != ConnectionStatus::Sent {
            return Err(StoreError::InvalidState(format!(
                "request is {}, expected sent",
                request.status.as_str()
            )));
        }

        tx.execute(
            "UPDATE connection_requests
             SET answer = ?1, status = 'replied', updated_at = ?2
             WHERE id = ?3",
            params![answer, now.to_rfc3339(), request_id.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(request = %request_id, "connection request replied");
        Ok(())
    }

    // ------------------------------------------------------------------
    // completed
    // ------------------------------------------------------------------

    /// Mark the handshake complete.
    ///
    /// Either participant may call this once its transport reports the
    /// direct channel open. Terminal and idempotent; used only for
    /// bookkeeping and cleanup.
    pub fn complete_connection_request(
        &mut self,
        request_id: Uuid,
        acting_account: Uuid,
        expiry: Duration,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;
        let now = Utc::now();

        let request = get_live_request(&tx, request_id, now, expiry)?;
        if request.from_account != acting_account && request.to_account != acting_account {
            return Err(StoreError::Unauthorized);
        }
        if request.status == ConnectionStatus::Completed {
            return Ok(());
        }

        tx.execute(
            "UPDATE connection_requests SET status = 'completed', updated_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), request_id.to_string()],
        )?;
        tx.commit()?;

        tracing::info!(request = %request_id, "connection request completed");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------

    /// Fetch a request by id, for one of its two participants only.
    ///
    /// Logically expired requests are `NotFound` here even while the row
    /// still physically exists.
    pub fn check_connection_request(
        &self,
        request_id: Uuid,
        acting_account: Uuid,
        expiry: Duration,
    ) -> Result<ConnectionRequest> {
        let request = get_live_request(self.conn(), request_id, Utc::now(), expiry)?;
        if request.from_account != acting_account && request.to_account != acting_account {
            return Err(StoreError::Unauthorized);
        }
        Ok(request)
    }

    /// Requests awaiting an answer from `to_session`.
    ///
    /// The caller must own the session; expired requests are excluded.
    pub fn list_incoming_connection_requests(
        &self,
        to_session: &str,
        acting_account: Uuid,
        expiry: Duration,
    ) -> Result<Vec<ConnectionRequest>> {
        match get_session(self.conn(), to_session)? {
            Some(session) if session.account_id == acting_account => {}
            _ => return Err(StoreError::Unauthorized),
        }

        let mut stmt = self.conn().prepare(
            "SELECT id, from_session, to_session, from_account, to_account,
                    from_display_name, offer, answer, status, created_at, updated_at
             FROM connection_requests
             WHERE to_session = ?1 AND status = 'sent'
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![to_session], row_to_connection_request)?;

        let now = Utc::now();
        let mut requests = Vec::new();
        for row in rows {
            let request = row?;
            if !request.is_expired(now, expiry) {
                requests.push(request);
            }
        }
        Ok(requests)
    }

    /// Total number of connection request rows (admin surface).
    pub fn count_connection_requests(&self) -> Result<u64> {
        let n: u64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM connection_requests", [], |row| {
                row.get(0)
            })?;
        Ok(n)
    }

    // ------------------------------------------------------------------
    // Sweep
    // ------------------------------------------------------------------

    /// Physically delete expired non-completed requests, and completed
    /// requests past the bookkeeping retention. Returns rows deleted.
    pub fn sweep_connection_requests(
        &mut self,
        expiry: Duration,
        completed_retention: Duration,
    ) -> Result<usize> {
        let tx = self.conn_mut().transaction()?;
        let now = Utc::now();

        let doomed: Vec<String> = {
            let mut stmt = tx.prepare(
                "SELECT id, from_session, to_session, from_account, to_account,
                        from_display_name, offer, answer, status, created_at, updated_at
                 FROM connection_requests",
            )?;
            let rows = stmt.query_map([], row_to_connection_request)?;
            let mut doomed = Vec::new();
            for row in rows {
                let request = row?;
                let dead = match request.status {
                    ConnectionStatus::Completed => {
                        now - request.updated_at > completed_retention
                    }
                    _ => request.is_expired(now, expiry),
                };
                if dead {
                    doomed.push(request.id.to_string());
                }
            }
            doomed
        };

        for id in &doomed {
            tx.execute("DELETE FROM connection_requests WHERE id = ?1", params![id])?;
        }
        tx.commit()?;

        if !doomed.is_empty() {
            tracing::info!(count = doomed.len(), "swept connection requests");
        }
        Ok(doomed.len())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Fetch a request, applying logical expiry: an expired non-completed
/// request is reported absent.
fn get_live_request(
    conn: &Connection,
    id: Uuid,
    now: DateTime<Utc>,
    expiry: Duration,
) -> Result<ConnectionRequest> {
    let request = match conn.query_row(
        "SELECT id, from_session, to_session, from_account, to_account,
                from_display_name, offer, answer, status, created_at, updated_at
         FROM connection_requests
         WHERE id = ?1",
        params![id.to_string()],
        row_to_connection_request,
    ) {
        Ok(request) => request,
        Err(rusqlite::Error::QueryReturnedNoRows) => return Err(StoreError::NotFound),
        Err(e) => return Err(StoreError::Sqlite(e)),
    };

    if request.is_expired(now, expiry) {
        return Err(StoreError::NotFound);
    }
    Ok(request)
}

/// All sent/replied requests for an ordered session pair.
fn list_for_pair(
    conn: &Connection,
    from_session: &str,
    to_session: &str,
) -> Result<Vec<ConnectionRequest>> {
    let mut stmt = conn.prepare(
        "SELECT id, from_session, to_session, from_account, to_account,
                from_display_name, offer, answer, status, created_at, updated_at
         FROM connection_requests
         WHERE from_session = ?1 AND to_session = ?2 AND status IN ('sent', 'replied')",
    )?;
    let rows = stmt.query_map(params![from_session, to_session], row_to_connection_request)?;

    let mut requests = Vec::new();
    for row in rows {
        requests.push(row?);
    }
    Ok(requests)
}

/// Map a `rusqlite::Row` to a [`ConnectionRequest`].
fn row_to_connection_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<ConnectionRequest> {
    let id_str: String = row.get(0)?;
    let from_session: String = row.get(1)?;
    let to_session: String = row.get(2)?;
    let from_account_str: String = row.get(3)?;
    let to_account_str: String = row.get(4)?;
    let from_display_name: String = row.get(5)?;
    let offer: String = row.get(6)?;
    let answer: Option<String> = row.get(7)?;
    let status_str: String = row.get(8)?;
    let created_str: String = row.get(9)?;
    let updated_str: String = row.get(10)?;

    let parse_uuid = |idx: usize, s: &str| {
        Uuid::parse_str(s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    };
    let parse_ts = |idx: usize, s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    };

    let status = ConnectionStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown connection request status: {status_str}").into(),
        )
    })?;

    Ok(ConnectionRequest {
        id: parse_uuid(0, &id_str)?,
        from_session,
        to_session,
        from_account: parse_uuid(3, &from_account_str)?,
        to_account: parse_uuid(4, &to_account_str)?,
        from_display_name,
        offer,
        answer,
        status,
        created_at: parse_ts(9, &created_str)?,
        updated_at: parse_ts(10, &updated_str)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_shared::types::FriendDecision;

    use crate::models::{Account, Session};
    use crate::sessions::backdate_heartbeat;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn staleness() -> Duration {
        Duration::seconds(60)
    }

    fn expiry() -> Duration {
        Duration::minutes(5)
    }

    /// alice and bob, friends, one live session each.
    fn handshake_fixture(db: &mut Database) -> (Account, Session, Account, Session) {
        let alice = db.create_account("alice").unwrap();
        let bob = db.create_account("bob").unwrap();
        let request = db.send_friend_request(alice.id, "bob").unwrap();
        db.respond_friend_request(request.id, bob.id, FriendDecision::Accept)
            .unwrap();
        let s1 = db.register_session(alice.id).unwrap();
        let s2 = db.register_session(bob.id).unwrap();
        (alice, s1, bob, s2)
    }

    fn backdate_request(db: &Database, id: Uuid, age: Duration) {
        let when = (Utc::now() - age).to_rfc3339();
        db.conn()
            .execute(
                "UPDATE connection_requests SET created_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![when, id.to_string()],
            )
            .unwrap();
    }

    #[test]
    fn test_full_handshake_flow() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = handshake_fixture(&mut db);

        // alice opens toward bob's session.
        let request = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "offer-sdp", staleness(), expiry())
            .unwrap();
        assert_eq!(request.status, ConnectionStatus::Sent);
        assert_eq!(request.from_display_name, "alice");

        // bob discovers it on his session.
        let incoming = db
            .list_incoming_connection_requests(&s2.handle, bob.id, expiry())
            .unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].offer, "offer-sdp");

        // bob replies.
        db.reply_connection_request(request.id, bob.id, "answer-sdp", expiry())
            .unwrap();

        // alice observes the reply.
        let seen = db
            .check_connection_request(request.id, alice.id, expiry())
            .unwrap();
        assert_eq!(seen.status, ConnectionStatus::Replied);
        assert_eq!(seen.answer.as_deref(), Some("answer-sdp"));

        // Either side completes; both can confirm.
        db.complete_connection_request(request.id, bob.id, expiry())
            .unwrap();
        for viewer in [alice.id, bob.id] {
            let seen = db
                .check_connection_request(request.id, viewer, expiry())
                .unwrap();
            assert_eq!(seen.status, ConnectionStatus::Completed);
        }

        // Completion is idempotent.
        db.complete_connection_request(request.id, alice.id, expiry())
            .unwrap();
    }

    #[test]
    fn test_open_requires_friendship() {
        let (_dir, mut db) = open_db();
        let alice = db.create_account("alice").unwrap();
        let carol = db.create_account("carol").unwrap();
        let s1 = db.register_session(alice.id).unwrap();
        let s2 = db.register_session(carol.id).unwrap();

        let err = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "offer", staleness(), expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFriends));

        // No record was created: carol's session sees nothing.
        let incoming = db
            .list_incoming_connection_requests(&s2.handle, carol.id, expiry())
            .unwrap();
        assert!(incoming.is_empty());
        assert_eq!(db.count_connection_requests().unwrap(), 0);
    }

    #[test]
    fn test_open_precondition_order() {
        let (_dir, mut db) = open_db();
        let (alice, s1, _bob, s2) = handshake_fixture(&mut db);
        let mallory = db.create_account("mallory").unwrap();

        // Unknown initiating session.
        let err = db
            .open_connection_request("nope", &s2.handle, alice.id, "o", staleness(), expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));

        // Session owned by someone else.
        let err = db
            .open_connection_request(&s1.handle, &s2.handle, mallory.id, "o", staleness(), expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));

        // Stale initiating session is dead.
        backdate_heartbeat(&db, &s1.handle, Duration::seconds(120));
        let err = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "o", staleness(), expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        db.heartbeat(&s1.handle, alice.id).unwrap();

        // Stale target is unavailable.
        backdate_heartbeat(&db, &s2.handle, Duration::seconds(120));
        let err = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "o", staleness(), expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::TargetUnavailable));
    }

    #[test]
    fn test_duplicate_request_same_direction() {
        let (_dir, mut db) = open_db();
        let (alice, s1, _bob, s2) = handshake_fixture(&mut db);

        db.open_connection_request(&s1.handle, &s2.handle, alice.id, "o1", staleness(), expiry())
            .unwrap();
        let err = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "o2", staleness(), expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateRequest));
    }

    #[test]
    fn test_simultaneous_bidirectional_open_allowed() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = handshake_fixture(&mut db);

        // Both directions may stand at once; the tie-break lives in the
        // client, not the state machine.
        db.open_connection_request(&s1.handle, &s2.handle, alice.id, "o1", staleness(), expiry())
            .unwrap();
        db.open_connection_request(&s2.handle, &s1.handle, bob.id, "o2", staleness(), expiry())
            .unwrap();
        assert_eq!(db.count_connection_requests().unwrap(), 2);
    }

    #[test]
    fn test_double_reply_keeps_first_answer() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = handshake_fixture(&mut db);

        let request = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "offer", staleness(), expiry())
            .unwrap();

        db.reply_connection_request(request.id, bob.id, "first", expiry())
            .unwrap();
        let err = db
            .reply_connection_request(request.id, bob.id, "second", expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));

        let seen = db
            .check_connection_request(request.id, alice.id, expiry())
            .unwrap();
        assert_eq!(seen.answer.as_deref(), Some("first"));
    }

    #[test]
    fn test_reply_authorization() {
        let (_dir, mut db) = open_db();
        let (alice, s1, _bob, s2) = handshake_fixture(&mut db);
        let mallory = db.create_account("mallory").unwrap();

        let request = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "offer", staleness(), expiry())
            .unwrap();

        // Neither the initiator nor a stranger may reply.
        for wrong in [alice.id, mallory.id] {
            let err = db
                .reply_connection_request(request.id, wrong, "a", expiry())
                .unwrap_err();
            assert!(matches!(err, StoreError::Unauthorized));
        }
    }

    #[test]
    fn test_check_is_participant_only() {
        let (_dir, mut db) = open_db();
        let (alice, s1, _bob, s2) = handshake_fixture(&mut db);
        let mallory = db.create_account("mallory").unwrap();

        let request = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "offer", staleness(), expiry())
            .unwrap();

        let err = db
            .check_connection_request(request.id, mallory.id, expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::Unauthorized));
    }

    #[test]
    fn test_logical_expiry_before_sweep() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = handshake_fixture(&mut db);

        let request = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "offer", staleness(), expiry())
            .unwrap();
        backdate_request(&db, request.id, Duration::minutes(6));

        // Row physically present, logically gone everywhere.
        assert_eq!(db.count_connection_requests().unwrap(), 1);
        let err = db
            .check_connection_request(request.id, alice.id, expiry())
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
        assert!(db
            .list_incoming_connection_requests(&s2.handle, bob.id, expiry())
            .unwrap()
            .is_empty());

        // The sweep then reclaims it physically.
        let deleted = db
            .sweep_connection_requests(expiry(), Duration::hours(1))
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(db.count_connection_requests().unwrap(), 0);
    }

    #[test]
    fn test_expired_duplicate_is_reclaimed_on_open() {
        let (_dir, mut db) = open_db();
        let (alice, s1, _bob, s2) = handshake_fixture(&mut db);

        let first = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "o1", staleness(), expiry())
            .unwrap();
        backdate_request(&db, first.id, Duration::minutes(6));

        // The stale request no longer blocks a fresh open, and is deleted
        // in the same transaction.
        let second = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "o2", staleness(), expiry())
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(db.count_connection_requests().unwrap(), 1);
    }

    #[test]
    fn test_completed_requests_survive_expiry_sweep() {
        let (_dir, mut db) = open_db();
        let (alice, s1, bob, s2) = handshake_fixture(&mut db);

        let request = db
            .open_connection_request(&s1.handle, &s2.handle, alice.id, "offer", staleness(), expiry())
            .unwrap();
        db.reply_connection_request(request.id, bob.id, "answer", expiry())
            .unwrap();
        db.complete_connection_request(request.id, alice.id, expiry())
            .unwrap();
        backdate_request(&db, request.id, Duration::minutes(30));

        // Inside the bookkeeping retention: kept.
        assert_eq!(
            db.sweep_connection_requests(expiry(), Duration::hours(1)).unwrap(),
            0
        );

        backdate_request(&db, request.id, Duration::hours(2));
        assert_eq!(
            db.sweep_connection_requests(expiry(), Duration::hours(1)).unwrap(),
            1
        );
    }
}

//! Friend graph: symmetric edges plus pending request edges.
//!
//! Edges are stored once, in canonical order (lower account id first), so
//! existence checks and duplicate prevention are single indexed lookups.
//! `are_friends` is the sole authorization gate used by the connection
//! request coordinator.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use parley_shared::types::{FriendDecision, FriendRequestStatus};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Account, FriendRequest, PendingFriendRequest};

impl Database {
    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    /// Send a friend request from `from_account` to the account named
    /// `to_username`.
    ///
    /// The duplicate checks and the insert commit atomically; two racing
    /// senders cannot both create a pending request for the same pair.
    pub fn send_friend_request(
        &mut self,
        from_account: Uuid,
        to_username: &str,
    ) -> Result<FriendRequest> {
        let tx = self.conn_mut().transaction()?;

        let to_account = match tx.query_row(
            "SELECT id FROM accounts WHERE username = ?1",
            params![to_username],
            |row| row.get::<_, String>(0),
        ) {
            Ok(id) => Uuid::parse_str(&id)?,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::Sqlite(e)),
        };

        if to_account == from_account {
            return Err(StoreError::InvalidArgument(
                "cannot send a friend request to yourself".into(),
            ));
        }

        if edge_exists(&tx, from_account, to_account)? {
            return Err(StoreError::AlreadyFriends);
        }

        // At most one pending request per unordered pair, in either
        // direction.
        let pending: u64 = tx.query_row(
            "SELECT COUNT(*) FROM friend_requests
             WHERE status = 'pending'
               AND ((from_account = ?1 AND to_account = ?2)
                 OR (from_account = ?2 AND to_account = ?1))",
            params![from_account.to_string(), to_account.to_string()],
            |row| row.get(0),
        )?;
        if pending > 0 {
            return Err(StoreError::RequestExists);
        }

        let request = FriendRequest {
            id: Uuid::new_v4(),
            from_account,
            to_account,
            status: FriendRequestStatus::Pending,
            created_at: Utc::now(),
        };

        tx.execute(
            "INSERT INTO friend_requests (id, from_account, to_account, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                request.id.to_string(),
                request.from_account.to_string(),
                request.to_account.to_string(),
                request.status.as_str(),
                request.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;

        tracing::info!(to = %to_username, "friend request sent");
        Ok(request)
    }

    /// Accept or reject a pending friend request.
    ///
    /// Only the recipient may respond. On acceptance the status update and
    /// the canonical edge insert are one atomic unit: both commit or
    /// neither does.
    pub fn respond_friend_request(
        &mut self,
        request_id: Uuid,
        acting_account: Uuid,
        decision: FriendDecision,
    ) -> Result<()> {
        let tx = self.conn_mut().transaction()?;

        let request = get_request(&tx, request_id)?.ok_or(StoreError::NotFound)?;

        if request.to_account != acting_account {
            return Err(StoreError::Unauthorized);
        }
        if request.status != FriendRequestStatus::Pending {
            return Err(StoreError::InvalidState(format!(
                "request is already {}",
                request.status.as_str()
            )));
        }

        let new_status = match decision {
            FriendDecision::Accept => FriendRequestStatus::Accepted,
            FriendDecision::Reject => FriendRequestStatus::Rejected,
        };

        tx.execute(
            "UPDATE friend_requests SET status = ?1 WHERE id = ?2",
            params![new_status.as_str(), request_id.to_string()],
        )?;

        if decision == FriendDecision::Accept {
            let (a, b) = canonical_pair(request.from_account, request.to_account);
            tx.execute(
                "INSERT INTO friend_edges (account_a, account_b, created_at)
                 VALUES (?1, ?2, ?3)",
                params![a.to_string(), b.to_string(), Utc::now().to_rfc3339()],
            )?;
        }

        tx.commit()?;

        tracing::info!(request = %request_id, decision = ?decision, "friend request answered");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------

    /// Whether the two accounts are mutual friends.
    pub fn are_friends(&self, a: Uuid, b: Uuid) -> Result<bool> {
        edge_exists(self.conn(), a, b)
    }

    /// Remove the friendship between two accounts.
    ///
    /// Idempotent; returns `true` if an edge was deleted.
    pub fn unfriend(&self, acting_account: Uuid, other: Uuid) -> Result<bool> {
        let (a, b) = canonical_pair(acting_account, other);
        let affected = self.conn().execute(
            "DELETE FROM friend_edges WHERE account_a = ?1 AND account_b = ?2",
            params![a.to_string(), b.to_string()],
        )?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// All accounts the given account is friends with.
    pub fn list_friends(&self, account_id: Uuid) -> Result<Vec<Account>> {
        let mut stmt = self.conn().prepare(
            "SELECT a.id, a.username, a.credential, a.created_at
             FROM accounts a
             JOIN friend_edges e
               ON (e.account_a = ?1 AND e.account_b = a.id)
               OR (e.account_b = ?1 AND e.account_a = a.id)
             ORDER BY a.username ASC",
        )?;

        let rows = stmt.query_map(params![account_id.to_string()], |row| {
            let id_str: String = row.get(0)?;
            let username: String = row.get(1)?;
            let credential: String = row.get(2)?;
            let created_str: String = row.get(3)?;
            Ok((id_str, username, credential, created_str))
        })?;

        let mut friends = Vec::new();
        for row in rows {
            let (id_str, username, credential, created_str) = row?;
            friends.push(Account {
                id: Uuid::parse_str(&id_str)?,
                username,
                credential,
                created_at: DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc),
            });
        }
        Ok(friends)
    }

    /// Pending requests addressed to the given account, with sender names.
    pub fn list_incoming_friend_requests(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<PendingFriendRequest>> {
        let mut stmt = self.conn().prepare(
            "SELECT r.id, r.from_account, a.username, r.created_at
             FROM friend_requests r
             JOIN accounts a ON a.id = r.from_account
             WHERE r.to_account = ?1 AND r.status = 'pending'
             ORDER BY r.created_at ASC",
        )?;

        let rows = stmt.query_map(params![account_id.to_string()], |row| {
            let id_str: String = row.get(0)?;
            let from_str: String = row.get(1)?;
            let from_username: String = row.get(2)?;
            let created_str: String = row.get(3)?;
            Ok((id_str, from_str, from_username, created_str))
        })?;

        let mut requests = Vec::new();
        for row in rows {
            let (id_str, from_str, from_username, created_str) = row?;
            requests.push(PendingFriendRequest {
                id: Uuid::parse_str(&id_str)?,
                from_account: Uuid::parse_str(&from_str)?,
                from_username,
                created_at: DateTime::parse_from_rfc3339(&created_str)?.with_timezone(&Utc),
            });
        }
        Ok(requests)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Canonical storage order for an unordered account pair.
fn canonical_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Edge existence check in canonical order, usable inside transactions.
pub(crate) fn edge_exists(conn: &Connection, a: Uuid, b: Uuid) -> Result<bool> {
    let (a, b) = canonical_pair(a, b);
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM friend_edges WHERE account_a = ?1 AND account_b = ?2",
        params![a.to_string(), b.to_string()],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn get_request(conn: &Connection, id: Uuid) -> Result<Option<FriendRequest>> {
    match conn.query_row(
        "SELECT id, from_account, to_account, status, created_at
         FROM friend_requests
         WHERE id = ?1",
        params![id.to_string()],
        row_to_request,
    ) {
        Ok(request) => Ok(Some(request)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

/// Map a `rusqlite::Row` to a [`FriendRequest`].
fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<FriendRequest> {
    let id_str: String = row.get(0)?;
    let from_str: String = row.get(1)?;
    let to_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let parse_uuid = |idx: usize, s: &str| {
        Uuid::parse_str(s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
    };

    let status = FriendRequestStatus::from_str(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown friend request status: {status_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(FriendRequest {
        id: parse_uuid(0, &id_str)?,
        from_account: parse_uuid(1, &from_str)?,
        to_account: parse_uuid(2, &to_str)?,
        status,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    fn two_accounts(db: &Database) -> (Account, Account) {
        (
            db.create_account("alice").unwrap(),
            db.create_account("bob").unwrap(),
        )
    }

    #[test]
    fn test_request_accept_creates_one_symmetric_edge() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);

        let request = db.send_friend_request(alice.id, "bob").unwrap();
        assert!(!db.are_friends(alice.id, bob.id).unwrap());

        db.respond_friend_request(request.id, bob.id, FriendDecision::Accept)
            .unwrap();

        // Discoverable from either order.
        assert!(db.are_friends(alice.id, bob.id).unwrap());
        assert!(db.are_friends(bob.id, alice.id).unwrap());

        let edges: u64 = db
            .conn()
            .query_row("SELECT COUNT(*) FROM friend_edges", [], |r| r.get(0))
            .unwrap();
        assert_eq!(edges, 1);
    }

    #[test]
    fn test_symmetric_duplicate_detection() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);

        db.send_friend_request(alice.id, "bob").unwrap();
        // The reverse direction is also blocked while one is pending.
        let err = db.send_friend_request(bob.id, "alice").unwrap_err();
        assert!(matches!(err, StoreError::RequestExists));
        let err = db.send_friend_request(alice.id, "bob").unwrap_err();
        assert!(matches!(err, StoreError::RequestExists));
    }

    #[test]
    fn test_self_request_rejected() {
        let (_dir, mut db) = open_db();
        let (alice, _) = two_accounts(&db);
        let err = db.send_friend_request(alice.id, "alice").unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_unknown_recipient() {
        let (_dir, mut db) = open_db();
        let (alice, _) = two_accounts(&db);
        let err = db.send_friend_request(alice.id, "carol").unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[test]
    fn test_already_friends() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);

        let request = db.send_friend_request(alice.id, "bob").unwrap();
        db.respond_friend_request(request.id, bob.id, FriendDecision::Accept)
            .unwrap();

        let err = db.send_friend_request(alice.id, "bob").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyFriends));
        let err = db.send_friend_request(bob.id, "alice").unwrap_err();
        assert!(matches!(err, StoreError::AlreadyFriends));
    }

    #[test]
    fn test_only_recipient_may_respond() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);
        let carol = db.create_account("carol").unwrap();

        let request = db.send_friend_request(alice.id, "bob").unwrap();

        // Neither the sender nor a third party may answer.
        for wrong in [alice.id, carol.id] {
            let err = db
                .respond_friend_request(request.id, wrong, FriendDecision::Accept)
                .unwrap_err();
            assert!(matches!(err, StoreError::Unauthorized));
        }
        assert!(!db.are_friends(alice.id, bob.id).unwrap());

        db.respond_friend_request(request.id, bob.id, FriendDecision::Accept)
            .unwrap();
        assert!(db.are_friends(alice.id, bob.id).unwrap());
    }

    #[test]
    fn test_double_respond_is_invalid_state() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);

        let request = db.send_friend_request(alice.id, "bob").unwrap();
        db.respond_friend_request(request.id, bob.id, FriendDecision::Reject)
            .unwrap();

        let err = db
            .respond_friend_request(request.id, bob.id, FriendDecision::Accept)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidState(_)));
        assert!(!db.are_friends(alice.id, bob.id).unwrap());
    }

    #[test]
    fn test_rejection_allows_new_request() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);

        let request = db.send_friend_request(alice.id, "bob").unwrap();
        db.respond_friend_request(request.id, bob.id, FriendDecision::Reject)
            .unwrap();

        // Pending is gone, so a fresh request may be sent.
        db.send_friend_request(bob.id, "alice").unwrap();
    }

    #[test]
    fn test_unfriend_is_idempotent() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);

        let request = db.send_friend_request(alice.id, "bob").unwrap();
        db.respond_friend_request(request.id, bob.id, FriendDecision::Accept)
            .unwrap();

        assert!(db.unfriend(bob.id, alice.id).unwrap());
        assert!(!db.are_friends(alice.id, bob.id).unwrap());
        // Second delete is a no-op.
        assert!(!db.unfriend(alice.id, bob.id).unwrap());
    }

    #[test]
    fn test_list_friends_and_incoming() {
        let (_dir, mut db) = open_db();
        let (alice, bob) = two_accounts(&db);
        let carol = db.create_account("carol").unwrap();

        let r1 = db.send_friend_request(alice.id, "bob").unwrap();
        db.respond_friend_request(r1.id, bob.id, FriendDecision::Accept)
            .unwrap();

        let r2 = db.send_friend_request(carol.id, "bob").unwrap();
        let incoming = db.list_incoming_friend_requests(bob.id).unwrap();
        assert_eq!(incoming.len(), 1);
        assert_eq!(incoming[0].id, r2.id);
        assert_eq!(incoming[0].from_username, "carol");

        let friends = db.list_friends(bob.id).unwrap();
        assert_eq!(friends.len(), 1);
        assert_eq!(friends[0].username, "alice");
    }
}

//! Identity store: account <-> bearer credential mapping.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use uuid::Uuid;

use parley_shared::constants::MAX_USERNAME_LEN;
use parley_shared::token;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Account;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Create an account with a fresh bearer credential.
    ///
    /// The credential is generated here and returned exactly once; it never
    /// rotates afterwards.
    pub fn create_account(&self, username: &str) -> Result<Account> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::InvalidArgument("username is empty".into()));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(StoreError::InvalidArgument(format!(
                "username longer than {MAX_USERNAME_LEN} characters"
            )));
        }
        if username.chars().any(char::is_control) {
            return Err(StoreError::InvalidArgument(
                "username contains control characters".into(),
            ));
        }

        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            credential: token::generate(),
            created_at: Utc::now(),
        };

        let inserted = self.conn().execute(
            "INSERT INTO accounts (id, username, credential, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                account.id.to_string(),
                account.username,
                account.credential,
                account.created_at.to_rfc3339(),
            ],
        );

        match inserted {
            Ok(_) => {
                tracing::info!(username = %account.username, "account created");
                Ok(account)
            }
            Err(e) if is_unique_violation(&e) => Err(StoreError::UsernameTaken),
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Resolve a bearer credential to its account. `None` means the
    /// credential is unknown (the caller maps this to Unauthorized).
    pub fn account_by_credential(&self, credential: &str) -> Result<Option<Account>> {
        get_account_where(self.conn(), "credential = ?1", credential)
    }

    /// Look up an account by display name.
    pub fn account_by_username(&self, username: &str) -> Result<Option<Account>> {
        get_account_where(self.conn(), "username = ?1", username)
    }

    /// Look up an account by id.
    pub fn account_by_id(&self, id: Uuid) -> Result<Option<Account>> {
        get_account_where(self.conn(), "id = ?1", &id.to_string())
    }

    /// Total number of accounts (admin surface).
    pub fn count_accounts(&self) -> Result<u64> {
        let n: u64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(n)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_account_where(conn: &Connection, clause: &str, value: &str) -> Result<Option<Account>> {
    let sql = format!(
        "SELECT id, username, credential, created_at FROM accounts WHERE {clause}"
    );
    match conn.query_row(&sql, params![value], row_to_account) {
        Ok(account) => Ok(Some(account)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

/// Resolve an account id to its username inside a transaction.
pub(crate) fn username_of(conn: &Connection, id: Uuid) -> Result<String> {
    match conn.query_row(
        "SELECT username FROM accounts WHERE id = ?1",
        params![id.to_string()],
        |row| row.get::<_, String>(0),
    ) {
        Ok(name) => Ok(name),
        Err(rusqlite::Error::QueryReturnedNoRows) => Err(StoreError::NotFound),
        Err(e) => Err(StoreError::Sqlite(e)),
    }
}

/// Map a `rusqlite::Row` to an [`Account`].
fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    let id_str: String = row.get(0)?;
    let username: String = row.get(1)?;
    let credential: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Account {
        id,
        username,
        credential,
        created_at,
    })
}

/// Whether an insert failed on a UNIQUE constraint.
fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_create_and_authenticate() {
        let (_dir, db) = open_db();

        let alice = db.create_account("alice").unwrap();
        assert_eq!(alice.username, "alice");
        assert_eq!(alice.credential.len(), 32);

        let found = db.account_by_credential(&alice.credential).unwrap();
        assert_eq!(found, Some(alice.clone()));

        // Only the exact credential resolves.
        assert!(db.account_by_credential("wrong-credential").unwrap().is_none());

        let by_name = db.account_by_username("alice").unwrap().unwrap();
        assert_eq!(by_name.id, alice.id);
    }

    #[test]
    fn test_duplicate_username_rejected() {
        let (_dir, db) = open_db();

        db.create_account("alice").unwrap();
        let err = db.create_account("alice").unwrap_err();
        assert!(matches!(err, StoreError::UsernameTaken));
    }

    #[test]
    fn test_username_validation() {
        let (_dir, db) = open_db();

        assert!(matches!(
            db.create_account("   ").unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            db.create_account(&"x".repeat(33)).unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
        assert!(matches!(
            db.create_account("evil\u{0007}name").unwrap_err(),
            StoreError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_count_accounts() {
        let (_dir, db) = open_db();
        assert_eq!(db.count_accounts().unwrap(), 0);
        db.create_account("alice").unwrap();
        db.create_account("bob").unwrap();
        assert_eq!(db.count_accounts().unwrap(), 2);
    }
}

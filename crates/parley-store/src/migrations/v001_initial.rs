//! v001 -- Initial schema creation.
//!
//! Creates the six core tables: `accounts`, `sessions`, `friend_requests`,
//! `friend_edges`, `connection_requests`, and `liveness_pings`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Accounts (identity store)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS accounts (
    id         TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    username   TEXT NOT NULL UNIQUE,
    credential TEXT NOT NULL UNIQUE,        -- opaque bearer token
    created_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Sessions (one row per live client attachment)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS sessions (
    handle         TEXT PRIMARY KEY NOT NULL,  -- opaque 32-char token
    account_id     TEXT NOT NULL,              -- FK -> accounts(id)
    created_at     TEXT NOT NULL,
    last_heartbeat TEXT NOT NULL,
    active         INTEGER NOT NULL DEFAULT 1, -- boolean 0/1

    FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_sessions_account ON sessions(account_id);

-- ----------------------------------------------------------------
-- Friend requests (directed, pending until answered)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_requests (
    id           TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    from_account TEXT NOT NULL,              -- FK -> accounts(id)
    to_account   TEXT NOT NULL,              -- FK -> accounts(id)
    status       TEXT NOT NULL DEFAULT 'pending', -- pending | accepted | rejected
    created_at   TEXT NOT NULL,

    FOREIGN KEY (from_account) REFERENCES accounts(id) ON DELETE CASCADE,
    FOREIGN KEY (to_account)   REFERENCES accounts(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_friend_requests_to
    ON friend_requests(to_account, status);
CREATE INDEX IF NOT EXISTS idx_friend_requests_from
    ON friend_requests(from_account, status);

-- ----------------------------------------------------------------
-- Friend edges (symmetric, canonical order: account_a < account_b)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS friend_edges (
    account_a  TEXT NOT NULL,
    account_b  TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (account_a, account_b),
    CHECK (account_a < account_b)
);

-- ----------------------------------------------------------------
-- Connection requests (signaling state machine)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS connection_requests (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    from_session      TEXT NOT NULL,
    to_session        TEXT NOT NULL,
    from_account      TEXT NOT NULL,   -- denormalized at creation
    to_account        TEXT NOT NULL,   -- denormalized at creation
    from_display_name TEXT NOT NULL,
    offer             TEXT NOT NULL,   -- opaque handshake payload
    answer            TEXT,            -- opaque counter-payload
    status            TEXT NOT NULL DEFAULT 'sent', -- sent | replied | completed
    created_at        TEXT NOT NULL,
    updated_at        TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_connection_requests_target
    ON connection_requests(to_session, status);
CREATE INDEX IF NOT EXISTS idx_connection_requests_pair
    ON connection_requests(from_session, to_session, status);

-- ----------------------------------------------------------------
-- Liveness pings (ephemeral probes)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS liveness_pings (
    id             TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    pinger_session TEXT NOT NULL,
    target_session TEXT NOT NULL,
    target_account TEXT NOT NULL,    -- denormalized at creation
    status         TEXT NOT NULL DEFAULT 'sent', -- sent | responded
    created_at     TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pings_target
    ON liveness_pings(target_session, status);
CREATE INDEX IF NOT EXISTS idx_pings_pair
    ON liveness_pings(pinger_session, target_session);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}

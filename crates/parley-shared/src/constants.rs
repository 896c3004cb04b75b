/// Application name
pub const APP_NAME: &str = "Parley";

/// Length of generated bearer credentials and session handles, in
/// alphanumeric characters. 32 chars over [a-zA-Z0-9] is ~190 bits,
/// comfortably past the 2^128 collision-resistance target.
pub const TOKEN_LEN: usize = 32;

/// Maximum accepted username length in characters.
pub const MAX_USERNAME_LEN: usize = 32;

/// Client heartbeat period in seconds.
pub const HEARTBEAT_PERIOD_SECS: u64 = 30;

/// A session with no heartbeat for longer than this is dead to every read
/// path (2x the heartbeat period).
pub const SESSION_STALENESS_SECS: i64 = 60;

/// Sessions whose heartbeat age exceeds this are physically deleted by the
/// sweep.
pub const SESSION_MAX_AGE_SECS: i64 = 3600;

/// A connection request not yet completed is reclaimed after this window.
pub const CONNECTION_REQUEST_EXPIRY_SECS: i64 = 300;

/// Completed connection requests are retained this long for bookkeeping.
pub const COMPLETED_RETENTION_SECS: i64 = 3600;

/// The pinger treats a probe without a response after this as "target
/// unresponsive".
pub const PING_TIMEOUT_SECS: u64 = 3;

/// Liveness pings older than this are deleted by the sweep, answered or not.
pub const PING_MAX_AGE_SECS: i64 = 30;

/// Sweep cadences (server background tasks).
pub const SESSION_SWEEP_INTERVAL_SECS: u64 = 600;
pub const REQUEST_SWEEP_INTERVAL_SECS: u64 = 60;
pub const PING_SWEEP_INTERVAL_SECS: u64 = 10;

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

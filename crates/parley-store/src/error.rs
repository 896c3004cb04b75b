use thiserror::Error;

use parley_shared::kinds::ErrorKind;

/// Errors produced by the store layer.
///
/// The domain variants map one-to-one onto the coordinator's failure-kind
/// taxonomy; every one of them is terminal and returned synchronously to the
/// caller, never retried here.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// UUID parsing error.
    #[error("UUID error: {0}")]
    Uuid(#[from] uuid::Error),

    /// Chrono parsing error.
    #[error("Timestamp parse error: {0}")]
    ChronoParse(#[from] chrono::ParseError),

    /// Referenced entity absent, including logically expired records.
    #[error("Record not found")]
    NotFound,

    /// Credential does not match the resource owner.
    #[error("Not authorized for this resource")]
    Unauthorized,

    /// Authorization predicate false: the accounts are not friends.
    #[error("The accounts are not friends")]
    NotFriends,

    /// Malformed or self-referential input.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation outside the allowed state transitions.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The accounts are already friends.
    #[error("Already friends")]
    AlreadyFriends,

    /// A pending friend request already exists in either direction.
    #[error("A friend request is already pending between these accounts")]
    RequestExists,

    /// The username is taken.
    #[error("Username is already taken")]
    UsernameTaken,

    /// An outstanding connection request already exists for this pair.
    #[error("A connection request is already outstanding for this session pair")]
    DuplicateRequest,

    /// The target session is not live right now.
    #[error("Target session is not available")]
    TargetUnavailable,
}

impl StoreError {
    /// The machine-readable kind reported to API clients.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound => ErrorKind::NotFound,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::NotFriends => ErrorKind::Forbidden,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::AlreadyFriends => ErrorKind::AlreadyFriends,
            Self::RequestExists => ErrorKind::RequestExists,
            Self::UsernameTaken => ErrorKind::UsernameTaken,
            Self::DuplicateRequest => ErrorKind::DuplicateRequest,
            Self::TargetUnavailable => ErrorKind::TargetUnavailable,
            Self::Sqlite(_)
            | Self::NoDataDir
            | Self::Io(_)
            | Self::Migration(_)
            | Self::Uuid(_)
            | Self::ChronoParse(_) => ErrorKind::Internal,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

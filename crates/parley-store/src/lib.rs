//! Durable state for the Parley rendezvous coordinator.
//!
//! One SQLite database holds every record collection of the coordinator:
//! accounts (the identity store), sessions (the registry), the friend graph,
//! connection requests (the signaling state machine) and liveness pings.
//!
//! Mutating operations that have preconditions run the check and the write
//! inside a single SQLite transaction; the atomic check-and-write is the
//! coordinator's only concurrency control.

pub mod accounts;
pub mod database;
pub mod error;
pub mod friends;
pub mod migrations;
pub mod models;
pub mod pings;
pub mod requests;
pub mod sessions;

pub use database::Database;
pub use error::{Result, StoreError};

//! Request handlers, one module per record collection.
//!
//! Handlers stay thin: resolve the caller's credential, take the store
//! lock, run the typed store operation, map the result onto the shared
//! DTOs. All precondition logic lives in `parley-store`, inside the
//! transaction that commits the write.

pub mod accounts;
pub mod admin;
pub mod connections;
pub mod friends;
pub mod pings;
pub mod sessions;

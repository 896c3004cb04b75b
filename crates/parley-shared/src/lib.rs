//! Shared types for the Parley rendezvous coordinator.
//!
//! Everything the server and the client SDK must agree on lives here: the
//! status enums of the signaling state machine, the request/response DTOs of
//! the REST surface, the machine-readable error kinds, token generation, and
//! the protocol timing constants.

pub mod constants;
pub mod kinds;
pub mod protocol;
pub mod token;
pub mod types;

//! Remote server status (server-list-ping).
//!
//! Read-only: a handshake announcing the status state, one status request,
//! one JSON response. No gameplay protocol is spoken here.

pub mod codec;
pub mod query;

pub use query::{query_status, RemoteStatus};

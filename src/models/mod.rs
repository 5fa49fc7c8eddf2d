//! Domain model module declarations.

pub mod account;
pub mod proxy;
pub mod server;
pub mod session;

pub use account::Account;
pub use proxy::{ProxyEndpoint, ProxyRoute, ProxyScheme};
pub use server::ServerAddress;
pub use session::{SessionState, SessionSummary};

//! Target server address.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::Serialize;

use super::proxy::split_host_port;
use crate::AppError;

/// Port used when an address omits one.
pub const DEFAULT_PORT: u16 = 25565;

/// `host:port` pair of the server every session connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ServerAddress {
    /// Host name or address.
    pub host: String,
    /// TCP port.
    pub port: u16,
}

impl ServerAddress {
    /// Construct an address from parts.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl FromStr for ServerAddress {
    type Err = AppError;

    /// Parse `host`, `host:port`, `[v6]` or `[v6]:port`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        let (host, port) = split_host_port(raw)
            .map_err(|why| AppError::InvalidCommand(format!("address '{raw}': {why}")))?;

        if host.is_empty() || host.contains(char::is_whitespace) {
            return Err(AppError::InvalidCommand(format!(
                "invalid host in address '{raw}'"
            )));
        }

        Ok(Self::new(host, port.unwrap_or(DEFAULT_PORT)))
    }
}

impl Display for ServerAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

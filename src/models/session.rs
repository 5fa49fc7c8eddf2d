//! Session lifecycle states and status rows.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ProxyEndpoint, ServerAddress};

/// Lifecycle state of one managed session.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    /// Created, handle not yet built.
    Idle,
    /// Handle built, waiting for the server to accept the session.
    Connecting,
    /// Server accepted the session.
    LoggedIn,
    /// Player entity materialized; the session is interactive.
    Spawned,
    /// Server removed the session with a reason.
    Kicked,
    /// Connection ended without a kick.
    Disconnected,
    /// Transport or protocol failure.
    Errored,
    /// Explicitly stopped, or gave up reconnecting. Terminal.
    Terminated,
}

impl SessionState {
    /// States in which the current handle may still deliver events.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(self, Self::Connecting | Self::LoggedIn | Self::Spawned)
    }

    /// States in which the handle is gone and a reconnect may be pending.
    #[must_use]
    pub fn is_down(self) -> bool {
        matches!(self, Self::Kicked | Self::Disconnected | Self::Errored)
    }

    /// Whether gameplay commands can be issued.
    #[must_use]
    pub fn is_interactive(self) -> bool {
        self == Self::Spawned
    }

    /// Short lowercase label used in logs and status output.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::LoggedIn => "logged-in",
            Self::Spawned => "spawned",
            Self::Kicked => "kicked",
            Self::Disconnected => "disconnected",
            Self::Errored => "errored",
            Self::Terminated => "terminated",
        }
    }
}

impl Display for SessionState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Point-in-time description of a registered session.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SessionSummary {
    /// Session identity.
    pub identity: String,
    /// Instance identifier of the registered session.
    pub instance_id: String,
    /// Lifecycle state at snapshot time.
    pub state: SessionState,
    /// Assigned proxy, `None` for direct connections.
    pub proxy: Option<ProxyEndpoint>,
    /// Target server.
    pub server: ServerAddress,
    /// Consecutive reconnect attempts since the last spawn.
    pub reconnect_attempts: u32,
    /// When the session was first registered.
    pub started_at: DateTime<Utc>,
}

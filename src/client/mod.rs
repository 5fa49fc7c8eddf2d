//! Protocol-client abstraction.
//!
//! The [`Connector`] and [`GameClient`] traits decouple the orchestrator
//! (registry, lifecycle, scheduler) from the game wire protocol. A connector
//! builds one handle per session; the handle accepts fire-and-forget
//! commands and reports what happens to it through an ordered
//! [`ClientEvent`] stream.

pub mod sim;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::config::{DriverKind, GlobalConfig};
use crate::models::{ProxyRoute, ServerAddress};
use crate::Result;

/// Capacity of each handle's event channel.
pub const EVENT_BUFFER: usize = 256;

/// Events a protocol client delivers for its session, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Server accepted the session.
    Connected,
    /// Player entity materialized (also emitted on respawn).
    Spawned,
    /// A chat line was observed.
    ChatReceived {
        /// Sender name as reported by the server.
        sender: String,
        /// Message text.
        text: String,
    },
    /// Server forcibly removed the session.
    Kicked {
        /// Kick reason as reported by the server.
        reason: String,
    },
    /// Connection ended.
    Ended,
    /// Transport or protocol failure.
    Errored {
        /// Error description.
        message: String,
    },
}

/// Movement control keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Walk forward.
    Forward,
}

/// World-space position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Position {
    /// Construct a position.
    #[must_use]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance_to(&self, other: &Position) -> f64 {
        let (dx, dy, dz) = (self.x - other.x, self.y - other.y, self.z - other.z);
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Classification of a visible entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// Another player.
    Player,
    /// Hostile or passive mob.
    Mob,
}

/// An entity the handle can currently see.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibleEntity {
    /// Protocol entity id.
    pub id: u32,
    /// Classification.
    pub kind: EntityKind,
    /// Player name, when known.
    pub name: Option<String>,
    /// Current position.
    pub position: Position,
}

/// Everything needed to build one session handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Target server.
    pub server: ServerAddress,
    /// Session identity (in-game name).
    pub identity: String,
    /// Account credential, carried for drivers that need it.
    pub credential: String,
    /// Proxy route, `None` for a direct connection.
    pub proxy: Option<ProxyRoute>,
}

/// A freshly built handle and the receiving end of its event stream.
pub struct ClientConnection {
    /// Command surface of the handle.
    pub client: Arc<dyn GameClient>,
    /// Ordered events for this handle.
    pub events: mpsc::Receiver<ClientEvent>,
}

/// Command and query surface of one protocol-client handle.
///
/// Commands are fire-and-forget; an `Err` means the handle could not accept
/// the command (typically because it is no longer interactive).
pub trait GameClient: Send + Sync {
    /// Send a chat line or slash command.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dispatch`](crate::AppError::Dispatch) if the handle is not interactive.
    fn send_chat(&self, text: &str) -> Result<()>;

    /// Press or release a movement key.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dispatch`](crate::AppError::Dispatch) if the handle is not interactive.
    fn set_movement(&self, direction: Direction, active: bool) -> Result<()>;

    /// Toggle sprinting.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dispatch`](crate::AppError::Dispatch) if the handle is not interactive.
    fn set_sprint(&self, active: bool) -> Result<()>;

    /// Attack an entity.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Dispatch`](crate::AppError::Dispatch) if the handle is not interactive
    /// or the target is gone.
    fn attack(&self, target: &VisibleEntity) -> Result<()>;

    /// Close the connection. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`](crate::AppError::Transport) if the close could not be
    /// initiated. Callers treat this as best-effort.
    fn terminate(&self, reason: &str) -> Result<()>;

    /// Entities currently visible to this handle.
    fn visible_entities(&self) -> Vec<VisibleEntity>;

    /// Own position, `None` before spawn.
    fn position(&self) -> Option<Position>;
}

/// Builds protocol-client handles.
pub trait Connector: Send + Sync {
    /// Build a handle. Construction is synchronous; the connection itself
    /// proceeds in the background and reports through the event stream.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Construction`](crate::AppError::Construction) if the handle cannot
    /// be built.
    fn connect(&self, request: ConnectRequest) -> Result<ClientConnection>;
}

/// Build the connector selected by the configuration.
#[must_use]
pub fn connector_for(config: &GlobalConfig) -> Arc<dyn Connector> {
    match config.driver {
        DriverKind::Sim => Arc::new(sim::SimConnector::new(config.sim.clone())),
    }
}

//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// A protocol-client handle could not be built (bad proxy, refused route).
    Construction(String),
    /// Post-connection transport or protocol failure.
    Transport(String),
    /// A command could not be delivered because the handle is not interactive.
    Dispatch(String),
    /// Requested entity (identity, log file) does not exist.
    NotFound(String),
    /// Operator input could not be understood.
    InvalidCommand(String),
    /// Remote status query failure.
    Status(String),
    /// IPC communication failure.
    Ipc(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Construction(msg) => write!(f, "construction: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Dispatch(msg) => write!(f, "dispatch: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::InvalidCommand(msg) => write!(f, "invalid command: {msg}"),
            Self::Status(msg) => write!(f, "status: {msg}"),
            Self::Ipc(msg) => write!(f, "ipc: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Io(format!("invalid json: {err}"))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

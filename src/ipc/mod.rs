//! Local IPC layer for `mc-herd-ctl` interaction.
//!
//! Provides a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! server that accepts JSON-line commands from the companion CLI.

pub mod server;

pub use server::{handle_request, spawn_ipc_server, IpcResponse};

#![forbid(unsafe_code)]

//! `mc-herd` — orchestrates many concurrent game-client sessions against a
//! single server, with per-session proxy routing, automatic reconnection,
//! a shared action loop and a textual control plane.

pub mod client;
pub mod config;
pub mod console;
pub mod errors;
pub mod ipc;
pub mod models;
pub mod orchestrator;
pub mod persistence;
pub mod status;

pub use config::GlobalConfig;
pub use errors::{AppError, Result};

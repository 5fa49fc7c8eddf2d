//! Session orchestration.
//!
//! Covers the per-session lifecycle and its event task, the identity-keyed
//! registry, proxy assignment, the post-spawn auth sequence, the periodic
//! action scheduler and the control-plane facade.

pub mod auth_sequencer;
pub mod flags;
pub mod lifecycle;
pub mod manager;
pub mod proxy_allocator;
pub mod registry;
pub mod scheduler;
pub mod session;

pub use flags::{ActionFlag, ActionFlags, FlagSnapshot};
pub use manager::{
    BroadcastReport, Orchestrator, StartReport, StatusReport, StopReport, StopTarget,
};

//! File-backed persistence: accounts, proxies, and session journals.

pub mod accounts;
pub mod journal;
pub mod proxies;

pub use accounts::AccountStore;
pub use journal::{FileJournal, Journal, MemoryJournal};

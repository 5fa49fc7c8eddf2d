//! Operator console: command grammar, execution and the stdin loop.

pub mod commands;
pub mod dispatch;
pub mod repl;

pub use commands::{parse_line, ControlCommand};
pub use dispatch::{execute, render, CommandOutput};
pub use repl::run_console;

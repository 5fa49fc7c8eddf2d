//! Control-plane command grammar.
//!
//! One [`ControlCommand`] type serves both surfaces: the console parses it
//! from a text line, the IPC server deserializes it from a JSON request
//! (`{"command": "start", "address": "...", "count": 3}`).

use serde::{Deserialize, Serialize};

use crate::orchestrator::ActionFlag;
use crate::{AppError, Result};

/// Lines shown by `help`.
pub const HELP: &[&str] = &[
    "start [address] [count]   start sessions (defaults: configured server, all accounts)",
    "stop [identity|all]       stop one session or all of them (default: all)",
    "chat <text>               send chat from every session",
    "say <identity> <text>     send chat from one session",
    "status                    list sessions and flags",
    "walk|run|fight|spam on|off  toggle an action",
    "players [host:port]       query a server's public status",
    "logs <identity>           last 20 lines of a session's log",
    "reloadproxies             re-read the proxies file",
    "help                      this list",
    "exit                      stop everything and quit",
];

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Start sessions.
    Start {
        /// `host[:port]`; the configured default when absent.
        #[serde(default)]
        address: Option<String>,
        /// Session count; every account when absent.
        #[serde(default)]
        count: Option<usize>,
    },
    /// Stop sessions.
    Stop {
        /// Identity or `all`; `all` when absent.
        #[serde(default)]
        target: Option<String>,
    },
    /// Broadcast chat.
    Chat {
        /// Message text.
        text: String,
    },
    /// Chat from one session.
    Say {
        /// Sending identity.
        identity: String,
        /// Message text.
        text: String,
    },
    /// Session and flag overview.
    Status,
    /// Toggle an action.
    Flag {
        /// Which action.
        flag: ActionFlag,
        /// New value.
        on: bool,
    },
    /// Remote server status.
    Players {
        /// `host[:port]`; the configured default when absent.
        #[serde(default)]
        address: Option<String>,
    },
    /// Tail a session log.
    Logs {
        /// Identity whose log to show.
        identity: String,
    },
    /// Re-read the proxies file.
    ReloadProxies,
    /// Show the command list.
    Help,
    /// Stop everything and quit.
    Exit,
}

/// Parse one console line. A leading `/` is accepted and ignored.
///
/// Returns `Ok(None)` for a blank line.
///
/// # Errors
///
/// Returns `AppError::InvalidCommand` for unknown verbs, missing arguments
/// or malformed numbers.
pub fn parse_line(line: &str) -> Result<Option<ControlCommand>> {
    let line = line.trim();
    let line = line.strip_prefix('/').unwrap_or(line);
    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };
    if verb.is_empty() {
        return Ok(None);
    }

    let command = match verb {
        "start" => parse_start(rest)?,
        "stop" => ControlCommand::Stop {
            target: non_empty(rest),
        },
        "chat" => ControlCommand::Chat {
            text: required(rest, "usage: chat <text>")?,
        },
        "say" => {
            let (identity, text) = rest
                .split_once(char::is_whitespace)
                .map(|(who, text)| (who, text.trim()))
                .filter(|(_, text)| !text.is_empty())
                .ok_or_else(|| AppError::InvalidCommand("usage: say <identity> <text>".into()))?;
            ControlCommand::Say {
                identity: identity.to_owned(),
                text: text.to_owned(),
            }
        }
        "status" => ControlCommand::Status,
        "walk" | "run" | "fight" | "spam" => ControlCommand::Flag {
            flag: verb.parse()?,
            on: parse_switch(verb, rest)?,
        },
        "players" => ControlCommand::Players {
            address: non_empty(rest),
        },
        "logs" => ControlCommand::Logs {
            identity: required(rest, "usage: logs <identity>")?,
        },
        "reloadproxies" => ControlCommand::ReloadProxies,
        "help" => ControlCommand::Help,
        "exit" | "quit" => ControlCommand::Exit,
        other => {
            return Err(AppError::InvalidCommand(format!(
                "unknown command '{other}', type help"
            )))
        }
    };
    Ok(Some(command))
}

fn parse_start(rest: &str) -> Result<ControlCommand> {
    let mut args = rest.split_whitespace();
    let address = args.next().map(ToOwned::to_owned);
    let count = match args.next() {
        None => None,
        Some(raw) => match raw.parse::<usize>() {
            Ok(0) => return Err(AppError::InvalidCommand("count must be at least 1".into())),
            Ok(count) => Some(count),
            Err(_) => {
                return Err(AppError::InvalidCommand(format!(
                    "count must be a number, got '{raw}'"
                )))
            }
        },
    };
    if args.next().is_some() {
        return Err(AppError::InvalidCommand(
            "usage: start [address] [count]".into(),
        ));
    }
    Ok(ControlCommand::Start { address, count })
}

fn parse_switch(verb: &str, rest: &str) -> Result<bool> {
    match rest {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(AppError::InvalidCommand(format!("usage: {verb} on|off"))),
    }
}

fn required(rest: &str, usage: &str) -> Result<String> {
    non_empty(rest).ok_or_else(|| AppError::InvalidCommand(usage.to_owned()))
}

fn non_empty(rest: &str) -> Option<String> {
    if rest.is_empty() {
        None
    } else {
        Some(rest.to_owned())
    }
}

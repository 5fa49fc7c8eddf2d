#![forbid(unsafe_code)]

//! `mc-herd-ctl` — local CLI companion for `mc-herd`.
//!
//! Connects to the IPC socket and sends JSON commands to a running
//! orchestrator, so sessions can be driven without the interactive console.

use std::io::{BufRead, BufReader, Write};

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};

#[derive(Debug, Parser)]
#[command(
    name = "mc-herd-ctl",
    about = "Local CLI for a running mc-herd orchestrator",
    version,
    long_about = None
)]
struct Cli {
    /// IPC socket name (must match the server's `ipc_name` config).
    #[arg(long, default_value = "mc-herd")]
    ipc_name: String,

    #[command(subcommand)]
    command: Command,
}

/// Action toggles, named as on the console.
#[derive(Debug, Copy, Clone, Eq, PartialEq, clap::ValueEnum)]
enum Flag {
    /// Walk forward in random bursts.
    Walk,
    /// Sprint during bursts.
    Run,
    /// Attack the nearest player.
    Fight,
    /// Occasionally send spam chat.
    Spam,
}

impl Flag {
    fn wire_name(self) -> &'static str {
        match self {
            Self::Walk => "movement",
            Self::Run => "sprint",
            Self::Fight => "combat",
            Self::Spam => "chat_spam",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, clap::ValueEnum)]
enum Switch {
    On,
    Off,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start sessions.
    Start {
        /// Server address (`host[:port]`); the configured default when omitted.
        address: Option<String>,
        /// Number of sessions; every account when omitted.
        count: Option<usize>,
    },

    /// Stop one session, or all of them.
    Stop {
        /// Identity to stop, or `all`.
        #[arg(default_value = "all")]
        target: String,
    },

    /// Send chat from every session.
    Chat {
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Send chat from one session.
    Say {
        /// Sending identity.
        identity: String,
        /// Message text.
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },

    /// Show sessions and action flags.
    Status,

    /// Turn an action on or off.
    Flag {
        /// Which action.
        #[arg(value_enum)]
        flag: Flag,
        /// New value.
        #[arg(value_enum)]
        switch: Switch,
    },

    /// Query a server's public status.
    Players {
        /// Server address (`host[:port]`); the configured default when omitted.
        address: Option<String>,
    },

    /// Show the tail of a session log.
    Logs {
        /// Identity whose log to show.
        identity: String,
    },

    /// Re-read the proxies file.
    ReloadProxies,
}

fn main() {
    let args = Cli::parse();

    let request_json = match &args.command {
        Command::Start { address, count } => {
            let mut req = serde_json::json!({ "command": "start" });
            if let Some(address) = address {
                req["address"] = serde_json::Value::String(address.clone());
            }
            if let Some(count) = count {
                req["count"] = serde_json::json!(count);
            }
            req
        }
        Command::Stop { target } => {
            serde_json::json!({ "command": "stop", "target": target })
        }
        Command::Chat { text } => {
            serde_json::json!({ "command": "chat", "text": text.join(" ") })
        }
        Command::Say { identity, text } => {
            serde_json::json!({ "command": "say", "identity": identity, "text": text.join(" ") })
        }
        Command::Status => serde_json::json!({ "command": "status" }),
        Command::Flag { flag, switch } => serde_json::json!({
            "command": "flag",
            "flag": flag.wire_name(),
            "on": *switch == Switch::On,
        }),
        Command::Players { address } => {
            let mut req = serde_json::json!({ "command": "players" });
            if let Some(address) = address {
                req["address"] = serde_json::Value::String(address.clone());
            }
            req
        }
        Command::Logs { identity } => {
            serde_json::json!({ "command": "logs", "identity": identity })
        }
        Command::ReloadProxies => serde_json::json!({ "command": "reload_proxies" }),
    };

    match send_ipc_command(&args.ipc_name, &request_json) {
        Ok(response) => {
            if let Some(obj) = response.as_object() {
                let ok = obj
                    .get("ok")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ok {
                    if let Some(data) = obj.get("data") {
                        println!("{}", serde_json::to_string_pretty(data).unwrap_or_default());
                    } else {
                        println!("OK");
                    }
                } else {
                    let err_msg = obj
                        .get("error")
                        .and_then(|v| v.as_str())
                        .unwrap_or("unknown error");
                    eprintln!("Error: {err_msg}");
                    std::process::exit(1);
                }
            } else {
                println!("{response}");
            }
        }
        Err(err) => {
            eprintln!("Failed to connect to server: {err}");
            eprintln!("Is mc-herd running with ipc_name '{}'?", args.ipc_name);
            std::process::exit(1);
        }
    }
}

/// Connect to the IPC socket, send a JSON command, and read the response.
fn send_ipc_command(
    ipc_name: &str,
    request: &serde_json::Value,
) -> std::result::Result<serde_json::Value, Box<dyn std::error::Error>> {
    let name = ipc_name.to_ns_name::<GenericNamespaced>()?;
    let mut stream = Stream::connect(name)?;

    let mut request_line = serde_json::to_string(request)?;
    request_line.push('\n');
    stream.write_all(request_line.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(&stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: serde_json::Value = serde_json::from_str(response_line.trim())?;
    Ok(response)
}

//! Execute a [`ControlCommand`] against the orchestrator.

use serde::Serialize;

use crate::console::commands::{ControlCommand, HELP};
use crate::models::ServerAddress;
use crate::orchestrator::{
    ActionFlag, BroadcastReport, Orchestrator, StartReport, StatusReport, StopReport, StopTarget,
};
use crate::status::RemoteStatus;
use crate::Result;

/// Lines returned by `logs`.
pub const LOG_TAIL_LINES: usize = 20;

/// Structured result of one command.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Sessions started.
    Started(StartReport),
    /// Sessions stopped.
    Stopped(StopReport),
    /// Broadcast delivered.
    Broadcast(BroadcastReport),
    /// Single chat sent.
    Sent {
        /// Sending identity.
        identity: String,
    },
    /// Session overview.
    Status(StatusReport),
    /// Flag changed.
    Flag {
        /// Which action.
        flag: ActionFlag,
        /// New value.
        on: bool,
    },
    /// Remote server status.
    Players(RemoteStatus),
    /// Log tail.
    Logs {
        /// Identity the lines belong to.
        identity: String,
        /// Lines, oldest first.
        lines: Vec<String>,
    },
    /// Proxy list reloaded.
    ProxiesReloaded {
        /// New list length.
        count: usize,
    },
    /// Command list.
    Help {
        /// One line per command.
        lines: Vec<String>,
    },
    /// Quit requested.
    Exit,
}

/// Run `command`.
///
/// # Errors
///
/// Propagates the orchestrator's error for the operation.
pub async fn execute(orchestrator: &Orchestrator, command: ControlCommand) -> Result<CommandOutput> {
    match command {
        ControlCommand::Start { address, count } => {
            let server = resolve_address(orchestrator, address.as_deref())?;
            let count = count.unwrap_or_else(|| orchestrator.account_count());
            orchestrator
                .start(server, count)
                .await
                .map(CommandOutput::Started)
        }
        ControlCommand::Stop { target } => {
            let target = match target {
                Some(raw) => raw.parse()?,
                None => StopTarget::All,
            };
            orchestrator.stop(target).await.map(CommandOutput::Stopped)
        }
        ControlCommand::Chat { text } => Ok(CommandOutput::Broadcast(
            orchestrator.broadcast_chat(&text).await,
        )),
        ControlCommand::Say { identity, text } => {
            orchestrator.send_chat(&identity, &text).await?;
            Ok(CommandOutput::Sent { identity })
        }
        ControlCommand::Status => Ok(CommandOutput::Status(orchestrator.status_snapshot().await)),
        ControlCommand::Flag { flag, on } => {
            orchestrator.set_flag(flag, on);
            Ok(CommandOutput::Flag { flag, on })
        }
        ControlCommand::Players { address } => {
            let server = resolve_address(orchestrator, address.as_deref())?;
            orchestrator
                .query_remote_status(&server.host, server.port)
                .await
                .map(CommandOutput::Players)
        }
        ControlCommand::Logs { identity } => {
            let lines = orchestrator.logs(&identity, LOG_TAIL_LINES)?;
            Ok(CommandOutput::Logs { identity, lines })
        }
        ControlCommand::ReloadProxies => orchestrator
            .reload_proxies()
            .map(|count| CommandOutput::ProxiesReloaded { count }),
        ControlCommand::Help => Ok(CommandOutput::Help {
            lines: HELP.iter().map(|line| (*line).to_owned()).collect(),
        }),
        ControlCommand::Exit => Ok(CommandOutput::Exit),
    }
}

fn resolve_address(orchestrator: &Orchestrator, raw: Option<&str>) -> Result<ServerAddress> {
    match raw {
        Some(raw) => raw.parse(),
        None => orchestrator.default_server(),
    }
}

/// Human-readable rendering for the console.
#[must_use]
pub fn render(output: &CommandOutput) -> Vec<String> {
    match output {
        CommandOutput::Started(report) => {
            let mut lines = Vec::new();
            if report.attempted < report.requested {
                lines.push(format!(
                    "only {} accounts available; starting {}",
                    report.attempted, report.attempted
                ));
            }
            lines.push(format!(
                "started {}, already running {}, failed {}",
                report.started.len(),
                report.skipped.len(),
                report.failed.len()
            ));
            lines.extend(
                report
                    .failed
                    .iter()
                    .map(|(identity, reason)| format!("  {identity}: {reason}")),
            );
            lines
        }
        CommandOutput::Stopped(report) => match report.stopped.as_slice() {
            [] => vec!["no sessions running".to_owned()],
            [one] => vec![format!("stopped {one}")],
            many => vec![format!("stopped {} sessions", many.len())],
        },
        CommandOutput::Broadcast(report) => vec![format!(
            "broadcast delivered to {} sessions ({} failed)",
            report.delivered, report.failed
        )],
        CommandOutput::Sent { identity } => vec![format!("sent as {identity}")],
        CommandOutput::Status(report) => render_status(report),
        CommandOutput::Flag { flag, on } => {
            vec![format!("{flag} {}", if *on { "on" } else { "off" })]
        }
        CommandOutput::Players(status) => {
            let mut lines = vec![
                format!("version: {} (protocol {})", status.version, status.protocol),
                format!("players: {}/{}", status.online, status.max),
                format!("motd: {}", status.motd),
                format!("latency: {} ms", status.latency_ms),
            ];
            if !status.sample.is_empty() {
                lines.push(format!("sample: {}", status.sample.join(", ")));
            }
            lines
        }
        CommandOutput::Logs { identity, lines } => {
            let mut out = vec![format!("--- {identity} (last {}) ---", lines.len())];
            out.extend(lines.iter().cloned());
            out
        }
        CommandOutput::ProxiesReloaded { count } => vec![format!("loaded {count} proxies")],
        CommandOutput::Help { lines } => {
            let mut out = vec!["commands (a leading / is optional):".to_owned()];
            out.extend(lines.iter().map(|line| format!("  {line}")));
            out
        }
        CommandOutput::Exit => vec!["shutting down".to_owned()],
    }
}

fn render_status(report: &StatusReport) -> Vec<String> {
    let flags = report.flags;
    let switch = |on: bool| if on { "on" } else { "off" };
    let mut lines = vec![
        "--- status ---".to_owned(),
        format!(
            "accounts: {}  proxies: {}  running: {}  interactive: {}",
            report.accounts, report.proxies, report.running, report.interactive
        ),
        format!(
            "walk: {}  run: {}  fight: {}  spam: {}",
            switch(flags.movement),
            switch(flags.sprint),
            switch(flags.combat),
            switch(flags.chat_spam)
        ),
    ];
    lines.extend(report.sessions.iter().map(|s| {
        let proxy = s
            .proxy
            .as_ref()
            .map_or_else(|| "direct".to_owned(), ToString::to_string);
        format!(
            "  {:<16} {:<12} {} via {} (reconnects: {})",
            s.identity,
            s.state.label(),
            s.server,
            proxy,
            s.reconnect_attempts
        )
    }));
    lines
}

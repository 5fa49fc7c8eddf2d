//! Local IPC server for `mc-herd-ctl`.
//!
//! Listens on a named pipe (Windows) or Unix domain socket (Linux/macOS)
//! using the `interprocess` crate. Requests are the console commands in
//! JSON form and run through the same dispatcher.
//!
//! ## Protocol
//!
//! Request (one JSON object per line):
//! ```json
//! {"command": "start", "address": "localhost:25565", "count": 5}
//! {"command": "stop", "target": "all"}
//! {"command": "say", "identity": "bot_1", "text": "hello"}
//! {"command": "flag", "flag": "combat", "on": true}
//! {"command": "status"}
//! ```
//!
//! Response (one JSON object per line):
//! ```json
//! {"ok": true, "data": { ... } }
//! {"ok": false, "error": "not found: bot_9 is not running"}
//! ```

use std::sync::Arc;

use interprocess::local_socket::{tokio::prelude::*, GenericNamespaced, ListenerOptions};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::console::{execute, ControlCommand};
use crate::orchestrator::Orchestrator;
use crate::{AppError, Result};

/// Outbound IPC response to `mc-herd-ctl`.
#[derive(Debug, Serialize)]
pub struct IpcResponse {
    /// Whether the command succeeded.
    pub ok: bool,
    /// Payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    /// Error message on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IpcResponse {
    fn success(data: serde_json::Value) -> Self {
        Self {
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Spawn the IPC server task.
///
/// # Errors
///
/// Returns `AppError::Ipc` if the listener cannot be created.
pub fn spawn_ipc_server(
    name: &str,
    orchestrator: Arc<Orchestrator>,
    ct: CancellationToken,
) -> Result<tokio::task::JoinHandle<()>> {
    let name = name.to_owned();

    let listener_name = name
        .clone()
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid ipc socket name '{name}': {err}")))?;

    let listener = ListenerOptions::new()
        .name(listener_name)
        .create_tokio()
        .map_err(|err| AppError::Ipc(format!("failed to create ipc listener: {err}")))?;

    info!(ipc_name = %name, "IPC server listening");

    let span = info_span!("ipc_server", name = %name);
    let handle = tokio::spawn(
        async move {
            loop {
                tokio::select! {
                    () = ct.cancelled() => {
                        info!("IPC server shutting down");
                        break;
                    }
                    accept_result = listener.accept() => {
                        match accept_result {
                            Ok(stream) => {
                                let orchestrator = Arc::clone(&orchestrator);
                                tokio::spawn(handle_connection(stream, orchestrator, ct.clone()));
                            }
                            Err(err) => {
                                warn!(%err, "IPC accept failed");
                            }
                        }
                    }
                }
            }
        }
        .instrument(span),
    );

    Ok(handle)
}

/// Handle a single IPC client connection.
async fn handle_connection(
    stream: interprocess::local_socket::tokio::Stream,
    orchestrator: Arc<Orchestrator>,
    ct: CancellationToken,
) {
    let span = info_span!("ipc_conn");
    async move {
        let (reader, mut writer) = stream.split();
        let mut buf_reader = BufReader::new(reader);
        let mut line = String::new();

        loop {
            line.clear();
            let read = tokio::select! {
                () = ct.cancelled() => break,
                read = buf_reader.read_line(&mut line) => read,
            };
            match read {
                Ok(0) => break,
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    let response = handle_request(trimmed, &orchestrator).await;

                    let mut response_line = serde_json::to_string(&response).unwrap_or_else(|_| {
                        r#"{"ok":false,"error":"serialization failed"}"#.to_owned()
                    });
                    response_line.push('\n');

                    if let Err(err) = writer.write_all(response_line.as_bytes()).await {
                        warn!(%err, "failed to write ipc response");
                        break;
                    }
                }
                Err(err) => {
                    warn!(%err, "ipc read error");
                    break;
                }
            }
        }

        info!("IPC connection closed");
    }
    .instrument(span)
    .await;
}

/// Decode one request line and run it.
pub async fn handle_request(raw: &str, orchestrator: &Orchestrator) -> IpcResponse {
    let command = match serde_json::from_str::<ControlCommand>(raw) {
        Ok(command) => command,
        Err(err) => return IpcResponse::error(format!("invalid request: {err}")),
    };
    if command == ControlCommand::Exit {
        return IpcResponse::error("exit is only available from the console");
    }

    let span = info_span!("ipc_command", ?command);
    let result = execute(orchestrator, command).instrument(span).await;
    match result {
        Ok(output) => match serde_json::to_value(&output) {
            Ok(data) => IpcResponse::success(data),
            Err(err) => IpcResponse::error(format!("serialization failed: {err}")),
        },
        Err(err) => IpcResponse::error(err.to_string()),
    }
}

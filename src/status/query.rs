//! Server-list-ping status query.

use std::time::{Duration, Instant};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::{debug, info_span, Instrument};

use crate::status::codec::{get_string, get_varint, put_string, put_varint, PingFrameCodec};
use crate::{AppError, Result};

/// Protocol version sent in the handshake; `-1` asks the server to report
/// its own.
const HANDSHAKE_PROTOCOL: i32 = -1;
const NEXT_STATE_STATUS: i32 = 1;
const PACKET_HANDSHAKE: i32 = 0x00;
const PACKET_STATUS: i32 = 0x00;

/// What a server reports about itself.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RemoteStatus {
    /// Version name (e.g. `1.20.4`).
    pub version: String,
    /// Protocol number.
    pub protocol: i32,
    /// Players online.
    pub online: u32,
    /// Player slots.
    pub max: u32,
    /// Names in the player sample.
    pub sample: Vec<String>,
    /// Message of the day as plain text.
    pub motd: String,
    /// Round trip from status request to response, in milliseconds.
    pub latency_ms: u64,
}

#[derive(Deserialize)]
struct RawStatus {
    version: RawVersion,
    #[serde(default)]
    players: Option<RawPlayers>,
    #[serde(default)]
    description: Option<Value>,
}

#[derive(Deserialize)]
struct RawVersion {
    name: String,
    protocol: i32,
}

#[derive(Deserialize)]
struct RawPlayers {
    #[serde(default)]
    max: u32,
    #[serde(default)]
    online: u32,
    #[serde(default)]
    sample: Vec<RawSample>,
}

#[derive(Deserialize)]
struct RawSample {
    name: String,
}

/// Query `host:port`, giving up after `timeout`.
///
/// # Errors
///
/// Returns `AppError::Status` on connect failure, timeout, a malformed
/// response or an early close.
pub async fn query_status(host: &str, port: u16, timeout: Duration) -> Result<RemoteStatus> {
    let span = info_span!("status_query", host, port);
    tokio::time::timeout(timeout, exchange(host, port))
        .instrument(span)
        .await
        .map_err(|_| {
            AppError::Status(format!(
                "{host}:{port} did not answer within {} ms",
                timeout.as_millis()
            ))
        })?
}

async fn exchange(host: &str, port: u16) -> Result<RemoteStatus> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| AppError::Status(format!("connect to {host}:{port} failed: {e}")))?;
    let mut framed = Framed::new(stream, PingFrameCodec::new());

    framed.send(handshake_packet(host, port)).await?;
    let sent_at = Instant::now();
    framed.send(status_request_packet()).await?;

    let frame = framed
        .next()
        .await
        .ok_or_else(|| AppError::Status("server closed the connection".into()))??;
    let latency = sent_at.elapsed();
    let json = read_status_response(frame)?;
    debug!(bytes = json.len(), "status response received");

    let mut status = parse_status_json(&json)?;
    status.latency_ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
    Ok(status)
}

/// Handshake body announcing a status request.
#[must_use]
pub fn handshake_packet(host: &str, port: u16) -> Bytes {
    let mut body = BytesMut::new();
    put_varint(&mut body, PACKET_HANDSHAKE);
    put_varint(&mut body, HANDSHAKE_PROTOCOL);
    put_string(&mut body, host);
    body.put_u16(port);
    put_varint(&mut body, NEXT_STATE_STATUS);
    body.freeze()
}

/// Empty status request body.
#[must_use]
pub fn status_request_packet() -> Bytes {
    let mut body = BytesMut::new();
    put_varint(&mut body, PACKET_STATUS);
    body.freeze()
}

/// Extract the JSON document from a status response body.
///
/// # Errors
///
/// Returns `AppError::Status` if the packet id is unexpected or the string
/// is malformed.
pub fn read_status_response(mut frame: Bytes) -> Result<String> {
    let id = get_varint(&mut frame)?;
    if id != PACKET_STATUS {
        return Err(AppError::Status(format!(
            "unexpected packet id {id:#04x} in status response"
        )));
    }
    let json = get_string(&mut frame)?;
    if frame.has_remaining() {
        debug!(trailing = frame.remaining(), "ignoring trailing bytes");
    }
    Ok(json)
}

/// Parse the status JSON. `latency_ms` is left at zero.
///
/// # Errors
///
/// Returns `AppError::Status` if required fields are missing.
pub fn parse_status_json(json: &str) -> Result<RemoteStatus> {
    let raw: RawStatus = serde_json::from_str(json)
        .map_err(|e| AppError::Status(format!("invalid status response: {e}")))?;
    let players = raw.players.unwrap_or(RawPlayers {
        max: 0,
        online: 0,
        sample: Vec::new(),
    });
    Ok(RemoteStatus {
        version: raw.version.name,
        protocol: raw.version.protocol,
        online: players.online,
        max: players.max,
        sample: players.sample.into_iter().map(|s| s.name).collect(),
        motd: raw
            .description
            .as_ref()
            .map(flatten_motd)
            .unwrap_or_default(),
        latency_ms: 0,
    })
}

/// Plain text of a chat component: `text` followed by every `extra`
/// child, with `§` formatting codes removed.
#[must_use]
pub fn flatten_motd(component: &Value) -> String {
    let mut out = String::new();
    collect_text(component, &mut out);
    strip_formatting(&out)
}

fn collect_text(component: &Value, out: &mut String) {
    match component {
        Value::String(text) => out.push_str(text),
        Value::Array(parts) => parts.iter().for_each(|part| collect_text(part, out)),
        Value::Object(map) => {
            if let Some(Value::String(text)) = map.get("text") {
                out.push_str(text);
            }
            if let Some(Value::Array(extra)) = map.get("extra") {
                extra.iter().for_each(|part| collect_text(part, out));
            }
        }
        _ => {}
    }
}

fn strip_formatting(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '§' {
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

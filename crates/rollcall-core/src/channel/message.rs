//! Push channel wire format
//!
//! The backend pushes events over Socket.IO (protocol 5) on top of the
//! Engine.IO (protocol 4) WebSocket transport. Every WebSocket text message
//! is one packet: an Engine.IO type digit, and for message packets a
//! Socket.IO type digit, optionally a namespace and ack id, then JSON.
//!
//! ```text
//! 0{"sid":"...","pingInterval":25000,"pingTimeout":20000}   open
//! 2 / 3                                                     ping / pong
//! 40                                                        namespace connect
//! 42["add",{"_id":"...","name":"..."}]                      event
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{SyncError, SyncResult};
use crate::models::{take_id, User};
use crate::roster::SyncEvent;

/// Event raised when a viewer connects
pub const VISITOR_ENTERS: &str = "visitor enters";
/// Event raised when a viewer disconnects
pub const VISITOR_EXITS: &str = "visitor exits";
/// Event raised when a user is created
pub const ADD: &str = "add";
/// Event raised when a user is changed
pub const UPDATE: &str = "update";
/// Event raised when a user is deleted
pub const DELETE: &str = "delete";

/// Handshake data sent by the server when the transport opens
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    #[serde(default)]
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

impl OpenInfo {
    /// Engine.IO defaults, used when the server omits the timings
    const DEFAULT_PING_INTERVAL_MS: u64 = 25_000;
    const DEFAULT_PING_TIMEOUT_MS: u64 = 20_000;

    /// How long the connection may stay silent before the peer is
    /// considered gone
    ///
    /// The server pings every `ping_interval` and waits `ping_timeout` for
    /// the reply, so nothing at all for the sum of both means it is dead.
    pub fn liveness_timeout(&self) -> Duration {
        let interval = match self.ping_interval {
            0 => Self::DEFAULT_PING_INTERVAL_MS,
            ms => ms,
        };
        let timeout = match self.ping_timeout {
            0 => Self::DEFAULT_PING_TIMEOUT_MS,
            ms => ms,
        };
        Duration::from_millis(interval.saturating_add(timeout))
    }
}

/// One packet on the push channel
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Transport opened
    Open(OpenInfo),
    /// Transport closing
    Close,
    /// Heartbeat from the server
    Ping,
    /// Heartbeat reply
    Pong,
    /// Namespace connected
    Connect,
    /// Namespace disconnected by the server
    Disconnect,
    /// Server refused the namespace connection
    ConnectError(String),
    /// Named event with its payload
    Event { name: String, payload: Value },
    /// Anything this client does not act on (acks, binary, upgrade, noop)
    Ignored,
}

impl Frame {
    /// Parse a text packet
    pub fn parse(text: &str) -> SyncResult<Frame> {
        let mut chars = text.chars();
        let Some(kind) = chars.next() else {
            return Err(SyncError::Channel("empty packet".to_string()));
        };
        let rest = chars.as_str();

        match kind {
            '0' => {
                let info = serde_json::from_str::<OpenInfo>(rest)
                    .map_err(|e| SyncError::Channel(format!("invalid open packet: {}", e)))?;
                Ok(Frame::Open(info))
            }
            '1' => Ok(Frame::Close),
            '2' => Ok(Frame::Ping),
            '3' => Ok(Frame::Pong),
            '4' => parse_message(rest),
            '5' | '6' => Ok(Frame::Ignored),
            other => Err(SyncError::Channel(format!(
                "unknown packet type '{}'",
                other
            ))),
        }
    }

    /// Encode a packet sent by this client
    pub fn encode(&self) -> String {
        match self {
            Frame::Close => "1".to_string(),
            Frame::Ping => "2".to_string(),
            Frame::Pong => "3".to_string(),
            Frame::Connect => "40".to_string(),
            Frame::Disconnect => "41".to_string(),
            Frame::Event { name, payload } => {
                format!("42{}", Value::Array(vec![Value::from(name.as_str()), payload.clone()]))
            }
            // Server-only packets
            Frame::Open(_) | Frame::ConnectError(_) | Frame::Ignored => "6".to_string(),
        }
    }
}

/// Parse the Socket.IO part of an Engine.IO message packet
fn parse_message(body: &str) -> SyncResult<Frame> {
    let mut chars = body.chars();
    let Some(kind) = chars.next() else {
        return Ok(Frame::Ignored);
    };
    let data = strip_ack_id(strip_namespace(chars.as_str()));

    match kind {
        '0' => Ok(Frame::Connect),
        '1' => Ok(Frame::Disconnect),
        '2' => parse_event(data),
        '4' => {
            let message = serde_json::from_str::<Value>(data)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
                .unwrap_or_else(|| data.to_string());
            Ok(Frame::ConnectError(message))
        }
        _ => Ok(Frame::Ignored),
    }
}

/// Drop a leading "/namespace," if present
fn strip_namespace(data: &str) -> &str {
    if data.starts_with('/') {
        match data.find(',') {
            Some(pos) => &data[pos + 1..],
            None => "",
        }
    } else {
        data
    }
}

/// Drop a leading numeric ack id if present
fn strip_ack_id(data: &str) -> &str {
    data.trim_start_matches(|c: char| c.is_ascii_digit())
}

fn parse_event(data: &str) -> SyncResult<Frame> {
    let value: Value = serde_json::from_str(data)
        .map_err(|e| SyncError::malformed("event", format!("invalid JSON: {}", e)))?;

    let Value::Array(mut items) = value else {
        return Err(SyncError::malformed("event", "expected a JSON array"));
    };
    if items.is_empty() {
        return Err(SyncError::malformed("event", "missing event name"));
    }

    let payload = if items.len() > 1 {
        items.swap_remove(1)
    } else {
        Value::Null
    };
    let Value::String(name) = items.swap_remove(0) else {
        return Err(SyncError::malformed("event", "event name is not a string"));
    };

    Ok(Frame::Event { name, payload })
}

/// Turn a named channel event into a roster event
///
/// Returns `Ok(None)` for events the roster does not care about.
pub fn decode_event(name: &str, payload: Value) -> SyncResult<Option<SyncEvent>> {
    let event = match name {
        VISITOR_ENTERS | VISITOR_EXITS => {
            let count = payload
                .as_u64()
                .ok_or_else(|| SyncError::malformed(name, "expected a non-negative integer"))?;
            SyncEvent::PresenceChanged(count)
        }
        ADD => SyncEvent::Added(user_from_payload(name, payload)?),
        UPDATE => SyncEvent::Updated(user_from_payload(name, payload)?),
        DELETE => {
            let mut fields = object_payload(name, payload)?;
            let id = take_id(&mut fields).map_err(|reason| SyncError::malformed(name, reason))?;
            SyncEvent::Removed(id)
        }
        _ => return Ok(None),
    };
    Ok(Some(event))
}

fn object_payload(event: &str, payload: Value) -> SyncResult<Map<String, Value>> {
    match payload {
        Value::Object(fields) => Ok(fields),
        _ => Err(SyncError::malformed(event, "expected a JSON object")),
    }
}

fn user_from_payload(event: &str, payload: Value) -> SyncResult<User> {
    let fields = object_payload(event, payload)?;
    User::from_fields(fields).map_err(|reason| SyncError::malformed(event, reason))
}

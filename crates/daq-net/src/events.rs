//! Typed notifications the engines hand back to their host, replacing the
//! source protocol's Qt signal/slot pairs.

use daq_proto::{Array, Role, Scalar};
use mio::Token;
use tracing::Level;

/// A status-log line, delivered alongside (not instead of) a `tracing` event.
#[derive(Debug, Clone)]
pub struct StatusLog {
    pub message: String,
    pub level: Level,
}

impl StatusLog {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self { level, message: message.into() }
    }
}

/// Notifications emitted by the client engine.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Connect sequence (TCP connect, role send, initial `Infos`) completed.
    Connected,
    /// The connection was torn down, whether by request, peer close, or error.
    Disconnected,
    /// Emitted right after `Connected`, asking the host to push axis data if
    /// it has any (mirrors the source's post-connect axis upload prompt).
    GetAxis,
    /// Server asked for an absolute move.
    MoveAbs(Scalar),
    /// Server asked for a relative move.
    MoveRel(Scalar),
    /// Server requested an x-axis frame.
    XAxisRequest,
    /// Server requested a y-axis frame.
    YAxisRequest,
    /// Any inbound command outside the above, forwarded verbatim.
    Command { name: String },
    Status(StatusLog),
}

/// Outbound requests the host enqueues for the client engine to translate
/// into wire traffic.
#[derive(Debug, Clone)]
pub enum ClientCommand {
    /// Completed data production; first item's arrays are sent as `"Done"`.
    DataReady(Vec<Array>),
    /// A settings-leaf delta: path (including the repeated mirror-root
    /// segment) plus the XML serialization of the new value.
    SendInfo { path: Vec<String>, xml: String },
    PositionIs(Scalar),
    MoveDone(Scalar),
    XAxis { data: Array, label: String, units: String },
    YAxis { data: Array, label: String, units: String },
    UpdateConnection { ip: String, port: u16 },
    Quit,
}

/// Notifications emitted by the server engine.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    PeerAttached { token: Token, role: Role, addr: String },
    PeerRemoved { token: Token, role: Role },
    PositionIs { token: Token, role: Role, value: Scalar },
    MoveDone { token: Token, role: Role, value: Scalar },
    Status(StatusLog),
}

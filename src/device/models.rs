use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::frame::MessageKind;

/// Device connection state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Details of the live connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub session_id: Uuid,
    pub port_name: String,
    pub connected_at: DateTime<Utc>,
}

/// Session activity for presentation layers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// Text exactly as received, for a terminal view
    RawText { text: String },
    /// A complete frame; `kind` is `None` when it was discarded
    Frame { kind: Option<MessageKind>, raw: String },
    /// A command written to the device
    CommandSent { command: String },
    /// Link-level notices such as end of stream or a transport fault
    Notice { message: String },
}

use serde::{Deserialize, Serialize};

use super::{FRAME_END, FRAME_START};

/// One complete `*...#` message from the device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Leading `*` through the first delimiter, e.g. `*MAC:` or `*TCP-`
    pub prefix: String,
    /// Everything after the prefix, terminator included
    pub body: String,
    /// The whole matched frame
    pub raw: String,
}

const TOKEN_DELIMITERS: [char; 5] = [':', ',', '-', ' ', FRAME_END];

impl Frame {
    pub fn new(matched: &str) -> Self {
        let raw = matched.trim();
        let split_at = raw
            .char_indices()
            .skip(1)
            .find(|(_, c)| TOKEN_DELIMITERS.contains(c))
            .map(|(i, c)| i + c.len_utf8())
            .unwrap_or(raw.len());

        Self {
            prefix: raw[..split_at].to_string(),
            body: raw[split_at..].to_string(),
            raw: raw.to_string(),
        }
    }

    /// Frame text between the markers
    pub fn content(&self) -> &str {
        let inner = self.raw.strip_prefix(FRAME_START).unwrap_or(&self.raw);
        inner.strip_suffix(FRAME_END).unwrap_or(inner)
    }

    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::classify(&self.raw)
    }
}

/// Message kinds, resolved from the frame prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    Identity,
    Firmware,
    Networks,
    Heartbeat,
    TcpFailed,
    TcpRestored,
    WifiConnected,
    Mqtt,
    WifiFailed,
    Counters,
    Pulses,
}

// Evaluated top to bottom, first match wins
const PREFIX_TABLE: [(&str, MessageKind); 11] = [
    ("*MAC:", MessageKind::Identity),
    ("*FW:", MessageKind::Firmware),
    ("*SSID,", MessageKind::Networks),
    ("*HBT-", MessageKind::Heartbeat),
    ("*TCP-NOTOK#", MessageKind::TcpFailed),
    ("*TCP-OK#", MessageKind::TcpRestored),
    ("*WiFi:", MessageKind::WifiConnected),
    ("*MQTT,", MessageKind::Mqtt),
    ("*WiFi failed bit set", MessageKind::WifiFailed),
    ("*TC,", MessageKind::Counters),
    ("*CHENA:", MessageKind::Pulses),
];

impl MessageKind {
    pub fn classify(raw: &str) -> Option<Self> {
        PREFIX_TABLE
            .iter()
            .find(|(prefix, _)| raw.starts_with(prefix))
            .map(|(_, kind)| *kind)
    }

    pub fn prefix(self) -> &'static str {
        PREFIX_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(prefix, _)| *prefix)
            .unwrap_or_default()
    }
}

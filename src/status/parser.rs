use crate::frame::{Frame, MessageKind};
use super::pulse::PulseField;

/// Parsed payload of one recognised frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Identity { mac_id: String, serial_number: String },
    Firmware { version: String },
    Networks { ssid1: String, ssid2: String, ssid3: String },
    Heartbeat,
    TcpFailed,
    TcpRestored,
    WifiConnected { ssid_index: String },
    Mqtt { code: String, reason: Option<String> },
    WifiFailed,
    Counters { raw: String },
    Pulses(PulseField),
}

impl Message {
    /// Resolve the frame kind and parse its payload. `None` covers both
    /// unknown prefixes and frames that fail their kind's structure check.
    pub fn parse(frame: &Frame) -> Option<Self> {
        match frame.kind()? {
            MessageKind::Identity => parse_identity(frame),
            MessageKind::Firmware => parse_firmware(frame),
            MessageKind::Networks => parse_networks(frame),
            MessageKind::Heartbeat => Some(Message::Heartbeat),
            MessageKind::TcpFailed => Some(Message::TcpFailed),
            MessageKind::TcpRestored => Some(Message::TcpRestored),
            MessageKind::WifiConnected => parse_wifi_connected(frame),
            MessageKind::Mqtt => parse_mqtt(frame),
            MessageKind::WifiFailed => Some(Message::WifiFailed),
            MessageKind::Counters => Some(Message::Counters { raw: frame.raw.clone() }),
            MessageKind::Pulses => PulseField::decode(&frame.raw).map(Message::Pulses),
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            Message::Identity { .. } => MessageKind::Identity,
            Message::Firmware { .. } => MessageKind::Firmware,
            Message::Networks { .. } => MessageKind::Networks,
            Message::Heartbeat => MessageKind::Heartbeat,
            Message::TcpFailed => MessageKind::TcpFailed,
            Message::TcpRestored => MessageKind::TcpRestored,
            Message::WifiConnected { .. } => MessageKind::WifiConnected,
            Message::Mqtt { .. } => MessageKind::Mqtt,
            Message::WifiFailed => MessageKind::WifiFailed,
            Message::Counters { .. } => MessageKind::Counters,
            Message::Pulses(_) => MessageKind::Pulses,
        }
    }
}

/// Text after the tag, without the closing `#`
fn payload<'a>(frame: &'a Frame, tag: &str) -> Option<&'a str> {
    frame.content().strip_prefix(tag)
}

/// Parse the identity frame
/// Format: *MAC:[6 hex octets]:[serial]#
pub fn parse_identity(frame: &Frame) -> Option<Message> {
    let groups: Vec<&str> = payload(frame, "MAC:")?.split(':').collect();
    if groups.len() < 7 {
        return None;
    }

    Some(Message::Identity {
        mac_id: groups[..6].join(":"),
        serial_number: groups[6..].join(":"),
    })
}

/// Parse the firmware frame
/// Format: *FW:[*][version] [build info...]#
pub fn parse_firmware(frame: &Frame) -> Option<Message> {
    let rest = payload(frame, "FW:")?;
    let rest = rest.strip_prefix('*').unwrap_or(rest);
    let version = rest.split_whitespace().next()?;

    Some(Message::Firmware { version: version.to_string() })
}

/// Parse the stored network list
/// Format: *SSID,[seq],[ssid1],[ssid2],[ssid3]#
pub fn parse_networks(frame: &Frame) -> Option<Message> {
    let names: Vec<&str> = frame.content().split(',').skip(2).collect();
    if names.len() < 3 {
        return None;
    }

    Some(Message::Networks {
        ssid1: names[0].to_string(),
        ssid2: names[1].to_string(),
        ssid3: names[2].to_string(),
    })
}

/// Parse the WiFi-up frame
/// Format: *WiFi:[ssid index]#
pub fn parse_wifi_connected(frame: &Frame) -> Option<Message> {
    let index = payload(frame, "WiFi:")?.trim();
    if index.is_empty() {
        return None;
    }

    Some(Message::WifiConnected { ssid_index: index.to_string() })
}

/// Parse the MQTT state frame
/// Format: *MQTT,[code]#  or  *MQTT,[code] [reason]#
pub fn parse_mqtt(frame: &Frame) -> Option<Message> {
    let rest = payload(frame, "MQTT,")?.trim();
    let (code, reason) = match rest.split_once(char::is_whitespace) {
        Some((code, reason)) => {
            let reason = reason.trim();
            (code, (!reason.is_empty()).then(|| reason.to_string()))
        }
        None => (rest, None),
    };

    Some(Message::Mqtt { code: code.to_string(), reason })
}

use serde::{Deserialize, Serialize};

/// Outbound command vocabulary understood by the device firmware.
/// Every command goes out newline-terminated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceCommand {
    /// `*RST#`
    Reset,
    /// `*SSID?#`, asks for the stored network list
    QueryNetworks,
    /// `*TC?#`, asks for the counter channel
    QueryCounters,
    /// `*PULSES?#`, asks for the pulse channel
    QueryPulses,
    /// Operator-entered text, sent verbatim
    Raw(String),
}

pub const RESET: &str = "*RST#";
pub const QUERY_NETWORKS: &str = "*SSID?#";
pub const QUERY_COUNTERS: &str = "*TC?#";
pub const QUERY_PULSES: &str = "*PULSES?#";

impl DeviceCommand {
    /// Classify operator text. A bare reset is recognised so the
    /// sequencer can react to it; everything else stays raw.
    pub fn from_operator(text: &str) -> Self {
        match text.trim() {
            RESET => DeviceCommand::Reset,
            _ => DeviceCommand::Raw(text.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeviceCommand::Reset => RESET,
            DeviceCommand::QueryNetworks => QUERY_NETWORKS,
            DeviceCommand::QueryCounters => QUERY_COUNTERS,
            DeviceCommand::QueryPulses => QUERY_PULSES,
            DeviceCommand::Raw(text) => text,
        }
    }

    pub fn is_reset(&self) -> bool {
        matches!(self, DeviceCommand::Reset)
    }

    /// Bytes as they go on the wire
    pub fn to_wire(&self) -> String {
        format!("{}\n", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(DeviceCommand::Reset.to_wire(), "*RST#\n");
        assert_eq!(DeviceCommand::QueryNetworks.to_wire(), "*SSID?#\n");
        assert_eq!(DeviceCommand::QueryCounters.to_wire(), "*TC?#\n");
        assert_eq!(DeviceCommand::QueryPulses.to_wire(), "*PULSES?#\n");
        assert_eq!(DeviceCommand::Raw("Hello UART".into()).to_wire(), "Hello UART\n");
    }

    #[test]
    fn test_operator_reset_detection() {
        assert!(DeviceCommand::from_operator("*RST#").is_reset());
        assert!(DeviceCommand::from_operator("  *RST#\r").is_reset());
        assert!(!DeviceCommand::from_operator("*RST#extra").is_reset());
        assert_eq!(DeviceCommand::from_operator("*TC?#"), DeviceCommand::Raw("*TC?#".into()));
    }
}

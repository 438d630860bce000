use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{ConfigError, Result};

pub const DEFAULT_BAUD_RATE: u32 = 115200;

/// Runtime settings for a monitoring session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub baud_rate: u32,
    pub read_buffer_size: usize,
    pub heartbeat_period_ms: u64,
    /// Network query delay, measured from connect or from a manual reset
    pub network_query_delay_ms: u64,
    /// Counter-channel query delay, measured from connect
    pub counter_query_delay_ms: u64,
    /// Pulse-channel query delay, measured from the counter query
    pub pulse_query_delay_ms: u64,
    pub event_capacity: usize,
    pub read_channel_capacity: usize,
    pub command_capacity: usize,
    pub shutdown_timeout_ms: u64,
    /// Only list ports with this USB vendor id
    pub usb_vid: Option<u16>,
    /// Only list ports with this USB product id
    pub usb_pid: Option<u16>,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_buffer_size: 512,
            heartbeat_period_ms: 1000,
            network_query_delay_ms: 5000,
            counter_query_delay_ms: 10000,
            pulse_query_delay_ms: 2000,
            event_capacity: 256,
            read_channel_capacity: 64,
            command_capacity: 32,
            shutdown_timeout_ms: 2000,
            usb_vid: None,
            usb_pid: None,
        }
    }
}

impl MonitorSettings {
    /// Load settings from a JSON file; missing keys fall back to defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        settings.validate()?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be non-zero".to_string()));
        }
        if self.heartbeat_period_ms == 0 {
            return Err(ConfigError::Invalid("heartbeat_period_ms must be non-zero".to_string()));
        }
        if self.read_buffer_size == 0 {
            return Err(ConfigError::Invalid("read_buffer_size must be non-zero".to_string()));
        }
        if self.event_capacity == 0 || self.read_channel_capacity == 0 || self.command_capacity == 0 {
            return Err(ConfigError::Invalid("channel capacities must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn heartbeat_period(&self) -> Duration {
        Duration::from_millis(self.heartbeat_period_ms)
    }

    pub fn network_query_delay(&self) -> Duration {
        Duration::from_millis(self.network_query_delay_ms)
    }

    pub fn counter_query_delay(&self) -> Duration {
        Duration::from_millis(self.counter_query_delay_ms)
    }

    pub fn pulse_query_delay(&self) -> Duration {
        Duration::from_millis(self.pulse_query_delay_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Whether a port passes the optional USB filter
    pub fn matches_usb(&self, vid: Option<u16>, pid: Option<u16>) -> bool {
        let vid_ok = self.usb_vid.map_or(true, |want| vid == Some(want));
        let pid_ok = self.usb_pid.map_or(true, |want| pid == Some(want));
        vid_ok && pid_ok
    }
}

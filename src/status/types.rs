use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `ssid` value meaning no network is active
pub const NO_NETWORK: &str = "0";

/// Health of one link layer as last reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Success,
    Failed,
}

/// Aggregated device state for one connection.
///
/// Error counters only move on a `Success -> Failed` edge, so they count
/// outage episodes rather than repeated failure announcements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceStatus {
    pub mac_id: String,
    pub serial_number: String,
    pub fw_version: String,

    /// Active network index, `"0"` when none
    pub ssid: String,
    pub ssid1: String,
    pub ssid2: String,
    pub ssid3: String,

    /// Heartbeat frames received
    pub hbt_counter: u64,
    /// Seconds since the last heartbeat frame (or since connect)
    pub hbt_timer: u64,

    pub wifi_status: Option<LinkStatus>,
    pub wifi_errors: u32,
    pub tcp_status: Option<LinkStatus>,
    pub tcp_errors: u32,
    pub mqtt_status: Option<LinkStatus>,
    pub mqtt_errors: u32,

    /// When WiFi last went from up to down
    pub wifi_failed_at: Option<DateTime<Utc>>,
    /// Seconds from `wifi_failed_at` to the latest WiFi-up frame
    pub wifi_failure_duration: u64,

    pub tc: String,
    pub last_tc: String,
    pub pulses: String,
    pub last_pulses: String,
}

impl Default for DeviceStatus {
    fn default() -> Self {
        Self {
            mac_id: String::new(),
            serial_number: String::new(),
            fw_version: String::new(),
            ssid: NO_NETWORK.to_string(),
            ssid1: String::new(),
            ssid2: String::new(),
            ssid3: String::new(),
            hbt_counter: 0,
            hbt_timer: 0,
            wifi_status: None,
            wifi_errors: 0,
            tcp_status: None,
            tcp_errors: 0,
            mqtt_status: None,
            mqtt_errors: 0,
            wifi_failed_at: None,
            wifi_failure_duration: 0,
            tc: String::new(),
            last_tc: String::new(),
            pulses: String::new(),
            last_pulses: String::new(),
        }
    }
}

/// Partial update produced by classifying one frame. Only the fields
/// that are `Some` get written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusUpdate {
    pub mac_id: Option<String>,
    pub serial_number: Option<String>,
    pub fw_version: Option<String>,
    pub ssid: Option<String>,
    pub ssid1: Option<String>,
    pub ssid2: Option<String>,
    pub ssid3: Option<String>,
    pub hbt_counter: Option<u64>,
    pub hbt_timer: Option<u64>,
    pub wifi_status: Option<LinkStatus>,
    pub wifi_errors: Option<u32>,
    pub tcp_status: Option<LinkStatus>,
    pub tcp_errors: Option<u32>,
    pub mqtt_status: Option<LinkStatus>,
    pub mqtt_errors: Option<u32>,
    pub wifi_failed_at: Option<DateTime<Utc>>,
    pub wifi_failure_duration: Option<u64>,
    pub tc: Option<String>,
    pub last_tc: Option<String>,
    pub pulses: Option<String>,
    pub last_pulses: Option<String>,
}

impl StatusUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn merge_field<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

impl DeviceStatus {
    /// Merge by presence: untouched fields keep their previous value
    pub fn merge(&mut self, update: StatusUpdate) {
        merge_field(&mut self.mac_id, update.mac_id);
        merge_field(&mut self.serial_number, update.serial_number);
        merge_field(&mut self.fw_version, update.fw_version);
        merge_field(&mut self.ssid, update.ssid);
        merge_field(&mut self.ssid1, update.ssid1);
        merge_field(&mut self.ssid2, update.ssid2);
        merge_field(&mut self.ssid3, update.ssid3);
        merge_field(&mut self.hbt_counter, update.hbt_counter);
        merge_field(&mut self.hbt_timer, update.hbt_timer);
        merge_field(&mut self.wifi_errors, update.wifi_errors);
        merge_field(&mut self.tcp_errors, update.tcp_errors);
        merge_field(&mut self.mqtt_errors, update.mqtt_errors);
        merge_field(&mut self.wifi_failure_duration, update.wifi_failure_duration);
        merge_field(&mut self.tc, update.tc);
        merge_field(&mut self.last_tc, update.last_tc);
        merge_field(&mut self.pulses, update.pulses);
        merge_field(&mut self.last_pulses, update.last_pulses);

        if update.wifi_status.is_some() {
            self.wifi_status = update.wifi_status;
        }
        if update.tcp_status.is_some() {
            self.tcp_status = update.tcp_status;
        }
        if update.mqtt_status.is_some() {
            self.mqtt_status = update.mqtt_status;
        }
        if update.wifi_failed_at.is_some() {
            self.wifi_failed_at = update.wifi_failed_at;
        }
    }

    /// Whether a network is currently active
    pub fn has_network(&self) -> bool {
        self.ssid != NO_NETWORK
    }
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::frame::{Frame, MessageKind};
use super::parser::Message;
use super::types::{DeviceStatus, LinkStatus, StatusUpdate, NO_NETWORK};

/// Frame counters for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameStats {
    pub classified: u64,
    pub discarded: u64,
}

/// Owns the one `DeviceStatus` of a connection and applies frame rules to it
#[derive(Debug, Default)]
pub struct StatusAggregator {
    status: DeviceStatus,
    stats: FrameStats,
}

impl StatusAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &DeviceStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut DeviceStatus {
        &mut self.status
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Classify one frame and merge the resulting update.
    /// Returns the kind that was applied, `None` if the frame was dropped.
    pub fn process_frame(&mut self, frame: &Frame, now: DateTime<Utc>) -> Option<MessageKind> {
        let Some(message) = Message::parse(frame) else {
            self.stats.discarded += 1;
            log::debug!("Discarding frame {:?}", frame.raw);
            return None;
        };

        let kind = message.kind();
        let update = self.classify(message, now);
        self.status.merge(update);
        self.stats.classified += 1;
        Some(kind)
    }

    /// Merge an update that did not come from a frame
    pub fn apply(&mut self, update: StatusUpdate) {
        self.status.merge(update);
    }

    /// Back to a fresh, zeroed status
    pub fn reset(&mut self) {
        self.status = DeviceStatus::default();
        self.stats = FrameStats::default();
    }

    /// Compute the partial update for `message` against the current status
    pub fn classify(&self, message: Message, now: DateTime<Utc>) -> StatusUpdate {
        let status = &self.status;

        match message {
            Message::Identity { mac_id, serial_number } => StatusUpdate {
                mac_id: Some(mac_id),
                serial_number: Some(serial_number),
                ..Default::default()
            },

            Message::Firmware { version } => StatusUpdate {
                fw_version: Some(version),
                ..Default::default()
            },

            Message::Networks { ssid1, ssid2, ssid3 } => StatusUpdate {
                ssid1: Some(ssid1),
                ssid2: Some(ssid2),
                ssid3: Some(ssid3),
                ..Default::default()
            },

            Message::Heartbeat => StatusUpdate {
                hbt_counter: Some(status.hbt_counter + 1),
                hbt_timer: Some(0),
                ..Default::default()
            },

            Message::TcpFailed => {
                let tcp_errors = if status.tcp_status == Some(LinkStatus::Success) {
                    log::info!("TCP link lost (episode {})", status.tcp_errors + 1);
                    Some(status.tcp_errors + 1)
                } else {
                    None
                };
                StatusUpdate {
                    tcp_status: Some(LinkStatus::Failed),
                    tcp_errors,
                    ..Default::default()
                }
            }

            Message::TcpRestored => StatusUpdate {
                tcp_status: Some(LinkStatus::Success),
                ..Default::default()
            },

            Message::WifiConnected { ssid_index } => {
                let failed_at = status.wifi_failed_at.unwrap_or(now);
                let duration = (now - failed_at).num_seconds().max(0) as u64;
                StatusUpdate {
                    wifi_failure_duration: Some(duration),
                    ssid: Some(ssid_index),
                    wifi_status: Some(LinkStatus::Success),
                    ..Default::default()
                }
            }

            Message::Mqtt { code, reason } => {
                let next = if reason.is_some() { LinkStatus::Failed } else { LinkStatus::Success };
                let mqtt_errors = if status.mqtt_status == Some(LinkStatus::Success) && next == LinkStatus::Failed {
                    log::info!(
                        "MQTT link lost (code {}, reason {}, episode {})",
                        code,
                        reason.as_deref().unwrap_or_default(),
                        status.mqtt_errors + 1
                    );
                    Some(status.mqtt_errors + 1)
                } else {
                    None
                };
                StatusUpdate {
                    mqtt_status: Some(next),
                    mqtt_errors,
                    ..Default::default()
                }
            }

            Message::WifiFailed => {
                let (wifi_errors, wifi_failed_at) = if status.wifi_status == Some(LinkStatus::Success) {
                    log::info!("WiFi link lost (episode {})", status.wifi_errors + 1);
                    (Some(status.wifi_errors + 1), Some(now))
                } else {
                    (None, None)
                };
                StatusUpdate {
                    wifi_status: Some(LinkStatus::Failed),
                    ssid: Some(NO_NETWORK.to_string()),
                    wifi_errors,
                    wifi_failed_at,
                    ..Default::default()
                }
            }

            Message::Counters { raw } => StatusUpdate {
                last_tc: Some(status.tc.clone()),
                tc: Some(raw),
                ..Default::default()
            },

            Message::Pulses(field) => StatusUpdate {
                last_pulses: Some(status.pulses.clone()),
                pulses: Some(field.to_string()),
                ..Default::default()
            },
        }
    }
}

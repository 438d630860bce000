pub mod heartbeat;
pub mod manager;
pub mod models;
pub mod sequencer;
mod session;

pub use heartbeat::{ClockState, HeartbeatClock};
pub use manager::DeviceManager;
pub use models::*;
pub use sequencer::{CommandSequencer, ScheduleHandle};


#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device already connected")]
    AlreadyConnected,

    #[error("Device not connected")]
    NotConnected,

    #[error("Session closed")]
    SessionClosed,

    #[error("Serial communication error: {0}")]
    SerialError(#[from] crate::serial::SerialError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] crate::config::ConfigError),
}

pub type Result<T> = std::result::Result<T, DeviceError>;

pub mod config;
pub mod device;
pub mod frame;
pub mod serial;
pub mod status;

pub use config::MonitorSettings;
pub use device::{ConnectionState, DeviceError, DeviceEvent, DeviceManager};
pub use status::DeviceStatus;

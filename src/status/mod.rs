pub mod aggregator;
pub mod parser;
pub mod pulse;
pub mod types;

pub use aggregator::{FrameStats, StatusAggregator};
pub use parser::Message;
pub use pulse::PulseField;
pub use types::*;

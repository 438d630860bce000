//! Star-hash framing: `*` opens a frame, `#` closes it.

pub mod buffer;
pub mod types;

pub use buffer::FrameBuffer;
pub use types::{Frame, MessageKind};

pub const FRAME_START: char = '*';
pub const FRAME_END: char = '#';

use super::{Frame, FRAME_END, FRAME_START};

/// Pending device text plus the frame extractor that consumes it.
///
/// The buffer is unbounded. A device that never sends `#` grows it
/// indefinitely; capping it would cut legitimate frames that arrive in
/// many small chunks.
#[derive(Debug, Default, Clone)]
pub struct FrameBuffer {
    pending: String,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, chunk: &str) {
        self.pending.push_str(chunk);
    }

    /// Extract every complete frame, in arrival order.
    ///
    /// Everything up to and including the last `#` is consumed, so a
    /// trailing partial frame stays behind for the next `append`. Without
    /// any `#` the buffer is left untouched.
    pub fn drain(&mut self) -> Vec<Frame> {
        let Some(last_end) = self.pending.rfind(FRAME_END) else {
            return Vec::new();
        };

        let mut frames = Vec::new();
        let scan = &self.pending[..=last_end];
        let mut cursor = 0;

        while let Some(offset) = scan[cursor..].find(FRAME_START) {
            let start = cursor + offset;
            // A frame never spans a line break
            let Some(len) = scan[start + 1..].find([FRAME_END, '\r', '\n']) else {
                break;
            };
            let stop = start + 1 + len;
            if scan[stop..].starts_with(FRAME_END) {
                frames.push(Frame::new(&scan[start..=stop]));
            }
            cursor = stop + 1;
        }

        self.pending.replace_range(..=last_end, "");
        frames
    }

    /// Text not yet consumed by `drain`
    pub fn pending(&self) -> &str {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::frame::{FRAME_END, FRAME_START};

/// Sparse form of a `*CHENA:<f0>:<b1>:...:<bn>#` bit field.
///
/// `lead` is the first field, kept verbatim. `active` holds the 1-origin
/// position of each set bit counted over the whole field list, so `b1`
/// is position 2. Cleared bits are dropped and the width is not kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseField {
    pub lead: String,
    pub active: Vec<usize>,
}

impl PulseField {
    /// Decode a raw `*CHENA:...#` frame
    pub fn decode(raw: &str) -> Option<Self> {
        let inner = raw.trim();
        let inner = inner.strip_prefix(FRAME_START).unwrap_or(inner);
        let inner = inner.strip_suffix(FRAME_END).unwrap_or(inner);

        let mut fields = inner.split(':');
        fields.next()?; // channel tag
        let lead = fields.next()?.trim();
        if lead.is_empty() {
            return None;
        }

        let active = fields
            .enumerate()
            .filter(|(_, bit)| bit.trim() == "1")
            .map(|(i, _)| i + 2)
            .collect();

        Some(Self {
            lead: lead.to_string(),
            active,
        })
    }

    /// Expand back to `width` bits (`b1..bn`). The width has to come from
    /// the caller since the sparse form does not carry it.
    pub fn to_bits(&self, width: usize) -> Vec<bool> {
        let mut bits = vec![false; width];
        for &position in &self.active {
            if let Some(bit) = position.checked_sub(2).and_then(|i| bits.get_mut(i)) {
                *bit = true;
            }
        }
        bits
    }
}

impl fmt::Display for PulseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.lead)?;
        for position in &self.active {
            write!(f, ":{}", position)?;
        }
        Ok(())
    }
}

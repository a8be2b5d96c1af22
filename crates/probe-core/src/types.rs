//! Block records as seen by the retarget engine.
//!
//! Only the fields that feed target arithmetic are kept. Timestamps are
//! signed: forged clocks can move them backwards and solve times derived
//! from them may be negative.

use serde::{Deserialize, Serialize};

use crate::compact::{self, CompactTarget};
use crate::Target;

/// One block's timing and target, as reported by a node or read from a file.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockRecord {
    /// Height of the block.
    pub height: u64,
    /// Header timestamp (unix seconds). Not guaranteed monotonic.
    pub time: i64,
    /// Median time past of the block (unix seconds).
    pub mediantime: i64,
    /// Compact target from the header.
    pub nbits: u32,
}

impl BlockRecord {
    pub fn new(height: u64, time: i64, mediantime: i64, nbits: u32) -> Self {
        Self {
            height,
            time,
            mediantime,
            nbits,
        }
    }

    /// Expanded target of this block.
    pub fn target(&self) -> Target {
        compact::decode(self.nbits)
    }

    /// Compact target wrapper, for display.
    pub fn compact(&self) -> CompactTarget {
        CompactTarget(self.nbits)
    }
}

//! Ordered, contiguous block history feeding the retarget engine.
//!
//! [`BlockChainView`] owns a run of [`BlockRecord`]s with heights increasing
//! by exactly one. It is filled by an external block source (RPC or file)
//! and is read-only while retarget computations run over it.

use crate::error::RetargetError;
use crate::params::NetworkParams;
use crate::retarget;
use crate::types::BlockRecord;

/// A height where the recorded `nbits` differs from what the retarget
/// algorithm computes from the preceding blocks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    pub height: u64,
    pub expected: u32,
    pub actual: u32,
}

/// Contiguous-by-height sequence of block records.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockChainView {
    records: Vec<BlockRecord>,
}

impl BlockChainView {
    /// Build a view, rejecting gaps or reordering.
    pub fn new(records: Vec<BlockRecord>) -> Result<Self, RetargetError> {
        retarget::check_contiguous(&records)?;
        Ok(Self { records })
    }

    /// Append a record; it must extend the tip by exactly one height.
    pub fn push(&mut self, record: BlockRecord) -> Result<(), RetargetError> {
        if let Some(tip) = self.records.last() {
            let expected = tip.height + 1;
            if record.height != expected {
                return Err(RetargetError::NonContiguous {
                    expected,
                    got: record.height,
                });
            }
        }
        self.records.push(record);
        Ok(())
    }

    pub fn records(&self) -> &[BlockRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn tip(&self) -> Option<&BlockRecord> {
        self.records.last()
    }

    pub fn first(&self) -> Option<&BlockRecord> {
        self.records.first()
    }

    /// Record at `height`, if held.
    pub fn get(&self, height: u64) -> Option<&BlockRecord> {
        let first = self.first()?.height;
        let index = height.checked_sub(first)? as usize;
        self.records.get(index)
    }

    /// All held records up to and including `height`.
    pub fn window_ending_at(&self, height: u64) -> Result<&[BlockRecord], RetargetError> {
        let first = self.first().map(|r| r.height).unwrap_or(0);
        match height.checked_sub(first) {
            Some(offset) if (offset as usize) < self.records.len() => {
                Ok(&self.records[..=offset as usize])
            }
            _ => Err(RetargetError::InsufficientWindow {
                have: self.records.len(),
                need: (height.saturating_sub(first) + 1) as usize,
            }),
        }
    }

    /// Required `nbits` for the block after the tip.
    pub fn next_nbits(&self, params: &NetworkParams) -> Result<u32, RetargetError> {
        retarget::next_nbits(params, &self.records)
    }

    /// `nbits` the algorithm requires at `height`, computed from its predecessors.
    pub fn expected_nbits_at(&self, params: &NetworkParams, height: u64) -> Result<u32, RetargetError> {
        let parent = height
            .checked_sub(1)
            .ok_or(RetargetError::InsufficientWindow { have: 0, need: 1 })?;
        retarget::next_nbits(params, self.window_ending_at(parent)?)
    }

    /// Replay the retarget algorithm over the held history.
    ///
    /// Heights below `fork_height`, or without enough predecessors in the
    /// view, are skipped. Returns only mismatches.
    pub fn audit(&self, params: &NetworkParams) -> Result<Vec<AuditEntry>, RetargetError> {
        let mut mismatches = Vec::new();
        for i in 1..self.records.len() {
            let actual = self.records[i];
            if actual.height < params.fork_height {
                continue;
            }
            let expected = match retarget::next_nbits(params, &self.records[..i]) {
                Ok(nbits) => nbits,
                Err(RetargetError::InsufficientWindow { .. }) => continue,
                Err(e) => return Err(e),
            };
            if expected != actual.nbits {
                tracing::debug!(
                    height = actual.height,
                    expected = format!("{expected:08x}"),
                    actual = format!("{:08x}", actual.nbits),
                    "nbits mismatch"
                );
                mismatches.push(AuditEntry {
                    height: actual.height,
                    expected,
                    actual: actual.nbits,
                });
            }
        }
        Ok(mismatches)
    }
}

impl TryFrom<Vec<BlockRecord>> for BlockChainView {
    type Error = RetargetError;

    fn try_from(records: Vec<BlockRecord>) -> Result<Self, Self::Error> {
        Self::new(records)
    }
}

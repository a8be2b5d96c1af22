//! # probe-source
//! Where block records come from: a node's JSON-RPC interface, or a
//! tabular file written by an earlier fetch.

pub mod config;
pub mod error;
pub mod rpc;
pub mod tabular;

use async_trait::async_trait;
use probe_core::types::BlockRecord;

pub use config::RpcSettings;
pub use error::{SourceError, TabularError};
pub use rpc::RpcBlockSource;

/// Read access to a chain's block history.
///
/// Every query may fail with a transient [`SourceError`]; callers decide
/// whether that is fatal.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Height of the current tip.
    async fn chain_height(&self) -> Result<u64, SourceError>;

    /// Record of the block at `height`.
    async fn block_at(&self, height: u64) -> Result<BlockRecord, SourceError>;

    /// Records for `from..=to`, oldest first. Empty when `to < from`.
    async fn block_range(&self, from: u64, to: u64) -> Result<Vec<BlockRecord>, SourceError> {
        let mut records = Vec::with_capacity(to.saturating_sub(from).saturating_add(1) as usize);
        for height in from..=to {
            records.push(self.block_at(height).await?);
        }
        Ok(records)
    }
}

/// Heights `tip − count×step, …, tip − step, tip`, clipped at genesis.
pub fn sample_heights(tip: u64, count: u64, step: u64) -> Vec<u64> {
    let step = step.max(1);
    let mut heights: Vec<u64> = (0..=count)
        .map_while(|i| i.checked_mul(step).and_then(|back| tip.checked_sub(back)))
        .collect();
    heights.reverse();
    heights
}

/// Fetch `count + 1` records ending at the current tip, `step` heights apart.
///
/// With `step > 1` the result is a sample and not contiguous; it suits
/// statistics but not retarget replay.
pub async fn fetch_latest<S>(source: &S, count: u64, step: u64) -> Result<Vec<BlockRecord>, SourceError>
where
    S: BlockSource + ?Sized,
{
    let tip = source.chain_height().await?;
    let heights = sample_heights(tip, count, step);
    tracing::info!(tip, blocks = heights.len(), step, "fetching latest blocks");
    let mut records = Vec::with_capacity(heights.len());
    for height in heights {
        let record = source.block_at(height).await?;
        tracing::debug!(height, "block fetched");
        records.push(record);
    }
    Ok(records)
}

//! Retarget algorithms: compute the next block's required target.
//!
//! Two interchangeable variants, selected by
//! [`NetworkParams::algorithm`](crate::params::NetworkParams):
//!
//! - **Interval-Retarget** adjusts once every `adjust_interval` blocks. It
//!   compares the real time span of the last interval against the expected
//!   span and scales the target proportionally, clamping the span to
//!   `[expected / retarget_factor, expected × retarget_factor]`.
//! - **LWMA** adjusts every block from a linearly weighted moving average of
//!   the last `average_window` solve times. Timestamps that do not move
//!   forward are coerced one second past their predecessor, so an attacker
//!   submitting non-increasing timestamps cannot produce zero or negative
//!   solve times.
//!
//! Both variants share one contract: the result never exceeds
//! `pow_limit`.
//!
//! # Windows
//!
//! Every function takes a slice of [`BlockRecord`]s ordered oldest to
//! newest, ending at the current tip. Only the trailing records an
//! algorithm needs are inspected; those must have contiguous heights.
//!
//! # Width
//!
//! Products of a 256-bit target and a time span are formed in 512 bits and
//! narrowed only after the division, so no intermediate overflows.

use crate::compact::{self, CompactTarget};
use crate::error::RetargetError;
use crate::params::{NetworkParams, RetargetAlgorithm};
use crate::types::BlockRecord;
use crate::{Target, U256, U512};

/// Solve times are capped at this multiple of the target solvetime.
pub const LWMA_SOLVETIME_CAP: i64 = 6;

/// Required `nbits` for the block after the tip of `window`.
pub fn next_nbits(params: &NetworkParams, window: &[BlockRecord]) -> Result<u32, RetargetError> {
    match params.algorithm {
        RetargetAlgorithm::IntervalRetarget => interval_next_nbits(params, window),
        RetargetAlgorithm::Lwma => lwma_next_nbits(params, window),
    }
}

/// Number of trailing records the configured algorithm may need.
pub fn required_window(params: &NetworkParams) -> usize {
    match params.algorithm {
        RetargetAlgorithm::IntervalRetarget => params.adjust_interval as usize + 1,
        RetargetAlgorithm::Lwma => params.average_window as usize + 1,
    }
}

/// The trailing `len` records of `window`, checked for contiguous heights.
fn tail(window: &[BlockRecord], len: usize) -> Result<&[BlockRecord], RetargetError> {
    if window.len() < len {
        return Err(RetargetError::InsufficientWindow {
            have: window.len(),
            need: len,
        });
    }
    let tail = &window[window.len() - len..];
    check_contiguous(tail)?;
    Ok(tail)
}

/// Verify heights increase by exactly one.
pub fn check_contiguous(records: &[BlockRecord]) -> Result<(), RetargetError> {
    for pair in records.windows(2) {
        let expected = pair[0].height + 1;
        if pair[1].height != expected {
            return Err(RetargetError::NonContiguous {
                expected,
                got: pair[1].height,
            });
        }
    }
    Ok(())
}

/// Clamp to `pow_limit` from above and to one from below, then encode.
fn finish(next: Target, params: &NetworkParams) -> Result<u32, RetargetError> {
    let next = next.min(params.pow_limit).max(U256::one());
    Ok(compact::encode(next)?)
}

// ----------------------------------------------------------------------
// Interval-Retarget
// ----------------------------------------------------------------------

/// Whether the block after `last_height` starts a new adjustment interval.
pub fn is_retarget_height(params: &NetworkParams, last_height: u64) -> bool {
    let next_height = last_height + 1;
    if params.adjust_interval == 0 || next_height < params.fork_height {
        return false;
    }
    (next_height - params.fork_height) % params.adjust_interval == 0
}

/// Clamp a raw time span to `[target_span / factor, target_span × factor]`.
///
/// Negative or zero spans (possible with forged timestamps) clamp to the
/// lower bound.
pub fn clamp_time_span(real_time_span: i64, target_time_span: u64, retarget_factor: u64) -> u64 {
    let factor = retarget_factor.max(1);
    let min = target_time_span / factor;
    let max = target_time_span.saturating_mul(factor);
    if real_time_span <= 0 {
        return min;
    }
    (real_time_span as u64).clamp(min, max)
}

/// Interval-Retarget result as a full target, before encoding.
///
/// Off-interval heights return the tip's own target.
pub fn interval_next_target(
    params: &NetworkParams,
    window: &[BlockRecord],
) -> Result<Target, RetargetError> {
    params.validate()?;
    let last = window
        .last()
        .ok_or(RetargetError::InsufficientWindow { have: 0, need: 1 })?;

    if !is_retarget_height(params, last.height) {
        return Ok(last.target());
    }

    let span = tail(window, params.adjust_interval as usize + 1)?;
    let real_time_span = last.time.saturating_sub(span[0].time);
    let target_time_span = params.target_time_span();
    let adjusted = clamp_time_span(real_time_span, target_time_span, params.retarget_factor);

    // Multiply before dividing, in 512 bits.
    let next = last.target().widen() * U512::from(adjusted) / U512::from(target_time_span);
    Ok(next.saturating_narrow())
}

/// Interval-Retarget: required `nbits` for the block after the tip.
///
/// Returns the tip's `nbits` unchanged unless
/// `(last_height + 1 − fork_height) mod adjust_interval == 0`. On a retarget
/// height, needs `adjust_interval + 1` trailing records.
pub fn interval_next_nbits(
    params: &NetworkParams,
    window: &[BlockRecord],
) -> Result<u32, RetargetError> {
    params.validate()?;
    let last = window
        .last()
        .ok_or(RetargetError::InsufficientWindow { have: 0, need: 1 })?;
    if !is_retarget_height(params, last.height) {
        return Ok(last.nbits);
    }
    let next = interval_next_target(params, window)?;
    let nbits = finish(next, params)?;
    tracing::trace!(height = last.height + 1, nbits = %CompactTarget(nbits), "interval retarget");
    Ok(nbits)
}

// ----------------------------------------------------------------------
// LWMA
// ----------------------------------------------------------------------

/// Normalizing sum of linear weights: `N(N+1)/2 × T`.
pub fn lwma_k(params: &NetworkParams) -> u64 {
    let n = params.average_window;
    n * (n + 1) / 2 * params.target_solvetime
}

/// Coerced solve times of the last `average_window` blocks, oldest first.
///
/// Each timestamp that does not strictly exceed its (already coerced)
/// predecessor is moved to predecessor + 1 before differencing, and every
/// solve time is capped at `6 × target_solvetime`. All returned values are
/// therefore in `1..=6T`.
pub fn lwma_solve_times(
    params: &NetworkParams,
    window: &[BlockRecord],
) -> Result<Vec<i64>, RetargetError> {
    params.validate()?;
    let span = tail(window, params.average_window as usize + 1)?;
    let cap = LWMA_SOLVETIME_CAP * params.target_solvetime as i64;
    let mut prev_timestamp = span[0].time;
    let mut solve_times = Vec::with_capacity(span.len() - 1);
    for block in &span[1..] {
        let this_timestamp = block.time.max(prev_timestamp.saturating_add(1));
        solve_times.push(this_timestamp.saturating_sub(prev_timestamp).min(cap).max(1));
        prev_timestamp = this_timestamp;
    }
    Ok(solve_times)
}

/// LWMA result as a full target, before clamping and encoding.
///
/// Returns `pow_limit` while the tip height is below `average_window`.
pub fn lwma_next_target(
    params: &NetworkParams,
    window: &[BlockRecord],
) -> Result<Target, RetargetError> {
    params.validate()?;
    let last = window
        .last()
        .ok_or(RetargetError::InsufficientWindow { have: 0, need: 1 })?;
    let n = params.average_window;
    if last.height < n {
        return Ok(params.pow_limit);
    }

    let span = tail(window, n as usize + 1)?;
    let solve_times = lwma_solve_times(params, span)?;
    // Dividing every term by N × k keeps the running sum inside 256 bits.
    let divisor = U256::from(n) * U256::from(lwma_k(params));

    let mut sum_weighted_solvetimes: u64 = 0;
    let mut average_target = U256::zero();
    for (i, (block, solve_time)) in span[1..].iter().zip(&solve_times).enumerate() {
        let weight = i as u64 + 1;
        sum_weighted_solvetimes += *solve_time as u64 * weight;
        average_target = average_target + block.target() / divisor;
    }

    let next = average_target.widen() * U512::from(sum_weighted_solvetimes);
    Ok(next.saturating_narrow())
}

/// LWMA: required `nbits` for the block after the tip.
///
/// Needs `average_window + 1` trailing records once the tip height reaches
/// `average_window`; below that the easiest target is returned.
pub fn lwma_next_nbits(params: &NetworkParams, window: &[BlockRecord]) -> Result<u32, RetargetError> {
    let next = lwma_next_target(params, window)?;
    finish(next, params)
}

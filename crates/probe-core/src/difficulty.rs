//! Human-readable difficulty.
//!
//! Difficulty is the ratio `reference_target / target`. Both sides are
//! 256-bit, so the ratio is taken in floating point rather than by
//! truncating integer division.

use crate::compact;
use crate::params::NetworkParams;
use crate::{Target, U256};

/// Maps compact targets to difficulty numbers relative to a fixed reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyCalculator {
    reference_target: Target,
}

impl DifficultyCalculator {
    pub fn new(reference_target: Target) -> Self {
        Self { reference_target }
    }

    pub fn from_params(params: &NetworkParams) -> Self {
        Self::new(params.reference_target)
    }

    /// Difficulty of a header `nbits`. A zero target gives `f64::INFINITY`.
    pub fn difficulty(&self, nbits: u32) -> f64 {
        self.difficulty_of_target(compact::decode(nbits))
    }

    /// Difficulty of an expanded target.
    pub fn difficulty_of_target(&self, target: Target) -> f64 {
        if target.is_zero() {
            return f64::INFINITY;
        }
        self.reference_target.to_f64() / target.to_f64()
    }

    /// Approximate inverse of [`difficulty`](Self::difficulty).
    ///
    /// Only 53 bits of the quotient survive, so the result is close to but
    /// not always exactly the target that produced `difficulty`. Returns
    /// `None` for non-finite or non-positive input.
    pub fn target_for_difficulty(&self, difficulty: f64) -> Option<Target> {
        if !difficulty.is_finite() || difficulty <= 0.0 {
            return None;
        }
        let quotient = self.reference_target.to_f64() / difficulty;
        Some(f64_to_u256(quotient))
    }
}

/// Truncating conversion of a non-negative finite `f64` into a `U256`.
fn f64_to_u256(value: f64) -> U256 {
    if value < 1.0 {
        return U256::zero();
    }
    let exponent = value.log2().floor() as i32;
    if exponent >= 256 {
        return U256::MAX;
    }
    if exponent < 64 {
        return U256::from(value as u64);
    }
    // Keep the 53 significant bits and shift them into place.
    let shift = exponent - 52;
    let mantissa = (value / 2f64.powi(shift)) as u64;
    U256::from(mantissa) << shift as usize
}

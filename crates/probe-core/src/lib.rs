//! # probe-core
//! Target arithmetic, retarget algorithms and the block history model for hashprobe.

use uint::construct_uint;

construct_uint! {
    /// Unsigned 256-bit integer, the width of a proof-of-work target.
    /// Consists of 4x64-bit little-endian words.
    pub struct U256(4);
}

construct_uint! {
    /// Unsigned 512-bit integer for overflow-free target products.
    pub struct U512(8);
}

/// A 256-bit proof-of-work target. Lower is harder.
pub type Target = U256;

impl U256 {
    /// Widen into 512 bits. Never loses information.
    pub fn widen(self) -> U512 {
        let w = self.0;
        U512([w[0], w[1], w[2], w[3], 0, 0, 0, 0])
    }

    /// Lossy conversion to `f64`, most significant word first.
    pub fn to_f64(self) -> f64 {
        self.0
            .iter()
            .rev()
            .fold(0.0_f64, |acc, &word| acc * 18_446_744_073_709_551_616.0 + word as f64)
    }
}

impl U512 {
    /// Narrow back to 256 bits, saturating at `U256::MAX`.
    pub fn saturating_narrow(self) -> U256 {
        let w = self.0;
        if w[4..].iter().any(|&x| x != 0) {
            U256::MAX
        } else {
            U256([w[0], w[1], w[2], w[3]])
        }
    }
}

pub mod chain;
pub mod compact;
pub mod difficulty;
pub mod error;
pub mod params;
pub mod retarget;
pub mod stats;
pub mod types;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widen_then_narrow_is_identity() {
        let x = U256::MAX - U256::from(12345u64);
        assert_eq!(x.widen().saturating_narrow(), x);
    }

    #[test]
    fn narrow_saturates_on_high_words() {
        let big = U256::MAX.widen() * U512::from(2u64);
        assert_eq!(big.saturating_narrow(), U256::MAX);
    }

    #[test]
    fn to_f64_small_values_exact() {
        assert_eq!(U256::from(0u64).to_f64(), 0.0);
        assert_eq!(U256::from(1_000_000u64).to_f64(), 1_000_000.0);
    }

    #[test]
    fn to_f64_high_word() {
        let x = U256::one() << 200usize;
        assert_eq!(x.to_f64(), 2f64.powi(200));
    }
}

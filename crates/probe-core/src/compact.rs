//! Compact ("nbits") encoding of 256-bit proof-of-work targets.
//!
//! A compact value packs a target into 32 bits: the top byte is a base-256
//! exponent `e` (the byte length of the target) and the low three bytes are
//! the mantissa `m`:
//!
//! ```text
//! target = m × 256^(e − 3)      when e ≥ 3
//! target = m >> 8 × (3 − e)     when e < 3
//! ```
//!
//! Bit `0x0080_0000` of the mantissa is a sign flag inherited from the
//! Bitcoin header format. Targets are never negative, so [`decode`] masks
//! it out instead of rejecting the value, and [`encode`] never sets it: a
//! mantissa whose top bit would be set is shifted down one byte and the
//! exponent bumped instead.
//!
//! The codec works on explicit bit fields of a `u32` and shifts of a
//! [`U256`]; no intermediate string representation is involved.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CompactError;
use crate::{Target, U256};

/// Sign flag inside the mantissa. Always clear on encoded output.
pub const SIGN_BIT: u32 = 0x0080_0000;

/// Mantissa bits that carry magnitude.
pub const MANTISSA_MASK: u32 = 0x007f_ffff;

/// Largest exponent the top byte can hold.
pub const MAX_EXPONENT: u32 = 0xff;

/// A 32-bit compact target as it appears in a block header.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct CompactTarget(pub u32);

impl CompactTarget {
    /// Base-256 exponent (top byte).
    pub const fn exponent(self) -> u32 {
        self.0 >> 24
    }

    /// Mantissa with the sign flag masked out.
    pub const fn mantissa(self) -> u32 {
        self.0 & MANTISSA_MASK
    }

    /// Whether the sign flag is set on a non-zero mantissa.
    ///
    /// Such values only appear on malformed or historical headers; they
    /// decode as if the flag were clear.
    pub const fn is_negative(self) -> bool {
        self.0 & SIGN_BIT != 0 && self.mantissa() != 0
    }

    /// Whether the expanded mantissa needs more than 256 bits.
    pub fn overflows(self) -> bool {
        let m = self.mantissa();
        let e = self.exponent();
        if m == 0 || e <= 3 {
            return false;
        }
        let mantissa_bits = 32 - m.leading_zeros();
        mantissa_bits + 8 * (e - 3) > 256
    }

    /// Expand into a full 256-bit target. Bits shifted past 256 are lost.
    pub fn to_target(self) -> Target {
        let m = self.mantissa();
        let e = self.exponent();
        if e <= 3 {
            return U256::from(m >> (8 * (3 - e)));
        }
        let shift = (8 * (e - 3)) as usize;
        if shift >= 256 {
            return U256::zero();
        }
        U256::from(m) << shift
    }

    /// Canonical compact form of `target`.
    pub fn from_target(target: Target) -> Result<Self, CompactError> {
        encode(target).map(Self)
    }

    /// Raw header value.
    pub const fn to_consensus(self) -> u32 {
        self.0
    }
}

impl From<u32> for CompactTarget {
    fn from(nbits: u32) -> Self {
        Self(nbits)
    }
}

impl From<CompactTarget> for u32 {
    fn from(compact: CompactTarget) -> Self {
        compact.0
    }
}

impl fmt::Display for CompactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0.to_be_bytes()))
    }
}

impl FromStr for CompactTarget {
    type Err = CompactError;

    /// Parse eight hex digits, with or without a `0x` prefix.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim();
        let digits = digits
            .strip_prefix("0x")
            .or_else(|| digits.strip_prefix("0X"))
            .unwrap_or(digits);
        let mut bytes = [0u8; 4];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| CompactError::OutOfRange(format!("invalid nbits hex {s:?}: {e}")))?;
        Ok(Self(u32::from_be_bytes(bytes)))
    }
}

/// Decode a header `nbits` into its target.
///
/// Never fails: the sign flag is masked and overflowing bits are dropped.
/// Use [`decode_checked`] to detect overflow.
pub fn decode(nbits: u32) -> Target {
    CompactTarget(nbits).to_target()
}

/// Like [`decode`] but rejects values that overflow 256 bits.
pub fn decode_checked(nbits: u32) -> Result<Target, CompactError> {
    let compact = CompactTarget(nbits);
    if compact.overflows() {
        return Err(CompactError::Overflow(nbits));
    }
    Ok(compact.to_target())
}

/// Encode a target into its canonical compact form.
///
/// Precision beyond the 23-bit mantissa is truncated toward zero.
///
/// # Errors
///
/// [`CompactError::OutOfRange`] if `target` is zero or the exponent would
/// not fit in one byte.
pub fn encode(target: Target) -> Result<u32, CompactError> {
    if target.is_zero() {
        return Err(CompactError::OutOfRange("zero target".to_string()));
    }

    let mut size = (target.bits() as u32).div_ceil(8);
    let mut mantissa = if size <= 3 {
        (target.low_u64() << (8 * (3 - size))) as u32
    } else {
        (target >> (8 * (size - 3)) as usize).low_u32()
    };

    // Keep the sign flag clear by moving one byte into the exponent.
    if mantissa & SIGN_BIT != 0 {
        mantissa >>= 8;
        size += 1;
    }

    if size > MAX_EXPONENT {
        return Err(CompactError::OutOfRange(format!("exponent {size} exceeds {MAX_EXPONENT}")));
    }

    Ok((size << 24) | mantissa)
}

/// Round `target` down to the nearest value the compact form can express.
pub fn canonicalize(target: Target) -> Result<Target, CompactError> {
    encode(target).map(decode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_target(s: &str) -> Target {
        U256::from_str_radix(s, 16).unwrap()
    }

    // ------------------------------------------------------------------
    // decode
    // ------------------------------------------------------------------

    #[test]
    fn decode_genesis_bits() {
        assert_eq!(
            decode(0x1d00ffff),
            hex_target("00000000ffff0000000000000000000000000000000000000000000000000000")
        );
    }

    #[test]
    fn decode_regtest_limit() {
        assert_eq!(
            decode(0x207fffff),
            hex_target("7fffff0000000000000000000000000000000000000000000000000000000000")
        );
    }

    #[test]
    fn decode_small_exponents_shift_right() {
        assert_eq!(decode(0x01123456), U256::from(0x12u64));
        assert_eq!(decode(0x02123456), U256::from(0x1234u64));
        assert_eq!(decode(0x03123456), U256::from(0x123456u64));
        assert_eq!(decode(0x00123456), U256::zero());
    }

    #[test]
    fn decode_large_exponent() {
        assert_eq!(decode(0x04123456), U256::from(0x1234_5600u64));
        assert_eq!(decode(0x05009234), U256::from(0x9234_0000u64));
        assert_eq!(decode(0x20123456), U256::from(0x123456u64) << 232usize);
    }

    #[test]
    fn decode_masks_sign_bit() {
        let c = CompactTarget(0x04923456);
        assert!(c.is_negative());
        assert_eq!(decode(0x04923456), U256::from(0x1234_5600u64));
    }

    #[test]
    fn decode_zero_mantissa_is_zero() {
        assert_eq!(decode(0x1d000000), U256::zero());
        assert!(!CompactTarget(0x1d800000).is_negative());
    }

    #[test]
    fn decode_overflow_drops_bits() {
        assert!(CompactTarget(0xff123456).overflows());
        assert_eq!(decode(0xff123456), U256::zero());
        assert_eq!(decode_checked(0xff123456), Err(CompactError::Overflow(0xff123456)));
    }

    #[test]
    fn overflow_boundary() {
        // 0x7fffff needs 23 bits; 23 + 8 * 29 = 255 fits.
        assert!(!CompactTarget(0x207fffff).overflows());
        // 0x00ff at exponent 0x21: 8 + 8 * 30 = 248 fits.
        assert!(!CompactTarget(0x210000ff).overflows());
        assert!(CompactTarget(0x22010000).overflows());
        assert!(decode_checked(0x207fffff).is_ok());
    }

    // ------------------------------------------------------------------
    // encode
    // ------------------------------------------------------------------

    #[test]
    fn encode_zero_is_out_of_range() {
        assert!(matches!(encode(U256::zero()), Err(CompactError::OutOfRange(_))));
    }

    #[test]
    fn encode_known_vectors() {
        assert_eq!(encode(decode(0x1d00ffff)).unwrap(), 0x1d00ffff);
        assert_eq!(encode(decode(0x207fffff)).unwrap(), 0x207fffff);
        assert_eq!(encode(U256::from(0x12u64)).unwrap(), 0x01120000);
        assert_eq!(encode(U256::from(0x1234u64)).unwrap(), 0x02123400);
        assert_eq!(encode(U256::from(0x9234_0000u64)).unwrap(), 0x05009234);
    }

    #[test]
    fn encode_avoids_sign_bit() {
        // 0x80 would set the sign flag at exponent 1.
        assert_eq!(encode(U256::from(0x80u64)).unwrap(), 0x02008000);
        assert_eq!(encode(U256::MAX).unwrap(), 0x2100ffff);
    }

    #[test]
    fn encode_truncates_low_bits() {
        let limit = (U256::one() << 224usize) - U256::one();
        assert_eq!(encode(limit).unwrap(), 0x1d00ffff);
        assert_eq!(canonicalize(limit).unwrap(), decode(0x1d00ffff));
    }

    #[test]
    fn encode_never_sets_sign_bit() {
        for shift in 0..256usize {
            let t = U256::one() << shift;
            let c = encode(t).unwrap();
            assert_eq!(c & SIGN_BIT, 0, "shift {shift} produced {c:#010x}");
            assert_eq!(decode(c), t);
        }
    }

    // ------------------------------------------------------------------
    // CompactTarget
    // ------------------------------------------------------------------

    #[test]
    fn fields() {
        let c = CompactTarget(0x1b0404cb);
        assert_eq!(c.exponent(), 0x1b);
        assert_eq!(c.mantissa(), 0x0404cb);
        assert_eq!(c.to_consensus(), 0x1b0404cb);
    }

    #[test]
    fn display_is_eight_hex_digits() {
        assert_eq!(CompactTarget(0x1d00ffff).to_string(), "1d00ffff");
        assert_eq!(CompactTarget(0x0100_0001).to_string(), "01000001");
    }

    #[test]
    fn parse_with_and_without_prefix() {
        assert_eq!("1d00ffff".parse::<CompactTarget>().unwrap(), CompactTarget(0x1d00ffff));
        assert_eq!("0x207fffff".parse::<CompactTarget>().unwrap(), CompactTarget(0x207fffff));
        assert!("1d00ff".parse::<CompactTarget>().is_err());
        assert!("zzzzzzzz".parse::<CompactTarget>().is_err());
    }

    #[test]
    fn from_target_round_trip() {
        let c = CompactTarget(0x1b0404cb);
        assert_eq!(CompactTarget::from_target(c.to_target()).unwrap(), c);
    }
}

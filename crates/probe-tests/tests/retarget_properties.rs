//! Property tests for the compact codec and both retarget algorithms.
//!
//! Each property test uses 256 cases with proptest shrinking to produce
//! minimal failing examples.
//!
//! Attack vectors tested:
//! - Timestamps that stall, repeat or run backwards (LWMA coercion)
//! - Very fast and very slow adjustment intervals (Interval clamp)
//! - Hash-rate collapse at the easiest target (pow_limit floor)
//! - Retargeting before a full window exists (LWMA early-height guard)

use proptest::prelude::*;

use probe_core::compact::{self, CompactTarget};
use probe_core::params::{NetworkParams, NetworkType, RetargetAlgorithm};
use probe_core::retarget::{self, LWMA_SOLVETIME_CAP};
use probe_core::types::BlockRecord;
use probe_core::U256;
use probe_tests::helpers::{chain_from_solve_times, steady_chain};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const T: i64 = 600;

fn lwma_params() -> NetworkParams {
    NetworkType::Testnet.params()
}

fn interval_params() -> NetworkParams {
    NetworkType::Regtest.params()
}

/// Canonical nbits: normalized mantissa, exponent in `exponents`.
fn canonical_nbits(exponents: std::ops::RangeInclusive<u32>) -> impl Strategy<Value = u32> {
    (exponents, 0x01_0000u32..=0x7f_ffffu32).prop_map(|(exponent, mantissa)| (exponent << 24) | mantissa)
}

fn rel_diff(a: U256, b: U256) -> f64 {
    (a.to_f64() - b.to_f64()).abs() / b.to_f64()
}

// ---------------------------------------------------------------------------
// Compact codec
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn canonical_nbits_round_trip(nbits in canonical_nbits(3..=0x20)) {
        let target = compact::decode(nbits);
        prop_assert_eq!(compact::encode(target).unwrap(), nbits);
        prop_assert_eq!(CompactTarget::from_target(target).unwrap().to_consensus(), nbits);
    }

    #[test]
    fn encode_truncates_toward_zero(raw in 1u128..=u128::MAX, shift in 0usize..=120) {
        let target = U256::from(raw) << shift;
        let nbits = compact::encode(target).unwrap();
        let decoded = compact::decode(nbits);
        prop_assert!(decoded <= target);
        prop_assert!(nbits & compact::SIGN_BIT == 0);
        // The 23-bit mantissa keeps at least 15 significant bits.
        prop_assert!(rel_diff(decoded, target) < 1.0 / 32_768.0);
    }
}

// ---------------------------------------------------------------------------
// Interval-Retarget
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn clamp_stays_within_factor(
        span in i64::MIN..=i64::MAX,
        target_span in 1u64..=10_000_000,
        factor in 1u64..=8,
    ) {
        let clamped = retarget::clamp_time_span(span, target_span, factor);
        prop_assert!(clamped >= target_span / factor);
        prop_assert!(clamped <= target_span * factor);
    }

    #[test]
    fn interval_adjustment_is_bounded(
        nbits in canonical_nbits(0x08..=0x1e),
        solve_times in prop::collection::vec(-3 * T..=10 * T, 72),
    ) {
        let params = interval_params();
        // Tip at 72: the block after it starts the first interval past fork_height 1.
        let window = chain_from_solve_times(0, &solve_times, nbits);
        let tip = compact::decode(nbits);
        let next = retarget::interval_next_target(&params, &window).unwrap();
        prop_assert!(next >= tip / U256::from(2u64));
        prop_assert!(next <= tip * U256::from(2u64));

        let next_bits = retarget::interval_next_nbits(&params, &window).unwrap();
        prop_assert!(compact::decode(next_bits) <= params.pow_limit);
    }

    #[test]
    fn interval_steady_chain_keeps_nbits(nbits in canonical_nbits(0x08..=0x20)) {
        let params = interval_params();
        let window = steady_chain(0, 73, T, nbits);
        prop_assert_eq!(retarget::interval_next_nbits(&params, &window).unwrap(), nbits);
    }

    #[test]
    fn interval_off_height_ignores_timing(
        nbits in canonical_nbits(0x08..=0x1e),
        tip in 73u64..=143,
        solve_times in prop::collection::vec(-3 * T..=10 * T, 1..=20),
    ) {
        let params = interval_params();
        let first = tip - solve_times.len() as u64;
        let window = chain_from_solve_times(first, &solve_times, nbits);
        prop_assert_eq!(retarget::interval_next_nbits(&params, &window).unwrap(), nbits);
    }

    #[test]
    fn interval_floors_at_pow_limit(solve_times in prop::collection::vec(T..=10 * T, 72)) {
        let params = interval_params();
        let easiest = params.pow_limit_bits();
        let window = chain_from_solve_times(72, &solve_times, easiest);
        // Tip at 144: (145 - 1) % 72 == 0.
        prop_assert_eq!(retarget::interval_next_nbits(&params, &window).unwrap(), easiest);
    }
}

#[test]
fn seventy_three_steady_blocks_keep_nbits() {
    let params = NetworkParams {
        algorithm: RetargetAlgorithm::IntervalRetarget,
        fork_height: 1,
        adjust_interval: 72,
        target_solvetime: 600,
        ..NetworkType::Regtest.params()
    };
    let window = steady_chain(0, 73, 600, 0x1c0f_ffff);
    assert!(retarget::is_retarget_height(&params, 72));
    assert_eq!(retarget::next_nbits(&params, &window).unwrap(), 0x1c0f_ffff);
}

// ---------------------------------------------------------------------------
// LWMA
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn lwma_steady_state_is_fixed_point(
        nbits in canonical_nbits(0x12..=0x1c),
        first in 0u64..=100_000,
    ) {
        let params = lwma_params();
        let window = steady_chain(first + 72, 73, T, nbits);
        let next = retarget::lwma_next_nbits(&params, &window).unwrap();
        let (next, tip) = (compact::decode(next), compact::decode(nbits));
        prop_assert!(next <= tip);
        prop_assert!(rel_diff(next, tip) < 1e-4);
    }

    #[test]
    fn lwma_survives_non_monotonic_timestamps(
        nbits in canonical_nbits(0x08..=0x1d),
        solve_times in prop::collection::vec(-12 * T..=12 * T, 72),
    ) {
        let params = lwma_params();
        let window = chain_from_solve_times(1_000, &solve_times, nbits);

        let coerced = retarget::lwma_solve_times(&params, &window).unwrap();
        prop_assert_eq!(coerced.len(), 72);
        for st in coerced {
            prop_assert!((1..=LWMA_SOLVETIME_CAP * T).contains(&st));
        }

        let next = compact::decode(retarget::lwma_next_nbits(&params, &window).unwrap());
        prop_assert!(!next.is_zero());
        prop_assert!(next <= params.pow_limit);
    }

    #[test]
    fn lwma_floors_at_pow_limit(solve_times in prop::collection::vec(6 * T..=20 * T, 72)) {
        let params = lwma_params();
        let easiest = params.pow_limit_bits();
        let window = chain_from_solve_times(5_000, &solve_times, easiest);
        prop_assert_eq!(retarget::lwma_next_nbits(&params, &window).unwrap(), easiest);
    }

    #[test]
    fn lwma_early_heights_use_pow_limit(tip in 0u64..72, nbits in canonical_nbits(0x08..=0x1c)) {
        let params = lwma_params();
        let window = steady_chain(tip, 1, T, nbits);
        prop_assert_eq!(retarget::lwma_next_nbits(&params, &window).unwrap(), params.pow_limit_bits());
    }
}

#[test]
fn testnet_easiest_bits() {
    assert_eq!(lwma_params().pow_limit_bits(), 0x1d00_ffff);
}

#[test]
fn lwma_full_window_required_at_guard_height() {
    let params = lwma_params();
    let short: Vec<BlockRecord> = steady_chain(30, 43, T, 0x1c0f_ffff);
    assert_eq!(short.last().map(|r| r.height), Some(72));
    assert!(retarget::lwma_next_nbits(&params, &short).is_err());
}

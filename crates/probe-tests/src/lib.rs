//! Adversarial test suite for hashprobe.
//!
//! Integration tests that feed the retarget algorithms hostile timestamp
//! sequences and check the consensus invariants still hold.

pub mod helpers;

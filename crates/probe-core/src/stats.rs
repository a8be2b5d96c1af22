//! Solve-time and difficulty statistics over block records.
//!
//! These work on any ordered slice, including sampled histories fetched
//! with a height step greater than one, so contiguity is not required.

use crate::difficulty::DifficultyCalculator;
use crate::types::BlockRecord;

/// Width of one histogram bucket in minutes.
pub const BUCKET_MINUTES: i64 = 5;

/// Number of bounded buckets before the open-ended tail.
pub const BOUNDED_BUCKETS: usize = 3;

/// Seconds between each record and its predecessor, keyed by the later height.
///
/// Negative values are kept: they are the visible trace of forged clocks.
pub fn solve_times(records: &[BlockRecord]) -> Vec<(u64, i64)> {
    records
        .windows(2)
        .map(|pair| (pair[1].height, pair[1].time.saturating_sub(pair[0].time)))
        .collect()
}

/// Difficulty of each record, recomputed from its `nbits`.
pub fn difficulty_series(records: &[BlockRecord], calc: &DifficultyCalculator) -> Vec<(u64, f64)> {
    records
        .iter()
        .map(|r| (r.height, calc.difficulty(r.nbits)))
        .collect()
}

/// Solve times grouped into 5-minute buckets: `[0,5)`, `[5,10)`, `[10,15)`
/// and `≥15` minutes. Negative solve times are counted apart.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SolveTimeHistogram {
    pub buckets: [u64; BOUNDED_BUCKETS + 1],
    pub negative: u64,
}

impl SolveTimeHistogram {
    pub fn from_solve_times<I>(solve_times: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        let mut hist = Self::default();
        for secs in solve_times {
            if secs < 0 {
                hist.negative += 1;
                continue;
            }
            let bucket = ((secs / 60) / BUCKET_MINUTES) as usize;
            hist.buckets[bucket.min(BOUNDED_BUCKETS)] += 1;
        }
        hist
    }

    /// Count of non-negative solve times.
    pub fn total(&self) -> u64 {
        self.buckets.iter().sum()
    }

    /// Human label for bucket `i`.
    pub fn label(i: usize) -> String {
        let lo = i as i64 * BUCKET_MINUTES;
        if i >= BOUNDED_BUCKETS {
            format!(">{lo} minutes")
        } else {
            format!("{lo}~{} minutes", lo + BUCKET_MINUTES)
        }
    }

    /// Share of each bucket in percent of [`total`](Self::total).
    pub fn shares(&self) -> [f64; BOUNDED_BUCKETS + 1] {
        let total = self.total();
        let mut shares = [0.0; BOUNDED_BUCKETS + 1];
        if total == 0 {
            return shares;
        }
        for (share, count) in shares.iter_mut().zip(self.buckets) {
            *share = count as f64 * 100.0 / total as f64;
        }
        shares
    }
}

/// Mean, minimum and maximum of a set of solve times.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveTimeSummary {
    pub count: usize,
    pub mean_secs: f64,
    pub min_secs: i64,
    pub max_secs: i64,
}

impl SolveTimeSummary {
    /// `None` when there are no solve times.
    pub fn from_solve_times(solve_times: &[i64]) -> Option<Self> {
        let min_secs = *solve_times.iter().min()?;
        let max_secs = *solve_times.iter().max()?;
        let sum: i128 = solve_times.iter().map(|&s| s as i128).sum();
        Some(Self {
            count: solve_times.len(),
            mean_secs: sum as f64 / solve_times.len() as f64,
            min_secs,
            max_secs,
        })
    }
}

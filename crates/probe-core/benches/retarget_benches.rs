//! Criterion benchmarks for probe-core hot paths.
//!
//! Covers: compact codec, LWMA and Interval-Retarget, full-history audit.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use probe_core::chain::BlockChainView;
use probe_core::compact;
use probe_core::params::{NetworkParams, NetworkType, RetargetAlgorithm};
use probe_core::retarget;
use probe_core::types::BlockRecord;

// --- Fixtures ---

/// Jittered solve times around 600 s so LWMA does real work.
fn history(count: usize, nbits: u32) -> Vec<BlockRecord> {
    let mut t = 1_600_000_000i64;
    (0..count)
        .map(|i| {
            t += 300 + (i as i64 * 7919) % 600;
            BlockRecord::new(i as u64, t, t - 3_000, nbits)
        })
        .collect()
}

fn bench_compact_codec(c: &mut Criterion) {
    let target = compact::decode(0x1b0404cb);
    c.bench_function("compact_decode", |b| b.iter(|| compact::decode(black_box(0x1b0404cb))));
    c.bench_function("compact_encode", |b| b.iter(|| compact::encode(black_box(target))));
}

fn bench_lwma(c: &mut Criterion) {
    let params = NetworkType::Testnet.params();
    let window = history(params.average_window as usize + 1, 0x1c0fffff);
    c.bench_function("lwma_next_nbits", |b| {
        b.iter(|| retarget::next_nbits(black_box(&params), black_box(&window)))
    });
}

fn bench_interval_retarget(c: &mut Criterion) {
    let params = NetworkParams {
        algorithm: RetargetAlgorithm::IntervalRetarget,
        ..NetworkType::Regtest.params()
    };
    // Fork height 1: tip at 72 makes height 73 a retarget height.
    let window = history(params.adjust_interval as usize + 1, 0x1c0fffff);
    c.bench_function("interval_next_nbits", |b| {
        b.iter(|| retarget::next_nbits(black_box(&params), black_box(&window)))
    });
}

fn bench_audit(c: &mut Criterion) {
    let params = NetworkType::Testnet.params();
    let view = BlockChainView::new(history(1_000, params.pow_limit_bits())).unwrap();
    c.bench_function("audit_1000_blocks", |b| b.iter(|| view.audit(black_box(&params))));
}

criterion_group!(
    benches,
    bench_compact_codec,
    bench_lwma,
    bench_interval_retarget,
    bench_audit
);
criterion_main!(benches);

//! Shared chain builders for the integration tests.

use probe_core::types::BlockRecord;

/// Timestamp of the first synthetic block.
pub const START_TIME: i64 = 1_600_000_000;

/// `count` records from `first_height`, each solved in exactly `solve_time`
/// seconds, all with the same `nbits`.
pub fn steady_chain(first_height: u64, count: usize, solve_time: i64, nbits: u32) -> Vec<BlockRecord> {
    (0..count)
        .map(|i| {
            let time = START_TIME + i as i64 * solve_time;
            BlockRecord::new(first_height + i as u64, time, time, nbits)
        })
        .collect()
}

/// Records from `first_height` whose timestamps follow `solve_times`.
///
/// The first record sits at [`START_TIME`]; each later one adds the next
/// solve time, which may be zero or negative.
pub fn chain_from_solve_times(first_height: u64, solve_times: &[i64], nbits: u32) -> Vec<BlockRecord> {
    let mut time = START_TIME;
    let mut records = Vec::with_capacity(solve_times.len() + 1);
    records.push(BlockRecord::new(first_height, time, time, nbits));
    for (i, solve_time) in solve_times.iter().enumerate() {
        time += solve_time;
        records.push(BlockRecord::new(first_height + i as u64 + 1, time, time, nbits));
    }
    records
}

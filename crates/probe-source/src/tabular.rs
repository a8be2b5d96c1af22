//! Comma-separated block history files.
//!
//! Layout: a header row `height,difficulty,time,mediantime,nbits`, then one
//! row per block. `nbits` is eight lowercase hex digits; everything else is
//! decimal. The difficulty column is for people reading the file and is
//! ignored on load.
//!
//! Files from older fetches lack the `nbits` column. Loading one rebuilds
//! `nbits` from the difficulty, which loses precision, and logs a warning.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use probe_core::compact::{self, CompactTarget};
use probe_core::difficulty::DifficultyCalculator;
use probe_core::types::BlockRecord;

use crate::error::TabularError;

/// Default file name for fetched history.
pub const DEFAULT_FILE_NAME: &str = "blocks.csv";

pub const HEADER: &str = "height,difficulty,time,mediantime,nbits";
pub const LEGACY_HEADER: &str = "height,difficulty,time,mediantime";

/// Write `records` with a header row.
pub fn write_records<W: Write>(
    mut out: W,
    records: &[BlockRecord],
    calc: &DifficultyCalculator,
) -> Result<(), TabularError> {
    writeln!(out, "{HEADER}")?;
    for r in records {
        writeln!(
            out,
            "{},{},{},{},{}",
            r.height,
            calc.difficulty(r.nbits),
            r.time,
            r.mediantime,
            CompactTarget(r.nbits)
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Read records written by [`write_records`], or by an older fetch without `nbits`.
pub fn read_records<R: BufRead>(input: R, calc: &DifficultyCalculator) -> Result<Vec<BlockRecord>, TabularError> {
    let mut lines = input.lines();
    let header = lines.next().ok_or(TabularError::MissingHeader)??;
    let legacy = match header.trim() {
        HEADER => false,
        LEGACY_HEADER => true,
        other => return Err(TabularError::Header(other.to_string())),
    };
    if legacy {
        tracing::warn!("file has no nbits column; rebuilding nbits from difficulty");
    }

    let mut records = Vec::new();
    for (index, line) in lines.enumerate() {
        let line = line?;
        let line_no = index + 2;
        let row = line.trim();
        if row.is_empty() {
            continue;
        }
        records.push(parse_row(row, legacy, calc).map_err(|reason| TabularError::Parse {
            line: line_no,
            reason,
        })?);
    }
    Ok(records)
}

/// Write `records` to `path`, replacing any existing file.
pub fn save(path: &Path, records: &[BlockRecord], calc: &DifficultyCalculator) -> Result<(), TabularError> {
    let file = File::create(path)?;
    write_records(BufWriter::new(file), records, calc)?;
    tracing::info!(path = %path.display(), blocks = records.len(), "block history saved");
    Ok(())
}

/// Load records from `path`.
pub fn load(path: &Path, calc: &DifficultyCalculator) -> Result<Vec<BlockRecord>, TabularError> {
    let file = File::open(path)?;
    let records = read_records(BufReader::new(file), calc)?;
    tracing::debug!(path = %path.display(), blocks = records.len(), "block history loaded");
    Ok(records)
}

fn parse_row(row: &str, legacy: bool, calc: &DifficultyCalculator) -> Result<BlockRecord, String> {
    let fields: Vec<&str> = row.split(',').map(str::trim).collect();
    let expected = if legacy { 4 } else { 5 };
    if fields.len() != expected {
        return Err(format!("expected {expected} fields, found {}", fields.len()));
    }

    let height: u64 = fields[0].parse().map_err(|e| format!("height {:?}: {e}", fields[0]))?;
    let time: i64 = fields[2].parse().map_err(|e| format!("time {:?}: {e}", fields[2]))?;
    let mediantime: i64 = fields[3]
        .parse()
        .map_err(|e| format!("mediantime {:?}: {e}", fields[3]))?;

    let nbits = if legacy {
        nbits_from_difficulty(fields[1], calc)?
    } else {
        let bits: CompactTarget = fields[4].parse().map_err(|e| format!("nbits: {e}"))?;
        bits.0
    };
    Ok(BlockRecord::new(height, time, mediantime, nbits))
}

fn nbits_from_difficulty(field: &str, calc: &DifficultyCalculator) -> Result<u32, String> {
    let difficulty: f64 = field.parse().map_err(|e| format!("difficulty {field:?}: {e}"))?;
    let target = calc
        .target_for_difficulty(difficulty)
        .ok_or_else(|| format!("difficulty {difficulty} has no target"))?;
    compact::encode(target).map_err(|e| e.to_string())
}

//! CSV loader for power readings.
//!
//! Accepts the canonical `timestamp,solar_power_w[,consumption_power_w]`
//! layout and inverter exports (`RTCTime`, `Power Now (W)`). Any other
//! columns are ignored.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::{info, warn};

use crate::error::LoadError;
use crate::reading::{group_by_day, DayBatch, RawReading, Reading};

/// Reads and normalizes every row of one CSV source.
///
/// Rows with unparseable timestamps are dropped and counted.
///
/// # Errors
///
/// Returns [`LoadError::Csv`] for malformed CSV.
pub fn read_readings(reader: impl Read) -> Result<(Vec<Reading>, usize), LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut readings = Vec::new();
    let mut dropped = 0usize;
    for row in rdr.deserialize::<RawReading>() {
        match row?.normalize() {
            Some(reading) => readings.push(reading),
            None => dropped += 1,
        }
    }
    Ok((readings, dropped))
}

/// Loads one or more CSV files into sorted, de-duplicated day batches.
///
/// When two rows share a timestamp the first one read wins.
///
/// # Errors
///
/// Returns a [`LoadError`] if a file cannot be read or parsed, or if no
/// usable reading remains.
pub fn load_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<DayBatch>, LoadError> {
    let mut all = Vec::new();
    let mut dropped = 0usize;
    for path in paths {
        let file = File::open(path.as_ref())?;
        let (readings, n_dropped) = read_readings(io::BufReader::new(file))?;
        all.extend(readings);
        dropped += n_dropped;
    }
    finish(all, dropped)
}

/// Like [`load_files`], for an in-memory or streamed source.
///
/// # Errors
///
/// See [`load_files`].
pub fn load_reader(reader: impl Read) -> Result<Vec<DayBatch>, LoadError> {
    let (readings, dropped) = read_readings(reader)?;
    finish(readings, dropped)
}

fn finish(readings: Vec<Reading>, dropped: usize) -> Result<Vec<DayBatch>, LoadError> {
    if dropped > 0 {
        warn!(dropped, "dropped rows with unparseable timestamps");
    }
    let n_rows = readings.len();
    let days = group_by_day(readings);
    let n_kept: usize = days.iter().map(|d| d.readings.len()).sum();
    if n_kept < n_rows {
        warn!(duplicates = n_rows - n_kept, "dropped rows with duplicate timestamps");
    }
    if days.is_empty() {
        return Err(LoadError::Empty);
    }
    info!(n_days = days.len(), n_readings = n_kept, "readings loaded");
    Ok(days)
}

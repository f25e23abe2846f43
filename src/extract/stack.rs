//! Multi-file stacking
//!
//! Orders recorder files by their start time, extracts each one in tolerant
//! mode and concatenates the per-file tables into one continuous table.
//! Files that cannot be read are logged and left out of the result.

use crate::error::{PlaybackError, Result};
use crate::reader::{ChannelReader, OpenFile};
use chrono::NaiveDateTime;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::declaration::{ChannelDeclaration, NameDeclaration};
use super::file::{extract_file, ExtractOptions};
use super::table::SeriesTable;

/// Marker of the start time line in a recorder file header
pub const START_TIME_MARKER: &str = "starttime:";

/// Number of header lines scanned for [`START_TIME_MARKER`]
pub const HEADER_SCAN_LINES: usize = 20;

const START_TIME_FORMATS: [&str; 2] = ["%d.%m.%Y %H:%M:%S%.f", "%d.%m.%Y %H:%M:%S"];

fn parse_start_time(value: &str) -> Option<NaiveDateTime> {
    START_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
}

/// Look for the start time in the textual file header
///
/// Returns `Ok(None)` when no usable line is found within the first
/// [`HEADER_SCAN_LINES`] lines.
pub fn scan_header_start_time(path: &Path) -> Result<Option<NaiveDateTime>> {
    let mut file = BufReader::new(File::open(path)?);
    let mut line = Vec::new();

    for _ in 0..HEADER_SCAN_LINES {
        line.clear();
        if file.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let text = String::from_utf8_lossy(&line);
        if let Some(value) = text.trim().strip_prefix(START_TIME_MARKER) {
            return Ok(parse_start_time(value.trim()));
        }
    }

    Ok(None)
}

/// Start time of a recorder file
///
/// Tries the header scan first and asks the reader when the header carries
/// no usable start time.
pub fn read_start_time(reader: &mut dyn ChannelReader, path: &Path) -> Result<NaiveDateTime> {
    match scan_header_start_time(path) {
        Ok(Some(start)) => return Ok(start),
        Ok(None) => {}
        Err(e) => tracing::debug!("Header scan of {} failed: {}", path.display(), e),
    }

    let mut file = OpenFile::open(reader, path)?;
    file.start_time()
}

/// Sort files ascending by start time
///
/// Files whose start time cannot be determined are logged and dropped.
pub fn sort_by_start_time(reader: &mut dyn ChannelReader, files: &[PathBuf]) -> Vec<PathBuf> {
    let mut dated: Vec<(NaiveDateTime, PathBuf)> = files
        .iter()
        .filter_map(|path| match read_start_time(reader, path) {
            Ok(start) => Some((start, path.clone())),
            Err(e) => {
                tracing::warn!("Could not read start time of {}: {}", path.display(), e);
                None
            }
        })
        .collect();

    // Stable, so files with equal start times keep their input order
    dated.sort_by_key(|(start, _)| *start);
    dated.into_iter().map(|(_, path)| path).collect()
}

/// Extract and concatenate several files in chronological order
///
/// Each file is extracted in tolerant mode; a file whose extraction fails
/// is excluded. Columns missing from a file are null for that file's rows.
/// Only the final concatenation can fail the batch with
/// [`PlaybackError::DataStacking`].
pub fn stack_files(
    reader: &mut dyn ChannelReader,
    files: &[PathBuf],
    channels: &ChannelDeclaration,
    names: Option<&NameDeclaration>,
    options: &ExtractOptions,
) -> Result<SeriesTable> {
    let options = options.clone().tolerant();
    let ordered = sort_by_start_time(reader, files);

    let mut tables = Vec::with_capacity(ordered.len());
    for path in &ordered {
        match extract_file(reader, path, channels, names, &options) {
            Ok(table) => tables.push(table),
            Err(e) if e.is_file_fatal() => {
                tracing::warn!("Excluding {}: {}", path.display(), e);
            }
            Err(e) => {
                tracing::error!("Excluding {} after failed extraction: {}", path.display(), e);
            }
        }
    }

    if tables.is_empty() {
        return Err(PlaybackError::DataStacking(format!(
            "none of the {} files could be extracted",
            files.len()
        )));
    }

    tracing::info!("Stacking {} of {} files", tables.len(), files.len());
    SeriesTable::concat(tables)
}

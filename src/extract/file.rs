//! Whole-file extraction
//!
//! Runs the declaration normalizer, the metadata validator and the channel
//! extractor for one recorder file and assembles the result into a
//! [`SeriesTable`] with a timestamp column.

use crate::error::{PlaybackError, Result};
use crate::reader::{ChannelReader, OpenFile};
use crate::types::{ChannelInfo, ChannelRef};
use chrono::{NaiveDateTime, TimeDelta};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use super::channel::{extract_spec, Timebase};
use super::declaration::{normalize, ChannelDeclaration, NameDeclaration, DEFAULT_DELIMITER};
use super::table::SeriesTable;
use super::validate::validate;

/// What to do with a requested channel the file does not contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingChannel {
    /// Fail the whole file with [`PlaybackError::ChannelNotFound`]
    #[default]
    Error,
    /// Leave the column out and continue
    Skip,
}

/// Knobs for [`extract_file`]
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractOptions {
    /// Output period in seconds (0 = file reference clock)
    pub tbase: f64,
    /// Delimiter for string declarations
    pub delimiter: String,
    /// Strict or tolerant handling of unresolved channels
    pub missing: MissingChannel,
    /// Warm the OS cache before the structured read
    pub prefetch: bool,
    /// Prefetch only when more channels than this are requested
    pub prefetch_min_channels: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            tbase: 0.0,
            delimiter: DEFAULT_DELIMITER.to_string(),
            missing: MissingChannel::Error,
            prefetch: true,
            prefetch_min_channels: 10,
        }
    }
}

impl ExtractOptions {
    /// Same options with a different output period
    pub fn with_tbase(mut self, tbase: f64) -> Self {
        self.tbase = tbase;
        self
    }

    /// Same options in tolerant mode
    pub fn tolerant(mut self) -> Self {
        self.missing = MissingChannel::Skip;
        self
    }
}

/// Read a file front to back and discard the bytes
///
/// Returns the number of bytes read.
pub fn prefetch(path: &Path) -> Result<u64> {
    let mut file = BufReader::with_capacity(1 << 20, File::open(path)?);
    let bytes = io::copy(&mut file, &mut io::sink())?;
    tracing::debug!("Prefetched {} bytes of {}", bytes, path.display());
    Ok(bytes)
}

/// Timestamp of every reference frame, decimated by `step`
pub fn time_column(start: NaiveDateTime, clock: f64, frames: u64, step: usize) -> Vec<NaiveDateTime> {
    let step = step.max(1);
    (0..frames as usize)
        .step_by(step)
        .map(|i| {
            let offset = (clock * i as f64 * 1e9).round() as i64;
            start + TimeDelta::nanoseconds(offset)
        })
        .collect()
}

/// Extract the declared channels of one file into a table
///
/// Columns are named after the normalized display names and appear in
/// declaration order. In [`MissingChannel::Skip`] mode unresolved channels
/// are left out; every other failure is returned.
pub fn extract_file(
    reader: &mut dyn ChannelReader,
    path: &Path,
    channels: &ChannelDeclaration,
    names: Option<&NameDeclaration>,
    options: &ExtractOptions,
) -> Result<SeriesTable> {
    let mut file = OpenFile::open(reader, path)?;
    let metadata = validate(&mut *file, path)?;

    let available = file.enumerate_channels().map_err(|e| PlaybackError::FileDamaged {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let requested = normalize(channels, names, &options.delimiter, &available);

    if options.prefetch && requested.len() > options.prefetch_min_channels {
        if let Err(e) = prefetch(path) {
            tracing::debug!("Prefetch of {} failed: {}", path.display(), e);
        }
    }

    let start = file.start_time().map_err(|e| PlaybackError::FileDamaged {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let timebase = Timebase {
        requested: options.tbase,
        reference: metadata.clock,
        frames: metadata.frames,
    };
    let mut table = SeriesTable::new(time_column(start, metadata.clock, metadata.frames, timebase.step()));

    for spec in &requested.specs {
        let series = match extract_spec(&mut *file, path, spec, timebase) {
            Ok(series) => series,
            Err(e) if e.is_channel_not_found() && options.missing == MissingChannel::Skip => {
                tracing::debug!("Skipping {}: {}", spec.name, e);
                continue;
            }
            Err(e) => return Err(e),
        };

        table.insert_column(spec.name.as_str(), series.values).map_err(|e| {
            PlaybackError::DataStacking(format!(
                "failed to add channel {} from {}: {}",
                spec.identity,
                path.display(),
                e
            ))
        })?;
    }

    tracing::debug!(
        "Extracted {} of {} channels ({} rows) from {}",
        table.columns().len(),
        requested.len(),
        table.len(),
        path.display()
    );

    Ok(table)
}

/// Describe the channels of a file
///
/// With `channels` set only those identities are described, in that order;
/// identities the file does not contain are skipped.
pub fn channel_infos(
    reader: &mut dyn ChannelReader,
    path: &Path,
    channels: Option<&[String]>,
) -> Result<Vec<ChannelInfo>> {
    let mut file = OpenFile::open(reader, path)?;
    let available = file.enumerate_channels()?;

    let Some(channels) = channels else {
        return Ok(available);
    };

    Ok(channels
        .iter()
        .filter_map(|identity| {
            let channel = ChannelRef::parse(identity);
            let found = available.iter().find(|c| c.matches(&channel)).cloned();
            if found.is_none() {
                tracing::debug!("Channel {} not in {}", identity, path.display());
            }
            found
        })
        .collect())
}

/// Check whether a file contains `identity`
pub fn has_channel(reader: &mut dyn ChannelReader, path: &Path, identity: &str) -> bool {
    match OpenFile::open(reader, path) {
        Ok(mut file) => file.resolve_channel(&ChannelRef::parse(identity)).is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{MemoryChannel, MemoryReader, MemoryRecording};
    use crate::types::{ChannelId, ChannelKind, SampleValue};
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn fixture(dir: &tempfile::TempDir) -> (MemoryReader, PathBuf) {
        let path = dir.path().join("run.dat");
        std::fs::write(&path, b"starttime:01.03.2024 12:00:00\n").unwrap();
        let recording = MemoryRecording::new(&path, 0.01, 6)
            .with_start_time(start())
            .with_module(3, "Drive")
            .with_channel(MemoryChannel::numeric(
                ChannelInfo::new(ChannelId::new(3, 0), "Speed", ChannelKind::Analog),
                0.01,
                vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            ))
            .with_channel(MemoryChannel::numeric(
                ChannelInfo::new(ChannelId::new(3, 1), "Torque", ChannelKind::Analog),
                0.02,
                vec![10.0, 20.0, 30.0],
            ))
            .with_channel(MemoryChannel::numeric(
                ChannelInfo::new(ChannelId::new(3, 2), "Short", ChannelKind::Analog),
                0.01,
                vec![1.0, 2.0],
            ));
        (MemoryReader::new().with_recording(recording), path)
    }

    #[test]
    fn test_mapping_declaration() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reader, path) = fixture(&dir);
        let decl = ChannelDeclaration::Mapping(vec![
            ("3:0".to_string(), "speed".to_string()),
            ("3:1".to_string(), "torque".to_string()),
        ]);

        let table = extract_file(&mut reader, &path, &decl, None, &ExtractOptions::default()).unwrap();
        assert_eq!(table.column_names(), vec!["speed", "torque"]);
        assert_eq!(table.len(), 6);
        assert_eq!(table.timestamps()[0], start());
        assert_eq!(table.timestamps()[5], start() + TimeDelta::milliseconds(50));
        assert_eq!(
            table.column("torque").unwrap().values[..3],
            [SampleValue::Number(10.0), SampleValue::Number(10.0), SampleValue::Number(20.0)]
        );
        assert!(!reader.is_open());
    }

    #[test]
    fn test_decimated_time_column() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reader, path) = fixture(&dir);
        let decl = ChannelDeclaration::Single("Speed".to_string());
        let options = ExtractOptions::default().with_tbase(0.02);

        let table = extract_file(&mut reader, &path, &decl, None, &options).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.timestamps()[1], start() + TimeDelta::milliseconds(20));
        assert_eq!(
            table.column("Speed").unwrap().values,
            vec![1.0.into(), 3.0.into(), 5.0.into()]
        );
    }

    #[test]
    fn test_strict_and_tolerant_missing_channel() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reader, path) = fixture(&dir);
        let decl = ChannelDeclaration::Delimited("Speed, Missing".to_string());

        let err = extract_file(&mut reader, &path, &decl, None, &ExtractOptions::default()).unwrap_err();
        assert!(err.is_channel_not_found());
        assert!(!reader.is_open());

        let table = extract_file(&mut reader, &path, &decl, None, &ExtractOptions::default().tolerant()).unwrap();
        assert_eq!(table.column_names(), vec!["Speed"]);
    }

    #[test]
    fn test_length_mismatch_is_stacking_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reader, path) = fixture(&dir);
        let decl = ChannelDeclaration::Single("3:2".to_string());

        let err = extract_file(&mut reader, &path, &decl, None, &ExtractOptions::default()).unwrap_err();
        assert!(matches!(err, PlaybackError::DataStacking(_)));
    }

    #[test]
    fn test_being_written_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.dat");
        std::fs::write(&path, b"").unwrap();
        let mut reader =
            MemoryReader::new().with_recording(MemoryRecording::new(&path, 0.01, 6).being_written());

        let err = extract_file(&mut reader, &path, &ChannelDeclaration::All, None, &ExtractOptions::default())
            .unwrap_err();
        assert!(matches!(err, PlaybackError::FileCurrentlyWritten(_)));
        assert_eq!(reader.stats().opens, 0);
    }

    #[test]
    fn test_channel_infos_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let (mut reader, path) = fixture(&dir);

        let all = channel_infos(&mut reader, &path, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].module_name, "Drive");

        let some = channel_infos(&mut reader, &path, Some(["3:1".to_string(), "9:9".to_string()].as_slice())).unwrap();
        assert_eq!(some.len(), 1);
        assert_eq!(some[0].name, "Torque");

        assert!(has_channel(&mut reader, &path, "Speed"));
        assert!(!has_channel(&mut reader, &path, "Nope"));
    }

    #[test]
    fn test_prefetch_reads_whole_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.dat");
        std::fs::write(&path, vec![0u8; 4096]).unwrap();
        assert_eq!(prefetch(&path).unwrap(), 4096);
        assert!(prefetch(&dir.path().join("absent.dat")).is_err());
    }
}

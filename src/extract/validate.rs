//! File metadata validation
//!
//! Reads the reference clock and the frame count of a recorder file and
//! classifies the file as usable, damaged, incomplete or vanished.

use crate::error::{PlaybackError, Result};
use crate::reader::{ChannelReader, OpenFile, CLOCK_INFO_KEY, FRAMES_INFO_KEY};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Frame count from which a file is considered unfinished
///
/// The recorder reserves this sentinel while it is still writing.
pub const INCOMPLETE_FRAME_SENTINEL: u64 = 1_000_000_000;

/// Clock and size of a validated file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FileMetadata {
    /// Reference clock period in seconds
    pub clock: f64,
    /// Number of frames on the reference clock
    pub frames: u64,
}

impl FileMetadata {
    /// Duration covered by the file in seconds
    pub fn duration_secs(&self) -> f64 {
        self.clock * self.frames as f64
    }
}

/// A validated file together with its start time
#[derive(Debug, Clone, PartialEq)]
pub struct FileDescriptor {
    /// Path of the file
    pub path: PathBuf,
    /// Reference clock period in seconds
    pub clock: f64,
    /// Number of frames on the reference clock
    pub frames: u64,
    /// Recording start
    pub start_time: NaiveDateTime,
}

fn read_metadata(reader: &mut dyn ChannelReader) -> Result<FileMetadata> {
    let clock_raw = reader.query_info(CLOCK_INFO_KEY)?;
    let frames_raw = reader.query_info(FRAMES_INFO_KEY)?;

    let clock: f64 = clock_raw
        .trim()
        .parse()
        .map_err(|_| PlaybackError::Reader(format!("clock '{}' is not a number", clock_raw)))?;
    if !(clock.is_finite() && clock > 0.0) {
        return Err(PlaybackError::Reader(format!(
            "clock {} is not a positive period",
            clock
        )));
    }

    let frames: u64 = frames_raw
        .trim()
        .parse()
        .map_err(|_| PlaybackError::Reader(format!("frame count '{}' is not an integer", frames_raw)))?;

    Ok(FileMetadata { clock, frames })
}

/// Validate the file at `path` and return its clock and frame count
///
/// Opens the file if the reader has nothing open and closes it again on
/// every exit path; a file the caller already opened stays open.
pub fn validate(reader: &mut dyn ChannelReader, path: &Path) -> Result<FileMetadata> {
    let mut file = OpenFile::open(reader, path)?;

    let metadata = match read_metadata(&mut *file) {
        Ok(metadata) => metadata,
        Err(e) => {
            if !path.exists() {
                return Err(PlaybackError::FileNotFound(path.to_path_buf()));
            }
            tracing::debug!("Metadata query failed for {}: {}", path.display(), e);
            return Err(PlaybackError::FileDamaged {
                path: path.to_path_buf(),
                reason: e.to_string(),
            });
        }
    };

    if metadata.frames >= INCOMPLETE_FRAME_SENTINEL {
        return Err(PlaybackError::FileIncomplete {
            path: path.to_path_buf(),
            frames: metadata.frames,
        });
    }

    Ok(metadata)
}

/// Validate a file and read its start time from the reader
pub fn describe(reader: &mut dyn ChannelReader, path: &Path) -> Result<FileDescriptor> {
    let mut file = OpenFile::open(reader, path)?;
    let metadata = validate(&mut *file, path)?;
    let start_time = file.start_time().map_err(|e| PlaybackError::FileDamaged {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    Ok(FileDescriptor {
        path: path.to_path_buf(),
        clock: metadata.clock,
        frames: metadata.frames,
        start_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::{MemoryReader, MemoryRecording};
    use std::fs::File;

    fn on_disk(dir: &tempfile::TempDir, name: &str) -> PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap();
        path
    }

    #[test]
    fn test_valid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(&dir, "ok.dat");
        let mut reader = MemoryReader::new().with_recording(MemoryRecording::new(&path, 0.001, 5000));

        let meta = validate(&mut reader, &path).unwrap();
        assert_eq!(meta.clock, 0.001);
        assert_eq!(meta.frames, 5000);
        assert!((meta.duration_secs() - 5.0).abs() < 1e-9);
        assert!(!reader.is_open());
    }

    #[test]
    fn test_sentinel_frame_count_is_incomplete() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(&dir, "partial.dat");
        let mut reader = MemoryReader::new()
            .with_recording(MemoryRecording::new(&path, 0.001, INCOMPLETE_FRAME_SENTINEL));

        let err = validate(&mut reader, &path).unwrap_err();
        assert!(matches!(err, PlaybackError::FileIncomplete { frames, .. } if frames == 1_000_000_000));
        assert!(!reader.is_open());
    }

    #[test]
    fn test_damaged_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(&dir, "broken.dat");
        let mut reader = MemoryReader::new().with_recording(MemoryRecording::new(&path, 0.001, 10).damaged());

        let err = validate(&mut reader, &path).unwrap_err();
        assert!(matches!(err, PlaybackError::FileDamaged { .. }));
        assert!(!reader.is_open());
    }

    #[test]
    fn test_vanished_file() {
        // Registered with the reader but absent from disk
        let path = PathBuf::from("/nonexistent/vanished.dat");
        let mut reader = MemoryReader::new().with_recording(MemoryRecording::new(&path, 0.001, 10).damaged());

        let err = validate(&mut reader, &path).unwrap_err();
        assert!(matches!(err, PlaybackError::FileNotFound(_)));
    }

    #[test]
    fn test_caller_owned_handle_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = on_disk(&dir, "broken.dat");
        let mut reader = MemoryReader::new().with_recording(MemoryRecording::new(&path, 0.001, 10).damaged());
        reader.open(&path).unwrap();

        assert!(validate(&mut reader, &path).is_err());
        assert!(reader.is_open());
    }
}

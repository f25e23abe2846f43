//! Channel reader interface
//!
//! The binary recorder format is decoded by an external reader. This module
//! defines the trait every reader binding implements, plus the [`OpenFile`]
//! guard that opens a file for the duration of a scope and closes it again
//! only if the guard was the one that opened it.
//!
//! # Components
//!
//! - [`ChannelReader`] - Open/close, metadata, channel resolution, samples
//! - [`OpenFile`] - Scoped open that never closes a caller-owned handle
//! - [`MemoryReader`] - In-memory reader for tests and demo runs

pub mod memory;

pub use memory::{MemoryChannel, MemoryData, MemoryReader, MemoryRecording, SamplePattern};

use crate::error::{PlaybackError, Result};
use crate::types::{ChannelInfo, ChannelRef, RawSamples};
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Metadata key holding the reference clock period in seconds
pub const CLOCK_INFO_KEY: &str = "clk";

/// Metadata key holding the frame count
pub const FRAMES_INFO_KEY: &str = "frames";

/// Opaque handle to a resolved channel, valid while the file stays open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle(pub usize);

/// Unified interface for recorder file readers
///
/// Implementations hold at most one open file at a time. They must be
/// `Send` so the offline pass can run on any thread.
pub trait ChannelReader: Send {
    /// Open a recorder file
    fn open(&mut self, path: &Path) -> Result<()>;

    /// Close the currently open file (no-op when nothing is open)
    fn close(&mut self);

    /// Check if a file is open
    fn is_open(&self) -> bool;

    /// Path of the open file, if any
    fn current_path(&self) -> Option<&Path>;

    /// Whether the recorder is still writing the file at `path`
    ///
    /// Checked before opening.
    fn is_being_written(&self, path: &Path) -> bool;

    /// List every channel of the open file
    fn enumerate_channels(&mut self) -> Result<Vec<ChannelInfo>>;

    /// Query a single file-level metadata entry
    fn query_info(&mut self, key: &str) -> Result<String>;

    /// Query all file-level metadata entries
    fn query_infos(&mut self) -> Result<BTreeMap<String, String>>;

    /// Resolve a channel reference to a handle
    fn resolve_channel(&mut self, channel: &ChannelRef) -> Result<ChannelHandle>;

    /// Information about a resolved channel
    fn channel_info(&mut self, handle: ChannelHandle) -> Result<ChannelInfo>;

    /// Raw samples of a resolved channel
    fn samples(&mut self, handle: ChannelHandle) -> Result<RawSamples>;

    /// Start time of the open file
    fn start_time(&mut self) -> Result<NaiveDateTime>;
}

/// Scoped access to an open recorder file
///
/// Dereferences to the underlying reader. On drop the file is closed only
/// if this guard opened it.
pub struct OpenFile<'r> {
    reader: &'r mut (dyn ChannelReader + 'r),
    path: PathBuf,
    owns_handle: bool,
}

impl<'r> OpenFile<'r> {
    /// Open `path` unless the reader already has it open
    ///
    /// Fails fast with [`PlaybackError::FileCurrentlyWritten`] when the
    /// recorder still owns the file, and with [`PlaybackError::Reader`] when
    /// the reader holds a different file.
    pub fn open(reader: &'r mut (dyn ChannelReader + 'r), path: &Path) -> Result<Self> {
        if reader.is_being_written(path) {
            return Err(PlaybackError::FileCurrentlyWritten(path.to_path_buf()));
        }

        let owns_handle = !reader.is_open();
        if !owns_handle {
            match reader.current_path() {
                Some(open) if open == path => {}
                other => {
                    return Err(PlaybackError::Reader(format!(
                        "reader has {} open, not {}",
                        other.map_or_else(|| "an unknown file".to_string(), |p| p.display().to_string()),
                        path.display()
                    )))
                }
            }
        }
        if owns_handle {
            if let Err(e) = reader.open(path) {
                // Make sure a half-open reader is not left behind
                reader.close();
                if !path.is_file() {
                    return Err(PlaybackError::FileNotFound(path.to_path_buf()));
                }
                return Err(e);
            }
        }

        Ok(Self {
            reader,
            path: path.to_path_buf(),
            owns_handle,
        })
    }

    /// Path of the file this guard refers to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the guard will close the file on drop
    pub fn owns_handle(&self) -> bool {
        self.owns_handle
    }
}

impl<'r> Deref for OpenFile<'r> {
    type Target = dyn ChannelReader + 'r;

    fn deref(&self) -> &Self::Target {
        &*self.reader
    }
}

impl<'r> DerefMut for OpenFile<'r> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.reader
    }
}

impl Drop for OpenFile<'_> {
    fn drop(&mut self) {
        if self.owns_handle {
            self.reader.close();
        }
    }
}

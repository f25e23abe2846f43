//! Error handling for recplay
//!
//! This module defines the error taxonomy shared by the offline extraction
//! pass and the playback workers, plus a Result alias for use throughout
//! the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for recplay operations
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// A requested channel identity could not be resolved in a file
    #[error("Channel {channel} is not available in {}", .path.display())]
    ChannelNotFound { channel: String, path: PathBuf },

    /// The file vanished or could not be accessed
    #[error("File {} does not exist or can not be accessed", .0.display())]
    FileNotFound(PathBuf),

    /// Metadata or channel data could not be read
    #[error("File {} seems to be damaged: {reason}", .path.display())]
    FileDamaged { path: PathBuf, reason: String },

    /// The recorder did not finish writing the file
    #[error("Recorder did not finish writing {} ({frames} frames reported)", .path.display())]
    FileIncomplete { path: PathBuf, frames: u64 },

    /// The recorder still owns the file
    #[error("File {} is currently written by the recorder", .0.display())]
    FileCurrentlyWritten(PathBuf),

    /// Per-channel series could not be merged into a table
    #[error("Data stacking failed: {0}")]
    DataStacking(String),

    /// A channel clock that cannot be aligned onto the reference clock
    #[error("Channel {channel} clock {native}s cannot be aligned to reference clock {reference}s")]
    UnsupportedClock {
        channel: String,
        native: f64,
        reference: f64,
    },

    /// Errors reported by the channel reader
    #[error("Reader error: {0}")]
    Reader(String),

    /// Errors reported by the publish sink
    #[error("Sink error: {0}")]
    Sink(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<PlaybackError>,
    },
}

impl PlaybackError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        PlaybackError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root(&self) -> &PlaybackError {
        match self {
            PlaybackError::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this error describes a problem with the file itself
    ///
    /// Multi-file stacking logs these as warnings when it excludes a file;
    /// any other extraction failure is logged as an error.
    pub fn is_file_fatal(&self) -> bool {
        matches!(
            self.root(),
            PlaybackError::ChannelNotFound { .. }
                | PlaybackError::FileNotFound(_)
                | PlaybackError::FileDamaged { .. }
                | PlaybackError::FileIncomplete { .. }
                | PlaybackError::FileCurrentlyWritten(_)
                | PlaybackError::UnsupportedClock { .. }
                | PlaybackError::Reader(_)
                | PlaybackError::Io(_)
        )
    }

    /// Whether this is a channel resolution failure
    pub fn is_channel_not_found(&self) -> bool {
        matches!(self.root(), PlaybackError::ChannelNotFound { .. })
    }
}

/// Result type alias for recplay operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlaybackError::ChannelNotFound {
            channel: "3:12".to_string(),
            path: PathBuf::from("a.dat"),
        };
        assert_eq!(err.to_string(), "Channel 3:12 is not available in a.dat");
    }

    #[test]
    fn test_error_with_context() {
        let err = PlaybackError::DataStacking("shape".to_string());
        let with_ctx = err.with_context("Failed to merge");
        assert!(with_ctx.to_string().contains("Failed to merge"));
        assert!(matches!(with_ctx.root(), PlaybackError::DataStacking(_)));
    }

    #[test]
    fn test_file_fatal_classification() {
        let incomplete = PlaybackError::FileIncomplete {
            path: PathBuf::from("b.dat"),
            frames: 1_000_000_000,
        };
        assert!(incomplete.is_file_fatal());

        let stacking = PlaybackError::DataStacking("x".to_string());
        assert!(!stacking.is_file_fatal());

        let wrapped = PlaybackError::FileCurrentlyWritten(PathBuf::from("c.dat"))
            .with_context("reading c.dat");
        assert!(wrapped.is_file_fatal());
    }
}

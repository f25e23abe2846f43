//! # recplay: Recorder File Playback
//!
//! Extracts multi-channel time series from recorder files and replays them
//! in real time, each channel at its original sample rate, toward a publish
//! sink such as an industrial protocol server.
//!
//! ## Architecture
//!
//! - **Reader**: the file decoder sits behind the [`reader::ChannelReader`] trait
//! - **Extract**: declaration normalizing, metadata validation, resampling and
//!   multi-file stacking into [`extract::SeriesTable`]s (offline, single pass)
//! - **Playback**: one drift-corrected worker thread per sample rate
//! - **Sink**: the outbound node tree behind the [`sink::PublishSink`] trait
//! - **Communication**: crossbeam channels for worker events and wake-ups
//!
//! ## Configuration
//!
//! Settings are read from a TOML file, by default in the platform config
//! directory under `recplay/recplay.toml`. See [`config::PlaybackConfig`].
//!
//! ## Example
//!
//! ```ignore
//! use recplay::{config::PlaybackConfig, playback, sink::MemorySink};
//! use std::sync::Arc;
//!
//! let config = PlaybackConfig::load_or_default("recplay.toml");
//! let sink = Arc::new(MemorySink::new());
//! let mut playback = playback::run(&mut reader, sink, &config)?;
//! std::thread::sleep(std::time::Duration::from_secs(60));
//! let stats = playback.shutdown();
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod playback;
pub mod reader;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use config::PlaybackConfig;
pub use error::{PlaybackError, Result, ResultExt};
pub use extract::{stack_files, ChannelDeclaration, ExtractOptions, SeriesTable};
pub use playback::{Playback, PlaybackEvent, PreparedSession, TickStats};
pub use reader::{ChannelReader, MemoryReader};
pub use sink::{MemorySink, PublishSink};
pub use types::{ChannelInfo, ChannelKind, SampleValue};

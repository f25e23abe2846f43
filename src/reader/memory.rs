//! In-memory channel reader
//!
//! This module provides a reader that serves recordings held in memory. It
//! is used by the test-suite and by the `demo` command of the binary, and
//! doubles as a reference for how a real reader binding should behave.
//!
//! # Features
//!
//! - **Explicit samples**: numeric vectors or sparse text transitions
//! - **Pattern-based data generation**: synthesize channels from waveforms
//! - **Failure simulation**: damaged headers, unreadable channels and files
//!   still being written by the recorder
//!
//! # Example
//!
//! ```ignore
//! use recplay::reader::{MemoryChannel, MemoryReader, MemoryRecording, SamplePattern};
//!
//! let mut reader = MemoryReader::new();
//! reader.insert(
//!     MemoryRecording::new("line1.dat", 0.001, 10_000).with_channel(MemoryChannel::pattern(
//!         info,
//!         0.01,
//!         SamplePattern::Sine { frequency: 1.0, amplitude: 10.0, offset: 0.0 },
//!     )),
//! );
//! ```

use crate::error::{PlaybackError, Result};
use crate::types::{ChannelInfo, ChannelRef, RawSamples, TextEvent};
use chrono::NaiveDateTime;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use super::{ChannelHandle, ChannelReader, CLOCK_INFO_KEY, FRAMES_INFO_KEY};

/// Pattern for generating synthetic channel data
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SamplePattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments once per sample and wraps
    Counter { step: f64, min: f64, max: f64 },
    /// Sawtooth wave
    Sawtooth { period: f64, amplitude: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
    /// Triangle wave
    Triangle { period: f64, amplitude: f64 },
}

impl Default for SamplePattern {
    fn default() -> Self {
        SamplePattern::Sine {
            frequency: 1.0,
            amplitude: 100.0,
            offset: 0.0,
        }
    }
}

impl SamplePattern {
    /// Value of the `index`-th sample, taken `elapsed_secs` after file start
    pub fn value_at(&self, index: usize, elapsed_secs: f64) -> f64 {
        match *self {
            SamplePattern::Constant(v) => v,
            SamplePattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed_secs).sin(),
            SamplePattern::Counter { step, min, max } => {
                let span = max - min;
                if span <= 0.0 {
                    return min;
                }
                min + (index as f64 * step).rem_euclid(span)
            }
            SamplePattern::Sawtooth { period, amplitude } => {
                let t = elapsed_secs % period;
                amplitude * (t / period)
            }
            SamplePattern::Square { period, amplitude } => {
                let t = elapsed_secs % period;
                if t < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
            SamplePattern::Triangle { period, amplitude } => {
                let t = elapsed_secs % period;
                let half = period / 2.0;
                if t < half {
                    amplitude * (2.0 * t / half - 1.0)
                } else {
                    amplitude * (1.0 - 2.0 * (t - half) / half)
                }
            }
        }
    }

    /// Generate `count` samples spaced `timebase` seconds apart
    pub fn generate(&self, timebase: f64, count: usize) -> Vec<f64> {
        (0..count)
            .map(|i| self.value_at(i, i as f64 * timebase))
            .collect()
    }
}

/// Data source of an in-memory channel
#[derive(Debug, Clone, PartialEq)]
pub enum MemoryData {
    /// Explicit numeric samples at `timebase`
    Numeric { timebase: f64, values: Vec<f64> },
    /// Samples synthesized on demand, sized to cover the whole file
    Pattern {
        timebase: f64,
        pattern: SamplePattern,
    },
    /// Sparse text transitions
    Text(Vec<TextEvent>),
    /// The channel resolves but its data cannot be read
    Unreadable,
}

/// A channel served by [`MemoryReader`]
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryChannel {
    /// Channel information reported by enumeration
    pub info: ChannelInfo,
    /// Sample source
    pub data: MemoryData,
}

impl MemoryChannel {
    /// Numeric channel with explicit samples
    pub fn numeric(info: ChannelInfo, timebase: f64, values: Vec<f64>) -> Self {
        Self {
            info: info.with_timebase(timebase),
            data: MemoryData::Numeric { timebase, values },
        }
    }

    /// Numeric channel synthesized from a pattern
    pub fn pattern(info: ChannelInfo, timebase: f64, pattern: SamplePattern) -> Self {
        Self {
            info: info.with_timebase(timebase),
            data: MemoryData::Pattern { timebase, pattern },
        }
    }

    /// Text channel with sparse transitions
    pub fn text(info: ChannelInfo, events: Vec<TextEvent>) -> Self {
        Self {
            info,
            data: MemoryData::Text(events),
        }
    }

    /// Channel whose data read fails
    pub fn unreadable(info: ChannelInfo) -> Self {
        Self {
            info,
            data: MemoryData::Unreadable,
        }
    }
}

/// A recorder file held in memory
#[derive(Debug, Clone)]
pub struct MemoryRecording {
    /// Path the recording answers to
    pub path: PathBuf,
    /// Reference clock period in seconds
    pub clock: f64,
    /// Number of frames on the reference clock
    pub frames: u64,
    /// Recording start
    pub start_time: NaiveDateTime,
    /// Module number to module name
    pub modules: BTreeMap<u32, String>,
    /// Channels in enumeration order
    pub channels: Vec<MemoryChannel>,
    /// Simulate a file the recorder is still writing
    pub being_written: bool,
    /// Simulate a file whose header cannot be parsed
    pub damaged: bool,
}

impl MemoryRecording {
    /// Create an empty recording starting at the Unix epoch
    pub fn new(path: impl Into<PathBuf>, clock: f64, frames: u64) -> Self {
        Self {
            path: path.into(),
            clock,
            frames,
            start_time: NaiveDateTime::default(),
            modules: BTreeMap::new(),
            channels: Vec::new(),
            being_written: false,
            damaged: false,
        }
    }

    /// Set the start time
    pub fn with_start_time(mut self, start_time: NaiveDateTime) -> Self {
        self.start_time = start_time;
        self
    }

    /// Name a module
    pub fn with_module(mut self, number: u32, name: impl Into<String>) -> Self {
        self.modules.insert(number, name.into());
        self
    }

    /// Add a channel; its module name is filled in from the module table
    pub fn with_channel(mut self, mut channel: MemoryChannel) -> Self {
        if channel.info.module_name.is_empty() {
            if let Some(name) = self.modules.get(&channel.info.id.module) {
                channel.info.module_name = name.clone();
            }
        }
        self.channels.push(channel);
        self
    }

    /// Mark the file as still being written
    pub fn being_written(mut self) -> Self {
        self.being_written = true;
        self
    }

    /// Mark the header as unreadable
    pub fn damaged(mut self) -> Self {
        self.damaged = true;
        self
    }

    /// Duration covered by the reference clock
    pub fn duration_secs(&self) -> f64 {
        self.clock * self.frames as f64
    }
}

/// Counters for reader operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReaderStats {
    /// Successful opens
    pub opens: u64,
    /// Closes of an open file
    pub closes: u64,
    /// Sample reads served
    pub sample_reads: u64,
}

/// Reader serving [`MemoryRecording`]s by path
#[derive(Debug, Default)]
pub struct MemoryReader {
    recordings: HashMap<PathBuf, MemoryRecording>,
    open: Option<PathBuf>,
    stats: ReaderStats,
}

impl MemoryReader {
    /// Create an empty reader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a recording under its path
    pub fn insert(&mut self, recording: MemoryRecording) {
        self.recordings.insert(recording.path.clone(), recording);
    }

    /// Builder-style [`MemoryReader::insert`]
    pub fn with_recording(mut self, recording: MemoryRecording) -> Self {
        self.insert(recording);
        self
    }

    /// Paths of all registered recordings
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.recordings.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Operation counters
    pub fn stats(&self) -> &ReaderStats {
        &self.stats
    }

    fn current(&self) -> Result<&MemoryRecording> {
        let path = self
            .open
            .as_ref()
            .ok_or_else(|| PlaybackError::Reader("no file is open".to_string()))?;
        self.recordings
            .get(path)
            .ok_or_else(|| PlaybackError::Reader(format!("{} vanished", path.display())))
    }

    fn header(&self) -> Result<&MemoryRecording> {
        let recording = self.current()?;
        if recording.damaged {
            return Err(PlaybackError::Reader(format!(
                "malformed header in {}",
                recording.path.display()
            )));
        }
        Ok(recording)
    }

    fn channel(&self, handle: ChannelHandle) -> Result<&MemoryChannel> {
        self.current()?
            .channels
            .get(handle.0)
            .ok_or_else(|| PlaybackError::Reader(format!("invalid channel handle {}", handle.0)))
    }
}

impl ChannelReader for MemoryReader {
    fn open(&mut self, path: &Path) -> Result<()> {
        if !self.recordings.contains_key(path) {
            return Err(PlaybackError::Reader(format!(
                "cannot open {}",
                path.display()
            )));
        }
        self.open = Some(path.to_path_buf());
        self.stats.opens += 1;
        Ok(())
    }

    fn close(&mut self) {
        if self.open.take().is_some() {
            self.stats.closes += 1;
        }
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn current_path(&self) -> Option<&Path> {
        self.open.as_deref()
    }

    fn is_being_written(&self, path: &Path) -> bool {
        self.recordings
            .get(path)
            .map(|r| r.being_written)
            .unwrap_or(false)
    }

    fn enumerate_channels(&mut self) -> Result<Vec<ChannelInfo>> {
        Ok(self
            .header()?
            .channels
            .iter()
            .map(|c| c.info.clone())
            .collect())
    }

    fn query_info(&mut self, key: &str) -> Result<String> {
        self.query_infos()?
            .remove(key)
            .ok_or_else(|| PlaybackError::Reader(format!("unknown info key '{}'", key)))
    }

    fn query_infos(&mut self) -> Result<BTreeMap<String, String>> {
        let recording = self.header()?;
        let mut infos = BTreeMap::new();
        infos.insert(CLOCK_INFO_KEY.to_string(), recording.clock.to_string());
        infos.insert(FRAMES_INFO_KEY.to_string(), recording.frames.to_string());
        for (number, name) in &recording.modules {
            infos.insert(format!("Module_name_{}", number), name.clone());
        }
        Ok(infos)
    }

    fn resolve_channel(&mut self, channel: &ChannelRef) -> Result<ChannelHandle> {
        self.current()?
            .channels
            .iter()
            .position(|c| c.info.matches(channel))
            .map(ChannelHandle)
            .ok_or_else(|| PlaybackError::Reader(format!("unknown channel '{}'", channel)))
    }

    fn channel_info(&mut self, handle: ChannelHandle) -> Result<ChannelInfo> {
        Ok(self.channel(handle)?.info.clone())
    }

    fn samples(&mut self, handle: ChannelHandle) -> Result<RawSamples> {
        let duration = self.current()?.duration_secs();
        let samples = match &self.channel(handle)?.data {
            MemoryData::Numeric { timebase, values } => RawSamples::Numeric {
                timebase: *timebase,
                values: values.clone(),
            },
            MemoryData::Pattern { timebase, pattern } => {
                let count = (duration / timebase).round() as usize;
                RawSamples::Numeric {
                    timebase: *timebase,
                    values: pattern.generate(*timebase, count),
                }
            }
            MemoryData::Text(events) => RawSamples::Text(events.clone()),
            MemoryData::Unreadable => {
                return Err(PlaybackError::Reader(format!(
                    "channel data of handle {} is unreadable",
                    handle.0
                )))
            }
        };
        self.stats.sample_reads += 1;
        Ok(samples)
    }

    fn start_time(&mut self) -> Result<NaiveDateTime> {
        Ok(self.header()?.start_time)
    }
}

//! Test data builders for creating recordings

use chrono::{NaiveDate, NaiveDateTime};
use recplay::reader::{MemoryChannel, MemoryRecording};
use recplay::types::{ChannelId, ChannelInfo, ChannelKind, TextEvent};
use std::path::{Path, PathBuf};

/// Fixed start time with a seconds offset
pub fn start_at(secs: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 14)
        .unwrap()
        .and_hms_opt(6, 0, 0)
        .unwrap()
        + chrono::TimeDelta::seconds(i64::from(secs))
}

/// Builder for a recording backed by a real file on disk
///
/// The file only carries the textual start time header; the channel data
/// is served by `MemoryReader`.
pub struct RecordingBuilder {
    path: PathBuf,
    clock: f64,
    frames: u64,
    start: NaiveDateTime,
    header: bool,
    channels: Vec<MemoryChannel>,
}

impl RecordingBuilder {
    pub fn new(dir: &Path, name: &str, clock: f64, frames: u64) -> Self {
        Self {
            path: dir.join(name),
            clock,
            frames,
            start: start_at(0),
            header: true,
            channels: Vec::new(),
        }
    }

    pub fn start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    /// Leave the start time out of the file header
    pub fn without_header(mut self) -> Self {
        self.header = false;
        self
    }

    pub fn numeric(mut self, module: u32, number: u32, name: &str, timebase: f64, values: Vec<f64>) -> Self {
        let info = ChannelInfo::new(ChannelId::new(module, number), name, ChannelKind::Analog);
        self.channels.push(MemoryChannel::numeric(info, timebase, values));
        self
    }

    pub fn digital(mut self, module: u32, number: u32, name: &str, timebase: f64, values: Vec<f64>) -> Self {
        let info = ChannelInfo::new(ChannelId::new(module, number), name, ChannelKind::Digital);
        self.channels.push(MemoryChannel::numeric(info, timebase, values));
        self
    }

    pub fn text(mut self, module: u32, number: u32, name: &str, events: Vec<(f64, &str)>) -> Self {
        let info = ChannelInfo::new(ChannelId::new(module, number), name, ChannelKind::Text);
        let events = events.into_iter().map(|(o, v)| TextEvent::new(o, v)).collect();
        self.channels.push(MemoryChannel::text(info, events));
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the file and return the recording to register with the reader
    pub fn build(self) -> MemoryRecording {
        let header = if self.header {
            format!("starttime:{}\n", self.start.format("%d.%m.%Y %H:%M:%S%.3f"))
        } else {
            "no header here\n".to_string()
        };
        std::fs::write(&self.path, header).unwrap();

        let mut recording = MemoryRecording::new(&self.path, self.clock, self.frames)
            .with_start_time(self.start)
            .with_module(1, "Line")
            .with_module(2, "Aux");
        for channel in self.channels {
            recording = recording.with_channel(channel);
        }
        recording
    }
}

/// `n` values counting up from `first`
pub fn ramp(first: f64, n: usize) -> Vec<f64> {
    (0..n).map(|i| first + i as f64).collect()
}

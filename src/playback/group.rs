//! Playback groups
//!
//! Channels sharing one sample period form a [`PlaybackGroup`]. A group
//! owns its rows, one value per member channel per tick, and is served by
//! exactly one worker.

use crate::error::{PlaybackError, Result};
use crate::extract::SeriesTable;
use crate::sink::NodeHandle;
use crate::types::{ChannelInfo, SampleValue};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Sample period used as a grouping key, in whole nanoseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RateKey(u64);

impl RateKey {
    /// Key for a period in seconds; `None` for non-positive periods
    pub fn from_secs(period: f64) -> Option<Self> {
        if !(period.is_finite() && period > 0.0) {
            return None;
        }
        let nanos = (period * 1e9).round();
        (nanos >= 1.0).then_some(RateKey(nanos as u64))
    }

    /// Period as a duration
    pub fn period(&self) -> Duration {
        Duration::from_nanos(self.0)
    }

    /// Period in seconds
    pub fn secs(&self) -> f64 {
        self.0 as f64 / 1e9
    }
}

impl fmt::Display for RateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.secs())
    }
}

/// Split channels by their native sample period
///
/// Channels without a native period (text channels) play at
/// `reference_clock`. Periods shorter than `min_period` are raised to it,
/// so faster channels share one decimated group (0 disables the floor).
/// With `include_text` unset text channels are left out.
pub fn partition_by_rate(
    channels: &[ChannelInfo],
    reference_clock: f64,
    min_period: f64,
    include_text: bool,
) -> BTreeMap<RateKey, Vec<ChannelInfo>> {
    let mut groups: BTreeMap<RateKey, Vec<ChannelInfo>> = BTreeMap::new();

    for info in channels {
        if !include_text && !info.kind.is_numeric() {
            continue;
        }
        let period = info.timebase.unwrap_or(reference_clock).max(min_period);
        match RateKey::from_secs(period) {
            Some(key) => groups.entry(key).or_default().push(info.clone()),
            None => tracing::warn!("Skipping {} with invalid period {}", info.label(), period),
        }
    }

    groups
}

/// A channel published by a group
#[derive(Debug, Clone, PartialEq)]
pub struct GroupChannel {
    /// Static channel description
    pub info: ChannelInfo,
    /// Column in the extracted table
    pub column: String,
    /// Value node in the sink
    pub handle: NodeHandle,
}

/// Channels of one sample rate and their pre-extracted rows
#[derive(Debug, Clone)]
pub struct PlaybackGroup {
    rate: RateKey,
    channels: Vec<GroupChannel>,
    rows: Vec<Vec<SampleValue>>,
}

impl PlaybackGroup {
    /// Create a group from ready rows
    ///
    /// Every row must hold one value per channel.
    pub fn new(rate: RateKey, channels: Vec<GroupChannel>, rows: Vec<Vec<SampleValue>>) -> Result<Self> {
        if let Some(i) = rows.iter().position(|r| r.len() != channels.len()) {
            return Err(PlaybackError::DataStacking(format!(
                "row {} of group {} has {} values for {} channels",
                i,
                rate,
                rows[i].len(),
                channels.len()
            )));
        }
        Ok(Self { rate, channels, rows })
    }

    /// Build a group by transposing the matching columns of `table`
    ///
    /// A channel without a column plays nulls.
    pub fn from_table(rate: RateKey, channels: Vec<GroupChannel>, table: &SeriesTable) -> Result<Self> {
        let columns: Vec<Option<&[SampleValue]>> = channels
            .iter()
            .map(|c| {
                let column = table.column(&c.column).map(|col| col.values.as_slice());
                if column.is_none() {
                    tracing::warn!("No data for {} in group {}", c.column, rate);
                }
                column
            })
            .collect();

        let rows = (0..table.len())
            .map(|i| {
                columns
                    .iter()
                    .map(|col| col.map(|values| values[i].clone()).unwrap_or_default())
                    .collect()
            })
            .collect();

        Self::new(rate, channels, rows)
    }

    /// Grouping key
    pub fn rate(&self) -> RateKey {
        self.rate
    }

    /// Tick period
    pub fn period(&self) -> Duration {
        self.rate.period()
    }

    /// Member channels in column order
    pub fn channels(&self) -> &[GroupChannel] {
        &self.channels
    }

    /// Values of tick `index`
    pub fn row(&self, index: usize) -> Option<&[SampleValue]> {
        self.rows.get(index).map(Vec::as_slice)
    }

    /// Number of ticks before playback wraps around
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if the group has nothing to play
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

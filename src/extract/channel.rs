//! Channel series extraction
//!
//! Resolves one requested channel in an open file, pulls its raw samples
//! and brings them onto the caller's grid: numeric channels are first
//! replicated onto the file's reference clock, text channels are expanded
//! from their transitions, and both are finally decimated to the requested
//! timebase.

use crate::error::{PlaybackError, Result};
use crate::reader::{ChannelHandle, ChannelReader};
use crate::types::{ChannelRef, ChannelSeries, RawSamples, SampleValue};
use std::path::Path;

use super::declaration::ChannelSpec;
use super::resample::{decimate, decimation_step, expand_text, replication_factor, upsample};

/// Grid the extracted samples are delivered on
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timebase {
    /// Requested output period in seconds (0 = reference clock)
    pub requested: f64,
    /// Reference clock period of the file in seconds
    pub reference: f64,
    /// Frame count of the file on the reference clock
    pub frames: u64,
}

impl Timebase {
    /// Reference grid without decimation
    pub fn native(reference: f64, frames: u64) -> Self {
        Self {
            requested: 0.0,
            reference,
            frames,
        }
    }

    /// Decimation step from the reference clock to the requested period
    pub fn step(&self) -> usize {
        decimation_step(self.requested, self.reference)
    }

    /// Number of samples every column must have on this grid
    pub fn output_len(&self) -> usize {
        (self.frames as usize).div_ceil(self.step())
    }
}

/// Resolve a channel identity in the open file
///
/// Structured ids (`3:12`) are looked up by id, anything else by name.
pub fn resolve(reader: &mut dyn ChannelReader, path: &Path, identity: &str) -> Result<ChannelHandle> {
    reader
        .resolve_channel(&ChannelRef::parse(identity))
        .map_err(|_| PlaybackError::ChannelNotFound {
            channel: identity.to_string(),
            path: path.to_path_buf(),
        })
}

/// Extract one channel onto `timebase`
pub fn extract(
    reader: &mut dyn ChannelReader,
    path: &Path,
    identity: &str,
    timebase: Timebase,
) -> Result<ChannelSeries> {
    let handle = resolve(reader, path, identity)?;

    let damaged = |e: PlaybackError| PlaybackError::FileDamaged {
        path: path.to_path_buf(),
        reason: format!("channel {}: {}", identity, e),
    };

    let (clock, values) = match reader.samples(handle).map_err(damaged)? {
        RawSamples::Numeric {
            timebase: native,
            values,
        } => {
            let factor = replication_factor(native, timebase.reference).ok_or_else(|| {
                PlaybackError::UnsupportedClock {
                    channel: identity.to_string(),
                    native,
                    reference: timebase.reference,
                }
            })?;
            let aligned: Vec<SampleValue> = upsample(&values, factor)
                .into_iter()
                .map(SampleValue::Number)
                .collect();
            (native, aligned)
        }
        RawSamples::Text(events) => {
            let dense = expand_text(&events, timebase.reference, timebase.frames as usize)
                .into_iter()
                .map(SampleValue::Text)
                .collect();
            (timebase.reference, dense)
        }
    };

    tracing::trace!(
        "Extracted {} ({} samples at {}s) from {}",
        identity,
        values.len(),
        clock,
        path.display()
    );

    Ok(ChannelSeries {
        identity: identity.to_string(),
        clock,
        values: decimate(values, timebase.step()),
    })
}

/// Extract the first candidate of `spec` that resolves
///
/// Non-resolution falls through to the next alternative; any other failure
/// is returned as is.
pub fn extract_spec(
    reader: &mut dyn ChannelReader,
    path: &Path,
    spec: &ChannelSpec,
    timebase: Timebase,
) -> Result<ChannelSeries> {
    let candidates = spec.candidates();
    for candidate in &candidates {
        match extract(reader, path, candidate, timebase) {
            Ok(series) => return Ok(series),
            Err(e) if e.is_channel_not_found() => continue,
            Err(e) => return Err(e),
        }
    }

    Err(PlaybackError::ChannelNotFound {
        channel: candidates.join(" | "),
        path: path.to_path_buf(),
    })
}

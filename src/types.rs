//! Core data types for recplay
//!
//! This module contains the fundamental data structures used throughout
//! the crate for describing channels and the samples read from them.
//!
//! # Main Types
//!
//! - [`ChannelId`] - Structured `module:channel` identity of a channel
//! - [`ChannelRef`] - How a caller refers to a channel (structured id or name)
//! - [`ChannelKind`] - Analog, digital or text signal
//! - [`ChannelInfo`] - Everything the reader reports about a channel
//! - [`SampleValue`] - A single value pushed to the publish sink
//! - [`RawSamples`] - Samples as delivered by the reader, before resampling
//! - [`ChannelSeries`] - A channel aligned onto the reference clock

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Info key under which readers report a channel's native timebase
pub const TIMEBASE_INFO_KEY: &str = "$PDA_Tbase";

/// Structured channel identity, written as `module:channel` (or `module.channel`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChannelId {
    /// Recording module number
    pub module: u32,
    /// Channel number within the module
    pub number: u32,
}

impl ChannelId {
    /// Create a new channel id
    pub fn new(module: u32, number: u32) -> Self {
        Self { module, number }
    }

    /// Parse `3:12`, `3.12` or `[3:12]`
    pub fn parse(identity: &str) -> Option<Self> {
        let trimmed = identity
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']');
        let (module, number) = trimmed.split_once([':', '.'])?;
        if module.is_empty() || number.is_empty() {
            return None;
        }
        if !module.bytes().all(|b| b.is_ascii_digit()) || !number.bytes().all(|b| b.is_ascii_digit())
        {
            return None;
        }
        Some(Self {
            module: module.parse().ok()?,
            number: number.parse().ok()?,
        })
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.number)
    }
}

impl FromStr for ChannelId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("'{}' is not a module:channel id", s))
    }
}

/// A reference to a channel as written by a caller
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelRef {
    /// Structured id such as `3:12`
    Id(ChannelId),
    /// Free-text channel name such as `ActCastingSpeed`
    Name(String),
}

impl ChannelRef {
    /// Interpret an identity string, preferring the structured id form
    pub fn parse(identity: &str) -> Self {
        match ChannelId::parse(identity) {
            Some(id) => ChannelRef::Id(id),
            None => ChannelRef::Name(identity.trim().to_string()),
        }
    }
}

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelRef::Id(id) => write!(f, "{}", id),
            ChannelRef::Name(name) => write!(f, "{}", name),
        }
    }
}

/// Signal type of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ChannelKind {
    /// Continuous numeric signal
    #[default]
    Analog,
    /// Binary signal stored as 0/1
    Digital,
    /// Sparse text transitions
    Text,
}

impl ChannelKind {
    /// Whether samples of this kind are numeric
    pub fn is_numeric(&self) -> bool {
        !matches!(self, ChannelKind::Text)
    }

    /// Name of the address space category holding channels of this kind
    pub fn category(&self) -> &'static str {
        match self {
            ChannelKind::Analog => "Analog",
            ChannelKind::Digital => "Digital",
            ChannelKind::Text => "Text",
        }
    }

    /// Value published before the first playback tick
    pub fn initial_value(&self) -> SampleValue {
        match self {
            ChannelKind::Analog | ChannelKind::Digital => SampleValue::Number(0.0),
            ChannelKind::Text => SampleValue::Text(String::new()),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Analog => write!(f, "analog"),
            ChannelKind::Digital => write!(f, "digital"),
            ChannelKind::Text => write!(f, "text"),
        }
    }
}

/// Information about a channel as reported by the reader
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Structured identity
    pub id: ChannelId,
    /// Display name stored in the file
    pub name: String,
    /// Signal type
    pub kind: ChannelKind,
    /// Name of the recording module the channel belongs to
    pub module_name: String,
    /// Native sample period in seconds (`None` for text channels)
    pub timebase: Option<f64>,
    /// Remaining reader-specific attributes
    #[serde(default)]
    pub infos: BTreeMap<String, String>,
}

impl ChannelInfo {
    /// Create channel info with no extra attributes
    pub fn new(id: ChannelId, name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            module_name: String::new(),
            timebase: None,
            infos: BTreeMap::new(),
        }
    }

    /// Set the module name
    pub fn with_module_name(mut self, module_name: impl Into<String>) -> Self {
        self.module_name = module_name.into();
        self
    }

    /// Set the native timebase
    pub fn with_timebase(mut self, timebase: f64) -> Self {
        self.timebase = Some(timebase);
        self.infos
            .insert(TIMEBASE_INFO_KEY.to_string(), timebase.to_string());
        self
    }

    /// Add an extra attribute
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.infos.insert(key.into(), value.into());
        self
    }

    /// The `module:channel` label
    pub fn label(&self) -> String {
        self.id.to_string()
    }

    /// Folder name of the owning module, e.g. `3 Caster`
    pub fn module_label(&self) -> String {
        if self.module_name.is_empty() {
            self.id.module.to_string()
        } else {
            format!("{} {}", self.id.module, self.module_name)
        }
    }

    /// Whether a caller reference designates this channel
    pub fn matches(&self, channel: &ChannelRef) -> bool {
        match channel {
            ChannelRef::Id(id) => self.id == *id,
            ChannelRef::Name(name) => self.name == *name,
        }
    }
}

/// A single sample value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum SampleValue {
    /// Numeric sample (analog or digital)
    Number(f64),
    /// Text sample
    Text(String),
    /// Absent value (channel missing from the source file)
    #[default]
    Null,
}

impl SampleValue {
    /// Check if this is the absent marker
    pub fn is_null(&self) -> bool {
        matches!(self, SampleValue::Null)
    }

    /// Numeric value, if any
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Text value, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SampleValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<f64> for SampleValue {
    fn from(v: f64) -> Self {
        SampleValue::Number(v)
    }
}

impl From<&str> for SampleValue {
    fn from(s: &str) -> Self {
        SampleValue::Text(s.to_string())
    }
}

impl From<String> for SampleValue {
    fn from(s: String) -> Self {
        SampleValue::Text(s)
    }
}

impl fmt::Display for SampleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleValue::Number(v) => write!(f, "{}", v),
            SampleValue::Text(s) => write!(f, "{}", s),
            SampleValue::Null => write!(f, "null"),
        }
    }
}

/// A text transition: `value` holds from `offset` seconds until the next event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextEvent {
    /// Offset from the file start in seconds
    pub offset: f64,
    /// Text valid from this offset on
    pub value: String,
}

impl TextEvent {
    /// Create a new text event
    pub fn new(offset: f64, value: impl Into<String>) -> Self {
        Self {
            offset,
            value: value.into(),
        }
    }
}

/// Samples as delivered by the reader
#[derive(Debug, Clone, PartialEq)]
pub enum RawSamples {
    /// Dense numeric samples at the channel's native period
    Numeric { timebase: f64, values: Vec<f64> },
    /// Sparse text transitions
    Text(Vec<TextEvent>),
}

/// A channel resampled onto a common grid
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    /// Identity the caller asked for
    pub identity: String,
    /// Native sample period of the channel in seconds
    pub clock: f64,
    /// Samples on the output grid
    pub values: Vec<SampleValue>,
}

impl ChannelSeries {
    /// Number of samples
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

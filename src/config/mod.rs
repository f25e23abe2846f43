//! Configuration for recplay
//!
//! A single TOML file describes where the recordings live, which channels
//! to extract and how the playback and the publish sink are set up.
//!
//! # Config Location
//!
//! Without `--config` the file is looked up in the platform config
//! directory:
//! - **Linux**: `~/.config/recplay/recplay.toml`
//! - **macOS**: `~/Library/Application Support/recplay/recplay.toml`
//! - **Windows**: `%APPDATA%\recplay\recplay.toml`
//!
//! # Example
//!
//! ```toml
//! [source]
//! directory = "dat"
//! scan_sub_folders = false
//!
//! [extraction]
//! channels = ["3:0", ["3:1", "Torque"], "Pressure"]
//! tbase = 0.0
//!
//! [sink]
//! root_folder = "Modules"
//! ```

use crate::error::{PlaybackError, Result};
use crate::extract::{ChannelDeclaration, ExtractOptions, MissingChannel, NameDeclaration, DEFAULT_DELIMITER};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "recplay";

/// Config filename
pub const CONFIG_FILE: &str = "recplay.toml";

/// Default recorder file extension
pub const DEFAULT_EXTENSION: &str = "dat";

/// Default capacity of the playback event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Default requested channel count above which files are prefetched
pub const DEFAULT_PREFETCH_MIN_CHANNELS: usize = 10;

/// Path of the config file in the platform config directory
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

fn default_directory() -> PathBuf {
    PathBuf::from("dat")
}

fn default_extension() -> String {
    DEFAULT_EXTENSION.to_string()
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

fn default_true() -> bool {
    true
}

fn default_prefetch_min_channels() -> usize {
    DEFAULT_PREFETCH_MIN_CHANNELS
}

fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

fn default_root_folder() -> String {
    "Modules".to_string()
}

fn default_server_name() -> String {
    "Recorder Playback Server".to_string()
}

fn default_endpoint() -> String {
    "opc.tcp://localhost:4840/recplay/".to_string()
}

/// Where recorder files are found
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Directory to search
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// File extension without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Also search sub directories
    #[serde(default)]
    pub scan_sub_folders: bool,
    /// File stem pattern with `*`/`?` wildcards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extension: default_extension(),
            scan_sub_folders: false,
            file_name: None,
        }
    }
}

/// Which channels to extract and on what grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Channel declaration (string, list, nested list or table)
    #[serde(default)]
    pub channels: ChannelDeclaration,
    /// Display names matching `channels`, used for the channel nodes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub names: Option<NameDeclaration>,
    /// Delimiter for string declarations
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Shortest playback period in seconds; faster channels are decimated
    /// to it (0 = no floor)
    #[serde(default)]
    pub tbase: f64,
    /// Warm the OS cache before reading large channel sets
    #[serde(default = "default_true")]
    pub prefetch: bool,
    /// Channel count above which prefetching kicks in
    #[serde(default = "default_prefetch_min_channels")]
    pub prefetch_min_channels: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            channels: ChannelDeclaration::All,
            names: None,
            delimiter: default_delimiter(),
            tbase: 0.0,
            prefetch: true,
            prefetch_min_channels: DEFAULT_PREFETCH_MIN_CHANNELS,
        }
    }
}

impl ExtractionConfig {
    /// Extraction options in strict mode
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            tbase: self.tbase,
            delimiter: self.delimiter.clone(),
            missing: MissingChannel::Error,
            prefetch: self.prefetch,
            prefetch_min_channels: self.prefetch_min_channels,
        }
    }
}

/// Playback worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSettings {
    /// Capacity of the event channel; events beyond it are dropped
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Publish text channels too
    #[serde(default = "default_true")]
    pub include_text_channels: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            event_capacity: DEFAULT_EVENT_CAPACITY,
            include_text_channels: true,
        }
    }
}

/// Publish sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Name of the folder holding all module folders
    #[serde(default = "default_root_folder")]
    pub root_folder: String,
    /// Server name handed to the sink
    #[serde(default = "default_server_name")]
    pub server_name: String,
    /// Endpoint handed to the sink
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            root_folder: default_root_folder(),
            server_name: default_server_name(),
            endpoint: default_endpoint(),
        }
    }
}

/// Complete recplay configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Recorder file discovery
    #[serde(default)]
    pub source: SourceConfig,
    /// Channel extraction
    #[serde(default)]
    pub extraction: ExtractionConfig,
    /// Playback workers
    #[serde(default)]
    pub playback: PlaybackSettings,
    /// Publish sink
    #[serde(default)]
    pub sink: SinkConfig,
}

impl PlaybackConfig {
    /// Parse a config from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| PlaybackError::Config(format!("Failed to parse config: {}", e)))?;
        config.check()?;
        Ok(config)
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PlaybackError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        Self::from_toml(&content).map_err(|e| e.with_context(format!("{:?}", path)))
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Save the config to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                PlaybackError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| PlaybackError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            PlaybackError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject values no run could work with
    pub fn check(&self) -> Result<()> {
        if !(self.extraction.tbase.is_finite() && self.extraction.tbase >= 0.0) {
            return Err(PlaybackError::Config(format!(
                "tbase must be a non-negative number of seconds, got {}",
                self.extraction.tbase
            )));
        }
        if self.extraction.delimiter.is_empty() {
            return Err(PlaybackError::Config("delimiter must not be empty".to_string()));
        }
        if self.playback.event_capacity == 0 {
            return Err(PlaybackError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

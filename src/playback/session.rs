//! Playback session setup
//!
//! Runs the offline pass once: inspects the first recording, groups its
//! channels by sample rate, creates their nodes in the sink and stacks
//! every group at its own period. The result is handed to [`Playback`].

use crate::config::{ExtractionConfig, PlaybackConfig};
use crate::error::{PlaybackError, Result, ResultExt};
use crate::extract::{
    channel_infos, describe, normalize, sorted_files, stack_files, ChannelDeclaration, ExtractOptions,
    FileDescriptor,
};
use crate::reader::ChannelReader;
use crate::sink::{AddressSpace, PublishSink};
use crate::types::{ChannelInfo, ChannelRef};
use std::path::PathBuf;
use std::sync::Arc;

use super::group::{partition_by_rate, GroupChannel, PlaybackGroup};
use super::scheduler::Playback;

/// Find the recorder files named by the config, oldest first
///
/// Fails with [`PlaybackError::FileNotFound`] when the directory holds no
/// usable file.
pub fn discover(reader: &mut dyn ChannelReader, config: &PlaybackConfig) -> Result<Vec<PathBuf>> {
    let source = &config.source;
    let files = sorted_files(
        reader,
        &source.directory,
        &source.extension,
        source.file_name.as_deref(),
        source.scan_sub_folders,
    )
    .with_context(|| format!("Failed to search {:?}", source.directory))?;

    if files.is_empty() {
        return Err(PlaybackError::FileNotFound(source.directory.clone()));
    }
    tracing::info!("Found {} recorder files in {:?}", files.len(), source.directory);
    Ok(files)
}

/// Channels of `available` selected by the extraction settings, in file
/// order, each paired with its display name
fn select_channels(available: Vec<ChannelInfo>, extraction: &ExtractionConfig) -> Vec<(ChannelInfo, String)> {
    let requested = normalize(
        &extraction.channels,
        extraction.names.as_ref(),
        &extraction.delimiter,
        &available,
    );
    let wanted: Vec<(ChannelRef, &str)> = requested
        .identities()
        .into_iter()
        .map(ChannelRef::parse)
        .zip(requested.names())
        .collect();

    available
        .into_iter()
        .filter_map(|info| {
            let name = wanted
                .iter()
                .find(|(channel, _)| info.matches(channel))
                .map(|(_, name)| name.to_string())?;
            Some((info, name))
        })
        .collect()
}

/// Everything needed to start playback
#[derive(Debug)]
pub struct PreparedSession {
    /// Files played, oldest first
    pub files: Vec<PathBuf>,
    /// Metadata of the first file
    pub reference: FileDescriptor,
    /// Node handles of all published channels
    pub address_space: AddressSpace,
    /// Groups with their stacked rows
    pub groups: Vec<PlaybackGroup>,
}

impl PreparedSession {
    /// Run the offline pass over `files`
    ///
    /// The first file defines the channel set and the reference clock. Nodes
    /// are created in `sink` before any data is stacked.
    pub fn prepare(
        reader: &mut dyn ChannelReader,
        files: Vec<PathBuf>,
        sink: &dyn PublishSink,
        config: &PlaybackConfig,
    ) -> Result<Self> {
        let first = files
            .first()
            .cloned()
            .ok_or_else(|| PlaybackError::Config("no recorder files to play".to_string()))?;

        let reference = describe(reader, &first)?;
        let available = channel_infos(reader, &first, None)?;
        let selected = select_channels(available, &config.extraction);
        tracing::info!(
            "Playing {} channels of {} (clock {}s, {} frames)",
            selected.len(),
            first.display(),
            reference.clock,
            reference.frames
        );

        let address_space = AddressSpace::build_named(sink, &config.sink.root_folder, &selected)?;

        let infos: Vec<ChannelInfo> = selected.into_iter().map(|(info, _)| info).collect();
        let partitions = partition_by_rate(
            &infos,
            reference.clock,
            config.extraction.tbase,
            config.playback.include_text_channels,
        );

        let mut groups = Vec::with_capacity(partitions.len());
        for (rate, members) in partitions {
            // Columns are keyed by label so duplicate channel names cannot collide
            let declaration = ChannelDeclaration::Mapping(
                members.iter().map(|c| (c.label(), c.label())).collect(),
            );
            let options = ExtractOptions {
                tbase: rate.secs(),
                ..config.extraction.options()
            };

            let table = stack_files(reader, &files, &declaration, None, &options)
                .with_context(|| format!("Failed to stack group {}", rate))?;

            let mut channels = Vec::with_capacity(members.len());
            for info in members {
                let label = info.label();
                let handle = address_space.value_handle(&label).ok_or_else(|| {
                    PlaybackError::Sink(format!("no value node for channel {}", label))
                })?;
                channels.push(GroupChannel {
                    info,
                    column: label,
                    handle,
                });
            }

            let group = PlaybackGroup::from_table(rate, channels, &table)?;
            tracing::info!(
                "Group {}: {} channels, {} rows",
                rate,
                group.channels().len(),
                group.len()
            );
            groups.push(group);
        }

        Ok(Self {
            files,
            reference,
            address_space,
            groups,
        })
    }

    /// Number of published channels
    pub fn channel_count(&self) -> usize {
        self.groups.iter().map(|g| g.channels().len()).sum()
    }

    /// Start one worker per group
    pub fn start(self, sink: Arc<dyn PublishSink>, config: &PlaybackConfig) -> Result<Playback> {
        Playback::start(self.groups, sink, config.playback.event_capacity)
    }
}

/// Discover, prepare and start in one go
pub fn run(
    reader: &mut dyn ChannelReader,
    sink: Arc<dyn PublishSink>,
    config: &PlaybackConfig,
) -> Result<Playback> {
    let files = discover(reader, config)?;
    let session = PreparedSession::prepare(reader, files, sink.as_ref(), config)?;
    session.start(sink, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ChannelEntry, NameDeclaration};
    use crate::types::{ChannelId, ChannelKind};

    fn available() -> Vec<ChannelInfo> {
        vec![
            ChannelInfo::new(ChannelId::new(1, 0), "Speed", ChannelKind::Analog),
            ChannelInfo::new(ChannelId::new(1, 1), "Torque", ChannelKind::Analog),
            ChannelInfo::new(ChannelId::new(2, 0), "State", ChannelKind::Text),
        ]
    }

    fn extraction(channels: ChannelDeclaration) -> ExtractionConfig {
        ExtractionConfig {
            channels,
            ..ExtractionConfig::default()
        }
    }

    #[test]
    fn test_select_all() {
        let selected = select_channels(available(), &extraction(ChannelDeclaration::All));
        let names: Vec<_> = selected.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, vec!["Speed", "Torque", "State"]);
    }

    #[test]
    fn test_select_subset_keeps_file_order() {
        let decl = ChannelDeclaration::List(vec![
            ChannelEntry::Id("State".to_string()),
            ChannelEntry::Alternatives(vec!["9:9".to_string(), "1:0".to_string()]),
        ]);
        let selected = select_channels(available(), &extraction(decl));
        let labels: Vec<_> = selected.iter().map(|(info, _)| info.label()).collect();
        assert_eq!(labels, vec!["1:0", "2:0"]);
    }

    #[test]
    fn test_select_applies_display_names() {
        let mut config = extraction(ChannelDeclaration::Delimited("Torque,1:0".to_string()));
        config.names = Some(NameDeclaration::Delimited("torque_nm,speed_rpm".to_string()));
        let selected = select_channels(available(), &config);
        let names: Vec<_> = selected.iter().map(|(_, name)| name.as_str()).collect();
        assert_eq!(names, vec!["speed_rpm", "torque_nm"]);

        let mapped = extraction(ChannelDeclaration::Mapping(vec![(
            "2:0".to_string(),
            "state_text".to_string(),
        )]));
        let selected = select_channels(available(), &mapped);
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].1, "state_text");
    }

    #[test]
    fn test_prepare_without_files() {
        let mut reader = crate::reader::MemoryReader::new();
        let sink = crate::sink::MemorySink::new();
        let err = PreparedSession::prepare(&mut reader, Vec::new(), &sink, &PlaybackConfig::default()).unwrap_err();
        assert!(matches!(err, PlaybackError::Config(_)));
    }
}

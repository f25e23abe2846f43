//! Channel node hierarchy
//!
//! Lays the channels of a recording out as
//! `root / "<module no> <module name>" / <Analog|Digital|Text> / <channel>`.
//! Each channel object carries a writable `value` variable and one
//! read-only attribute per static channel property. Attributes are written
//! once here and never touched by playback.

use crate::error::{PlaybackError, Result};
use crate::types::{ChannelInfo, SampleValue};
use std::collections::BTreeMap;

use super::{NodeHandle, NodeKind, PublishSink};

/// Name of the per-channel variable updated during playback
pub const VALUE_NODE_NAME: &str = "value";

/// Nodes created for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelNodes {
    /// Channel object
    pub object: NodeHandle,
    /// Current value variable
    pub value: NodeHandle,
    /// Read-only attributes by name
    pub attributes: BTreeMap<String, NodeHandle>,
}

/// Node handles for a set of channels
#[derive(Debug, Clone, Default)]
pub struct AddressSpace {
    root: Option<NodeHandle>,
    modules: BTreeMap<String, NodeHandle>,
    categories: BTreeMap<(String, &'static str), NodeHandle>,
    channels: BTreeMap<String, ChannelNodes>,
}

fn static_attributes(info: &ChannelInfo) -> Vec<(String, SampleValue)> {
    let mut attributes = vec![
        ("type".to_string(), SampleValue::from(info.kind.to_string())),
        ("module_no".to_string(), SampleValue::Number(f64::from(info.id.module))),
        ("module".to_string(), SampleValue::from(info.module_name.clone())),
        ("no".to_string(), SampleValue::Number(f64::from(info.id.number))),
        ("id".to_string(), SampleValue::from(info.label())),
    ];
    attributes.extend(
        info.infos
            .iter()
            .map(|(k, v)| (k.clone(), SampleValue::from(v.clone()))),
    );
    attributes
}

impl AddressSpace {
    /// Create the node tree for `channels` below a new `root_folder`
    ///
    /// Channels are keyed by their `module:channel` label.
    pub fn build(sink: &dyn PublishSink, root_folder: &str, channels: &[ChannelInfo]) -> Result<Self> {
        let named: Vec<(ChannelInfo, String)> = channels
            .iter()
            .map(|info| (info.clone(), info.name.clone()))
            .collect();
        Self::build_named(sink, root_folder, &named)
    }

    /// Like [`AddressSpace::build`], with the channel objects named by the
    /// paired display name instead of the name stored in the file
    pub fn build_named(
        sink: &dyn PublishSink,
        root_folder: &str,
        channels: &[(ChannelInfo, String)],
    ) -> Result<Self> {
        let root = sink.create_node(None, root_folder, NodeKind::Folder)?;
        let mut space = AddressSpace {
            root: Some(root),
            ..Default::default()
        };

        for (info, display) in channels {
            space.add_channel(sink, info, display)?;
        }

        tracing::info!(
            "Address space ready: {} modules, {} channels",
            space.modules.len(),
            space.channels.len()
        );
        Ok(space)
    }

    fn add_channel(&mut self, sink: &dyn PublishSink, info: &ChannelInfo, display: &str) -> Result<()> {
        let label = info.label();
        if self.channels.contains_key(&label) {
            return Err(PlaybackError::Sink(format!("channel {} added twice", label)));
        }

        let module_label = info.module_label();
        let module = match self.modules.get(&module_label) {
            Some(&handle) => handle,
            None => {
                let handle = sink.create_node(self.root, &module_label, NodeKind::Folder)?;
                self.modules.insert(module_label.clone(), handle);
                handle
            }
        };

        let category_key = (module_label, info.kind.category());
        let category = match self.categories.get(&category_key) {
            Some(&handle) => handle,
            None => {
                let handle = sink.create_node(Some(module), category_key.1, NodeKind::Folder)?;
                self.categories.insert(category_key, handle);
                handle
            }
        };

        let object = sink.create_node(Some(category), display, NodeKind::Object)?;
        let value = sink.create_node(
            Some(object),
            VALUE_NODE_NAME,
            NodeKind::Variable {
                initial: info.kind.initial_value(),
                writable: true,
            },
        )?;

        let mut attributes = BTreeMap::new();
        for (name, initial) in static_attributes(info) {
            let handle = sink.create_node(Some(object), &name, NodeKind::attribute(initial))?;
            attributes.insert(name, handle);
        }

        let display_name = display;
        tracing::debug!("Created nodes for {} ({})", label, display_name);
        self.channels.insert(
            label,
            ChannelNodes {
                object,
                value,
                attributes,
            },
        );
        Ok(())
    }

    /// Root folder handle
    pub fn root(&self) -> Option<NodeHandle> {
        self.root
    }

    /// Nodes of a channel by its `module:channel` label
    pub fn channel(&self, label: &str) -> Option<&ChannelNodes> {
        self.channels.get(label)
    }

    /// Value handle of a channel by its `module:channel` label
    pub fn value_handle(&self, label: &str) -> Option<NodeHandle> {
        self.channels.get(label).map(|c| c.value)
    }

    /// Number of module folders
    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    /// Number of channels
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Check if no channel has nodes
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}

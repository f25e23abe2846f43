//! Publish sink interface
//!
//! The sink is the outbound side of playback, typically an industrial
//! protocol server. It exposes a tree of nodes; channel values are pushed
//! to it by handle. Implementations must accept concurrent
//! [`PublishSink::set_value`] calls from several playback workers, each
//! targeting its own handles.

pub mod address_space;
pub mod memory;

pub use address_space::{AddressSpace, ChannelNodes, VALUE_NODE_NAME};
pub use memory::{MemorySink, NodeRecord, TracingSink, WriteRecord};

use crate::error::Result;
use crate::types::SampleValue;
use std::fmt;

/// Opaque reference to a node created by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub u64);

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ns=1;i={}", self.0)
    }
}

/// What kind of node to create
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Plain organizational folder
    Folder,
    /// Object grouping the nodes of one channel
    Object,
    /// Value-carrying node
    Variable {
        /// Value published before the first update
        initial: SampleValue,
        /// Whether clients may write the value
        writable: bool,
    },
}

impl NodeKind {
    /// Read-only variable holding `value`
    pub fn attribute(value: impl Into<SampleValue>) -> Self {
        NodeKind::Variable {
            initial: value.into(),
            writable: false,
        }
    }
}

/// Outbound publishing target
#[cfg_attr(test, mockall::automock)]
pub trait PublishSink: Send + Sync {
    /// Create a node below `parent` (or below the sink's root)
    fn create_node(&self, parent: Option<NodeHandle>, name: &str, kind: NodeKind) -> Result<NodeHandle>;

    /// Publish a new value for a variable node
    fn set_value(&self, handle: NodeHandle, value: &SampleValue) -> Result<()>;
}

//! In-process sinks
//!
//! [`MemorySink`] keeps the created node tree and every published value,
//! which makes playback observable in tests. [`TracingSink`] only logs and
//! backs the demo binary.

use crate::error::{PlaybackError, Result};
use crate::types::SampleValue;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use super::{NodeHandle, NodeKind, PublishSink};

/// A node created through [`MemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub struct NodeRecord {
    /// Parent node (`None` below the sink root)
    pub parent: Option<NodeHandle>,
    /// Browse name
    pub name: String,
    /// Node kind with its initial value
    pub kind: NodeKind,
}

/// One published value
#[derive(Debug, Clone, PartialEq)]
pub struct WriteRecord {
    /// Target node
    pub handle: NodeHandle,
    /// Published value
    pub value: SampleValue,
    /// When the write arrived
    pub at: Instant,
}

#[derive(Debug, Default)]
struct MemorySinkState {
    nodes: Vec<NodeRecord>,
    children: HashMap<(Option<NodeHandle>, String), NodeHandle>,
    writes: Vec<WriteRecord>,
}

/// Sink that records nodes and writes in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    state: Mutex<MemorySinkState>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemorySinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Follow a browse path from the root
    pub fn find(&self, path: &[&str]) -> Option<NodeHandle> {
        let state = self.state();
        let mut parent = None;
        for name in path {
            parent = Some(*state.children.get(&(parent, (*name).to_string()))?);
        }
        parent
    }

    /// The record of a created node
    pub fn node(&self, handle: NodeHandle) -> Option<NodeRecord> {
        self.state().nodes.get(handle.0 as usize).cloned()
    }

    /// Number of created nodes
    pub fn node_count(&self) -> usize {
        self.state().nodes.len()
    }

    /// All writes in arrival order
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.state().writes.clone()
    }

    /// Writes that targeted `handle`, in arrival order
    pub fn writes_for(&self, handle: NodeHandle) -> Vec<WriteRecord> {
        self.state()
            .writes
            .iter()
            .filter(|w| w.handle == handle)
            .cloned()
            .collect()
    }

    /// Total number of writes
    pub fn write_count(&self) -> usize {
        self.state().writes.len()
    }

    /// Latest value of a variable (its initial value before any write)
    pub fn current_value(&self, handle: NodeHandle) -> Option<SampleValue> {
        let state = self.state();
        if let Some(write) = state.writes.iter().rev().find(|w| w.handle == handle) {
            return Some(write.value.clone());
        }
        match &state.nodes.get(handle.0 as usize)?.kind {
            NodeKind::Variable { initial, .. } => Some(initial.clone()),
            _ => None,
        }
    }
}

impl PublishSink for MemorySink {
    fn create_node(&self, parent: Option<NodeHandle>, name: &str, kind: NodeKind) -> Result<NodeHandle> {
        let mut state = self.state();
        if let Some(parent) = parent {
            if parent.0 as usize >= state.nodes.len() {
                return Err(PlaybackError::Sink(format!("unknown parent node {}", parent)));
            }
        }

        let key = (parent, name.to_string());
        if state.children.contains_key(&key) {
            return Err(PlaybackError::Sink(format!("node '{}' already exists", name)));
        }

        let handle = NodeHandle(state.nodes.len() as u64);
        state.nodes.push(NodeRecord {
            parent,
            name: name.to_string(),
            kind,
        });
        state.children.insert(key, handle);
        Ok(handle)
    }

    fn set_value(&self, handle: NodeHandle, value: &SampleValue) -> Result<()> {
        let at = Instant::now();
        let mut state = self.state();
        match state.nodes.get(handle.0 as usize) {
            Some(NodeRecord {
                kind: NodeKind::Variable { .. },
                ..
            }) => {}
            _ => {
                return Err(PlaybackError::Sink(format!(
                    "node {} is not a variable",
                    handle
                )))
            }
        }
        state.writes.push(WriteRecord {
            handle,
            value: value.clone(),
            at,
        });
        Ok(())
    }
}

/// Sink that logs writes through `tracing` and keeps no data
#[derive(Debug)]
pub struct TracingSink {
    server_name: String,
    next_handle: AtomicU64,
    writes: AtomicU64,
}

impl TracingSink {
    /// Create a sink labelled `server_name` in the logs
    pub fn new(server_name: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            next_handle: AtomicU64::new(0),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of values published so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl PublishSink for TracingSink {
    fn create_node(&self, parent: Option<NodeHandle>, name: &str, kind: NodeKind) -> Result<NodeHandle> {
        let handle = NodeHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(
            "[{}] node {} '{}' under {:?}: {:?}",
            self.server_name,
            handle,
            name,
            parent,
            kind
        );
        Ok(handle)
    }

    fn set_value(&self, handle: NodeHandle, value: &SampleValue) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("[{}] {} = {}", self.server_name, handle, value);
        Ok(())
    }
}

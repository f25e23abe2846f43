//! Channel declaration normalizing
//!
//! Callers declare channels in several shapes: nothing or `*` (every
//! channel), a single id, a delimited string, a list whose entries may be
//! groups of interchangeable alternatives, or an id → display name map.
//! [`normalize`] turns any of these into parallel identity/name sequences.
//!
//! When the supplied names do not line up with the resolved channels, the
//! names fall back to the channel identities without an error.

use crate::types::{ChannelInfo, ChannelRef};
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Wildcard selecting every channel of a file
pub const ALL_CHANNELS: &str = "*";

/// Default delimiter for string declarations
pub const DEFAULT_DELIMITER: &str = ",";

/// One entry of a channel list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelEntry {
    /// A single identity (`3:12` or a channel name)
    Id(String),
    /// Interchangeable identities; the first one present in the file wins
    Alternatives(Vec<String>),
}

/// How a caller declares the channels to extract
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ChannelDeclaration {
    /// Every channel in the file
    #[default]
    All,
    /// Exactly one identity, never split
    Single(String),
    /// Identities joined by a delimiter
    Delimited(String),
    /// Ordered identities and alternative groups
    List(Vec<ChannelEntry>),
    /// Identity → display name, in declaration order
    Mapping(Vec<(String, String)>),
}

/// How a caller declares the display names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NameDeclaration {
    /// Names joined by a delimiter
    Delimited(String),
    /// Ordered names
    List(Vec<String>),
}

/// A resolved channel request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    /// Preferred identity
    pub identity: String,
    /// Column / node name the channel is published under
    pub name: String,
    /// Alternative identities to try in order (empty for plain entries)
    pub alternatives: Vec<String>,
}

impl ChannelSpec {
    /// Plain single-identity request
    pub fn new(identity: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            name: name.into(),
            alternatives: Vec::new(),
        }
    }

    /// Identities to try, in order
    pub fn candidates(&self) -> Vec<&str> {
        if self.alternatives.is_empty() {
            vec![self.identity.as_str()]
        } else {
            self.alternatives.iter().map(String::as_str).collect()
        }
    }

    /// Whether this request came from an alternative group
    pub fn is_alternative_group(&self) -> bool {
        !self.alternatives.is_empty()
    }
}

/// Result of [`normalize`]: equal-length identity and name sequences
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NormalizedChannels {
    /// Requests in declaration order
    pub specs: Vec<ChannelSpec>,
}

impl NormalizedChannels {
    /// Preferred identities in order
    pub fn identities(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.identity.as_str()).collect()
    }

    /// Display names in order
    pub fn names(&self) -> Vec<&str> {
        self.specs.iter().map(|s| s.name.as_str()).collect()
    }

    /// Number of requested channels
    pub fn len(&self) -> usize {
        self.specs.len()
    }

    /// Check if nothing was requested
    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

fn is_wildcard(s: &str) -> bool {
    let s = s.trim();
    s.is_empty() || s == ALL_CHANNELS
}

fn split_trimmed(s: &str, delimiter: &str) -> Vec<String> {
    s.split(delimiter)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn present(available: &[ChannelInfo], identity: &str) -> bool {
    let channel = ChannelRef::parse(identity);
    available.iter().any(|c| c.matches(&channel))
}

/// Normalize a channel declaration against the channels of a file
///
/// `available` is only consulted for the all-channels case and to pick the
/// preferred member of alternative groups.
pub fn normalize(
    channels: &ChannelDeclaration,
    names: Option<&NameDeclaration>,
    delimiter: &str,
    available: &[ChannelInfo],
) -> NormalizedChannels {
    let entries: Vec<ChannelEntry> = match channels {
        ChannelDeclaration::All => return all_channels(available),
        ChannelDeclaration::Single(id) if is_wildcard(id) => return all_channels(available),
        ChannelDeclaration::Delimited(s) if is_wildcard(s) => return all_channels(available),
        ChannelDeclaration::Mapping(pairs) => {
            // Mapped names win over any supplied names
            let specs = pairs
                .iter()
                .map(|(id, name)| ChannelSpec::new(id.trim(), name.as_str()))
                .collect();
            return NormalizedChannels { specs };
        }
        ChannelDeclaration::Single(id) => vec![ChannelEntry::Id(id.trim().to_string())],
        ChannelDeclaration::Delimited(s) => split_trimmed(s, delimiter)
            .into_iter()
            .map(ChannelEntry::Id)
            .collect(),
        ChannelDeclaration::List(list) => list
            .iter()
            .filter_map(|entry| match entry {
                ChannelEntry::Id(id) if id.is_empty() => None,
                ChannelEntry::Id(id) => Some(ChannelEntry::Id(id.clone())),
                ChannelEntry::Alternatives(alts) => {
                    let alts: Vec<String> =
                        alts.iter().filter(|a| !a.is_empty()).cloned().collect();
                    (!alts.is_empty()).then_some(ChannelEntry::Alternatives(alts))
                }
            })
            .collect(),
    };

    if entries.is_empty() {
        return all_channels(available);
    }

    let names: Option<Vec<String>> = match names {
        Some(NameDeclaration::Delimited(s)) if is_wildcard(s) => None,
        Some(NameDeclaration::Delimited(s)) => Some(split_trimmed(s, delimiter)),
        Some(NameDeclaration::List(list)) => Some(list.clone()),
        None => None,
    };
    let names = names.filter(|n| n.len() == entries.len());

    let specs = entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let (identity, alternatives) = match entry {
                ChannelEntry::Id(id) => (id, Vec::new()),
                ChannelEntry::Alternatives(alts) => {
                    let preferred = alts
                        .iter()
                        .find(|a| present(available, a))
                        .unwrap_or(&alts[0])
                        .clone();
                    (preferred, alts)
                }
            };
            let name = match &names {
                Some(names) => names[i].clone(),
                None => identity.clone(),
            };
            ChannelSpec {
                identity,
                name,
                alternatives,
            }
        })
        .collect();

    NormalizedChannels { specs }
}

/// Every channel by its `module:channel` label, named after its display
/// name; display names shared by several channels fall back to the label
fn all_channels(available: &[ChannelInfo]) -> NormalizedChannels {
    NormalizedChannels {
        specs: available
            .iter()
            .map(|c| {
                let shared = available.iter().filter(|o| o.name == c.name).count() > 1;
                let name = if shared { c.label() } else { c.name.clone() };
                ChannelSpec::new(c.label(), name)
            })
            .collect(),
    }
}

// ==================== Serde ====================
//
// A declaration is written as whatever shape is natural: a string, a list
// (with nested lists for alternatives), or a table of id = "name".

impl Serialize for ChannelDeclaration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ChannelDeclaration::All => serializer.serialize_str(ALL_CHANNELS),
            ChannelDeclaration::Single(s) | ChannelDeclaration::Delimited(s) => {
                serializer.serialize_str(s)
            }
            ChannelDeclaration::List(entries) => {
                let mut seq = serializer.serialize_seq(Some(entries.len()))?;
                for entry in entries {
                    seq.serialize_element(entry)?;
                }
                seq.end()
            }
            ChannelDeclaration::Mapping(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (id, name) in pairs {
                    map.serialize_entry(id, name)?;
                }
                map.end()
            }
        }
    }
}

struct DeclarationVisitor;

impl<'de> Visitor<'de> for DeclarationVisitor {
    type Value = ChannelDeclaration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a channel string, a list of channels or a table of id = name")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        if is_wildcard(v) {
            Ok(ChannelDeclaration::All)
        } else {
            Ok(ChannelDeclaration::Delimited(v.to_string()))
        }
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ChannelDeclaration::All)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(ChannelDeclaration::All)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut entries = Vec::new();
        while let Some(entry) = seq.next_element::<ChannelEntry>()? {
            entries.push(entry);
        }
        Ok(ChannelDeclaration::List(entries))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut pairs = Vec::new();
        while let Some((id, name)) = map.next_entry::<String, String>()? {
            pairs.push((id, name));
        }
        Ok(ChannelDeclaration::Mapping(pairs))
    }
}

impl<'de> Deserialize<'de> for ChannelDeclaration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DeclarationVisitor)
    }
}

//! Offline extraction pass.
//!
//! Turns recorder files into in-memory [`SeriesTable`]s: channel
//! declarations are normalized against the file, metadata is validated,
//! every channel is aligned to the reference clock and decimated to the
//! requested timebase, and several files are stacked in chronological
//! order.
//!
//! # Pipeline
//!
//! ```text
//! discover ──► sort by start time ──► per file: validate ──► normalize
//!                                                  └──► extract channels ──► SeriesTable
//!                                     concat (null-fill) ◄──┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! let files = sorted_files(&mut reader, dir, "dat", None, false)?;
//! let table = stack_files(&mut reader, &files, &ChannelDeclaration::All, None, &ExtractOptions::default())?;
//! ```

pub mod channel;
pub mod declaration;
pub mod discovery;
pub mod file;
pub mod resample;
pub mod stack;
pub mod table;
pub mod validate;

pub use channel::{extract, extract_spec, Timebase};
pub use declaration::{
    normalize, ChannelDeclaration, ChannelEntry, ChannelSpec, NameDeclaration, NormalizedChannels,
    ALL_CHANNELS, DEFAULT_DELIMITER,
};
pub use discovery::{discover_files, sorted_files};
pub use file::{channel_infos, extract_file, has_channel, prefetch, ExtractOptions, MissingChannel};
pub use stack::{read_start_time, sort_by_start_time, stack_files};
pub use table::{Column, SeriesTable};
pub use validate::{describe, validate, FileDescriptor, FileMetadata, INCOMPLETE_FRAME_SENTINEL};

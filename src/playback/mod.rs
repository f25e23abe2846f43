//! Real-time multi-rate playback.
//!
//! Channels are grouped by sample period. Each group runs on its own
//! worker thread, advancing a cursor through its pre-extracted rows and
//! pushing one value per channel per tick to the publish sink.
//!
//! # Architecture
//!
//! ```text
//! PreparedSession::prepare ──► [PlaybackGroup 1ms]  ──► worker ──┐
//!  (offline, blocking)         [PlaybackGroup 10ms] ──► worker ──┼──► PublishSink
//!                              [PlaybackGroup 1s]   ──► worker ──┘
//!                                                          └──► PlaybackEvent channel
//! ```
//!
//! # Example
//!
//! ```ignore
//! let files = discover(&mut reader, &config)?;
//! let session = PreparedSession::prepare(&mut reader, files, sink.as_ref(), &config)?;
//! let mut playback = session.start(sink, &config)?;
//! // ...
//! for (rate, stats) in playback.shutdown() {
//!     println!("{}: {} ticks, {} overruns", rate, stats.ticks, stats.overruns);
//! }
//! ```

pub mod group;
pub mod scheduler;
pub mod session;

pub use group::{partition_by_rate, GroupChannel, PlaybackGroup, RateKey};
pub use scheduler::{Playback, PlaybackEvent, TickStats};
pub use session::{discover, run, PreparedSession};

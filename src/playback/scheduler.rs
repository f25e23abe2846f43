//! Drift-corrected playback workers
//!
//! Every [`PlaybackGroup`] gets its own thread. The thread keeps an
//! absolute deadline that advances by exactly one period per tick, so a
//! late tick shortens the following sleep instead of shifting every later
//! tick.
//!
//! # Tick
//!
//! 1. Check the running flag; exit when cleared.
//! 2. Publish the value of every member channel at the cursor.
//! 3. Advance the cursor, wrapping to the first row at the end.
//! 4. Advance the deadline by one period and wait for it. If it already
//!    passed, report an overrun and continue immediately.
//!
//! Workers share nothing but the sink. Events go out over a bounded
//! channel with `try_send`, so a slow consumer never stalls playback.

use crate::error::Result;
use crate::sink::{NodeHandle, PublishSink};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::group::{PlaybackGroup, RateKey};

/// Size of the rolling window for recent tick lateness
const RECENT_WINDOW_SIZE: usize = 100;

/// Timing statistics of one worker
#[derive(Debug, Clone, Serialize)]
pub struct TickStats {
    /// Ticks started
    pub ticks: u64,
    /// Ticks whose deadline had already passed
    pub overruns: u64,
    /// Failed sink writes
    pub sink_errors: u64,
    /// Sum of tick start lateness in microseconds
    pub total_lateness_us: u64,
    /// Largest tick start lateness in microseconds
    pub max_lateness_us: u64,
    /// Rolling window of recent lateness values
    pub recent_lateness_us: VecDeque<u64>,
}

impl Default for TickStats {
    fn default() -> Self {
        Self {
            ticks: 0,
            overruns: 0,
            sink_errors: 0,
            total_lateness_us: 0,
            max_lateness_us: 0,
            recent_lateness_us: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl TickStats {
    /// Record the start of a tick `lateness` after its deadline
    pub fn record_tick(&mut self, lateness: Duration) {
        let us = lateness.as_micros() as u64;
        self.ticks += 1;
        self.total_lateness_us += us;
        self.max_lateness_us = self.max_lateness_us.max(us);

        self.recent_lateness_us.push_back(us);
        if self.recent_lateness_us.len() > RECENT_WINDOW_SIZE {
            self.recent_lateness_us.pop_front();
        }
    }

    /// Record a tick whose deadline had passed before its sleep
    pub fn record_overrun(&mut self) {
        self.overruns += 1;
    }

    /// Record a failed sink write
    pub fn record_sink_error(&mut self) {
        self.sink_errors += 1;
    }

    /// Average tick start lateness in microseconds
    pub fn avg_lateness_us(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.total_lateness_us as f64 / self.ticks as f64
        }
    }

    /// Lateness spread (max - min) over the recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_lateness_us.iter().min().copied().unwrap_or(0);
        let max = self.recent_lateness_us.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }

    /// Share of ticks that overran, in percent
    pub fn overrun_rate(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.overruns as f64 / self.ticks as f64 * 100.0
        }
    }
}

/// Notifications from playback workers
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    /// A worker entered its tick loop
    Started {
        /// Group served
        rate: RateKey,
        /// Number of member channels
        channels: usize,
        /// Number of rows before wrap-around
        rows: usize,
    },
    /// A tick finished after the next deadline
    Overrun {
        /// Group served
        rate: RateKey,
        /// Tick counter at the overrun
        tick: u64,
        /// How far past the deadline the tick ended
        lateness: Duration,
    },
    /// The sink rejected a value
    SinkError {
        /// Group served
        rate: RateKey,
        /// Target node
        handle: NodeHandle,
        /// Error text
        message: String,
    },
    /// A worker left its tick loop
    Stopped {
        /// Group served
        rate: RateKey,
        /// Ticks performed
        ticks: u64,
    },
}

struct GroupWorker {
    group: PlaybackGroup,
    sink: Arc<dyn PublishSink>,
    running: Arc<AtomicBool>,
    wake_rx: Receiver<()>,
    events: Sender<PlaybackEvent>,
    cursor: usize,
    stats: TickStats,
}

impl GroupWorker {
    fn run(mut self) -> TickStats {
        let rate = self.group.rate();
        let period = self.group.period();
        tracing::info!(
            "Playback worker {} started ({} channels, {} rows)",
            rate,
            self.group.channels().len(),
            self.group.len()
        );
        self.emit(PlaybackEvent::Started {
            rate,
            channels: self.group.channels().len(),
            rows: self.group.len(),
        });

        let mut deadline = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            self.stats
                .record_tick(Instant::now().saturating_duration_since(deadline));

            self.publish_row();
            self.cursor = (self.cursor + 1) % self.group.len();

            deadline += period;
            let now = Instant::now();
            if now >= deadline {
                let lateness = now - deadline;
                self.stats.record_overrun();
                tracing::warn!("Group {} overran tick {} by {:?}", rate, self.stats.ticks, lateness);
                self.emit(PlaybackEvent::Overrun {
                    rate,
                    tick: self.stats.ticks,
                    lateness,
                });
                continue;
            }

            match self.wake_rx.recv_deadline(deadline) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Controller is gone
                    self.running.store(false, Ordering::SeqCst);
                }
            }
        }

        tracing::info!("Playback worker {} stopped after {} ticks", rate, self.stats.ticks);
        self.emit(PlaybackEvent::Stopped {
            rate,
            ticks: self.stats.ticks,
        });
        self.stats
    }

    fn publish_row(&mut self) {
        let Some(row) = self.group.row(self.cursor) else {
            return;
        };

        for (channel, value) in self.group.channels().iter().zip(row) {
            if let Err(e) = self.sink.set_value(channel.handle, value) {
                self.stats.record_sink_error();
                if self.stats.sink_errors == 1 {
                    tracing::warn!("Sink rejected {}: {}", channel.info.label(), e);
                } else {
                    tracing::debug!("Sink rejected {}: {}", channel.info.label(), e);
                }
                let event = PlaybackEvent::SinkError {
                    rate: self.group.rate(),
                    handle: channel.handle,
                    message: e.to_string(),
                };
                let _ = self.events.try_send(event);
            }
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.events.try_send(event);
    }
}

struct WorkerHandle {
    rate: RateKey,
    running: Arc<AtomicBool>,
    wake_tx: Sender<()>,
    thread: Option<JoinHandle<TickStats>>,
}

impl WorkerHandle {
    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
    }

    fn join(&mut self) -> Option<TickStats> {
        let thread = self.thread.take()?;
        match thread.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                tracing::error!("Playback worker {} panicked", self.rate);
                None
            }
        }
    }
}

/// Running playback: one worker per group
///
/// Dropping the controller stops and joins all workers.
pub struct Playback {
    workers: Vec<WorkerHandle>,
    events: Receiver<PlaybackEvent>,
}

impl Playback {
    /// Start one worker per non-empty group
    pub fn start(groups: Vec<PlaybackGroup>, sink: Arc<dyn PublishSink>, event_capacity: usize) -> Result<Self> {
        let (event_tx, event_rx) = bounded(event_capacity.max(1));
        let mut workers = Vec::with_capacity(groups.len());

        for group in groups {
            let rate = group.rate();
            if group.is_empty() {
                tracing::warn!("Group {} has no rows, not starting it", rate);
                continue;
            }

            let running = Arc::new(AtomicBool::new(true));
            let (wake_tx, wake_rx) = bounded(1);
            let worker = GroupWorker {
                group,
                sink: Arc::clone(&sink),
                running: Arc::clone(&running),
                wake_rx,
                events: event_tx.clone(),
                cursor: 0,
                stats: TickStats::default(),
            };

            let spawned = std::thread::Builder::new()
                .name(format!("playback-{}", rate))
                .spawn(move || worker.run());

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    // Do not leave already started workers behind
                    let mut partial = Playback {
                        workers,
                        events: event_rx,
                    };
                    partial.shutdown();
                    return Err(e.into());
                }
            };

            workers.push(WorkerHandle {
                rate,
                running,
                wake_tx,
                thread: Some(thread),
            });
        }

        Ok(Self {
            workers,
            events: event_rx,
        })
    }

    /// Event stream of all workers
    pub fn events(&self) -> &Receiver<PlaybackEvent> {
        &self.events
    }

    /// Rates with a started worker
    pub fn rates(&self) -> Vec<RateKey> {
        self.workers.iter().map(|w| w.rate).collect()
    }

    /// Check if any worker is still looping
    pub fn is_running(&self) -> bool {
        self.workers
            .iter()
            .any(|w| w.thread.as_ref().is_some_and(|t| !t.is_finished()))
    }

    /// Signal one group to stop; returns false for an unknown rate
    pub fn stop_group(&self, rate: RateKey) -> bool {
        match self.workers.iter().find(|w| w.rate == rate) {
            Some(worker) => {
                worker.stop();
                true
            }
            None => false,
        }
    }

    /// Signal every group to stop
    pub fn stop_all(&self) {
        for worker in &self.workers {
            worker.stop();
        }
    }

    /// Wait for one group to finish and return its statistics
    ///
    /// Blocks until the group is stopped.
    pub fn join_group(&mut self, rate: RateKey) -> Option<TickStats> {
        self.workers
            .iter_mut()
            .find(|w| w.rate == rate)
            .and_then(WorkerHandle::join)
    }

    /// Stop every group and wait for all workers
    ///
    /// Once this returns no worker writes to the sink anymore.
    pub fn shutdown(&mut self) -> Vec<(RateKey, TickStats)> {
        self.stop_all();
        self.workers
            .iter_mut()
            .filter_map(|w| w.join().map(|stats| (w.rate, stats)))
            .collect()
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.shutdown();
    }
}
